//! Ferrox - remote file session engine on the command line
//!
//! Browses, transfers and synchronizes files through a [`Session`]. The
//! bundled loopback backend serves a local directory as the remote tree.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use dialoguer::Confirm;
use ferrox_config::{Config, ConfigLoader};
use ferrox_session::{JsonChangesStore, LoopbackConnector, Session};
use ferrox_sync::{SyncMode, SyncOptions, SyncParams, SynchronizeEngine};
use ferrox_types::{CopyParam, DeleteParams, FileItem, FileMasks};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

mod display;
mod ui;

use ui::TerminalUi;

/// Ferrox - remote file session engine
#[derive(Parser)]
#[command(
    name = "ferrox",
    version = env!("CARGO_PKG_VERSION"),
    about = "Remote file sessions with caching, transactions and synchronization",
    long_about = "Ferrox drives a remote file session: listings are cached, batch operations\n\
                  resolve errors with retry and skip, and directories can be synchronized\n\
                  in either direction."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the log to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Never ask, answer every question with its default
    #[arg(short, long)]
    yes: bool,

    /// Local directory served as the remote tree
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a remote directory
    Ls {
        /// Remote directory
        #[arg(default_value = ".")]
        directory: String,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a remote directory
    Mkdir {
        /// Remote path
        path: String,
    },
    /// Delete remote files and directories
    Rm {
        /// Remote paths
        #[arg(required = true)]
        paths: Vec<String>,
        /// Never use the recycle bin
        #[arg(long)]
        force: bool,
    },
    /// Download remote files and directories
    Get {
        /// Remote paths
        #[arg(required = true)]
        paths: Vec<String>,
        /// Local target directory
        #[arg(short, long, default_value = ".")]
        to: PathBuf,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Upload local files and directories
    Put {
        /// Local paths
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Remote target directory
        #[arg(short, long, default_value = ".")]
        to: String,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Synchronize a local directory with a remote one
    Sync {
        /// Local directory
        local: PathBuf,
        /// Remote directory
        #[arg(default_value = ".")]
        remote: String,
        /// Side brought up to date
        #[arg(short, long, value_enum, default_value = "remote")]
        mode: SyncModeArg,
        /// Delete obsolete files on the target side
        #[arg(long)]
        delete: bool,
        /// Compare sizes as well
        #[arg(long)]
        by_size: bool,
        /// Do not compare modification times
        #[arg(long)]
        not_by_time: bool,
        /// Only update files that exist on both sides
        #[arg(long)]
        existing_only: bool,
        /// Only align modification times
        #[arg(long)]
        timestamp: bool,
        /// Any time difference updates the target side
        #[arg(long)]
        mirror: bool,
        /// Do not descend into subdirectories
        #[arg(long)]
        no_recurse: bool,
        /// Restrict the first level to these names
        #[arg(long)]
        only: Vec<String>,
        /// File masks, `include|exclude`
        #[arg(long)]
        mask: Option<String>,
        /// Dry run - show what would be done
        #[arg(long)]
        dry_run: bool,
        /// Print the checklist as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
        /// Validate a configuration file
        #[arg(long)]
        validate: Option<PathBuf>,
        /// Write a default configuration file
        #[arg(long)]
        generate: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct TransferArgs {
    /// Delete sources after the transfer
    #[arg(long = "move")]
    delete: bool,
    /// Only transfer files newer than the target
    #[arg(long)]
    newer_only: bool,
    /// Keep source modification times
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    preserve_time: bool,
    /// Keep source permissions
    #[arg(long)]
    preserve_rights: bool,
    /// Resume partially transferred files
    #[arg(long)]
    resume: bool,
    /// File masks, `include|exclude`
    #[arg(long)]
    mask: Option<String>,
}

impl TransferArgs {
    fn copy_param(&self, no_confirmation: bool) -> Result<CopyParam> {
        Ok(CopyParam {
            masks: parse_masks(self.mask.as_deref())?,
            preserve_time: self.preserve_time,
            preserve_rights: self.preserve_rights,
            newer_only: self.newer_only,
            resume: self.resume,
            delete: self.delete,
            no_confirmation,
            ..CopyParam::default()
        })
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum SyncModeArg {
    Remote,
    Local,
    Both,
}

impl From<SyncModeArg> for SyncMode {
    fn from(mode: SyncModeArg) -> Self {
        match mode {
            SyncModeArg::Remote => SyncMode::Remote,
            SyncModeArg::Local => SyncMode::Local,
            SyncModeArg::Both => SyncMode::Both,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigLoader::load_default().context("Failed to load configuration")?,
    };

    let log_file = cli.log_file.clone().or_else(|| config.logging.log_file.clone());
    let _guard = init_logging(&cli, &config, log_file.as_deref())?;

    info!("Ferrox v{} starting", env!("CARGO_PKG_VERSION"));

    let interactive = !cli.yes && std::io::stdin().is_terminal();
    let ui = Arc::new(TerminalUi::new(interactive, cli.quiet));
    let result = run(&cli, &config, &ui);
    ui.clear();
    result
}

fn run(cli: &Cli, config: &Config, ui: &Arc<TerminalUi>) -> Result<()> {
    match &cli.command {
        Commands::Ls { directory, json } => {
            let mut session = open_session(cli, config, ui)?;
            let list = session
                .read_directory_listing(directory, &FileMasks::default())
                .with_context(|| format!("Failed to list {}", directory))?;
            ui.clear();
            if *json {
                let files: Vec<_> = list
                    .files()
                    .iter()
                    .map(|file| {
                        serde_json::json!({
                            "name": file.file_name,
                            "directory": file.is_directory(),
                            "size": file.size,
                            "modification": file.modification,
                            "rights": file.rights,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                display::display_listing(&list);
            }
            session.close();
        }
        Commands::Mkdir { path } => {
            let mut session = open_session(cli, config, ui)?;
            session
                .create_directory(path, None)
                .with_context(|| format!("Failed to create {}", path))?;
            session.close();
            display::display_done(&format!("Created {}", path));
        }
        Commands::Rm { paths, force } => {
            let mut session = open_session(cli, config, ui)?;
            let items: Vec<FileItem> = paths.iter().map(|path| FileItem::new(path.as_str())).collect();
            let params = DeleteParams {
                force_delete: *force,
                ..DeleteParams::default()
            };
            let completed = session.delete_files(&items, params)?;
            session.close();
            report_completion(completed, &format!("Deleted {} item(s)", items.len()));
        }
        Commands::Get { paths, to, transfer } => {
            let copy_param = transfer.copy_param(!ui.is_interactive())?;
            let mut session = open_session(cli, config, ui)?;
            let items: Vec<FileItem> = paths.iter().map(|path| FileItem::new(path.as_str())).collect();
            let completed = session.copy_to_local(&items, to, &copy_param)?;
            session.close();
            report_completion(completed, &format!("Downloaded into {}", to.display()));
        }
        Commands::Put { paths, to, transfer } => {
            let copy_param = transfer.copy_param(!ui.is_interactive())?;
            let mut session = open_session(cli, config, ui)?;
            let completed = session.copy_to_remote(paths, to, &copy_param)?;
            session.close();
            report_completion(completed, &format!("Uploaded into {}", to));
        }
        Commands::Sync {
            local,
            remote,
            mode,
            delete,
            by_size,
            not_by_time,
            existing_only,
            timestamp,
            mirror,
            no_recurse,
            only,
            mask,
            dry_run,
            json,
        } => {
            let params = SyncParams {
                delete: *delete,
                no_confirmation: !ui.is_interactive(),
                existing_only: *existing_only,
                timestamp: *timestamp,
                not_by_time: *not_by_time,
                by_size: *by_size,
                no_recurse: *no_recurse,
                mirror: *mirror,
                ..SyncParams::default()
            };
            let copy_param = CopyParam {
                masks: parse_masks(mask.as_deref())?,
                ..CopyParam::default()
            };
            let options = (!only.is_empty()).then(|| SyncOptions::with_filter(only.iter().cloned()));
            sync_command(
                cli,
                config,
                ui,
                SyncRequest {
                    local,
                    remote,
                    mode: (*mode).into(),
                    params,
                    copy_param: &copy_param,
                    options: options.as_ref(),
                    dry_run: *dry_run,
                    json: *json,
                },
            )?;
        }
        Commands::Config {
            default,
            format,
            validate,
            generate,
        } => config_command(config, *default, *format, validate.as_deref(), generate.as_deref())?,
    }
    Ok(())
}

fn init_logging(cli: &Cli, config: &Config, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else if log_file.is_some() {
        config.logging.level.as_str()
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;

    let Some(path) = log_file else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
        return Ok(None);
    };

    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().context("Log file path has no file name")?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));

    let layer = if config.logging.json_format {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(writer)
            .boxed()
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(Some(guard))
}

fn parse_masks(mask: Option<&str>) -> Result<FileMasks> {
    match mask {
        Some(text) => FileMasks::parse(text).with_context(|| format!("Invalid file mask '{}'", text)),
        None => Ok(FileMasks::default()),
    }
}

fn open_session(cli: &Cli, config: &Config, ui: &Arc<TerminalUi>) -> Result<Session> {
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("Remote root {} does not exist", cli.root.display()))?;
    let connector = Rc::new(LoopbackConnector::new(&root));

    let mut session = Session::new(config.session.clone(), config.engine.clone(), connector, ui.clone());
    if config.session.preserve_directory_changes {
        if let Some(directory) = ConfigLoader::state_directory() {
            let store = JsonChangesStore::new(directory.join("directory-changes.json"));
            session = session.with_changes_store(Rc::new(store));
        }
    }

    session
        .open()
        .with_context(|| format!("Failed to open session on {}", root.display()))?;
    info!("Session {} opened", session.session_name());
    Ok(session)
}

fn report_completion(completed: bool, message: &str) {
    if completed {
        display::display_done(message);
    } else {
        display::display_warning("Operation was cancelled");
    }
}

struct SyncRequest<'a> {
    local: &'a Path,
    remote: &'a str,
    mode: SyncMode,
    params: SyncParams,
    copy_param: &'a CopyParam,
    options: Option<&'a SyncOptions>,
    dry_run: bool,
    json: bool,
}

fn sync_command(cli: &Cli, config: &Config, ui: &Arc<TerminalUi>, request: SyncRequest<'_>) -> Result<()> {
    if !request.local.is_dir() {
        bail!("Local directory {} does not exist", request.local.display());
    }

    let mut session = open_session(cli, config, ui)?;
    let mut engine = SynchronizeEngine::new(&mut session);
    let checklist = engine
        .collect(
            request.local,
            request.remote,
            request.mode,
            request.copy_param,
            request.params,
            request.options,
        )
        .context("Failed to compare directories")?;
    ui.clear();

    if request.json {
        println!("{}", serde_json::to_string_pretty(&checklist)?);
    } else if !cli.quiet {
        display::display_checklist(&checklist);
    }

    if request.dry_run || checklist.checked_count() == 0 {
        return Ok(());
    }

    if ui.is_interactive() {
        let proceed = Confirm::new()
            .with_prompt(format!("Apply {} action(s)?", checklist.checked_count()))
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        if !proceed {
            println!("{}", style("Nothing changed").dim());
            return Ok(());
        }
    }

    engine
        .apply(&checklist, request.copy_param, request.params)
        .context("Synchronization failed")?;
    session.close();
    display::display_done(&format!(
        "Synchronized {} with {}",
        request.local.display(),
        request.remote
    ));
    Ok(())
}

fn config_command(
    config: &Config,
    default: bool,
    format: ConfigFormat,
    validate: Option<&Path>,
    generate: Option<&Path>,
) -> Result<()> {
    if let Some(path) = validate {
        ConfigLoader::validate_file(path)
            .with_context(|| format!("Configuration {} is invalid", path.display()))?;
        display::display_done(&format!("{} is valid", path.display()));
        return Ok(());
    }

    if let Some(path) = generate {
        ConfigLoader::generate_default_config(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        display::display_done(&format!("Wrote {}", path.display()));
        return Ok(());
    }

    let shown = if default { Config::default() } else { config.clone() };
    let text = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&shown)?,
        ConfigFormat::Toml => toml::to_string_pretty(&shown)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&shown)?,
    };
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_arguments() {
        let cli = Cli::try_parse_from([
            "ferrox", "--root", "/srv", "sync", "site", "/www", "--mode", "both", "--delete", "--only", "docs",
        ])
        .unwrap();
        match cli.command {
            Commands::Sync {
                local,
                remote,
                mode,
                delete,
                only,
                ..
            } => {
                assert_eq!(local, PathBuf::from("site"));
                assert_eq!(remote, "/www");
                assert_eq!(SyncMode::from(mode), SyncMode::Both);
                assert!(delete);
                assert_eq!(only, vec!["docs".to_string()]);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn test_transfer_defaults_preserve_time() {
        let cli = Cli::try_parse_from(["ferrox", "get", "a.txt", "--newer-only"]).unwrap();
        let Commands::Get { transfer, .. } = cli.command else {
            panic!("expected get");
        };
        let copy_param = transfer.copy_param(true).unwrap();
        assert!(copy_param.preserve_time);
        assert!(copy_param.newer_only);
        assert!(copy_param.no_confirmation);
        assert!(!copy_param.delete);
    }

    #[test]
    fn test_parse_masks() {
        assert!(parse_masks(Some("*.txt")).is_ok());
        assert!(parse_masks(None).unwrap().is_empty());
    }
}

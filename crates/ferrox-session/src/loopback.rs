//! Loopback backend serving a local directory tree as the remote side
//!
//! [`LoopbackBackend`] maps remote paths below `/` onto a local root
//! directory. It implements the whole [`FileSystemBackend`] contract with
//! plain filesystem calls, which makes it the backend of the command line
//! tool and of round-trip tests.

use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ferrox_config::SessionConfig;
use ferrox_types::{
    unix_path, Answers, BoundProtocol, CancelStatus, Capability, CopyParam, DeleteParams, Error,
    FileItem, FileKind, FileList, FileSystemBackend, ModificationPrecision, OperationProgress,
    OverwriteFileParams, QueryAnswer, RemoteFile, RemoteProperties, Result, SessionUi,
};
use filetime::FileTime;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::connector::{Connector, SecureShell};
use crate::tunnel::{TunnelTarget, TunnelTransport};

const PRECISION: ModificationPrecision = ModificationPrecision::Seconds;

/// Backend over a local directory
#[derive(Debug)]
pub struct LoopbackBackend {
    root: PathBuf,
    protocol: BoundProtocol,
    home_directory: String,
    current_directory: String,
    active: bool,
}

impl LoopbackBackend {
    /// Connect to `root`, starting in `home_directory`
    pub fn connect(
        root: impl Into<PathBuf>,
        protocol: BoundProtocol,
        home_directory: &str,
    ) -> Result<Self> {
        let mut backend = Self {
            root: root.into(),
            protocol,
            home_directory: unix_path::expand(home_directory, "/"),
            current_directory: String::new(),
            active: false,
        };
        backend.open()?;
        Ok(backend)
    }

    /// Local directory served as `/`
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path of a remote path, relative paths resolve against the
    /// current directory
    pub fn local_path(&self, path: &str) -> PathBuf {
        let remote = unix_path::expand(path, &self.current_directory);
        remote
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |local, part| local.join(part))
    }

    fn remote_path(&self, local: &Path) -> Result<String> {
        let root = fs::canonicalize(&self.root)?;
        let relative = local.strip_prefix(&root).map_err(|_| {
            Error::command(format!(
                "Path '{}' is outside of the served directory",
                local.display()
            ))
        })?;
        let parts: Vec<String> = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(format!("/{}", parts.join("/")))
    }

    fn ensure_active(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(Error::fatal("Connection closed"))
        }
    }

    fn entry(&self, directory: &str, name: &str, local: &Path) -> Result<RemoteFile> {
        let link_metadata = fs::symlink_metadata(local)
            .map_err(|e| Error::command(format!("{}: {}", local.display(), e)))?;
        let is_symlink = link_metadata.file_type().is_symlink();
        let metadata = if is_symlink {
            fs::metadata(local).unwrap_or_else(|_| link_metadata.clone())
        } else {
            link_metadata
        };

        let mut file = RemoteFile {
            file_name: name.to_string(),
            directory: directory.to_string(),
            kind: if metadata.is_dir() {
                FileKind::Directory
            } else {
                FileKind::File
            },
            is_symlink,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modification: modification_time(&metadata),
            precision: PRECISION,
            rights: rights(&metadata),
            ..RemoteFile::default()
        };
        if is_symlink {
            file.link_target = fs::read_link(local)
                .ok()
                .map(|target| target.to_string_lossy().into_owned());
        }
        Ok(file)
    }
}

fn modification_time(metadata: &Metadata) -> DateTime<Utc> {
    let time = metadata
        .modified()
        .map_or_else(|_| DateTime::<Utc>::default(), DateTime::<Utc>::from);
    PRECISION.reduce(time)
}

#[cfg(unix)]
fn rights(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn rights(_metadata: &Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn set_rights(path: &Path, rights: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(rights))
}

#[cfg(not(unix))]
fn set_rights(_path: &Path, _rights: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Changing permissions is not supported on this platform",
    ))
}

#[cfg(unix)]
fn symlink(point_to: &str, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(point_to, path)
}

#[cfg(not(unix))]
fn symlink(_point_to: &str, _path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Symbolic links are not supported on this platform",
    ))
}

fn remove(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn copy_tree(source: &Path, target: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

fn overwrite_answers() -> Answers {
    Answers::of(&[
        QueryAnswer::Yes,
        QueryAnswer::No,
        QueryAnswer::Cancel,
        QueryAnswer::YesToAll,
        QueryAnswer::NoToAll,
        QueryAnswer::All,
        QueryAnswer::NeverAskAgain,
    ])
}

/// Copy one file, consulting the overwrite policy when the target exists
///
/// Returns whether the file was written.
fn transfer_file(
    source: &Path,
    destination: &Path,
    copy_param: &CopyParam,
    progress: &mut OperationProgress,
) -> Result<bool> {
    progress.set_file(destination.to_string_lossy())?;
    let source_metadata = fs::metadata(source)?;

    let mut append_from = None;
    if let Ok(dest_metadata) = fs::metadata(destination) {
        if dest_metadata.is_dir() {
            return Err(Error::command(format!(
                "Cannot overwrite directory '{}' with a file",
                destination.display()
            )));
        }
        let params = OverwriteFileParams {
            source_size: source_metadata.len(),
            dest_size: dest_metadata.len(),
            source_timestamp: modification_time(&source_metadata),
            dest_timestamp: modification_time(&dest_metadata),
            source_precision: PRECISION,
            dest_precision: PRECISION,
        };
        let name = destination
            .file_name()
            .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
        match progress.confirm_file_overwrite(
            &name,
            Some(&params),
            overwrite_answers(),
            copy_param,
            copy_param.resume,
        )? {
            QueryAnswer::Yes => {}
            QueryAnswer::Retry => {
                append_from = Some(if copy_param.resume {
                    params.dest_size.min(params.source_size)
                } else {
                    0
                });
            }
            QueryAnswer::Cancel | QueryAnswer::Abort => {
                progress.set_cancel(CancelStatus::Cancel);
                return Ok(false);
            }
            answer => {
                debug!("Keeping existing {} ({:?})", destination.display(), answer);
                progress.add_skipped(source_metadata.len());
                return Ok(false);
            }
        }
    }

    let written = match append_from {
        Some(offset) => {
            let mut input = File::open(source)?;
            input.seek(SeekFrom::Start(offset))?;
            let mut output = OpenOptions::new().append(true).open(destination)?;
            io::copy(&mut input, &mut output)?
        }
        None => fs::copy(source, destination)?,
    };
    progress.add_transferred(written)?;

    if copy_param.preserve_time {
        filetime::set_file_mtime(
            destination,
            FileTime::from_last_modification_time(&source_metadata),
        )?;
    }
    if copy_param.preserve_rights {
        fs::set_permissions(destination, source_metadata.permissions())?;
    }
    Ok(true)
}

/// Copy `source` into `target_directory`, recursing into directories
fn transfer_item(
    source: &Path,
    target_directory: &Path,
    copy_param: &CopyParam,
    progress: &mut OperationProgress,
) -> Result<()> {
    let name = source
        .file_name()
        .ok_or_else(|| Error::command(format!("Invalid source '{}'", source.display())))?;
    let display_name = name.to_string_lossy().into_owned();
    let metadata = fs::metadata(source)?;
    if !copy_param.allow_transfer(&display_name, metadata.is_dir()) {
        trace!("{} excluded by masks", source.display());
        return Ok(());
    }

    let destination = target_directory.join(name);
    let mut complete = true;
    if metadata.is_dir() {
        let walker = WalkDir::new(source)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || copy_param.allow_transfer(
                        &entry.file_name().to_string_lossy(),
                        entry.file_type().is_dir(),
                    )
            });
        for entry in walker {
            if !progress.is_continuing() {
                return Ok(());
            }
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
            let target = destination.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                complete &= transfer_file(entry.path(), &target, copy_param, progress)?;
            }
        }
    } else {
        complete = transfer_file(source, &destination, copy_param, progress)?;
    }

    if copy_param.delete && complete && progress.is_continuing() {
        remove(source)?;
    }
    progress.finish(&display_name, true)
}

impl FileSystemBackend for LoopbackBackend {
    fn protocol(&self) -> BoundProtocol {
        self.protocol
    }

    fn open(&mut self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(Error::fatal(format!(
                "Directory '{}' cannot be served",
                self.root.display()
            )));
        }
        self.active = true;
        if self.current_directory.is_empty() {
            self.current_directory.clone_from(&self.home_directory);
        }
        debug!("Serving {} as /", self.root.display());
        Ok(())
    }

    fn close(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn is_capable(&self, capability: Capability) -> bool {
        match capability {
            Capability::RemoteCopy
            | Capability::RemoteMove
            | Capability::HardLink
            | Capability::PreservingTimestamp
            | Capability::Resume => true,
            Capability::SymbolicLink | Capability::ModeChanging => cfg!(unix),
            Capability::AnyCommand
            | Capability::OwnerChanging
            | Capability::GroupChanging
            | Capability::UserGroupListing
            | Capability::CheckingSpaceAvailable
            | Capability::CalculatingChecksum => false,
        }
    }

    fn current_directory(&self) -> String {
        self.current_directory.clone()
    }

    fn read_current_directory(&mut self) -> Result<()> {
        self.ensure_active()?;
        if !self.local_path(&self.current_directory).is_dir() {
            return Err(Error::command(format!(
                "Directory '{}' no longer exists",
                self.current_directory
            )));
        }
        Ok(())
    }

    fn home_directory(&mut self) -> Result<()> {
        let home = self.home_directory.clone();
        self.change_directory(&home)
    }

    fn change_directory(&mut self, directory: &str) -> Result<()> {
        self.ensure_active()?;
        let target = unix_path::expand(directory, &self.current_directory);
        if !self.local_path(&target).is_dir() {
            return Err(Error::command(format!("Directory '{}' does not exist", target)));
        }
        self.current_directory = target;
        Ok(())
    }

    fn read_directory(&mut self, list: &mut FileList) -> Result<()> {
        self.ensure_active()?;
        let directory = unix_path::expand(list.directory(), &self.current_directory);
        let local = self.local_path(&directory);
        let mut entries: Vec<_> = fs::read_dir(&local)
            .map_err(|e| Error::command(format!("{}: {}", directory, e)))?
            .collect::<io::Result<_>>()?;
        entries.sort_by_key(fs::DirEntry::file_name);

        if directory != "/" {
            let parent = local.parent().unwrap_or(self.root.as_path());
            let mut up = self.entry(&directory, "..", parent)?;
            up.is_symlink = false;
            up.link_target = None;
            list.add_file(up);
        }
        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            list.add_file(self.entry(&directory, &name, &entry.path())?);
        }
        Ok(())
    }

    fn read_file(&mut self, path: &str) -> Result<RemoteFile> {
        self.ensure_active()?;
        let remote = unix_path::expand(path, &self.current_directory);
        let directory = unix_path::parent(&remote);
        self.entry(&directory, unix_path::file_name(&remote), &self.local_path(&remote))
    }

    fn read_symlink(&mut self, link: &RemoteFile) -> Result<RemoteFile> {
        self.ensure_active()?;
        let resolved = fs::canonicalize(self.local_path(&link.full_file_name()))
            .map_err(|e| Error::command(format!("{}: {}", link.full_file_name(), e)))?;
        let remote = self.remote_path(&resolved)?;
        let mut target = self.entry(&unix_path::parent(&remote), unix_path::file_name(&remote), &resolved)?;
        target.link_target = Some(remote);
        Ok(target)
    }

    fn create_directory(&mut self, path: &str) -> Result<()> {
        self.ensure_active()?;
        fs::create_dir(self.local_path(path))?;
        Ok(())
    }

    fn create_link(&mut self, path: &str, point_to: &str, symbolic: bool) -> Result<()> {
        self.ensure_active()?;
        let local = self.local_path(path);
        if symbolic {
            symlink(point_to, &local)?;
        } else {
            fs::hard_link(self.local_path(point_to), &local)?;
        }
        Ok(())
    }

    fn delete_file(
        &mut self,
        path: &str,
        _file: Option<&RemoteFile>,
        _params: DeleteParams,
    ) -> Result<()> {
        self.ensure_active()?;
        remove(&self.local_path(path))?;
        Ok(())
    }

    fn rename_file(&mut self, path: &str, new_path: &str) -> Result<()> {
        self.ensure_active()?;
        fs::rename(self.local_path(path), self.local_path(new_path))?;
        Ok(())
    }

    fn copy_file(&mut self, path: &str, new_path: &str) -> Result<()> {
        self.ensure_active()?;
        let source = self.local_path(path);
        let target = self.local_path(new_path);
        if source.is_dir() {
            copy_tree(&source, &target)?;
        } else {
            fs::copy(&source, &target)?;
        }
        Ok(())
    }

    fn change_file_properties(
        &mut self,
        path: &str,
        _file: Option<&RemoteFile>,
        properties: &RemoteProperties,
    ) -> Result<()> {
        self.ensure_active()?;
        if properties.owner.is_some() || properties.group.is_some() {
            return Err(Error::command("Changing ownership is not supported"));
        }
        let local = self.local_path(path);
        let targets: Vec<PathBuf> = if properties.recursive && local.is_dir() {
            WalkDir::new(&local)
                .into_iter()
                .map(|entry| entry.map(walkdir::DirEntry::into_path))
                .collect::<std::result::Result<_, _>>()
                .map_err(io::Error::from)?
        } else {
            vec![local]
        };
        for target in targets {
            if let Some(rights) = properties.rights {
                set_rights(&target, rights)?;
            }
            if let Some(modification) = properties.modification {
                let time = FileTime::from_unix_time(
                    modification.timestamp(),
                    modification.timestamp_subsec_nanos(),
                );
                filetime::set_file_mtime(&target, time)?;
            }
        }
        Ok(())
    }

    fn copy_to_remote(
        &mut self,
        files: &[PathBuf],
        target_directory: &str,
        copy_param: &CopyParam,
        progress: &mut OperationProgress,
    ) -> Result<()> {
        self.ensure_active()?;
        let target = self.local_path(target_directory);
        for file in files {
            if !progress.is_continuing() {
                break;
            }
            transfer_item(file, &target, copy_param, progress)?;
        }
        Ok(())
    }

    fn copy_to_local(
        &mut self,
        files: &[FileItem],
        target_directory: &Path,
        copy_param: &CopyParam,
        progress: &mut OperationProgress,
    ) -> Result<()> {
        self.ensure_active()?;
        for item in files {
            if !progress.is_continuing() {
                break;
            }
            let source = self.local_path(&item.name);
            transfer_item(&source, target_directory, copy_param, progress)?;
        }
        Ok(())
    }
}

/// Secure shell stand-in of the loopback connector
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopbackShell;

impl SecureShell for LoopbackShell {
    fn ssh_fallback_command(&self) -> bool {
        false
    }
}

/// Connector binding every protocol to a [`LoopbackBackend`]
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    root: PathBuf,
    home_directory: String,
}

impl LoopbackConnector {
    /// Serve `root` with `/` as the home directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            home_directory: "/".to_string(),
        }
    }

    /// Start sessions in `home_directory`
    pub fn with_home_directory(mut self, home_directory: impl Into<String>) -> Self {
        self.home_directory = home_directory.into();
        self
    }

    fn backend(&self, protocol: BoundProtocol) -> Result<Box<dyn FileSystemBackend>> {
        Ok(Box::new(LoopbackBackend::connect(
            self.root.clone(),
            protocol,
            &self.home_directory,
        )?))
    }
}

impl Connector for LoopbackConnector {
    fn connect_ftp(
        &self,
        _config: &SessionConfig,
        _ui: Arc<dyn SessionUi>,
    ) -> Result<Box<dyn FileSystemBackend>> {
        self.backend(BoundProtocol::Ftp)
    }

    fn connect_shell(
        &self,
        _config: &SessionConfig,
        _ui: Arc<dyn SessionUi>,
    ) -> Result<Box<dyn SecureShell>> {
        Ok(Box::new(LoopbackShell))
    }

    fn bind_shell(
        &self,
        _shell: Box<dyn SecureShell>,
        protocol: BoundProtocol,
    ) -> Result<Box<dyn FileSystemBackend>> {
        self.backend(protocol)
    }

    fn open_tunnel(
        &self,
        _target: &TunnelTarget,
        _ui: Arc<dyn SessionUi>,
    ) -> Result<Box<dyn TunnelTransport>> {
        Err(Error::tunnel("The loopback connector does not open tunnels"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrox_types::{Operation, OperationSide};
    use tempfile::TempDir;

    fn served() -> (TempDir, LoopbackBackend) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("docs")).unwrap();
        fs::write(root.join("docs").join("a.txt"), b"hello").unwrap();
        fs::write(root.join("readme.md"), b"read me").unwrap();
        let backend = LoopbackBackend::connect(root, BoundProtocol::Sftp, "/").unwrap();
        (temp_dir, backend)
    }

    fn progress() -> OperationProgress {
        OperationProgress::start(Operation::Copy, OperationSide::Local, 1, None)
    }

    #[test]
    fn test_listing_includes_parent_entry() {
        let (_temp_dir, mut backend) = served();
        let mut list = FileList::new("/docs");
        backend.read_directory(&mut list).unwrap();

        let names: Vec<_> = list.files().iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["..", "a.txt"]);
        let file = list.find("a.txt").unwrap();
        assert_eq!(file.size, 5);
        assert_eq!(file.directory, "/docs");
        assert_eq!(file.precision, ModificationPrecision::Seconds);
    }

    #[test]
    fn test_root_listing_has_no_parent_entry() {
        let (_temp_dir, mut backend) = served();
        let mut list = FileList::new("/");
        backend.read_directory(&mut list).unwrap();
        assert!(list.find("..").is_none());
        assert!(list.find("docs").unwrap().is_directory());
    }

    #[test]
    fn test_change_directory_resolves_relative_paths() {
        let (_temp_dir, mut backend) = served();
        backend.change_directory("docs").unwrap();
        assert_eq!(backend.current_directory(), "/docs");
        backend.change_directory("..").unwrap();
        assert_eq!(backend.current_directory(), "/");
        assert!(backend.change_directory("/missing").is_err());
        assert_eq!(backend.current_directory(), "/");
    }

    #[test]
    fn test_paths_cannot_escape_the_root() {
        let (temp_dir, backend) = served();
        assert_eq!(backend.local_path("/../../etc"), temp_dir.path().join("etc"));
    }

    #[test]
    fn test_file_operations() {
        let (temp_dir, mut backend) = served();
        backend.create_directory("/new").unwrap();
        backend.rename_file("/readme.md", "/new/readme.md").unwrap();
        backend.copy_file("/new", "/copy").unwrap();
        assert!(temp_dir.path().join("copy").join("readme.md").is_file());

        backend
            .delete_file("/new", None, DeleteParams::default())
            .unwrap();
        assert!(!temp_dir.path().join("new").exists());
    }

    #[test]
    fn test_change_modification_time() {
        let (_temp_dir, mut backend) = served();
        let time = DateTime::<Utc>::from_timestamp(1_600_000_000, 0).unwrap();
        backend
            .change_file_properties("/readme.md", None, &RemoteProperties::modification(time))
            .unwrap();
        assert_eq!(backend.read_file("/readme.md").unwrap().modification, time);
    }

    #[test]
    fn test_closed_backend_fails_fatally() {
        let (_temp_dir, mut backend) = served();
        backend.close();
        let error = backend.change_directory("/docs").unwrap_err();
        assert!(error.is_fatal());
    }

    #[test]
    fn test_copy_to_local_preserves_time() {
        let (_temp_dir, mut backend) = served();
        let target = TempDir::new().unwrap();
        let copy_param = CopyParam {
            preserve_time: true,
            ..CopyParam::default()
        };
        let mut progress = progress();
        backend
            .copy_to_local(&[FileItem::new("/docs")], target.path(), &copy_param, &mut progress)
            .unwrap();

        let copied = target.path().join("docs").join("a.txt");
        assert_eq!(fs::read(&copied).unwrap(), b"hello");
        let source = backend.read_file("/docs/a.txt").unwrap();
        let local = modification_time(&fs::metadata(&copied).unwrap());
        assert_eq!(local, source.modification);
        assert_eq!(progress.processed(), 1);
        assert_eq!(progress.transferred(), 5);
    }

    #[test]
    fn test_copy_to_remote_honours_masks() {
        let (temp_dir, mut backend) = served();
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("keep.txt"), b"1").unwrap();
        fs::write(source.path().join("drop.log"), b"2").unwrap();
        let copy_param = CopyParam {
            masks: ferrox_types::FileMasks::parse("*.txt").unwrap(),
            ..CopyParam::default()
        };
        let files = vec![source.path().join("keep.txt"), source.path().join("drop.log")];
        backend
            .copy_to_remote(&files, "/docs", &copy_param, &mut progress())
            .unwrap();
        assert!(temp_dir.path().join("docs").join("keep.txt").is_file());
        assert!(!temp_dir.path().join("docs").join("drop.log").exists());
    }

    #[test]
    fn test_existing_target_kept_when_newer_only() {
        let (temp_dir, mut backend) = served();
        let source = TempDir::new().unwrap();
        let local = source.path().join("a.txt");
        fs::write(&local, b"older content").unwrap();
        filetime::set_file_mtime(&local, FileTime::from_unix_time(1_000_000_000, 0)).unwrap();

        let copy_param = CopyParam {
            newer_only: true,
            ..CopyParam::default()
        };
        let mut progress = progress();
        backend
            .copy_to_remote(&[local], "/docs", &copy_param, &mut progress)
            .unwrap();
        assert_eq!(fs::read(temp_dir.path().join("docs").join("a.txt")).unwrap(), b"hello");
        assert_eq!(progress.skipped(), 13);
    }

    #[test]
    fn test_move_removes_sources() {
        let (temp_dir, mut backend) = served();
        let target = TempDir::new().unwrap();
        let copy_param = CopyParam {
            delete: true,
            ..CopyParam::default()
        };
        backend
            .copy_to_local(&[FileItem::new("/readme.md")], target.path(), &copy_param, &mut progress())
            .unwrap();
        assert!(target.path().join("readme.md").is_file());
        assert!(!temp_dir.path().join("readme.md").exists());
    }

    #[test]
    fn test_connector_binds_requested_protocol() {
        let temp_dir = TempDir::new().unwrap();
        let connector = LoopbackConnector::new(temp_dir.path());
        let ui: Arc<dyn SessionUi> = Arc::new(ferrox_types::UnattendedUi);
        let config = SessionConfig::default();
        let shell = connector.connect_shell(&config, Arc::clone(&ui)).unwrap();
        let backend = connector.bind_shell(shell, BoundProtocol::Scp).unwrap();
        assert_eq!(backend.protocol(), BoundProtocol::Scp);
        assert!(backend.is_active());
        assert!(connector.connect_ftp(&config, ui).unwrap().is_active());
    }
}

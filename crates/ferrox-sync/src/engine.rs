//! Collect and apply over a session

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ferrox_session::Session;
use ferrox_types::{
    unix_path, CopyParam, DeleteParams, Error, FileItem, ModificationPrecision, Operation,
    OperationProgress, OperationSide, RemoteFile, RemoteProperties, Result,
};
use filetime::FileTime;
use tracing::debug;

use crate::checklist::{Checklist, ChecklistAction, ChecklistItem, FileInfo};
use crate::options::{SyncMode, SyncOptions, SyncParams};

/// Two-phase synchronizer of a local and a remote directory tree
///
/// [`collect`](Self::collect) compares the trees and proposes actions,
/// [`apply`](Self::apply) carries out the checked ones through the session's
/// regular file operations.
#[derive(Debug)]
pub struct SynchronizeEngine<'a> {
    session: &'a mut Session,
}

/// Settings shared by every directory of one collection
struct CollectContext<'p> {
    mode: SyncMode,
    copy_param: &'p CopyParam,
    params: SyncParams,
    options: Option<&'p SyncOptions>,
}

impl CollectContext<'_> {
    fn passes_filter(&self, first_level: bool, name: &str, other_name: &str) -> bool {
        !first_level
            || self
                .options
                .map_or(true, |options| options.allows(name) || options.allows(other_name))
    }

    fn default_checked(&self, is_directory: bool) -> bool {
        !is_directory || !self.params.no_recurse || self.params.sub_dirs
    }
}

/// A local entry waiting to be matched against the remote listing
struct LocalEntry {
    info: FileInfo,
    is_directory: bool,
    new: bool,
    modified: bool,
    matching_remote: Option<(FileInfo, RemoteFile)>,
}

fn local_modification(metadata: &fs::Metadata) -> DateTime<Utc> {
    let time = FileTime::from_last_modification_time(metadata);
    DateTime::from_timestamp(time.unix_seconds(), time.nanoseconds()).unwrap_or_default()
}

impl<'a> SynchronizeEngine<'a> {
    /// Synchronize through `session`
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    /// Compare `local_directory` with `remote_directory` and list the actions
    /// that bring the side selected by `mode` up to date
    ///
    /// The checklist is sorted by directory and name. Running it twice over
    /// unchanged trees yields the same items in the same order.
    pub fn collect(
        &mut self,
        local_directory: &Path,
        remote_directory: &str,
        mode: SyncMode,
        copy_param: &CopyParam,
        params: SyncParams,
        options: Option<&SyncOptions>,
    ) -> Result<Checklist> {
        let context = CollectContext {
            mode,
            copy_param,
            params,
            options,
        };
        let mut checklist = Checklist::new();
        collect_directory(
            self.session,
            &context,
            local_directory,
            &unix_path::exclude_trailing_slash(remote_directory),
            true,
            &mut checklist,
        )?;
        checklist.sort();
        Ok(checklist)
    }

    /// Carry out the checked items of `checklist`
    ///
    /// Items are handled per directory pair, each pair in its own transaction,
    /// downloads first, then remote deletions, uploads and local deletions. A
    /// batch that does not run to the end aborts the rest.
    pub fn apply(&mut self, checklist: &Checklist, copy_param: &CopyParam, params: SyncParams) -> Result<()> {
        let mut sync_copy_param = copy_param.clone();
        if !params.not_by_time {
            sync_copy_param.preserve_time = true;
        }
        if params.no_confirmation {
            sync_copy_param.no_confirmation = true;
        }

        checklist.groups().into_iter().try_for_each(|group| {
            self.session.begin_transaction();
            let applied = self.apply_group(group, &sync_copy_param, params);
            let ended = self.session.end_transaction();
            applied.and(ended)
        })
    }

    fn apply_group(&mut self, group: &[ChecklistItem], copy_param: &CopyParam, params: SyncParams) -> Result<()> {
        let Some(first) = group.first() else {
            return Ok(());
        };
        let local_directory = PathBuf::from(&first.local.directory);
        let remote_directory = first.remote.directory.clone();
        self.session.log().info(format!(
            "Synchronizing local directory '{}' with remote directory '{}', params = {:?}",
            local_directory.display(),
            remote_directory,
            params
        ));

        let checked: Vec<&ChecklistItem> = group.iter().filter(|item| item.checked).collect();
        if checked.is_empty() {
            return Ok(());
        }
        report_directory(self.session, &local_directory, &remote_directory, false)?;

        if params.timestamp {
            return self.apply_timestamps(&checked);
        }

        let downloads: Vec<FileItem> = checked
            .iter()
            .filter(|item| {
                matches!(
                    item.action,
                    ChecklistAction::DownloadNew | ChecklistAction::DownloadUpdate
                )
            })
            .map(|item| remote_item(item))
            .collect();
        let remote_deletions: Vec<FileItem> = checked
            .iter()
            .filter(|item| item.action == ChecklistAction::DeleteRemote)
            .map(|item| remote_item(item))
            .collect();
        let uploads: Vec<PathBuf> = checked
            .iter()
            .filter(|item| {
                matches!(
                    item.action,
                    ChecklistAction::UploadNew | ChecklistAction::UploadUpdate
                )
            })
            .map(|item| item.local_path())
            .collect();
        let local_deletions: Vec<PathBuf> = checked
            .iter()
            .filter(|item| item.action == ChecklistAction::DeleteLocal)
            .map(|item| item.local_path())
            .collect();

        if !downloads.is_empty() && !self.session.copy_to_local(&downloads, &local_directory, copy_param)? {
            return Err(Error::Abort);
        }
        if !remote_deletions.is_empty()
            && !self
                .session
                .delete_files(&remote_deletions, DeleteParams::default())?
        {
            return Err(Error::Abort);
        }
        if !uploads.is_empty() && !self.session.copy_to_remote(&uploads, &remote_directory, copy_param)? {
            return Err(Error::Abort);
        }
        if !local_deletions.is_empty()
            && !self
                .session
                .delete_local_files(&local_deletions, DeleteParams::default())?
        {
            return Err(Error::Abort);
        }
        Ok(())
    }

    fn apply_timestamps(&mut self, checked: &[&ChecklistItem]) -> Result<()> {
        let mut local_times = HashMap::new();
        let mut local_files = Vec::new();
        let mut remote_times = HashMap::new();
        let mut remote_files = Vec::new();
        for item in checked {
            match item.action {
                ChecklistAction::DownloadUpdate => {
                    let path = item.local_path().to_string_lossy().into_owned();
                    local_times.insert(path.clone(), item.remote.modification);
                    local_files.push(FileItem::new(path));
                }
                ChecklistAction::UploadUpdate => {
                    let path = item.remote_path();
                    let time = item.local_last_write.unwrap_or(item.local.modification);
                    remote_times.insert(path.clone(), time);
                    remote_files.push(FileItem::new(path));
                }
                action => debug!("No timestamp to align for {:?} of {}", action, item.file_name()),
            }
        }

        if !local_files.is_empty() {
            self.session.process_files(
                &local_files,
                Operation::SetProperties,
                OperationSide::Local,
                |session, item| {
                    let Some(time) = local_times.get(&item.name) else {
                        return Ok(());
                    };
                    let mtime = FileTime::from_unix_time(time.timestamp(), time.timestamp_subsec_nanos());
                    session.file_operation_loop(
                        &format!("Can't set attributes of file '{}'.", item.name),
                        true,
                        |_| filetime::set_file_mtime(&item.name, mtime).map_err(Error::from),
                    )
                },
            )?;
        }
        if !remote_files.is_empty() {
            self.session.process_files(
                &remote_files,
                Operation::SetProperties,
                OperationSide::Remote,
                |session, item| {
                    let Some(time) = remote_times.get(&item.name) else {
                        return Ok(());
                    };
                    session.change_file_properties(item, &RemoteProperties::modification(*time))
                },
            )?;
        }
        Ok(())
    }
}

fn remote_item(item: &ChecklistItem) -> FileItem {
    match &item.remote_file {
        Some(file) => FileItem::from_file(file.clone()),
        None => FileItem::new(item.remote_path()),
    }
}

/// Report the directory pair being worked on; a cancel answer aborts
fn report_directory(session: &Session, local_directory: &Path, remote_directory: &str, collect: bool) -> Result<()> {
    let operation = if collect {
        Operation::GetProperties
    } else {
        Operation::Copy
    };
    let mut progress = OperationProgress::start(operation, OperationSide::Remote, 0, Some(session.ui_handle()))
        .with_directory(remote_directory);
    progress.set_file(local_directory.to_string_lossy())?;
    if progress.is_continuing() {
        Ok(())
    } else {
        Err(Error::Abort)
    }
}

fn read_local_directory(
    session: &mut Session,
    context: &CollectContext<'_>,
    local_directory: &Path,
    first_level: bool,
) -> Result<BTreeMap<String, LocalEntry>> {
    let message = format!("Error listing directory '{}'.", local_directory.display());
    let entries = session.file_operation_loop(&message, false, |_| {
        fs::read_dir(local_directory)?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(Error::from)
    })?;

    let directory = local_directory.to_string_lossy().into_owned();
    let mut locals = BTreeMap::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let metadata = session.file_operation_loop(&message, false, |_| {
            fs::metadata(entry.path()).map_err(Error::from)
        })?;
        let is_directory = metadata.is_dir();
        if !context.copy_param.allow_transfer(&name, is_directory)
            || session.temporary_transfer_file(&name)
            || !context.passes_filter(first_level, &name, &name)
        {
            continue;
        }
        let info = FileInfo {
            file_name: name.clone(),
            directory: directory.clone(),
            size: if is_directory { 0 } else { metadata.len() },
            modification: local_modification(&metadata),
            precision: ModificationPrecision::Full,
        };
        locals.insert(
            name.to_lowercase(),
            LocalEntry {
                info,
                is_directory,
                new: true,
                modified: false,
                matching_remote: None,
            },
        );
    }
    Ok(locals)
}

fn collect_directory(
    session: &mut Session,
    context: &CollectContext<'_>,
    local_directory: &Path,
    remote_directory: &str,
    first_level: bool,
    checklist: &mut Checklist,
) -> Result<()> {
    let params = context.params;
    session.log().info(format!(
        "Collecting synchronization list for local directory '{}' and remote directory '{}', mode = {:?}, params = {:?}",
        local_directory.display(),
        remote_directory,
        context.mode,
        params
    ));
    if !params.delay_progress {
        report_directory(session, local_directory, remote_directory, true)?;
    }

    let mut locals = read_local_directory(session, context, local_directory, first_level)?;

    let cached = params.use_cache
        && session.config().cache_directories
        && session.cached_file_list(remote_directory).is_some();
    if !cached && params.delay_progress {
        report_directory(session, local_directory, remote_directory, true)?;
    }

    session.process_directory(
        remote_directory,
        |session, _path, file| {
            collect_file(
                session,
                context,
                local_directory,
                remote_directory,
                first_level,
                file,
                &mut locals,
                checklist,
            )
        },
        params.use_cache,
        false,
    )?;

    let mode = context.mode;
    for local in locals.into_values() {
        let modified = local.modified && mode.uploads();
        let new = local.new && (mode == SyncMode::Local || (mode.uploads() && !params.timestamp));
        if !modified && !new {
            continue;
        }

        let mut item = ChecklistItem {
            is_directory: local.is_directory,
            local_last_write: Some(local.info.modification),
            local: local.info,
            ..ChecklistItem::default()
        };
        match local.matching_remote {
            Some((remote, file)) if modified => {
                item.remote = remote;
                item.remote_file = Some(file);
            }
            _ => item.remote.directory = remote_directory.to_string(),
        }

        if mode.uploads() {
            item.action = if modified {
                ChecklistAction::UploadUpdate
            } else {
                ChecklistAction::UploadNew
            };
            item.checked =
                (modified || !params.existing_only) && context.default_checked(item.is_directory);
        } else if mode == SyncMode::Local && !params.timestamp {
            item.action = ChecklistAction::DeleteLocal;
            item.checked = params.delete && context.default_checked(item.is_directory);
        }

        if item.action != ChecklistAction::None {
            checklist.add(item);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn collect_file(
    session: &mut Session,
    context: &CollectContext<'_>,
    local_directory: &Path,
    remote_directory: &str,
    first_level: bool,
    file: &RemoteFile,
    locals: &mut BTreeMap<String, LocalEntry>,
    checklist: &mut Checklist,
) -> Result<()> {
    let name = file.file_name.as_str();
    if !context.copy_param.allow_transfer(name, file.is_directory())
        || session.temporary_transfer_file(name)
        || !context.passes_filter(first_level, name, name)
    {
        return Ok(());
    }

    let params = context.params;
    let mode = context.mode;
    let mut item = ChecklistItem {
        is_directory: file.is_directory(),
        remote: FileInfo {
            file_name: file.file_name.clone(),
            directory: remote_directory.to_string(),
            size: file.size,
            modification: file.modification,
            precision: file.precision,
        },
        ..ChecklistItem::default()
    };

    let mut modified = false;
    let new = match locals.get_mut(&name.to_lowercase()) {
        None => {
            item.local.directory = local_directory.to_string_lossy().into_owned();
            true
        }
        Some(local) => {
            local.new = false;
            if file.is_directory() != local.is_directory {
                session.log().info(format!(
                    "{} is directory on one side, but file on the another",
                    name
                ));
            } else if !file.is_directory() {
                let precision = local.info.precision.lesser(file.precision);
                item.local = local.info.clone();
                item.local.modification = precision.reduce(item.local.modification);
                let remote_modification = precision.reduce(item.remote.modification);

                let compare_times = !params.not_by_time
                    && (!params.timestamp || !params.by_size || item.local.size == item.remote.size);
                let mut local_modified = false;
                match compare_times.then(|| item.local.modification.cmp(&remote_modification)) {
                    Some(std::cmp::Ordering::Less) => {
                        if (!params.timestamp && !params.mirror) || mode.downloads() {
                            modified = true;
                        } else {
                            local_modified = true;
                        }
                    }
                    Some(std::cmp::Ordering::Greater) => {
                        if (!params.timestamp && !params.mirror) || mode.uploads() {
                            local_modified = true;
                        } else {
                            modified = true;
                        }
                    }
                    _ => {
                        if params.by_size && item.local.size != item.remote.size && !params.timestamp {
                            modified = true;
                            local_modified = true;
                        }
                    }
                }

                if local_modified {
                    local.modified = true;
                    local.matching_remote = Some((item.remote.clone(), file.clone()));
                }
            } else if !params.no_recurse {
                let local_subdirectory = local_directory.join(&local.info.file_name);
                let remote_subdirectory = unix_path::join(remote_directory, name);
                collect_directory(
                    session,
                    context,
                    &local_subdirectory,
                    &remote_subdirectory,
                    false,
                    checklist,
                )?;
            }
            false
        }
    };

    if !new && !modified {
        return Ok(());
    }
    if mode.downloads() {
        if !params.timestamp || modified {
            item.action = if modified {
                ChecklistAction::DownloadUpdate
            } else {
                ChecklistAction::DownloadNew
            };
            item.checked =
                (modified || !params.existing_only) && context.default_checked(item.is_directory);
        }
    } else if mode == SyncMode::Remote && new && !params.timestamp {
        item.action = ChecklistAction::DeleteRemote;
        item.checked = params.delete && context.default_checked(item.is_directory);
    }

    if item.action != ChecklistAction::None {
        item.remote_file = Some(file.clone());
        checklist.add(item);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrox_config::{EngineConfig, SessionConfig};
    use ferrox_session::{LogLevel, LogSink, LoopbackConnector};
    use ferrox_types::UnattendedUi;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct Trees {
        local: TempDir,
        remote: TempDir,
    }

    impl Trees {
        fn new() -> Self {
            Self {
                local: TempDir::new().unwrap(),
                remote: TempDir::new().unwrap(),
            }
        }

        fn write(root: &Path, path: &str, content: &[u8], mtime: i64) {
            let path = root.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
        }

        fn session(&self) -> Session {
            let mut session = Session::new(
                SessionConfig::default(),
                EngineConfig::default(),
                Rc::new(LoopbackConnector::new(self.remote.path())),
                Arc::new(UnattendedUi),
            );
            session.open().unwrap();
            session
        }
    }

    #[derive(Default)]
    struct Transcript(Mutex<Vec<String>>);

    impl LogSink for Transcript {
        fn add(&self, _level: LogLevel, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    impl Transcript {
        fn count(&self, message: &str) -> usize {
            self.0.lock().unwrap().iter().filter(|line| *line == message).count()
        }

        fn clear(&self) {
            self.0.lock().unwrap().clear();
        }
    }

    fn actions(checklist: &Checklist) -> Vec<(String, ChecklistAction, bool)> {
        checklist
            .items()
            .iter()
            .map(|item| (item.file_name().to_string(), item.action, item.checked))
            .collect()
    }

    #[test]
    fn test_newer_remote_file_is_downloaded() {
        let trees = Trees::new();
        Trees::write(trees.local.path(), "x.txt", b"same", 1_000_000_000);
        Trees::write(trees.remote.path(), "x.txt", b"same", 1_000_000_100);
        let mut session = trees.session();

        let checklist = SynchronizeEngine::new(&mut session)
            .collect(trees.local.path(), "/", SyncMode::Both, &CopyParam::default(), SyncParams::default(), None)
            .unwrap();
        assert_eq!(
            actions(&checklist),
            vec![("x.txt".to_string(), ChecklistAction::DownloadUpdate, true)]
        );
    }

    #[test]
    fn test_equal_times_are_unchanged_unless_by_size() {
        let trees = Trees::new();
        Trees::write(trees.local.path(), "x.txt", b"short", 1_000_000_000);
        Trees::write(trees.remote.path(), "x.txt", b"much longer", 1_000_000_000);
        let mut session = trees.session();
        let mut engine = SynchronizeEngine::new(&mut session);

        let checklist = engine
            .collect(trees.local.path(), "/", SyncMode::Remote, &CopyParam::default(), SyncParams::default(), None)
            .unwrap();
        assert!(checklist.is_empty());

        let by_size = SyncParams {
            by_size: true,
            ..SyncParams::default()
        };
        let checklist = engine
            .collect(trees.local.path(), "/", SyncMode::Remote, &CopyParam::default(), by_size, None)
            .unwrap();
        assert_eq!(
            actions(&checklist),
            vec![("x.txt".to_string(), ChecklistAction::UploadUpdate, true)]
        );
    }

    #[test]
    fn test_obsolete_remote_files_checked_only_with_delete() {
        let trees = Trees::new();
        Trees::write(trees.remote.path(), "old.txt", b"gone", 1_000_000_000);
        let mut session = trees.session();
        let mut engine = SynchronizeEngine::new(&mut session);

        let checklist = engine
            .collect(trees.local.path(), "/", SyncMode::Remote, &CopyParam::default(), SyncParams::default(), None)
            .unwrap();
        assert_eq!(
            actions(&checklist),
            vec![("old.txt".to_string(), ChecklistAction::DeleteRemote, false)]
        );

        let delete = SyncParams {
            delete: true,
            ..SyncParams::default()
        };
        let checklist = engine
            .collect(trees.local.path(), "/", SyncMode::Remote, &CopyParam::default(), delete, None)
            .unwrap();
        assert!(checklist.items()[0].checked);
    }

    #[test]
    fn test_file_against_directory_produces_no_action() {
        let trees = Trees::new();
        Trees::write(trees.local.path(), "entry", b"file", 1_000_000_000);
        Trees::write(trees.remote.path(), "entry/inner.txt", b"dir", 1_000_000_000);
        let mut session = trees.session();

        let checklist = SynchronizeEngine::new(&mut session)
            .collect(trees.local.path(), "/", SyncMode::Both, &CopyParam::default(), SyncParams::default(), None)
            .unwrap();
        assert!(checklist.is_empty());
    }

    #[test]
    fn test_first_level_filter() {
        let trees = Trees::new();
        Trees::write(trees.local.path(), "keep/a.txt", b"a", 1_000_000_000);
        Trees::write(trees.local.path(), "skip/b.txt", b"b", 1_000_000_000);
        let mut session = trees.session();
        let options = SyncOptions::with_filter(["KEEP"]);

        let checklist = SynchronizeEngine::new(&mut session)
            .collect(
                trees.local.path(),
                "/",
                SyncMode::Remote,
                &CopyParam::default(),
                SyncParams::default(),
                Some(&options),
            )
            .unwrap();
        assert_eq!(
            actions(&checklist),
            vec![("keep".to_string(), ChecklistAction::UploadNew, true)]
        );
    }

    #[test]
    fn test_apply_then_collect_finds_nothing() {
        let trees = Trees::new();
        Trees::write(trees.local.path(), "a.txt", b"local only", 1_000_000_000);
        Trees::write(trees.local.path(), "both.txt", b"newer local", 1_000_000_500);
        Trees::write(trees.remote.path(), "both.txt", b"older", 1_000_000_000);
        Trees::write(trees.remote.path(), "sub/b.txt", b"remote only", 1_000_000_000);
        let mut session = trees.session();
        let params = SyncParams {
            no_confirmation: true,
            ..SyncParams::default()
        };
        let copy_param = CopyParam::default();
        let mut engine = SynchronizeEngine::new(&mut session);

        let checklist = engine
            .collect(trees.local.path(), "/", SyncMode::Both, &copy_param, params, None)
            .unwrap();
        assert_eq!(checklist.checked_count(), 3);
        engine.apply(&checklist, &copy_param, params).unwrap();

        let again = engine
            .collect(trees.local.path(), "/", SyncMode::Both, &copy_param, params, None)
            .unwrap();
        assert!(again.is_empty(), "{:?}", actions(&again));
        assert_eq!(fs::read(trees.remote.path().join("both.txt")).unwrap(), b"newer local");
        assert!(trees.local.path().join("sub").join("b.txt").is_file());
    }

    #[test]
    fn test_each_directory_pair_is_applied_in_its_own_transaction() {
        let trees = Trees::new();
        Trees::write(trees.local.path(), "a.txt", b"top", 1_000_000_000);
        Trees::write(trees.local.path(), "sub/b.txt", b"nested", 1_000_000_000);
        fs::create_dir_all(trees.remote.path().join("sub")).unwrap();
        let transcript = Arc::new(Transcript::default());
        let mut session = Session::new(
            SessionConfig::default(),
            EngineConfig::default(),
            Rc::new(LoopbackConnector::new(trees.remote.path())),
            Arc::new(UnattendedUi),
        )
        .with_log_sink(transcript.clone());
        session.open().unwrap();
        let copy_param = CopyParam::default();
        let params = SyncParams::default();
        let mut engine = SynchronizeEngine::new(&mut session);

        let checklist = engine
            .collect(trees.local.path(), "/", SyncMode::Remote, &copy_param, params, None)
            .unwrap();
        assert_eq!(checklist.groups().len(), 2);
        transcript.clear();
        engine.apply(&checklist, &copy_param, params).unwrap();

        assert_eq!(transcript.count("Transaction level 1 started"), 2);
        assert_eq!(transcript.count("Transaction level 1 finished"), 2);
        assert!(!session.in_transaction());
        assert!(trees.remote.path().join("sub").join("b.txt").is_file());
    }

    #[test]
    fn test_timestamp_mode_aligns_times_only() {
        let trees = Trees::new();
        Trees::write(trees.local.path(), "x.txt", b"local", 1_000_000_500);
        Trees::write(trees.remote.path(), "x.txt", b"remote", 1_000_000_000);
        let mut session = trees.session();
        let params = SyncParams {
            timestamp: true,
            ..SyncParams::default()
        };
        let copy_param = CopyParam::default();
        let mut engine = SynchronizeEngine::new(&mut session);

        let checklist = engine
            .collect(trees.local.path(), "/", SyncMode::Remote, &copy_param, params, None)
            .unwrap();
        assert_eq!(
            actions(&checklist),
            vec![("x.txt".to_string(), ChecklistAction::UploadUpdate, true)]
        );
        engine.apply(&checklist, &copy_param, params).unwrap();

        let remote = trees.remote.path().join("x.txt");
        assert_eq!(fs::read(&remote).unwrap(), b"remote");
        let mtime = FileTime::from_last_modification_time(&fs::metadata(&remote).unwrap());
        assert_eq!(mtime.unix_seconds(), 1_000_000_500);
    }
}

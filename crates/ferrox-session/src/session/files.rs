//! Batch processing and the file verbs built on it

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use ferrox_types::{
    mask_file_name, unix_path, Answers, CancelStatus, Capability, CopyParam, DeleteParams, Error,
    FileItem, FileOperationStats, FsCommand, OnceDoneOperation, Operation, OperationProgress,
    OperationSide, Outcome, Query, QueryAnswer, QueryKind, RemoteFile, RemoteProperties, Result,
    SessionUi,
};

use super::Session;

impl Session {
    /// Run `action` for every item of a batch
    ///
    /// Remote batches run inside one transaction. Skipped items are counted
    /// as failed and the batch carries on; an abort cancels the rest of the
    /// batch. Every attempted item is reported as finished, whatever its
    /// outcome. Returns whether the batch ran to the end.
    pub fn process_files<F>(
        &mut self,
        files: &[FileItem],
        operation: Operation,
        side: OperationSide,
        mut action: F,
    ) -> Result<bool>
    where
        F: FnMut(&mut Self, &FileItem) -> Result<()>,
    {
        let progress = OperationProgress::start(operation, side, files.len(), Some(self.ui_handle()));
        let saved = self.progress.replace(progress);
        if side == OperationSide::Remote {
            self.begin_transaction();
        }

        let processed = self.process_files_loop(files, &mut action);

        let ended = if side == OperationSide::Remote {
            self.end_transaction()
        } else {
            Ok(())
        };
        let once_done = std::mem::replace(&mut self.progress, saved)
            .map_or(OnceDoneOperation::Idle, |progress| progress.once_done());

        let continuing = processed?;
        ended?;
        if once_done != OnceDoneOperation::Idle {
            return Err(self.close_on_completion(once_done));
        }
        Ok(continuing)
    }

    fn process_files_loop<F>(&mut self, files: &[FileItem], action: &mut F) -> Result<bool>
    where
        F: FnMut(&mut Self, &FileItem) -> Result<()>,
    {
        for item in files {
            if !self.progress_continuing() {
                break;
            }
            let result = self
                .set_progress_file(&item.name)
                .and_then(|()| action(self, item));
            let outcome = Outcome::from_result(result);
            if let Some(progress) = self.progress.as_mut() {
                progress.finish(&item.name, outcome.is_continue())?;
            }
            match outcome {
                Outcome::Continue => {}
                Outcome::Skip(error) => {
                    if self.exception_on_fail() {
                        return Err(error);
                    }
                    self.log
                        .debug(format!("Skipped \"{}\": {}", item.name, error));
                }
                Outcome::Abort => {
                    if let Some(progress) = self.progress.as_mut() {
                        progress.set_cancel(CancelStatus::Cancel);
                    }
                    break;
                }
                Outcome::Fatal(error) => return Err(error),
            }
        }
        Ok(self.progress_continuing())
    }

    fn check_continuing(&self) -> Result<()> {
        if self.progress_continuing() {
            Ok(())
        } else {
            Err(Error::Abort)
        }
    }

    /// Fail when `file_name` already names an entry of the current listing
    ///
    /// Only bare names are checked, and only while the listing snapshot is
    /// the one of the current directory.
    pub fn ensure_non_existence(&self, file_name: &str) -> Result<()> {
        if !unix_path::parent(file_name).is_empty()
            || !unix_path::same_path(&self.current_directory, self.files.directory())
        {
            return Ok(());
        }
        match self.files.find(file_name) {
            Some(file) if file.is_directory() => Err(Error::command(format!(
                "Directory '{}' already exists.",
                file_name
            ))),
            Some(_) => Err(Error::command(format!("File '{}' already exists.", file_name))),
            None => Ok(()),
        }
    }

    /// Delete remote files and directories
    pub fn delete_files(&mut self, files: &[FileItem], params: DeleteParams) -> Result<bool> {
        self.process_files(files, Operation::Delete, OperationSide::Remote, |session, item| {
            session.delete_file(item, params)
        })
    }

    /// Delete one remote entry, or move it into the recycle bin
    pub fn delete_file(&mut self, item: &FileItem, params: DeleteParams) -> Result<()> {
        self.check_continuing()?;
        let recycle = !params.force_delete
            && self.config.delete_to_recycle_bin != params.alternative
            && !self.config.recycle_bin_path.is_empty();
        if recycle && !self.is_recycled_file(&item.name) {
            return self.recycle_file(item);
        }

        self.log.info(format!("Deleting file \"{}\".", item.name));
        self.file_modified(item.file.as_ref(), &item.name, true);
        self.retrying(&format!("Error deleting file '{}'.", item.name), |session| {
            session
                .backend_mut()?
                .delete_file(&item.name, item.file.as_ref(), params)
        })?;
        self.react_on_command(FsCommand::DeleteFile)
    }

    fn is_recycled_file(&self, file_name: &str) -> bool {
        let path = unix_path::expand(file_name, &self.current_directory);
        unix_path::same_path(&unix_path::parent(&path), &self.config.recycle_bin_path)
    }

    fn recycle_file(&mut self, item: &FileItem) -> Result<()> {
        let recycle_bin = self.config.recycle_bin_path.clone();
        self.log.info(format!(
            "Moving file \"{}\" to remote recycle bin '{}'.",
            item.name, recycle_bin
        ));
        let mask = format!("*-{}.*", Local::now().format("%Y%m%d-%H%M%S"));
        self.move_file(item, &recycle_bin, &mask)
    }

    /// Delete local files and directory trees
    ///
    /// The UI's `delete_local_file` hook gets the first chance to handle
    /// each path.
    pub fn delete_local_files(&mut self, files: &[PathBuf], params: DeleteParams) -> Result<bool> {
        let items: Vec<FileItem> = files
            .iter()
            .map(|path| FileItem::new(path.to_string_lossy()))
            .collect();
        self.process_files(&items, Operation::Delete, OperationSide::Local, |session, item| {
            session.delete_local_file(Path::new(&item.name), params)
        })
    }

    fn delete_local_file(&mut self, path: &Path, params: DeleteParams) -> Result<()> {
        if self.callbacks.delete_local_file(path, params.alternative)? {
            return Ok(());
        }
        let message = format!("Error deleting file '{}'.", path.display());
        self.file_operation_loop(&message, true, |_| {
            let removed = if path.is_dir() {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            removed.map_err(Error::from)
        })
    }

    /// Rename an entry in place
    ///
    /// With `check_existence`, an existing entry named `new_name` in the
    /// current listing is only replaced after the user confirms.
    pub fn rename_file(&mut self, item: &FileItem, new_name: &str, check_existence: bool) -> Result<()> {
        if check_existence && self.engine.confirm_overwriting {
            if let Some(duplicate) = self.files.find(new_name) {
                let message = if duplicate.is_directory() {
                    format!("Directory '{}' already exists. Overwrite?", new_name)
                } else {
                    format!("File '{}' already exists. Overwrite?", new_name)
                };
                let query = Query::new(message, Answers::of(&[QueryAnswer::Yes, QueryAnswer::No]))
                    .kind(QueryKind::Confirmation);
                if self.ask(&query)? == QueryAnswer::No {
                    return Ok(());
                }
            }
        }

        self.log
            .info(format!("Renaming file \"{}\" to \"{}\".", item.name, new_name));
        self.file_modified(item.file.as_ref(), &item.name, true);
        let renamed = self.do_rename_file(&item.name, new_name, false);
        self.skipped(renamed)?;
        self.react_on_command(FsCommand::RenameFile)
    }

    fn do_rename_file(&mut self, file_name: &str, new_name: &str, move_file: bool) -> Result<()> {
        let message = if move_file {
            format!("Error moving file '{}' to '{}'.", file_name, new_name)
        } else {
            format!("Error renaming file '{}' to '{}'.", file_name, new_name)
        };
        self.retrying(&message, |session| {
            session.backend_mut()?.rename_file(file_name, new_name)
        })
    }

    /// Move entries into `target`, renaming them by `mask`
    ///
    /// When the current directory was among the moved entries, the session
    /// ends up in its nearest ancestor that still exists.
    pub fn move_files(&mut self, files: &[FileItem], target: &str, mask: &str) -> Result<bool> {
        self.directory_modified(target, true);
        self.forget_directory_changes(target);
        self.begin_transaction();
        let moved = self.process_files(files, Operation::RemoteMove, OperationSide::Remote, |session, item| {
            session.move_file(item, target, mask)
        });
        let left = if self.is_active() {
            self.leave_moved_directory(files)
        } else {
            Ok(())
        };
        let ended = self.end_transaction();
        let moved = moved?;
        left?;
        ended?;
        Ok(moved)
    }

    fn leave_moved_directory(&mut self, files: &[FileItem]) -> Result<()> {
        let current = self.current_directory.clone();
        let possibly_moved = files.iter().any(|item| {
            item.is_directory()
                && unix_path::is_child_of(&unix_path::expand(&item.name, &current), &current)
        });
        if !possibly_moved || self.file_exists(&current)? {
            return Ok(());
        }
        let mut nearest = current;
        loop {
            nearest = unix_path::parent(&nearest);
            if nearest.is_empty() || nearest == "/" || self.file_exists(&nearest)? {
                break;
            }
        }
        if nearest.is_empty() {
            nearest = "/".to_string();
        }
        self.change_directory(&nearest)
    }

    /// Move one entry into `target`, renaming it by `mask`
    pub fn move_file(&mut self, item: &FileItem, target: &str, mask: &str) -> Result<()> {
        self.check_continuing()?;
        let new_name = unix_path::join(
            target,
            &mask_file_name(unix_path::file_name(&item.name), mask),
        );
        self.log
            .info(format!("Moving file \"{}\" to \"{}\".", item.name, new_name));
        self.file_modified(item.file.as_ref(), &item.name, true);
        self.do_rename_file(&item.name, &new_name, true)?;
        self.react_on_command(FsCommand::MoveFile)
    }

    /// Copy entries on the server into `target`, renaming them by `mask`
    ///
    /// Without server-side copy support the copy runs on the command session.
    pub fn copy_files(&mut self, files: &[FileItem], target: &str, mask: &str) -> Result<bool> {
        self.directory_modified(target, true);
        self.process_files(files, Operation::RemoteCopy, OperationSide::Remote, |session, item| {
            session.copy_file(item, target, mask)
        })
    }

    /// Copy one entry on the server
    pub fn copy_file(&mut self, item: &FileItem, target: &str, mask: &str) -> Result<()> {
        self.check_continuing()?;
        let new_name = unix_path::join(
            target,
            &mask_file_name(unix_path::file_name(&item.name), mask),
        );
        self.log
            .info(format!("Copying file \"{}\" to \"{}\".", item.name, new_name));
        let message = format!("Error copying file '{}' to '{}'.", item.name, new_name);
        self.retrying(&message, |session| {
            if session.is_capable(Capability::RemoteCopy) {
                session.backend_mut()?.copy_file(&item.name, &new_name)
            } else {
                let directory = session.current_directory.clone();
                session.run_on_command_session(|command_session| {
                    command_session.sync_directory(&directory)?;
                    command_session
                        .backend_mut()?
                        .copy_file(&item.name, &new_name)
                })
            }
        })?;
        self.react_on_command(FsCommand::CopyFile)
    }

    /// Create a remote directory, optionally applying properties to it
    pub fn create_directory(&mut self, name: &str, properties: Option<&RemoteProperties>) -> Result<()> {
        self.ensure_non_existence(name)?;
        self.file_modified(None, name, false);
        self.log.info(format!("Creating directory \"{}\".", name));
        let created = self.retrying(&format!("Error creating directory '{}'.", name), |session| {
            session.backend_mut()?.create_directory(name)
        });
        self.skipped(created)?;
        if let Some(properties) = properties.filter(|properties| !properties.is_empty()) {
            let changed = self.do_change_file_properties(name, None, properties);
            self.skipped(changed)?;
        }
        self.react_on_command(FsCommand::CreateDirectory)
    }

    /// Create a symbolic or hard link named `name` pointing to `point_to`
    pub fn create_link(&mut self, name: &str, point_to: &str, symbolic: bool) -> Result<()> {
        self.ensure_non_existence(name)?;
        if self.config.cache_directories {
            let directory = self.current_directory.clone();
            self.directory_modified(&directory, false);
        }
        self.log.info(format!(
            "Creating link \"{}\" to \"{}\" (symbolic: {}).",
            name, point_to, symbolic
        ));
        let created = self.retrying(&format!("Error creating link '{}'.", name), |session| {
            session.backend_mut()?.create_link(name, point_to, symbolic)
        });
        self.skipped(created)?;
        self.react_on_command(FsCommand::CreateLink)
    }

    /// Change permissions, ownership or times of several entries
    pub fn change_files_properties(&mut self, files: &[FileItem], properties: &RemoteProperties) -> Result<bool> {
        self.process_files(files, Operation::SetProperties, OperationSide::Remote, |session, item| {
            session.change_file_properties(item, properties)
        })
    }

    /// Change permissions, ownership or times of one entry
    pub fn change_file_properties(&mut self, item: &FileItem, properties: &RemoteProperties) -> Result<()> {
        self.check_continuing()?;
        self.log.info(format!(
            "Changing properties of \"{}\" ({})",
            item.name, properties
        ));
        self.file_modified(item.file.as_ref(), &item.name, false);
        self.do_change_file_properties(&item.name, item.file.as_ref(), properties)?;
        self.react_on_command(FsCommand::ChangeProperties)
    }

    fn do_change_file_properties(
        &mut self,
        file_name: &str,
        file: Option<&RemoteFile>,
        properties: &RemoteProperties,
    ) -> Result<()> {
        self.retrying(&format!("Error changing properties of file '{}'.", file_name), |session| {
            session
                .backend_mut()?
                .change_file_properties(file_name, file, properties)
        })
    }

    /// Total size of remote entries, descending into directories
    ///
    /// Symbolic links to directories count with their own size. With a
    /// `copy_param`, entries its masks exclude are left out. Ends with
    /// [`Error::Abort`] when the batch is cancelled.
    pub fn calculate_files_size(
        &mut self,
        files: &[FileItem],
        copy_param: Option<&CopyParam>,
    ) -> Result<FileOperationStats> {
        let mut stats = FileOperationStats::new();
        let completed = self.process_files(files, Operation::CalculateSize, OperationSide::Remote, |session, item| {
            let file = match &item.file {
                Some(file) => file.clone(),
                None => session.read_file(&item.name)?,
            };
            session.calculate_file_size(&file, copy_param, &mut stats)
        })?;
        if !completed {
            return Err(Error::Abort);
        }
        Ok(stats)
    }

    fn calculate_file_size(
        &mut self,
        file: &RemoteFile,
        copy_param: Option<&CopyParam>,
        stats: &mut FileOperationStats,
    ) -> Result<()> {
        self.check_continuing()?;
        let allowed = copy_param.map_or(true, |param| {
            param.allow_transfer(&file.file_name, file.is_directory())
        });
        if !allowed {
            return Ok(());
        }
        if file.is_directory() {
            if file.is_symlink {
                stats.size += file.size;
            } else {
                let directory = unix_path::exclude_trailing_slash(&file.full_file_name());
                self.log
                    .debug(format!("Getting size of directory \"{}\"", directory));
                self.process_directory(
                    &directory,
                    |session, _path, entry| session.calculate_file_size(entry, copy_param, stats),
                    false,
                    false,
                )?;
            }
            stats.directories += 1;
        } else {
            stats.size += file.size;
            stats.files += 1;
        }
        if file.is_symlink {
            stats.symlinks += 1;
        }
        Ok(())
    }

    /// Checksums of remote files as `(path, checksum)` pairs
    pub fn calculate_files_checksum(&mut self, algorithm: &str, files: &[FileItem]) -> Result<Vec<(String, String)>> {
        if !self.is_capable(Capability::CalculatingChecksum) {
            return Err(Error::command("Calculating checksums is not supported by this protocol."));
        }
        self.log.info(format!(
            "Calculating {} checksum of {} files.",
            algorithm,
            files.len()
        ));
        self.retrying(&format!("Error calculating {} checksum.", algorithm), |session| {
            session
                .backend_mut()?
                .calculate_files_checksum(algorithm, files)
        })
    }

    /// Free space at a remote path
    pub fn space_available(&mut self, path: &str) -> Result<ferrox_types::SpaceAvailable> {
        if !self.is_capable(Capability::CheckingSpaceAvailable) {
            return Err(Error::command("Checking space available is not supported by this protocol."));
        }
        let result = self
            .backend_mut()
            .and_then(|backend| backend.space_available(path));
        result.map_err(|error| self.raise(error, &format!("Error checking space available for path '{}'.", path)))
    }

    /// Run a shell command on files
    ///
    /// A command containing `!&` runs once with the quoted list of the
    /// non-directory entries. Any other command runs once per file with `!`
    /// replaced by the quoted path; `!!` stands for a literal `!` and `!/` for
    /// the current directory.
    pub fn custom_command_on_files(
        &mut self,
        command: &str,
        files: &[FileItem],
        output: &mut dyn FnMut(&str, bool),
    ) -> Result<bool> {
        if !is_file_list_command(command) {
            return self.process_files(files, Operation::CustomCommand, OperationSide::Remote, |session, item| {
                session.custom_command_on_file(command, item, &mut *output)
            });
        }
        let file_list = files
            .iter()
            .filter(|item| !(item.is_directory() && !item.file.as_ref().is_some_and(|file| file.is_symlink)))
            .map(|item| shell_quote(&item.name))
            .collect::<Vec<_>>()
            .join(" ");
        let command = complete_command(command, "", &file_list, &self.current_directory);
        self.any_command(&command, output)?;
        Ok(true)
    }

    fn custom_command_on_file(
        &mut self,
        command: &str,
        item: &FileItem,
        output: &mut dyn FnMut(&str, bool),
    ) -> Result<()> {
        self.check_continuing()?;
        self.log.info(format!(
            "Executing custom command \"{}\" on file \"{}\".",
            command, item.name
        ));
        self.file_modified(item.file.as_ref(), &item.name, false);
        let completed = complete_command(command, &shell_quote(&item.name), "", &self.current_directory);
        let message = format!("Error executing custom command '{}' on file '{}'.", command, item.name);
        self.retrying(&message, |session| session.execute_command(&completed, &mut *output))?;
        self.react_on_command(FsCommand::AnyCommand)
    }
}

/// Quote a path for a POSIX shell command line
fn shell_quote(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn is_file_list_command(command: &str) -> bool {
    let mut chars = command.chars();
    while let Some(c) = chars.next() {
        if c == '!' && chars.next() == Some('&') {
            return true;
        }
    }
    false
}

fn complete_command(command: &str, file_name: &str, file_list: &str, current_directory: &str) -> String {
    let mut completed = String::with_capacity(command.len());
    let mut chars = command.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '!' {
            completed.push(c);
            continue;
        }
        match chars.peek() {
            Some('!') => {
                chars.next();
                completed.push('!');
            }
            Some('&') => {
                chars.next();
                completed.push_str(file_list);
            }
            Some('/') => {
                chars.next();
                completed.push_str(&unix_path::include_trailing_slash(current_directory));
            }
            _ => completed.push_str(file_name),
        }
    }
    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("chmod 644 !", "\"a b.txt\"", "chmod 644 \"a b.txt\"")]
    #[case("echo !! !", "\"x\"", "echo ! \"x\"")]
    #[case("ls !/", "", "ls /home/user/")]
    fn test_complete_command(#[case] command: &str, #[case] file_name: &str, #[case] expected: &str) {
        assert_eq!(complete_command(command, file_name, "", "/home/user"), expected);
    }

    #[test]
    fn test_file_list_command() {
        assert!(is_file_list_command("tar czf out.tgz !&"));
        assert!(!is_file_list_command("echo !!&"));
        assert!(!is_file_list_command("rm !"));
        assert_eq!(
            complete_command("tar czf out.tgz !&", "", "\"a\" \"b\"", "/"),
            "tar czf out.tgz \"a\" \"b\""
        );
    }

    #[test]
    fn test_shell_quote_escapes_specials() {
        assert_eq!(shell_quote("plain"), "\"plain\"");
        assert_eq!(shell_quote("it's \"$HOME\""), "\"it's \\\"\\$HOME\\\"\"");
    }
}

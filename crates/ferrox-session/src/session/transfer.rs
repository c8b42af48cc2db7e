//! Uploads and downloads

use std::path::{Path, PathBuf};

use ferrox_types::{
    unix_path, CopyParam, Error, FileItem, FsCommand, OnceDoneOperation, Operation,
    OperationProgress, OperationSide, Result,
};
use walkdir::WalkDir;

use super::Session;

impl Session {
    /// Upload local files and directories into `target_directory`
    ///
    /// The upload runs in one transaction and the target listing is
    /// invalidated afterwards. Failures are resolved as command errors.
    /// Returns whether the transfer was not cancelled.
    pub fn copy_to_remote(
        &mut self,
        files: &[PathBuf],
        target_directory: &str,
        copy_param: &CopyParam,
    ) -> Result<bool> {
        let (continuing, once_done) =
            match self.do_copy_to_remote(files, target_directory, copy_param) {
                Ok(done) => done,
                Err(error) => {
                    self.command_error(error, "Copying files to remote side failed.")?;
                    (false, OnceDoneOperation::Idle)
                }
            };
        if once_done != OnceDoneOperation::Idle {
            return Err(self.close_on_completion(once_done));
        }
        Ok(continuing)
    }

    fn do_copy_to_remote(
        &mut self,
        files: &[PathBuf],
        target_directory: &str,
        copy_param: &CopyParam,
    ) -> Result<(bool, OnceDoneOperation)> {
        // Moves size everything, the masks only apply to what gets copied
        let total_size = copy_param
            .calculate_size
            .then(|| local_files_size(files, (!copy_param.delete).then_some(copy_param)));

        let mut progress = self.transfer_progress(copy_param, OperationSide::Local, files.len(), target_directory);
        if let Some(size) = total_size {
            progress.set_total_size(size);
        }
        let target = unix_path::translate_locked(target_directory, &self.lock_directory, false);

        self.begin_transaction();
        self.log.info(format!(
            "Copying {} files/directories to remote directory \"{}\"",
            files.len(),
            target
        ));
        let copied = self
            .backend_mut()
            .and_then(|backend| backend.copy_to_remote(files, &target, copy_param, &mut progress));
        let reacted = if self.is_active() && !copied.as_ref().is_err_and(Error::is_fatal) {
            self.directory_modified(&target, true);
            self.react_on_command(FsCommand::CopyToRemote)
        } else {
            Ok(())
        };
        let ended = self.end_transaction();
        self.keep_overwrite_confirmation(&progress);

        copied.and(reacted).and(ended)?;
        Ok((progress.is_continuing(), progress.once_done()))
    }

    /// Download remote files and directories into `target_directory`
    ///
    /// With `copy_param.delete` the sources are removed, which invalidates
    /// their listings. Returns whether the transfer was not cancelled.
    pub fn copy_to_local(
        &mut self,
        files: &[FileItem],
        target_directory: &Path,
        copy_param: &CopyParam,
    ) -> Result<bool> {
        self.begin_transaction();
        let result = self.do_copy_to_local(files, target_directory, copy_param);
        let ended = self.end_transaction();

        let (continuing, once_done) = match result {
            Ok(done) => done,
            Err(error) => {
                let resolved = self.command_error(error, "Copying files from remote side failed.");
                ended?;
                resolved?;
                return Ok(false);
            }
        };
        ended?;
        if once_done != OnceDoneOperation::Idle {
            return Err(self.close_on_completion(once_done));
        }
        Ok(continuing)
    }

    fn do_copy_to_local(
        &mut self,
        files: &[FileItem],
        target_directory: &Path,
        copy_param: &CopyParam,
    ) -> Result<(bool, OnceDoneOperation)> {
        let total_size = if copy_param.calculate_size {
            // Moves size everything, the masks only apply to what gets copied
            let masks = (!copy_param.delete).then_some(copy_param);
            match self.with_exception_on_fail(|session| session.calculate_files_size(files, masks)) {
                Ok(stats) => Some(stats.size),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    self.log
                        .debug(format!("Size of download not calculated: {}", error));
                    None
                }
            }
        } else {
            None
        };

        let mut progress = self.transfer_progress(
            copy_param,
            OperationSide::Remote,
            files.len(),
            &target_directory.to_string_lossy(),
        );
        if let Some(size) = total_size {
            progress.set_total_size(size);
        }
        self.log.info(format!(
            "Copying {} files/directories to local directory \"{}\"",
            files.len(),
            target_directory.display()
        ));

        let copied = self
            .backend_mut()
            .and_then(|backend| backend.copy_to_local(files, target_directory, copy_param, &mut progress));
        let reacted = if copy_param.delete
            && self.is_active()
            && !copied.as_ref().is_err_and(Error::is_fatal)
        {
            for item in files {
                self.file_modified(item.file.as_ref(), &item.name, true);
            }
            // Moving removes the sources
            self.react_on_command(FsCommand::DeleteFile)
        } else {
            Ok(())
        };
        self.keep_overwrite_confirmation(&progress);

        copied.and(reacted)?;
        Ok((progress.is_continuing(), progress.once_done()))
    }

    fn transfer_progress(
        &self,
        copy_param: &CopyParam,
        side: OperationSide,
        count: usize,
        directory: &str,
    ) -> OperationProgress {
        let operation = if copy_param.delete {
            Operation::Move
        } else {
            Operation::Copy
        };
        OperationProgress::start(operation, side, count, Some(self.ui_handle()))
            .with_directory(directory)
            .with_confirm_overwriting(self.engine.confirm_overwriting)
    }

    fn keep_overwrite_confirmation(&mut self, progress: &OperationProgress) {
        if !progress.confirm_overwriting() && self.engine.confirm_overwriting {
            self.log.info("Overwrite confirmations turned off.");
            self.engine.confirm_overwriting = false;
        }
    }
}

/// Total size of local files below `files`, honouring the masks of `copy_param`
pub(crate) fn local_files_size(files: &[PathBuf], copy_param: Option<&CopyParam>) -> u64 {
    files
        .iter()
        .flat_map(|path| {
            WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_entry(move |entry| {
                    let root_directory = entry.depth() == 0 && entry.file_type().is_dir();
                    root_directory
                        || copy_param.map_or(true, |param| {
                            param.allow_transfer(
                                &entry.file_name().to_string_lossy(),
                                entry.file_type().is_dir(),
                            )
                        })
                })
                .filter_map(std::result::Result::ok)
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrox_types::FileMasks;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_local_files_size_honours_masks() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), b"12345").unwrap();
        fs::write(root.join("b.log"), b"123").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("c.txt"), b"12").unwrap();

        assert_eq!(local_files_size(&[root.to_path_buf()], None), 10);

        let copy_param = CopyParam {
            masks: FileMasks::parse("*.txt;sub").unwrap(),
            ..CopyParam::default()
        };
        assert_eq!(local_files_size(&[root.to_path_buf()], Some(&copy_param)), 7);

        let excluded = CopyParam {
            masks: FileMasks::parse("|sub/").unwrap(),
            ..CopyParam::default()
        };
        assert_eq!(local_files_size(&[root.to_path_buf()], Some(&excluded)), 8);
    }

    #[test]
    fn test_local_files_size_of_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("one.bin");
        fs::write(&file, vec![0u8; 64]).unwrap();
        assert_eq!(local_files_size(&[file], None), 64);
    }
}

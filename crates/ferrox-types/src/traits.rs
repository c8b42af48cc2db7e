//! Contracts of the engine's external collaborators

use std::path::{Path, PathBuf};

use crate::model::{
    BoundProtocol, Capability, FileItem, FileList, OnceDoneOperation, Operation, OperationSide,
    RemoteFile,
};
use crate::params::{CopyParam, DeleteParams, RemoteProperties};
use crate::progress::{CancelStatus, OperationProgress};
use crate::query::{Prompt, Query, QueryAnswer};
use crate::{Error, Result};

/// User-interaction sink
///
/// Every method has an unattended default, so implementations only override
/// what they present. Returning a fatal error from any callback is allowed;
/// the session captures it through its callback guard.
pub trait SessionUi: Send + Sync {
    /// Ask a question; the default picks the timeout answer or aborts
    fn query_user(&self, query: &Query) -> Result<QueryAnswer> {
        Ok(query
            .timeout_answer
            .unwrap_or_else(|| query.answers.abort_answer()))
    }

    /// Ask for credentials or text; `None` means cancelled
    fn prompt_user(&self, _prompt: &Prompt) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    /// Show the server banner
    fn display_banner(&self, _session_name: &str, _banner: &str) -> Result<()> {
        Ok(())
    }

    /// Status line updates; `active == false` marks the end of a sequence
    fn information(&self, _text: &str, _status: bool, _active: bool) -> Result<()> {
        Ok(())
    }

    /// Progress of a batch; returning `Cancel` stops it at the next check
    fn progress(&self, _progress: &OperationProgress) -> Result<CancelStatus> {
        Ok(CancelStatus::Continue)
    }

    /// One batch item finished
    fn finished(
        &self,
        _operation: Operation,
        _side: OperationSide,
        _file_name: &str,
        _success: bool,
    ) -> Result<OnceDoneOperation> {
        Ok(OnceDoneOperation::Idle)
    }

    /// Present an error that was resolved without a question
    fn show_extended_exception(&self, _error: &Error) -> Result<()> {
        Ok(())
    }

    /// The current directory changed
    fn directory_changed(&self, _directory: &str) -> Result<()> {
        Ok(())
    }

    /// A listing is about to be read
    fn read_directory_started(&self) -> Result<()> {
        Ok(())
    }

    /// A new listing snapshot is available
    fn directory_read(&self, _list: &FileList, _reload_only: bool) -> Result<()> {
        Ok(())
    }

    /// Delete a local file; returning `false` leaves it to the engine
    fn delete_local_file(&self, _path: &Path, _alternative: bool) -> Result<bool> {
        Ok(false)
    }

    /// The session was closed
    fn closed(&self) -> Result<()> {
        Ok(())
    }
}

/// UI that answers everything with defaults
#[derive(Debug, Default, Clone, Copy)]
pub struct UnattendedUi;

impl SessionUi for UnattendedUi {}

/// Free space information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpaceAvailable {
    /// Total bytes on the filesystem
    pub bytes_on_device: u64,
    /// Bytes available to the user
    pub bytes_available_to_user: u64,
}

fn unsupported<T>(what: &str) -> Result<T> {
    Err(Error::command(format!("{} is not supported by this protocol", what)))
}

/// One bound wire-protocol implementation
///
/// Paths are absolute remote paths unless stated otherwise. Optional
/// operations are gated by [`is_capable`](Self::is_capable) and fail with a
/// command error by default.
pub trait FileSystemBackend {
    /// Protocol implemented by the backend
    fn protocol(&self) -> BoundProtocol;

    /// Reconnect an already bound backend
    fn open(&mut self) -> Result<()>;

    /// Drop the connection
    fn close(&mut self);

    /// Whether the connection is up
    fn is_active(&self) -> bool;

    /// Keep-alive hook
    fn idle(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether an optional operation is supported
    fn is_capable(&self, capability: Capability) -> bool;

    /// Protocol-specific startup after the connection is made
    fn do_startup(&mut self) -> Result<()> {
        Ok(())
    }

    /// Last known current directory
    fn current_directory(&self) -> String;

    /// Ask the server for the current directory
    fn read_current_directory(&mut self) -> Result<()>;

    /// Change to the home directory
    fn home_directory(&mut self) -> Result<()>;

    /// Change the current directory
    fn change_directory(&mut self, directory: &str) -> Result<()>;

    /// Change to an already resolved absolute directory
    fn cached_change_directory(&mut self, directory: &str) -> Result<()> {
        self.change_directory(directory)
    }

    /// Fill a listing of `list.directory()`
    fn read_directory(&mut self, list: &mut FileList) -> Result<()>;

    /// Read a single entry
    fn read_file(&mut self, path: &str) -> Result<RemoteFile>;

    /// Resolve a symbolic link
    fn read_symlink(&mut self, link: &RemoteFile) -> Result<RemoteFile>;

    /// Create a directory
    fn create_directory(&mut self, path: &str) -> Result<()>;

    /// Create a link
    fn create_link(&mut self, _path: &str, _point_to: &str, _symbolic: bool) -> Result<()> {
        unsupported("Creating links")
    }

    /// Delete a file or a directory tree
    fn delete_file(
        &mut self,
        path: &str,
        file: Option<&RemoteFile>,
        params: DeleteParams,
    ) -> Result<()>;

    /// Rename or move an entry
    fn rename_file(&mut self, path: &str, new_path: &str) -> Result<()>;

    /// Copy an entry on the server
    fn copy_file(&mut self, _path: &str, _new_path: &str) -> Result<()> {
        unsupported("Remote copy")
    }

    /// Change permissions, ownership or times
    fn change_file_properties(
        &mut self,
        path: &str,
        file: Option<&RemoteFile>,
        properties: &RemoteProperties,
    ) -> Result<()>;

    /// Upload local files into `target_directory`
    fn copy_to_remote(
        &mut self,
        files: &[PathBuf],
        target_directory: &str,
        copy_param: &CopyParam,
        progress: &mut OperationProgress,
    ) -> Result<()>;

    /// Download remote files into `target_directory`
    fn copy_to_local(
        &mut self,
        files: &[FileItem],
        target_directory: &Path,
        copy_param: &CopyParam,
        progress: &mut OperationProgress,
    ) -> Result<()>;

    /// Run an arbitrary command, streaming `(line, is_error)` to `output`
    fn any_command(&mut self, _command: &str, _output: &mut dyn FnMut(&str, bool)) -> Result<()> {
        unsupported("Executing commands")
    }

    /// Checksums of the given files as `(path, checksum)` pairs
    fn calculate_files_checksum(
        &mut self,
        _algorithm: &str,
        _files: &[FileItem],
    ) -> Result<Vec<(String, String)>> {
        unsupported("Calculating checksums")
    }

    /// Free space at a path
    fn space_available(&mut self, _path: &str) -> Result<SpaceAvailable> {
        unsupported("Checking space available")
    }

    /// Load user and group names
    fn lookup_users_groups(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether a name is a temporary file of an interrupted transfer
    fn temporary_transfer_file(&self, name: &str) -> bool {
        name.ends_with(".filepart")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Answers;
    use std::time::Duration;

    #[test]
    fn test_unattended_query_prefers_timeout_answer() {
        let ui = UnattendedUi;
        let query = Query::new("Reconnect?", Answers::of(&[QueryAnswer::Retry, QueryAnswer::Abort]));
        assert_eq!(ui.query_user(&query).unwrap(), QueryAnswer::Abort);
        let query = query.timeout(Duration::from_secs(1), QueryAnswer::Retry);
        assert_eq!(ui.query_user(&query).unwrap(), QueryAnswer::Retry);
    }

    #[test]
    fn test_unattended_prompt_is_cancelled() {
        assert_eq!(UnattendedUi.prompt_user(&Prompt::password("x")).unwrap(), None);
    }
}

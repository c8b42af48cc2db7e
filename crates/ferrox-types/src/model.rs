//! Remote file model and session-level enumerations

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::unix_path;

/// Precision of a file modification time as reported by one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModificationPrecision {
    /// Sub-second precision
    #[default]
    Full,
    /// Whole seconds
    Seconds,
    /// Whole minutes
    Minutes,
    /// Date only
    Days,
}

impl ModificationPrecision {
    /// Truncate a timestamp to this precision
    pub fn reduce(self, time: DateTime<Utc>) -> DateTime<Utc> {
        let truncated = match self {
            Self::Full => return time,
            Self::Seconds => Utc.with_ymd_and_hms(
                time.year(),
                time.month(),
                time.day(),
                time.hour(),
                time.minute(),
                time.second(),
            ),
            Self::Minutes => Utc.with_ymd_and_hms(
                time.year(),
                time.month(),
                time.day(),
                time.hour(),
                time.minute(),
                0,
            ),
            Self::Days => Utc.with_ymd_and_hms(time.year(), time.month(), time.day(), 0, 0, 0),
        };
        truncated.single().unwrap_or(time)
    }

    /// The coarser of two precisions
    pub fn lesser(self, other: Self) -> Self {
        self.max(other)
    }
}

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileKind {
    /// Regular file
    #[default]
    File,
    /// Directory, or a symlink resolving to one
    Directory,
}

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RemoteFile {
    /// Entry name without directory
    pub file_name: String,
    /// Directory the entry was listed in
    pub directory: String,
    /// Entry kind
    pub kind: FileKind,
    /// Whether the entry is a symbolic link
    pub is_symlink: bool,
    /// Link target, when known
    pub link_target: Option<String>,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modification: DateTime<Utc>,
    /// Precision of `modification`
    pub precision: ModificationPrecision,
    /// Owner name
    pub owner: String,
    /// Group name
    pub group: String,
    /// Unix permission bits
    pub rights: Option<u32>,
}

impl Default for RemoteFile {
    fn default() -> Self {
        Self {
            file_name: String::new(),
            directory: String::new(),
            kind: FileKind::File,
            is_symlink: false,
            link_target: None,
            size: 0,
            modification: DateTime::<Utc>::from(SystemTime::UNIX_EPOCH),
            precision: ModificationPrecision::Full,
            owner: String::new(),
            group: String::new(),
            rights: None,
        }
    }
}

impl RemoteFile {
    /// Create a regular file entry
    pub fn file(name: impl Into<String>, size: u64, modification: DateTime<Utc>) -> Self {
        Self {
            file_name: name.into(),
            size,
            modification,
            ..Self::default()
        }
    }

    /// Create a directory entry
    pub fn directory_entry(name: impl Into<String>, modification: DateTime<Utc>) -> Self {
        Self {
            file_name: name.into(),
            kind: FileKind::Directory,
            modification,
            ..Self::default()
        }
    }

    /// Set the directory the entry belongs to
    pub fn in_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Set the modification precision
    pub fn with_precision(mut self, precision: ModificationPrecision) -> Self {
        self.precision = precision;
        self
    }

    /// Whether the entry is a directory
    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// Whether the entry is the `..` pseudo entry
    pub fn is_parent_directory(&self) -> bool {
        self.file_name == ".."
    }

    /// Whether the entry is the `.` pseudo entry
    pub fn is_this_directory(&self) -> bool {
        self.file_name == "."
    }

    /// Absolute path of the entry
    pub fn full_file_name(&self) -> String {
        if self.directory.is_empty() {
            self.file_name.clone()
        } else {
            unix_path::join(&self.directory, &self.file_name)
        }
    }
}

static LIST_TIMESTAMP: AtomicU64 = AtomicU64::new(1);

fn next_list_timestamp() -> u64 {
    LIST_TIMESTAMP.fetch_add(1, Ordering::Relaxed)
}

/// Snapshot of one remote directory
///
/// A list is never mutated once handed out. Refreshes build a new list and
/// cloning yields an independent duplicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileList {
    directory: String,
    files: Vec<RemoteFile>,
    timestamp: u64,
}

impl FileList {
    /// Create an empty listing for a directory
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            files: Vec::new(),
            timestamp: next_list_timestamp(),
        }
    }

    /// Directory the listing belongs to
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Monotonic creation stamp
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Listed entries in backend order
    pub fn files(&self) -> &[RemoteFile] {
        &self.files
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the listing has no entries
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Append an entry, stamping it with the listing directory
    pub fn add_file(&mut self, mut file: RemoteFile) {
        if file.directory.is_empty() {
            file.directory.clone_from(&self.directory);
        }
        self.files.push(file);
    }

    /// Find an entry by exact name
    pub fn find(&self, name: &str) -> Option<&RemoteFile> {
        self.files.iter().find(|file| file.file_name == name)
    }

    /// Mutable access used while a listing is being built
    pub fn files_mut(&mut self) -> &mut [RemoteFile] {
        &mut self.files
    }
}

/// Element of a batch: a path with the listing entry it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    /// Path as given by the caller
    pub name: String,
    /// Listing entry, when the caller has one
    pub file: Option<RemoteFile>,
}

impl FileItem {
    /// Create a batch item from a bare path
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: None,
        }
    }

    /// Create a batch item from a listing entry
    pub fn from_file(file: RemoteFile) -> Self {
        Self {
            name: file.full_file_name(),
            file: Some(file),
        }
    }

    /// Whether the item is known to be a directory
    pub fn is_directory(&self) -> bool {
        self.file.as_ref().is_some_and(RemoteFile::is_directory)
    }
}

impl From<&str> for FileItem {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Optional operations a backend may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Arbitrary shell commands
    AnyCommand,
    /// Server-side copy
    RemoteCopy,
    /// Server-side move
    RemoteMove,
    /// Symbolic link creation
    SymbolicLink,
    /// Hard link creation
    HardLink,
    /// Permission changes
    ModeChanging,
    /// Owner changes
    OwnerChanging,
    /// Group changes
    GroupChanging,
    /// Listing of users and groups
    UserGroupListing,
    /// Free space queries
    CheckingSpaceAvailable,
    /// Server-side checksums
    CalculatingChecksum,
    /// Timestamp preservation on upload
    PreservingTimestamp,
    /// Resumable transfers
    Resume,
}

/// Protocol requested by the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FsProtocol {
    /// SCP only
    Scp,
    /// SFTP, falling back to SCP when the server requires it
    #[default]
    Sftp,
    /// SFTP only
    SftpOnly,
    /// FTP
    Ftp,
}

/// Protocol actually bound to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundProtocol {
    /// SCP over a secure shell
    Scp,
    /// SFTP over a secure shell
    Sftp,
    /// FTP
    Ftp,
}

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Not connected
    #[default]
    Closed,
    /// Connection in progress
    Opening,
    /// Connected and started up
    Opened,
}

/// Kind of a batch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Transfer
    Copy,
    /// Transfer and delete source
    Move,
    /// Deletion
    Delete,
    /// Property change
    SetProperties,
    /// Size calculation
    CalculateSize,
    /// Custom command on files
    CustomCommand,
    /// Checksum calculation
    CalculateChecksum,
    /// Server-side copy
    RemoteCopy,
    /// Server-side move
    RemoteMove,
    /// Property reading
    GetProperties,
}

/// Side of the connection a batch works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationSide {
    /// Local filesystem
    Local,
    /// Remote filesystem
    Remote,
}

/// Action requested once a batch completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OnceDoneOperation {
    /// Keep the session open
    #[default]
    Idle,
    /// Close the session
    Disconnect,
    /// Close the session and the application
    Shutdown,
}

/// Commands that may affect the current directory or its contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsCommand {
    /// Change of the current directory
    ChangeDirectory,
    /// Change to the home directory
    HomeDirectory,
    /// Read of the current directory
    CurrentDirectory,
    /// Read of a listing
    ReadDirectory,
    /// Upload
    CopyToRemote,
    /// Download
    CopyToLocal,
    /// Deletion
    DeleteFile,
    /// Rename
    RenameFile,
    /// Move
    MoveFile,
    /// Server-side copy
    CopyFile,
    /// Directory creation
    CreateDirectory,
    /// Property change
    ChangeProperties,
    /// Arbitrary command
    AnyCommand,
    /// Link creation
    CreateLink,
}

impl FsCommand {
    /// Whether the command may change the current directory
    pub fn changes_directory(self) -> bool {
        matches!(
            self,
            Self::ChangeDirectory | Self::HomeDirectory | Self::AnyCommand
        )
    }

    /// Whether the command may change the contents of the current directory
    pub fn modifies_files(self) -> bool {
        matches!(
            self,
            Self::CopyToRemote
                | Self::DeleteFile
                | Self::RenameFile
                | Self::MoveFile
                | Self::CopyFile
                | Self::CreateDirectory
                | Self::ChangeProperties
                | Self::AnyCommand
                | Self::CreateLink
        )
    }
}

/// Aggregated statistics of a size calculation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOperationStats {
    /// Regular files visited
    pub files: u64,
    /// Directories visited
    pub directories: u64,
    /// Symbolic links visited
    pub symlinks: u64,
    /// Total size in bytes
    pub size: u64,
}

impl FileOperationStats {
    /// Create empty statistics
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(secs: i64, nanos: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, nanos).single().unwrap()
    }

    proptest! {
        #[test]
        fn test_reduce_never_moves_forward(secs in 0i64..4_000_000_000, nanos in 0u32..1_000_000_000) {
            let time = at(secs, nanos);
            for precision in [
                ModificationPrecision::Full,
                ModificationPrecision::Seconds,
                ModificationPrecision::Minutes,
                ModificationPrecision::Days,
            ] {
                prop_assert!(precision.reduce(time) <= time);
                prop_assert_eq!(precision.reduce(precision.reduce(time)), precision.reduce(time));
            }
        }
    }

    #[test]
    fn test_reduce_precision() {
        let time = at(90_061, 500);
        assert_eq!(ModificationPrecision::Full.reduce(time), time);
        assert_eq!(ModificationPrecision::Seconds.reduce(time), at(90_061, 0));
        assert_eq!(ModificationPrecision::Minutes.reduce(time), at(90_060, 0));
        assert_eq!(ModificationPrecision::Days.reduce(time), at(86_400, 0));
    }

    #[test]
    fn test_lesser_is_coarser() {
        assert_eq!(
            ModificationPrecision::Full.lesser(ModificationPrecision::Minutes),
            ModificationPrecision::Minutes
        );
        assert_eq!(
            ModificationPrecision::Days.lesser(ModificationPrecision::Seconds),
            ModificationPrecision::Days
        );
    }

    #[test]
    fn test_file_list_stamps_directory() {
        let mut list = FileList::new("/data");
        list.add_file(RemoteFile::file("a.txt", 3, at(0, 0)));
        assert_eq!(list.files()[0].directory, "/data");
        assert_eq!(list.find("a.txt").map(RemoteFile::full_file_name).as_deref(), Some("/data/a.txt"));
        assert!(list.find("b.txt").is_none());
    }

    #[test]
    fn test_file_list_timestamps_are_monotonic() {
        let first = FileList::new("/");
        let second = FileList::new("/");
        assert!(second.timestamp() > first.timestamp());
        let copy = second.clone();
        assert_eq!(copy.timestamp(), second.timestamp());
    }

    #[test]
    fn test_command_classification() {
        assert!(FsCommand::AnyCommand.changes_directory());
        assert!(FsCommand::AnyCommand.modifies_files());
        assert!(FsCommand::HomeDirectory.changes_directory());
        assert!(!FsCommand::CopyToLocal.modifies_files());
        assert!(!FsCommand::CurrentDirectory.changes_directory());
    }
}

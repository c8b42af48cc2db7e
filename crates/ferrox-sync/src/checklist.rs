//! Synchronization checklist

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use ferrox_types::{unix_path, ModificationPrecision, RemoteFile};
use serde::{Deserialize, Serialize};

/// What applying a checklist item does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChecklistAction {
    /// Nothing
    #[default]
    None,
    /// Upload a file missing on the remote side
    UploadNew,
    /// Upload a file newer on the local side
    UploadUpdate,
    /// Download a file missing on the local side
    DownloadNew,
    /// Download a file newer on the remote side
    DownloadUpdate,
    /// Delete a local file missing on the remote side
    DeleteLocal,
    /// Delete a remote file missing on the local side
    DeleteRemote,
}

/// One side of a checklist item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Name, empty when the file does not exist on this side
    pub file_name: String,
    /// Directory on this side
    pub directory: String,
    /// Size in bytes
    pub size: u64,
    /// Modification time
    pub modification: DateTime<Utc>,
    /// Precision of `modification`
    #[serde(skip)]
    pub precision: ModificationPrecision,
}

/// One proposed synchronization action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Proposed action
    pub action: ChecklistAction,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// Local side
    pub local: FileInfo,
    /// Remote side
    pub remote: FileInfo,
    /// Whether the action will be applied
    pub checked: bool,
    /// Unreduced local modification time, used to stamp the remote side
    pub local_last_write: Option<DateTime<Utc>>,
    /// Listing entry of the remote file
    #[serde(skip)]
    pub remote_file: Option<RemoteFile>,
}

impl ChecklistItem {
    /// Name of the entry, preferring the remote one
    pub fn file_name(&self) -> &str {
        if self.remote.file_name.is_empty() {
            &self.local.file_name
        } else {
            &self.remote.file_name
        }
    }

    /// Full local path
    pub fn local_path(&self) -> PathBuf {
        PathBuf::from(&self.local.directory).join(&self.local.file_name)
    }

    /// Full remote path
    pub fn remote_path(&self) -> String {
        unix_path::join(&self.remote.directory, &self.remote.file_name)
    }

    fn directory_key(&self) -> &str {
        if self.local.directory.is_empty() {
            &self.remote.directory
        } else {
            &self.local.directory
        }
    }
}

fn compare_text(left: &str, right: &str) -> Ordering {
    left.chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase))
}

/// Collected synchronization actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    items: Vec<ChecklistItem>,
}

impl Checklist {
    /// Create an empty checklist
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item
    pub fn add(&mut self, item: ChecklistItem) {
        self.items.push(item);
    }

    /// Order items by directory, then by name, ignoring case
    pub fn sort(&mut self) {
        self.items.sort_by(|left, right| {
            compare_text(left.directory_key(), right.directory_key())
                .then_with(|| compare_text(left.file_name(), right.file_name()))
        });
    }

    /// Items in checklist order
    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    /// Mutable items, used to check or uncheck actions
    pub fn items_mut(&mut self) -> &mut [ChecklistItem] {
        &mut self.items
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the checklist proposes nothing
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of checked items
    pub fn checked_count(&self) -> usize {
        self.items.iter().filter(|item| item.checked).count()
    }

    /// Runs of consecutive items sharing local and remote directory
    pub fn groups(&self) -> Vec<&[ChecklistItem]> {
        let mut groups = Vec::new();
        let mut start = 0;
        for index in 1..=self.items.len() {
            let split = index == self.items.len()
                || !same_directories(&self.items[index - 1], &self.items[index]);
            if split {
                groups.push(&self.items[start..index]);
                start = index;
            }
        }
        groups
    }
}

fn same_directories(left: &ChecklistItem, right: &ChecklistItem) -> bool {
    left.local.directory == right.local.directory && left.remote.directory == right.remote.directory
}

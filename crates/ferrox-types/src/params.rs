//! Parameters of transfer and file operations

use chrono::{DateTime, Utc};

use crate::mask::FileMasks;

/// Transfer settings and flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyParam {
    /// Include/exclude masks deciding which files take part
    pub masks: FileMasks,
    /// Keep source modification times
    pub preserve_time: bool,
    /// Keep source permissions
    pub preserve_rights: bool,
    /// Compute the total size before transferring
    pub calculate_size: bool,
    /// Bandwidth limit in bytes per second, 0 for none
    pub cps_limit: u64,
    /// Overwrite without asking
    pub no_confirmation: bool,
    /// Transfer only files newer than the target
    pub newer_only: bool,
    /// Append to existing targets
    pub append: bool,
    /// Resume partial targets
    pub resume: bool,
    /// Delete sources after transfer
    pub delete: bool,
    /// Transfer into a temporary location
    pub temporary: bool,
}

impl CopyParam {
    /// Create default transfer settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a file takes part in the transfer
    pub fn allow_transfer(&self, name: &str, is_directory: bool) -> bool {
        self.masks.matches(name, is_directory)
    }
}

/// Flags of a delete operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteParams {
    /// Never move to the recycle bin
    pub force_delete: bool,
    /// Invert the configured recycle bin policy
    pub alternative: bool,
}

/// Flags of a reopen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReopenParams {
    /// Do not read the directory listing after reconnecting
    pub no_read_directory: bool,
}

/// Properties to apply to a remote file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteProperties {
    /// Unix permission bits
    pub rights: Option<u32>,
    /// Owner name
    pub owner: Option<String>,
    /// Group name
    pub group: Option<String>,
    /// Modification time
    pub modification: Option<DateTime<Utc>>,
    /// Apply to directory contents as well
    pub recursive: bool,
}

impl RemoteProperties {
    /// Properties setting only the modification time
    pub fn modification(time: DateTime<Utc>) -> Self {
        Self {
            modification: Some(time),
            ..Self::default()
        }
    }

    /// Whether nothing would be changed
    pub fn is_empty(&self) -> bool {
        self.rights.is_none()
            && self.owner.is_none()
            && self.group.is_none()
            && self.modification.is_none()
    }
}

impl std::fmt::Display for RemoteProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(rights) = self.rights {
            parts.push(format!("rights={:o}", rights));
        }
        if let Some(owner) = &self.owner {
            parts.push(format!("owner={}", owner));
        }
        if let Some(group) = &self.group {
            parts.push(format!("group={}", group));
        }
        if let Some(modification) = self.modification {
            parts.push(format!("modification={}", modification.to_rfc3339()));
        }
        if self.recursive {
            parts.push("recursive".to_string());
        }
        write!(f, "{}", parts.join(", "))
    }
}

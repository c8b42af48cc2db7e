//! Synchronization mode and parameters

use serde::{Deserialize, Serialize};

/// Side that is brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Make the remote side match the local one
    #[default]
    Remote,
    /// Make the local side match the remote one
    Local,
    /// Exchange newer files in both directions
    Both,
}

impl SyncMode {
    /// Whether local files may be uploaded
    pub fn uploads(self) -> bool {
        matches!(self, Self::Remote | Self::Both)
    }

    /// Whether remote files may be downloaded
    pub fn downloads(self) -> bool {
        matches!(self, Self::Local | Self::Both)
    }
}

/// Flags steering collection and application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncParams {
    /// Check deletions of obsolete files
    pub delete: bool,
    /// Overwrite without confirmation when applying
    pub no_confirmation: bool,
    /// Check only updates of files existing on both sides
    pub existing_only: bool,
    /// Only align modification times instead of transferring content
    pub timestamp: bool,
    /// Do not compare modification times
    pub not_by_time: bool,
    /// Also compare sizes
    pub by_size: bool,
    /// Do not descend into subdirectories
    pub no_recurse: bool,
    /// Check new subdirectories even when not recursing
    pub sub_dirs: bool,
    /// Read remote listings from the directory cache when possible
    pub use_cache: bool,
    /// Report a directory only once its remote listing is about to be read
    pub delay_progress: bool,
    /// Treat any time difference as an update of the target side
    pub mirror: bool,
}

/// Optional restrictions of a collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Names allowed at the first level, matched case-insensitively against
    /// the local or the remote name
    pub first_level_filter: Option<Vec<String>>,
}

impl SyncOptions {
    /// Restrict the first level to `names`
    pub fn with_filter<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            first_level_filter: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether a first level entry passes the filter
    pub fn allows(&self, name: &str) -> bool {
        self.first_level_filter.as_ref().map_or(true, |names| {
            names.iter().any(|allowed| allowed.eq_ignore_ascii_case(name))
        })
    }
}

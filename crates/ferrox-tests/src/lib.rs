//! Ferrox Testing Suite
//!
//! Integration tests and benchmarks for the Ferrox crates, together with the
//! test doubles they share: an in-memory server with its backend and
//! connector, a scripted UI, a recording log sink and a manual clock.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// Doubles that record into one shared timeline so tests can assert the
/// order in which the session talks to its collaborators.
pub mod test_utils;

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use filetime::FileTime;

/// Write a local file with `content` and a fixed modification time
pub fn write_local_file(path: &Path, content: &str, modification: DateTime<Utc>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    filetime::set_file_mtime(path, FileTime::from_unix_time(modification.timestamp(), 0))
}

/// Build a tree of files under `base` from `(relative path, content)` pairs
pub fn create_tree(base: &Path, files: &[(&str, &str)], modification: DateTime<Utc>) -> std::io::Result<()> {
    for (relative, content) in files {
        write_local_file(&base.join(relative), content, modification)?;
    }
    Ok(())
}

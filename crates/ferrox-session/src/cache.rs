//! Directory listing cache and directory change cache

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use ferrox_types::{unix_path, Error, FileList, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Listings keyed by directory
///
/// Entries are immutable snapshots; [`get`](Self::get) hands out a copy.
#[derive(Debug, Default, Clone)]
pub struct DirectoryCache {
    lists: HashMap<String, FileList>,
}

fn cache_key(directory: &str) -> String {
    unix_path::exclude_trailing_slash(directory)
}

impl DirectoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a listing, replacing an older one of the same directory
    pub fn add(&mut self, list: FileList) {
        self.lists.insert(cache_key(list.directory()), list);
    }

    /// Copy of the cached listing of a directory
    pub fn get(&self, directory: &str) -> Option<FileList> {
        self.lists.get(&cache_key(directory)).cloned()
    }

    /// Whether a listing of the directory is cached
    pub fn has_file_list(&self, directory: &str) -> bool {
        self.lists.contains_key(&cache_key(directory))
    }

    /// Whether the cached listing is newer than the given stamp
    pub fn has_newer_file_list(&self, directory: &str, timestamp: u64) -> bool {
        self.lists
            .get(&cache_key(directory))
            .is_some_and(|list| list.timestamp() > timestamp)
    }

    /// Drop the listing of a directory, and of everything below it with `sub_dirs`
    pub fn clear_file_list(&mut self, directory: &str, sub_dirs: bool) {
        let key = cache_key(directory);
        self.lists.remove(&key);
        if sub_dirs {
            self.lists
                .retain(|cached, _| !unix_path::is_child_of(&key, cached));
        }
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.lists.clear();
    }

    /// Number of cached listings
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

/// Marks a directory known to exist as the target of some change
const SELF_TARGET: &str = "//";

/// One remembered directory change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryChange {
    /// Absolute path, or `source,change` for relative changes
    pub key: String,
    /// Resolved absolute target
    pub target: String,
}

/// Bounded memory of how directory changes resolved
///
/// Relative changes such as `..` are keyed by the directory they were made
/// from, absolute ones by the path itself. The oldest entries are dropped
/// once the size limit is reached.
#[derive(Debug, Clone)]
pub struct DirectoryChangesCache {
    entries: VecDeque<DirectoryChange>,
    max_size: usize,
}

fn expand_change(change: &str, source: &str) -> String {
    if unix_path::is_absolute(change) || change.is_empty() {
        change.to_string()
    } else {
        unix_path::join(source, change)
    }
}

fn change_key(source: &str, change: &str) -> Option<String> {
    if change.is_empty() {
        return None;
    }
    if unix_path::is_absolute(change) {
        Some(change.to_string())
    } else if source.is_empty() {
        None
    } else {
        Some(format!("{},{}", source, change))
    }
}

impl DirectoryChangesCache {
    /// Create a cache holding at most `max_size` entries
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_size: max_size.max(1),
        }
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.target.as_str())
    }

    fn set_value(&mut self, key: String, target: String) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.key == key) {
            entry.target = target;
            return;
        }
        self.entries.push_back(DirectoryChange { key, target });
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
    }

    /// Remember that `change` made from `source` led to `target`
    pub fn add_directory_change(&mut self, source: &str, change: &str, target: &str) {
        if target.is_empty() {
            return;
        }
        self.set_value(target.to_string(), SELF_TARGET.to_string());
        if expand_change(change, source) != target {
            if let Some(key) = change_key(source, change) {
                self.set_value(key, target.to_string());
            }
        }
    }

    /// Target of `change` made from `source`, if known
    pub fn get_directory_change(&self, source: &str, change: &str) -> Option<String> {
        let expanded = expand_change(change, source);
        if let Some(target) = self.value(&expanded) {
            return Some(if target == SELF_TARGET {
                expanded
            } else {
                target.to_string()
            });
        }
        let key = change_key(source, change)?;
        self.value(&key)
            .filter(|target| !target.is_empty())
            .map(str::to_string)
    }

    /// Forget changes made from `source` or below it
    pub fn clear_directory_change(&mut self, source: &str) {
        self.entries
            .retain(|entry| !entry.key.starts_with(source));
    }

    /// Forget changes leading to `target` or below it
    pub fn clear_directory_change_target(&mut self, target: &str) {
        self.entries
            .retain(|entry| !(entry.key.starts_with(target) || entry.target.starts_with(target)));
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of remembered entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is remembered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn entries(&self) -> Vec<DirectoryChange> {
        self.entries.iter().cloned().collect()
    }

    /// Replace the content with previously saved entries
    pub fn restore(&mut self, entries: Vec<DirectoryChange>) {
        self.entries.clear();
        for entry in entries {
            self.set_value(entry.key, entry.target);
        }
    }
}

/// Persistence of directory change caches between sessions
pub trait DirectoryChangesStore {
    /// Entries saved for a server
    fn load(&self, key: &str) -> Result<Option<Vec<DirectoryChange>>>;

    /// Save the entries of a server
    fn save(&self, key: &str, entries: &[DirectoryChange]) -> Result<()>;
}

/// Store keeping all servers in one JSON file
#[derive(Debug, Clone)]
pub struct JsonChangesStore {
    path: PathBuf,
}

type StoredChanges = BTreeMap<String, Vec<DirectoryChange>>;

impl JsonChangesStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File the store writes to
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<StoredChanges> {
        if !self.path.exists() {
            return Ok(StoredChanges::new());
        }
        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::other(format!(
                "Failed to parse directory changes from {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl DirectoryChangesStore for JsonChangesStore {
    fn load(&self, key: &str) -> Result<Option<Vec<DirectoryChange>>> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&self, key: &str, entries: &[DirectoryChange]) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), entries.to_vec());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&all)
            .map_err(|e| Error::other(format!("Failed to serialize directory changes: {}", e)))?;
        fs::write(&self.path, content)?;
        debug!("Saved {} directory changes for {}", entries.len(), key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrox_types::RemoteFile;
    use tempfile::TempDir;

    fn listing(directory: &str) -> FileList {
        let mut list = FileList::new(directory);
        list.add_file(RemoteFile::file("a.txt", 1, chrono::Utc::now()));
        list
    }

    #[test]
    fn test_get_returns_independent_copy() {
        let mut cache = DirectoryCache::new();
        cache.add(listing("/data"));
        let copy = cache.get("/data/").unwrap();
        assert_eq!(copy.len(), 1);
        assert_eq!(cache.get("/data"), Some(copy));
    }

    #[test]
    fn test_clear_with_subdirectories() {
        let mut cache = DirectoryCache::new();
        for directory in ["/data", "/data/a", "/data/a/b", "/database", "/other"] {
            cache.add(listing(directory));
        }
        cache.clear_file_list("/data", false);
        assert!(!cache.has_file_list("/data"));
        assert!(cache.has_file_list("/data/a"));

        cache.clear_file_list("/data", true);
        assert!(!cache.has_file_list("/data/a/b"));
        assert!(cache.has_file_list("/database"));
        assert!(cache.has_file_list("/other"));
    }

    #[test]
    fn test_has_newer_file_list() {
        let mut cache = DirectoryCache::new();
        let old = listing("/data");
        let newer = listing("/data");
        cache.add(newer);
        assert!(cache.has_newer_file_list("/data", old.timestamp()));
        assert!(!cache.has_newer_file_list("/missing", 0));
    }

    #[test]
    fn test_parent_change_keyed_by_source() {
        let mut cache = DirectoryChangesCache::new(10);
        cache.add_directory_change("/a/b", "..", "/a");
        assert_eq!(cache.get_directory_change("/a/b", ".."), Some("/a".to_string()));
        assert_eq!(cache.get_directory_change("/x/y", ".."), None);
        assert!(cache.entries().iter().all(|entry| entry.key != "/a/b,.." || entry.target == "/a"));
    }

    #[test]
    fn test_absolute_symlink_change() {
        let mut cache = DirectoryChangesCache::new(10);
        cache.add_directory_change("/home", "/link", "/real/dir");
        assert_eq!(cache.get_directory_change("/anywhere", "/link"), Some("/real/dir".to_string()));
        assert_eq!(cache.get_directory_change("/", "/real/dir"), Some("/real/dir".to_string()));
    }

    #[test]
    fn test_size_bound_drops_oldest() {
        let mut cache = DirectoryChangesCache::new(2);
        cache.add_directory_change("/a", "x", "/a/x");
        cache.add_directory_change("/b", "y", "/b/y");
        cache.add_directory_change("/c", "z", "/c/z");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_directory_change("/a", "x"), None);
        assert_eq!(cache.get_directory_change("/c", "z"), Some("/c/z".to_string()));
    }

    #[test]
    fn test_clear_directory_change_and_target() {
        let mut cache = DirectoryChangesCache::new(10);
        cache.add_directory_change("/a/b", "..", "/a");
        cache.add_directory_change("/c", "/link", "/real");
        cache.clear_directory_change("/a/b");
        assert_eq!(cache.get_directory_change("/a/b", ".."), None);
        cache.clear_directory_change_target("/real");
        assert_eq!(cache.get_directory_change("/c", "/link"), None);
    }

    #[test]
    fn test_json_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonChangesStore::new(temp_dir.path().join("state").join("changes.json"));
        assert_eq!(store.load("alice@host:22").unwrap(), None);

        let mut cache = DirectoryChangesCache::new(10);
        cache.add_directory_change("/a/b", "..", "/a");
        store.save("alice@host:22", &cache.entries()).unwrap();
        store.save("bob@host:22", &[]).unwrap();

        let mut restored = DirectoryChangesCache::new(10);
        restored.restore(store.load("alice@host:22").unwrap().unwrap());
        assert_eq!(restored.get_directory_change("/a/b", ".."), Some("/a".to_string()));
    }
}

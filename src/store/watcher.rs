//! Detects writes made to a [`FileStore`](super::FileStore) by other processes.
//!
//! Browsers notify a tab when another tab changes local storage, but never
//! for the tab's own writes. The watcher reproduces that by diffing the
//! store file against a snapshot and re-taking the snapshot after local
//! writes via [`FileWatcher::resync`].

use super::file::load_entries;
use crate::error::StoreError;
use crate::signals::Signal;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// Polls a store file and reports per-key changes since the last poll.
#[derive(Debug)]
pub struct FileWatcher {
    path: PathBuf,
    snapshot: Option<BTreeMap<String, String>>,
}

impl FileWatcher {
    /// Create a watcher and take the initial snapshot.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut watcher = Self {
            path: path.into(),
            snapshot: None,
        };
        watcher.resync()?;
        Ok(watcher)
    }

    /// Re-take the snapshot without reporting anything.
    pub fn resync(&mut self) -> Result<(), StoreError> {
        self.snapshot = self.read()?;
        Ok(())
    }

    /// Compare the file against the snapshot, update the snapshot, and
    /// return one signal per changed key.
    pub fn poll(&mut self) -> Result<Vec<Signal>, StoreError> {
        let current = self.read()?;
        let signals = diff(self.snapshot.as_ref(), current.as_ref());
        if !signals.is_empty() {
            debug!("{} store change(s) detected", signals.len());
        }
        self.snapshot = current;
        Ok(signals)
    }

    fn read(&self) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        Ok(load_entries(&self.path)?.map(|entries| entries.into_iter().collect()))
    }
}

fn diff(
    before: Option<&BTreeMap<String, String>>,
    after: Option<&BTreeMap<String, String>>,
) -> Vec<Signal> {
    match (before, after) {
        (None, None) => Vec::new(),
        (Some(_), None) => vec![Signal::StorageChanged { key: None }],
        (None, Some(after)) => after.keys().map(Signal::storage_changed).collect(),
        (Some(before), Some(after)) => {
            let mut changed: Vec<&String> = after
                .iter()
                .filter(|(key, value)| before.get(*key) != Some(*value))
                .map(|(key, _)| key)
                .collect();
            changed.extend(before.keys().filter(|key| !after.contains_key(*key)));
            changed.sort();
            changed.into_iter().map(Signal::storage_changed).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, KeyValueStore};
    use tempfile::TempDir;

    #[test]
    fn test_reports_changed_added_and_removed_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut other_tab = FileStore::open(&path);
        other_tab.set("admins", "[]").unwrap();
        other_tab.set("certificates", "[]").unwrap();

        let mut watcher = FileWatcher::new(&path).unwrap();
        assert!(watcher.poll().unwrap().is_empty());

        other_tab.set("admins", "[{}]").unwrap();
        other_tab.set("institutions", "[]").unwrap();
        other_tab.remove("certificates").unwrap();

        let signals = watcher.poll().unwrap();
        assert_eq!(
            signals,
            vec![
                Signal::storage_changed("admins"),
                Signal::storage_changed("certificates"),
                Signal::storage_changed("institutions"),
            ]
        );
        assert!(watcher.poll().unwrap().is_empty());
    }

    #[test]
    fn test_same_value_rewrite_is_silent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut other_tab = FileStore::open(&path);
        other_tab.set("admins", "[]").unwrap();

        let mut watcher = FileWatcher::new(&path).unwrap();
        other_tab.set("admins", "[]").unwrap();
        assert!(watcher.poll().unwrap().is_empty());
    }

    #[test]
    fn test_resync_hides_own_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut this_tab = FileStore::open(&path);
        let mut watcher = FileWatcher::new(&path).unwrap();

        this_tab.set("currentAdmin", "null").unwrap();
        watcher.resync().unwrap();
        assert!(watcher.poll().unwrap().is_empty());
    }

    #[test]
    fn test_deleted_file_is_a_clear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        FileStore::open(&path).set("admins", "[]").unwrap();

        let mut watcher = FileWatcher::new(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            watcher.poll().unwrap(),
            vec![Signal::StorageChanged { key: None }]
        );
    }
}

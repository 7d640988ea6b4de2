//! File-backed store shared between processes.
//!
//! The store file is a single JSON object mapping each key to its stored
//! string. Every operation re-reads the file, so a write made by another
//! process is visible on the next read. Writes replace the whole document
//! atomically; concurrent writers are last-write-wins.

use super::KeyValueStore;
use crate::error::StoreError;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A key-value store persisted as a JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Open a store at `path`. The file does not need to exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>, StoreError> {
        load_document(&self.path).map(Option::unwrap_or_default)
    }

    fn save(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let encoded = serde_json::to_vec_pretty(document)?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&encoded).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!("Wrote {} keys to {}", document.len(), self.path.display());
        Ok(())
    }
}

/// Read the store document at `path`, as stored strings per key.
///
/// Returns `Ok(None)` when the file does not exist.
pub(crate) fn load_entries(path: &Path) -> Result<Option<Vec<(String, String)>>, StoreError> {
    Ok(load_document(path)?.map(|doc| {
        doc.into_iter()
            .map(|(key, value)| (key, stored_string(value)))
            .collect()
    }))
}

fn load_document(path: &Path) -> Result<Option<Map<String, Value>>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if content.trim().is_empty() {
        return Ok(Some(Map::new()));
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: "top-level value is not an object".to_string(),
        }),
        Err(e) => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Local storage only holds strings; anything else in the file is read as
/// its JSON text.
fn stored_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut document = self.load()?;
        Ok(document.remove(key).map(stored_string))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut document = self.load()?;
        document.insert(key.to_string(), Value::String(value.to_string()));
        self.save(&document)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let mut document = self.load()?;
        if document.remove(key).is_some() {
            self.save(&document)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.load()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("store.json"));

        assert_eq!(store.get("currentAdmin").unwrap(), None);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_set_then_get_from_second_handle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut writer = FileStore::open(&path);
        let reader = FileStore::open(&path);

        writer.set("admins", "[]").unwrap();
        assert_eq!(reader.get("admins").unwrap().as_deref(), Some("[]"));

        writer.remove("admins").unwrap();
        assert_eq!(reader.get("admins").unwrap(), None);
    }

    #[test]
    fn test_non_string_values_read_as_json_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"{"institutions": [{"id": 1}], "currentAdmin": null}"#).unwrap();

        let store = FileStore::open(&path);
        assert_eq!(
            store.get("institutions").unwrap().as_deref(),
            Some(r#"[{"id":1}]"#)
        );
        assert_eq!(store.get("currentAdmin").unwrap().as_deref(), Some("null"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = FileStore::open(&path);
        assert!(matches!(
            store.get("admins"),
            Err(StoreError::Corrupt { .. })
        ));
    }
}

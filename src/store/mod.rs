//! Key-value store access.
//!
//! The dashboard never owns its data. Everything lives in a shared,
//! string-valued key-value store (the browser's local storage, or a JSON
//! document on disk shared between processes). This module defines the
//! store trait, its implementations, and the lenient JSON decoding used to
//! read collections out of it.

pub mod file;
pub mod memory;
pub mod watcher;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use watcher::FileWatcher;

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Storage keys read or written by the dashboard.
pub mod keys {
    pub const CURRENT_ADMIN: &str = "currentAdmin";
    pub const ADMIN_NOTIFICATIONS: &str = "adminNotifications";
    pub const INSTITUTIONS: &str = "institutions";
    pub const ADMINS: &str = "admins";
    pub const CERTIFICATES: &str = "certificates";
    /// Legacy location of issue requests, read when the admin queue is absent.
    pub const CERTIFICATE_REQUESTS: &str = "certificateRequests";
    pub const ADMIN_CERTIFICATE_REQUESTS: &str = "admin_certificate_requests";
    pub const ADMIN_REVOKE_REQUESTS: &str = "admin_revoke_requests";
    pub const ADMIN_PROCESSED_REQUESTS: &str = "admin_processed_requests";

    /// Every key the dashboard depends on.
    pub const ALL: [&str; 9] = [
        CURRENT_ADMIN,
        ADMIN_NOTIFICATIONS,
        INSTITUTIONS,
        ADMINS,
        CERTIFICATES,
        CERTIFICATE_REQUESTS,
        ADMIN_CERTIFICATE_REQUESTS,
        ADMIN_REVOKE_REQUESTS,
        ADMIN_PROCESSED_REQUESTS,
    ];
}

/// A string-valued key-value store with no schema and no transactions.
pub trait KeyValueStore {
    /// Read the raw stored string for `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is a no-op.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    /// All keys currently present.
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &mut S {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).keys()
    }
}

/// Read a collection stored as a JSON array, keeping elements untyped.
///
/// An absent key yields an empty collection. A value that is not valid JSON,
/// or not an array, also yields an empty collection and logs a warning.
pub fn read_raw_collection<S>(store: &S, key: &str) -> Result<Vec<Value>, StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.get(key)? else {
        debug!("{} is absent, treating as empty", key);
        return Ok(Vec::new());
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(Value::Null) => Ok(Vec::new()),
        Ok(other) => {
            warn!(
                "{} holds a JSON {} instead of an array, treating as empty",
                key,
                json_kind(&other)
            );
            Ok(Vec::new())
        }
        Err(e) => {
            warn!("{} is not valid JSON ({}), treating as empty", key, e);
            Ok(Vec::new())
        }
    }
}

/// Read a collection and decode each element into `T`.
///
/// Elements that do not fit `T` decode as `T::default()`, so the result has
/// the same length as the stored array.
pub fn read_collection<T, S>(store: &S, key: &str) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned + Default,
    S: KeyValueStore + ?Sized,
{
    let items = read_raw_collection(store, key)?;
    Ok(items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).unwrap_or_else(|e| {
                debug!("Element of {} does not fit the record shape: {}", key, e);
                T::default()
            })
        })
        .collect())
}

/// Read a single JSON document.
///
/// Absent keys, a literal `null`, and malformed JSON all yield `None`.
pub fn read_document<T, S>(store: &S, key: &str) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    match serde_json::from_str::<Option<T>>(&raw) {
        Ok(doc) => Ok(doc),
        Err(e) => {
            warn!("{} is not a valid document ({}), ignoring it", key, e);
            Ok(None)
        }
    }
}

/// Serialize `items` as a JSON array and store them under `key`.
pub fn write_collection<S>(store: &mut S, key: &str, items: &[Value]) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
{
    let encoded = serde_json::to_string(items)?;
    store.set(key, &encoded)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

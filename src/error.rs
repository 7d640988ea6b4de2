//! Typed errors for the store and the session shell.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the underlying key-value store.
///
/// Missing keys and malformed collection values are not errors; they are
/// defaulted by the decoding helpers in [`crate::store`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access store file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store file {path} is not a JSON object: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to serialize store value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failures of session actions (logout, withdrawal).
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("No admin is signed in")]
    NotSignedIn,

    #[error("Super admins cannot withdraw their account")]
    WithdrawalForbidden,

    #[error(transparent)]
    Store(#[from] StoreError),
}

//! Persistence layer for the delivery client
//!
//! Every collection is one JSON blob under a string key. Provides:
//! - The [`KvStore`] trait with an atomic read-modify-write primitive
//! - Typed JSON helpers on top of it ([`JsonStoreExt`])
//! - SQLite-backed and in-memory implementations

mod memory;
mod sqlite;
mod traits;

pub use memory::*;
pub use sqlite::*;
pub use traits::*;

use delivery_util::DeliveryError;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The update closure declined to write; the stored value is unchanged
    #[error("Update aborted")]
    Aborted,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for DeliveryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => DeliveryError::NotFound(what),
            other => DeliveryError::StoreError(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

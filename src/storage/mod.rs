//! Durable key/value persistence for membership snapshots and command sources

use async_trait::async_trait;
use thiserror::Error;

mod file;
mod sqlite;

pub use file::FileStore;
pub use sqlite::{create_pool, SqliteStore};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("corrupt data under {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Byte-oriented persistence backend
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Durably replace the value under `key`
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

/// Key under which a session's welcomed-viewer set is persisted
///
/// Only filename-safe characters of the session id are kept, truncated to
/// 20 characters so keys stay short on every filesystem.
pub fn membership_key(session_id: &str) -> String {
    let safe: String = session_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(20)
        .collect();
    format!("welcomed_{}.json", safe)
}

/// Reject keys that would escape the store root
fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

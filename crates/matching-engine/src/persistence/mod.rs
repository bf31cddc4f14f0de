//! Per-profile notification state
//!
//! A small key-value store scoped to one browser/device profile holds the
//! pending-match slot and the "don't show again" flags. It is advisory only:
//! nothing here ever influences which records a match query returns.

mod file;
mod memory;
mod pending;
mod signature;

pub use file::FileKeyValueStore;
pub use memory::InMemoryKeyValueStore;
pub use pending::{PendingMatchPersistence, PENDING_VEHICLE_MATCH_KEY};
pub use signature::MatchSignature;

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors raised by a profile key-value store
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Profile storage misconfigured: {0}")]
    Config(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Synchronous string key-value storage for one profile
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> PersistenceResult<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> PersistenceResult<()>;

    /// Removing an absent key is not an error
    fn remove_item(&self, key: &str) -> PersistenceResult<()>;
}

/// Create the profile store from the `notifications.profile_storage` section
pub fn create_profile_store(
    config: &config::ProfileStorageConfig,
) -> PersistenceResult<Arc<dyn KeyValueStore>> {
    match config.storage_type.to_lowercase().as_str() {
        "memory" => {
            info!("Using in-memory profile storage");
            Ok(Arc::new(InMemoryKeyValueStore::new()))
        }
        "file" => {
            let path = config.path.as_deref().ok_or_else(|| {
                PersistenceError::Config("file profile storage requires a path".to_string())
            })?;
            info!(path = %path, "Using file profile storage");
            Ok(Arc::new(FileKeyValueStore::new(path)))
        }
        other => Err(PersistenceError::Config(format!(
            "unknown profile storage type '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_create_profile_store() {
        let memory = config::ProfileStorageConfig::default();
        assert!(create_profile_store(&memory).is_ok());

        let missing_path = config::ProfileStorageConfig {
            storage_type: "file".to_string(),
            path: None,
        };
        assert_matches!(
            create_profile_store(&missing_path).err(),
            Some(PersistenceError::Config(_))
        );

        let unknown = config::ProfileStorageConfig {
            storage_type: "cookie".to_string(),
            path: None,
        };
        assert!(create_profile_store(&unknown).is_err());
    }
}

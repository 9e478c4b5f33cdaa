//! Progress storage
//!
//! Persists progress records keyed by (user, word). The scheduling core never
//! touches storage; callers load a record, run the scheduler and save the
//! result through a [`ProgressStore`].
//!
//! Backends:
//! - [`MemoryStore`] - process-local maps, for tests and ephemeral sessions
//! - [`JsonFileStore`] - one JSON document per user
//! - [`SqliteStore`] - a single SQLite database with versioned migrations

// ============================================================
// Submodules
// ============================================================

pub mod json_file;
pub mod memory;
pub mod migrations;
pub mod sqlite;

// ============================================================
// Re-exports
// ============================================================

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use migrations::run_migrations;
pub use sqlite::SqliteStore;

use thiserror::Error;
use wordwise_algo::{ProgressRecord, ValidationError};

use crate::config::{StorageConfig, StoreBackend};

// ============================================================
// Errors
// ============================================================

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("lock poisoned: {0}")]
    LockError(String),

    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================
// ProgressStore
// ============================================================

/// Persistence collaborator for progress records.
///
/// Implementations must not run the scheduler themselves and must reject
/// records that fail validation on `save`.
pub trait ProgressStore: Send + Sync {
    fn load(&self, user_id: &str, word_id: &str) -> StorageResult<Option<ProgressRecord>>;

    fn save(&self, user_id: &str, record: &ProgressRecord) -> StorageResult<()>;

    /// Every record of a user, ordered by word id
    fn load_all(&self, user_id: &str) -> StorageResult<Vec<ProgressRecord>>;

    fn save_all(&self, user_id: &str, records: &[ProgressRecord]) -> StorageResult<()> {
        for record in records {
            self.save(user_id, record)?;
        }
        Ok(())
    }
}

impl<T: ProgressStore + ?Sized> ProgressStore for Box<T> {
    fn load(&self, user_id: &str, word_id: &str) -> StorageResult<Option<ProgressRecord>> {
        (**self).load(user_id, word_id)
    }

    fn save(&self, user_id: &str, record: &ProgressRecord) -> StorageResult<()> {
        (**self).save(user_id, record)
    }

    fn load_all(&self, user_id: &str) -> StorageResult<Vec<ProgressRecord>> {
        (**self).load_all(user_id)
    }

    fn save_all(&self, user_id: &str, records: &[ProgressRecord]) -> StorageResult<()> {
        (**self).save_all(user_id, records)
    }
}

/// Open the backend named by the configuration
pub fn open_store(config: &StorageConfig) -> StorageResult<Box<dyn ProgressStore>> {
    tracing::info!(
        backend = config.backend.as_str(),
        path = %config.data_path.display(),
        "opening progress store"
    );

    let store: Box<dyn ProgressStore> = match config.backend {
        StoreBackend::Memory => Box::new(MemoryStore::new()),
        StoreBackend::JsonFile => Box::new(JsonFileStore::new(&config.data_path)?),
        StoreBackend::Sqlite => Box::new(SqliteStore::open(&config.data_path)?),
    };
    Ok(store)
}

/// Shared key check for every backend
pub(crate) fn check_user_id(user_id: &str) -> StorageResult<()> {
    if user_id.trim().is_empty() {
        return Err(StorageError::InvalidKey("user id must not be empty".to_string()));
    }
    Ok(())
}

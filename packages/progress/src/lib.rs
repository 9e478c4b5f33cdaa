//! # wordwise-progress
//!
//! Everything around the scheduling core that touches the outside world:
//!
//! - [`config`] - environment-driven configuration
//! - [`logging`] - tracing subscriber setup
//! - [`storage`] - the [`ProgressStore`] trait with memory, JSON and SQLite backends
//! - [`legacy`] - import of progress kept by the old clients
//! - [`service`] - [`ProgressService`], the load / schedule / save round trip

pub mod config;
pub mod legacy;
pub mod logging;
pub mod service;
pub mod storage;

pub use config::{Config, LogConfig, StorageConfig, StoreBackend};
pub use legacy::{import_learning_progress, import_learning_progress_with};
pub use service::{ProgressService, ReviewReport, ServiceError, ServiceResult};
pub use storage::{
    open_store, JsonFileStore, MemoryStore, ProgressStore, SqliteStore, StorageError,
    StorageResult,
};

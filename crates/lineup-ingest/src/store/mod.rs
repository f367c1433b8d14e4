//! Performance store interface
//!
//! The coordinator only knows [`PerformanceStore`]. Production wires in
//! [`DynamoPerformanceStore`]; dry runs and tests use [`MemoryPerformanceStore`].

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ItemKey, PerformanceRecord};

pub mod dynamodb;
pub mod memory;

pub use dynamodb::DynamoPerformanceStore;
pub use memory::MemoryPerformanceStore;

/// Failure of a single store operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Transient backend failure (throttling, 5xx, timeout); safe to retry
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Permanent failure for this item (validation, missing table, bad key)
    #[error("storage rejected request: {0}")]
    Rejected(String),
}

/// Key-value table of performances keyed by `(stage, date#start)`
///
/// `put` must overwrite an existing item with the same key, and the store
/// must apply each single-item write atomically.
#[async_trait]
pub trait PerformanceStore: Send + Sync {
    /// Insert or overwrite the item identified by `record.key()`
    async fn put(&self, record: &PerformanceRecord) -> Result<(), StorageError>;

    /// Read back the item for `key`, if any
    async fn get(&self, key: &ItemKey) -> Result<Option<PerformanceRecord>, StorageError>;
}

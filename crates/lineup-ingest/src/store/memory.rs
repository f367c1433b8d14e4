//! In-process store for dry runs and tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PerformanceStore, StorageError};
use crate::models::{ItemKey, PerformanceRecord};

/// Ordered map behind a lock; never fails
#[derive(Debug, Default)]
pub struct MemoryPerformanceStore {
    items: RwLock<BTreeMap<ItemKey, PerformanceRecord>>,
    writes: AtomicUsize,
}

impl MemoryPerformanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct items currently stored
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Total successful `put` calls, overwrites included
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Copy of every stored item in key order
    pub async fn snapshot(&self) -> Vec<PerformanceRecord> {
        self.items.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl PerformanceStore for MemoryPerformanceStore {
    async fn put(&self, record: &PerformanceRecord) -> Result<(), StorageError> {
        self.items.write().await.insert(record.key(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &ItemKey) -> Result<Option<PerformanceRecord>, StorageError> {
        Ok(self.items.read().await.get(key).cloned())
    }
}

//! Shared fakes and fixtures for pipeline tests
//!
//! Everything here is in-process: the reader serves byte buffers, the store
//! wraps [`MemoryPerformanceStore`] with injectable failures, and the notifier
//! records what it was asked to send.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lineup_ingest::coordinator::CoordinatorConfig;
use lineup_ingest::handler::{IngestContext, ObjectReport};
use lineup_ingest::models::{ItemKey, PerformanceRecord};
use lineup_ingest::notify::Notifier;
use lineup_ingest::source::{ObjectLocation, ObjectReader, SourceError};
use lineup_ingest::store::{MemoryPerformanceStore, PerformanceStore, StorageError};
use lineup_ingest::upsert::RetryPolicy;
use tokio_util::sync::CancellationToken;

pub const HEADER: &str = "Stage,Date,Start,Performer,End";
pub const BUCKET: &str = "festival-uploads";
pub const KEY: &str = "lineup.csv";

/// CSV document with the standard header and the given data lines
pub fn csv(lines: &[&str]) -> Vec<u8> {
    let mut text = String::from(HEADER);
    for line in lines {
        text.push('\n');
        text.push_str(line);
    }
    text.push('\n');
    text.into_bytes()
}

pub fn location() -> ObjectLocation {
    ObjectLocation::new(BUCKET, KEY)
}

// ============================================================================
// Object reader
// ============================================================================

#[derive(Default)]
pub struct InMemoryReader {
    objects: Mutex<HashMap<ObjectLocation, Vec<u8>>>,
    denied: Mutex<HashSet<ObjectLocation>>,
}

impl InMemoryReader {
    pub fn with_object(location: ObjectLocation, bytes: Vec<u8>) -> Self {
        let reader = Self::default();
        reader.put(location, bytes);
        reader
    }

    pub fn put(&self, location: ObjectLocation, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(location, bytes);
    }

    pub fn deny(&self, location: ObjectLocation) {
        self.denied.lock().unwrap().insert(location);
    }
}

#[async_trait]
impl ObjectReader for InMemoryReader {
    async fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>, SourceError> {
        if self.denied.lock().unwrap().contains(location) {
            return Err(SourceError::AccessDenied(location.clone()));
        }
        self.objects
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .ok_or_else(|| SourceError::ObjectNotFound(location.clone()))
    }
}

// ============================================================================
// Store
// ============================================================================

/// Memory store that can fail the first puts, reject a stage outright, or
/// cancel a token after a number of successful writes
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryPerformanceStore,
    transient_failures: AtomicU32,
    rejected_stage: Option<String>,
    cancel_after: Option<(usize, CancellationToken)>,
    pub put_calls: AtomicU32,
    history: Mutex<Vec<PerformanceRecord>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` puts with [`StorageError::Unavailable`]
    pub fn failing_first(count: u32) -> Self {
        let store = Self::default();
        store.transient_failures.store(count, Ordering::SeqCst);
        store
    }

    pub fn rejecting_stage(stage: &str) -> Self {
        Self {
            rejected_stage: Some(stage.to_string()),
            ..Self::default()
        }
    }

    pub fn cancelling_after(writes: usize, cancel: CancellationToken) -> Self {
        Self {
            cancel_after: Some((writes, cancel)),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Successful writes in the order the store applied them
    pub fn history(&self) -> Vec<PerformanceRecord> {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait]
impl PerformanceStore for FaultyStore {
    async fn put(&self, record: &PerformanceRecord) -> Result<(), StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        if self.rejected_stage.as_deref() == Some(record.stage.as_str()) {
            return Err(StorageError::Rejected(
                "ValidationException: item rejected".into(),
            ));
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable(
                "ProvisionedThroughputExceededException".into(),
            ));
        }

        self.inner.put(record).await?;
        self.history.lock().unwrap().push(record.clone());

        if let Some((writes, cancel)) = &self.cancel_after {
            if self.inner.write_count() >= *writes {
                cancel.cancel();
            }
        }
        Ok(())
    }

    async fn get(&self, key: &ItemKey) -> Result<Option<PerformanceRecord>, StorageError> {
        self.inner.get(key).await
    }
}

// ============================================================================
// Notifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|(subject, _)| subject).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subject: &str, message: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), message.to_string()));
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub reader: Arc<InMemoryReader>,
    pub store: Arc<FaultyStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub context: IngestContext,
}

impl Harness {
    pub fn new(store: FaultyStore, config: CoordinatorConfig) -> Self {
        let reader = Arc::new(InMemoryReader::default());
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::default());
        let context = IngestContext::new(reader.clone(), store.clone(), notifier.clone(), config);

        Self {
            reader,
            store,
            notifier,
            context,
        }
    }

    /// Sequential writes, fast retries
    pub fn sequential() -> Self {
        Self::new(FaultyStore::new(), test_config(1))
    }

    /// Upload `bytes` at the default location and process it
    pub async fn ingest(&self, bytes: Vec<u8>) -> ObjectReport {
        self.ingest_with(bytes, &CancellationToken::new()).await
    }

    pub async fn ingest_with(&self, bytes: Vec<u8>, cancel: &CancellationToken) -> ObjectReport {
        self.reader.put(location(), bytes);
        self.context.process_object(&location(), cancel).await
    }

    pub async fn stored(&self, stage: &str, date_start: &str) -> Option<PerformanceRecord> {
        self.store
            .get(&ItemKey::new(stage, date_start))
            .await
            .unwrap()
    }
}

pub fn test_config(write_concurrency: usize) -> CoordinatorConfig {
    CoordinatorConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(10),
            max_delay: std::time::Duration::from_millis(100),
        },
        max_rejections: 100,
        write_concurrency,
    }
}

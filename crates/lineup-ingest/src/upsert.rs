//! Upsert engine: single write and bounded retry around it

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::models::{PerformanceRecord, RejectionReason};
use crate::store::{PerformanceStore, StorageError};

/// Default attempts per row (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the first retry
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);
/// Default upper bound for a single backoff delay
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

/// Exponential backoff for transient store failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_delay: DEFAULT_RETRY_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// One attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` counts from 1
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Writes validated records into a [`PerformanceStore`]
#[derive(Clone)]
pub struct UpsertEngine {
    store: Arc<dyn PerformanceStore>,
}

impl UpsertEngine {
    pub fn new(store: Arc<dyn PerformanceStore>) -> Self {
        Self { store }
    }

    /// One put of the full attribute set, overwriting any item with the same key
    ///
    /// Applying the same record twice leaves the same stored state.
    pub async fn upsert(&self, record: &PerformanceRecord) -> Result<(), StorageError> {
        self.store.put(record).await
    }

    /// [`upsert`](Self::upsert) with retries on [`StorageError::Unavailable`]
    ///
    /// Permanent errors are returned after the first attempt. A backoff is cut
    /// short when `cancel` fires, and the row is reported unavailable with the
    /// attempts made so far. Returns the number of attempts used on success.
    pub async fn upsert_with_retry(
        &self,
        record: &PerformanceRecord,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<u32, RejectionReason> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.upsert(record).await {
                Ok(()) => return Ok(attempt),
                Err(StorageError::Rejected(detail)) => {
                    return Err(RejectionReason::StorageRejected { detail });
                },
                Err(StorageError::Unavailable(detail)) => {
                    if attempt >= max_attempts || cancel.is_cancelled() {
                        return Err(RejectionReason::StorageUnavailable {
                            attempts: attempt,
                            detail,
                        });
                    }

                    let delay = policy.delay_after(attempt);
                    warn!(
                        key = %record.key(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %detail,
                        "Store unavailable, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            warn!(key = %record.key(), attempt, "Cancelled during backoff");
                            return Err(RejectionReason::StorageUnavailable {
                                attempts: attempt,
                                detail,
                            });
                        },
                        _ = tokio::time::sleep(delay) => {},
                    }
                    attempt += 1;
                },
            }
        }
    }
}

impl std::fmt::Debug for UpsertEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpsertEngine").finish_non_exhaustive()
    }
}

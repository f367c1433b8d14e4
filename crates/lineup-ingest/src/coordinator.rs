//! Batch coordinator
//!
//! Drives parse then upsert over every row of one file and folds the per-row
//! results into a [`BatchOutcome`]. A failing row is recorded and skipped;
//! nothing a single row does stops the batch.
//!
//! With `write_concurrency == 1` rows are parsed and written one at a time in
//! file order. With a higher value every row is parsed first, validated
//! records are grouped by [`ItemKey`] and the groups are written concurrently.
//! Rows inside a group keep file order, so the last row for a key is still the
//! one left in the store.
//!
//! The coordinator does no file or notification I/O.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{ItemKey, PerformanceRecord, RejectionReason};
use crate::outcome::{BatchOutcome, OutcomeRecorder, DEFAULT_MAX_REJECTIONS};
use crate::parser;
use crate::source::SourceRow;
use crate::upsert::{RetryPolicy, UpsertEngine};

/// Default number of key groups written at once
pub const DEFAULT_WRITE_CONCURRENCY: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub retry: RetryPolicy,
    /// Rejections kept with full detail in the outcome
    pub max_rejections: usize,
    /// Key groups written concurrently; 1 means strictly sequential
    pub write_concurrency: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_rejections: DEFAULT_MAX_REJECTIONS,
            write_concurrency: DEFAULT_WRITE_CONCURRENCY,
        }
    }
}

/// Validated records sharing one key, in file order
type KeyGroup = Vec<(usize, PerformanceRecord)>;

/// Per-row results of writing one key group
#[derive(Debug, Default)]
struct GroupResult {
    written: Vec<usize>,
    rejected: Vec<(usize, RejectionReason)>,
    unprocessed: usize,
}

#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    engine: UpsertEngine,
    config: CoordinatorConfig,
}

impl BatchCoordinator {
    pub fn new(engine: UpsertEngine, config: CoordinatorConfig) -> Self {
        Self { engine, config }
    }

    /// Process every row and classify the batch
    ///
    /// `cancel` is checked between rows. Once it fires no further writes are
    /// started; remaining rows are still parsed so malformed ones are reported,
    /// and the valid ones are counted as `unprocessed`.
    pub async fn run<I>(&self, rows: I, cancel: &CancellationToken) -> BatchOutcome
    where
        I: IntoIterator<Item = SourceRow>,
    {
        info!(
            write_concurrency = self.config.write_concurrency,
            max_attempts = self.config.retry.max_attempts,
            "Starting batch"
        );

        let mut recorder = OutcomeRecorder::new(self.config.max_rejections);
        let unprocessed = if self.config.write_concurrency > 1 {
            self.run_grouped(rows, cancel, &mut recorder).await
        } else {
            self.run_sequential(rows, cancel, &mut recorder).await
        };

        let interrupted = cancel.is_cancelled() && unprocessed > 0;
        let outcome = recorder.finish(interrupted, unprocessed);

        if interrupted {
            warn!(
                attempted = outcome.attempted,
                unprocessed, "Batch interrupted before all rows were written"
            );
        }
        info!(
            status = %outcome.status,
            attempted = outcome.attempted,
            succeeded = outcome.succeeded,
            rejected = outcome.rejected,
            "Batch finished"
        );

        outcome
    }

    async fn run_sequential<I>(
        &self,
        rows: I,
        cancel: &CancellationToken,
        recorder: &mut OutcomeRecorder,
    ) -> usize
    where
        I: IntoIterator<Item = SourceRow>,
    {
        let mut unprocessed = 0;

        for SourceRow { row_index, row } in rows {
            let record = match row.and_then(|raw| parser::parse(&raw)) {
                Ok(record) => record,
                Err(reason) => {
                    record_rejection(recorder, row_index, reason);
                    continue;
                },
            };

            if cancel.is_cancelled() {
                unprocessed += 1;
                continue;
            }

            match self
                .engine
                .upsert_with_retry(&record, &self.config.retry, cancel)
                .await
            {
                Ok(attempts) => {
                    debug!(row_index, key = %record.key(), attempts, "Row stored");
                    recorder.record_success();
                },
                Err(reason) => record_rejection(recorder, row_index, reason),
            }
        }

        unprocessed
    }

    async fn run_grouped<I>(
        &self,
        rows: I,
        cancel: &CancellationToken,
        recorder: &mut OutcomeRecorder,
    ) -> usize
    where
        I: IntoIterator<Item = SourceRow>,
    {
        let mut groups: Vec<KeyGroup> = Vec::new();
        let mut group_of: HashMap<ItemKey, usize> = HashMap::new();

        for SourceRow { row_index, row } in rows {
            match row.and_then(|raw| parser::parse(&raw)) {
                Ok(record) => {
                    let slot = *group_of.entry(record.key()).or_insert_with(|| {
                        groups.push(Vec::new());
                        groups.len() - 1
                    });
                    groups[slot].push((row_index, record));
                },
                Err(reason) => record_rejection(recorder, row_index, reason),
            }
        }

        debug!(groups = groups.len(), "Rows grouped by key");

        let engine = &self.engine;
        let policy = self.config.retry;
        let results: Vec<GroupResult> = stream::iter(groups)
            .map(|group| write_group(engine, group, policy, cancel))
            .buffer_unordered(self.config.write_concurrency)
            .collect()
            .await;

        let mut unprocessed = 0;
        for result in results {
            for _ in result.written {
                recorder.record_success();
            }
            for (row_index, reason) in result.rejected {
                record_rejection(recorder, row_index, reason);
            }
            unprocessed += result.unprocessed;
        }

        unprocessed
    }
}

async fn write_group(
    engine: &UpsertEngine,
    group: KeyGroup,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> GroupResult {
    let mut result = GroupResult::default();

    for (row_index, record) in group {
        if cancel.is_cancelled() {
            result.unprocessed += 1;
            continue;
        }

        match engine.upsert_with_retry(&record, &policy, cancel).await {
            Ok(attempts) => {
                debug!(row_index, key = %record.key(), attempts, "Row stored");
                result.written.push(row_index);
            },
            Err(reason) => result.rejected.push((row_index, reason)),
        }
    }

    result
}

fn record_rejection(recorder: &mut OutcomeRecorder, row_index: usize, reason: RejectionReason) {
    warn!(row_index, kind = reason.kind(), reason = %reason, "Row rejected");
    recorder.record_rejection(row_index, reason);
}

//! Batch summary types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Rejection, RejectionReason};

/// Default number of rejections kept with full detail
pub const DEFAULT_MAX_REJECTIONS: usize = 100;

/// Terminal classification of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    AllSucceeded,
    PartialFailure,
    TotalFailure,
}

impl BatchStatus {
    /// `AllSucceeded` with no rejections on a run that saw every row,
    /// `TotalFailure` when rows were attempted and none stored,
    /// `PartialFailure` otherwise
    pub fn classify(attempted: usize, succeeded: usize, rejected: usize, interrupted: bool) -> Self {
        if rejected == 0 && !interrupted {
            BatchStatus::AllSucceeded
        } else if succeeded == 0 && attempted > 0 {
            BatchStatus::TotalFailure
        } else {
            BatchStatus::PartialFailure
        }
    }

    /// Invocation status code reported to the trigger
    pub fn status_code(self) -> u16 {
        match self {
            BatchStatus::AllSucceeded => 200,
            BatchStatus::PartialFailure => 207,
            BatchStatus::TotalFailure => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::AllSucceeded => "all_succeeded",
            BatchStatus::PartialFailure => "partial_failure",
            BatchStatus::TotalFailure => "total_failure",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one coordinator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    /// Rows that reached a final outcome (stored or rejected)
    pub attempted: usize,
    pub succeeded: usize,
    pub rejected: usize,
    /// Rejected row count per [`RejectionReason::kind`]
    pub rejected_by_kind: BTreeMap<String, usize>,
    /// Lowest-indexed rejections, capped; `rejected` keeps the full count
    pub rejections: Vec<Rejection>,
    /// The run was cancelled before the source was exhausted
    pub interrupted: bool,
    /// Validated rows never written because the run was cancelled
    pub unprocessed: usize,
}

/// Accumulates per-row results while a run is in progress
#[derive(Debug)]
pub struct OutcomeRecorder {
    max_rejections: usize,
    succeeded: usize,
    rejected: usize,
    rejected_by_kind: BTreeMap<String, usize>,
    rejections: Vec<Rejection>,
}

impl OutcomeRecorder {
    pub fn new(max_rejections: usize) -> Self {
        Self {
            max_rejections,
            succeeded: 0,
            rejected: 0,
            rejected_by_kind: BTreeMap::new(),
            rejections: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_rejection(&mut self, row_index: usize, reason: RejectionReason) {
        self.rejected += 1;
        *self
            .rejected_by_kind
            .entry(reason.kind().to_string())
            .or_default() += 1;

        if self.max_rejections == 0 {
            return;
        }

        self.rejections.push(Rejection { row_index, reason });

        // Rows can arrive out of order from concurrent writers; compact lazily
        if self.rejections.len() >= self.max_rejections.saturating_mul(2) {
            self.compact();
        }
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.rejected
    }

    fn compact(&mut self) {
        self.rejections.sort_by_key(|r| r.row_index);
        self.rejections.truncate(self.max_rejections);
    }

    pub fn finish(mut self, interrupted: bool, unprocessed: usize) -> BatchOutcome {
        self.compact();
        let attempted = self.attempted();

        BatchOutcome {
            status: BatchStatus::classify(attempted, self.succeeded, self.rejected, interrupted),
            attempted,
            succeeded: self.succeeded,
            rejected: self.rejected,
            rejected_by_kind: self.rejected_by_kind,
            rejections: self.rejections,
            interrupted,
            unprocessed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(BatchStatus::classify(0, 0, 0, false), BatchStatus::AllSucceeded);
        assert_eq!(BatchStatus::classify(5, 5, 0, false), BatchStatus::AllSucceeded);
        assert_eq!(BatchStatus::classify(5, 3, 2, false), BatchStatus::PartialFailure);
        assert_eq!(BatchStatus::classify(5, 0, 5, false), BatchStatus::TotalFailure);
    }

    #[test]
    fn test_interrupted_run_is_never_all_succeeded() {
        assert_eq!(BatchStatus::classify(2, 2, 0, true), BatchStatus::PartialFailure);
        assert_eq!(BatchStatus::classify(0, 0, 0, true), BatchStatus::PartialFailure);
        assert_eq!(BatchStatus::classify(3, 0, 3, true), BatchStatus::TotalFailure);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BatchStatus::AllSucceeded.status_code(), 200);
        assert_eq!(BatchStatus::PartialFailure.status_code(), 207);
        assert_eq!(BatchStatus::TotalFailure.status_code(), 500);
    }

    #[test]
    fn test_recorder_counts_and_kinds() {
        let mut recorder = OutcomeRecorder::new(10);
        recorder.record_success();
        recorder.record_rejection(1, RejectionReason::missing("Performer"));
        recorder.record_rejection(2, RejectionReason::missing("Stage"));
        recorder.record_rejection(
            3,
            RejectionReason::StorageRejected {
                detail: "ValidationException".into(),
            },
        );

        let outcome = recorder.finish(false, 0);
        assert_eq!(outcome.attempted, 4);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.rejected, 3);
        assert_eq!(outcome.rejected_by_kind["missing_field"], 2);
        assert_eq!(outcome.rejected_by_kind["storage_rejected"], 1);
        assert_eq!(outcome.status, BatchStatus::PartialFailure);
        assert_eq!(outcome.rejections.len(), 3);
    }

    #[test]
    fn test_rejection_list_is_capped_to_lowest_rows() {
        let mut recorder = OutcomeRecorder::new(3);
        for row_index in (0..20).rev() {
            recorder.record_rejection(row_index, RejectionReason::missing("Date"));
        }

        let outcome = recorder.finish(false, 0);
        assert_eq!(outcome.rejected, 20);
        let rows: Vec<usize> = outcome.rejections.iter().map(|r| r.row_index).collect();
        assert_eq!(rows, vec![0, 1, 2]);
        assert_eq!(outcome.status, BatchStatus::TotalFailure);
    }

    #[test]
    fn test_interrupted_clean_run_reports_partial() {
        let mut recorder = OutcomeRecorder::new(10);
        recorder.record_success();

        let outcome = recorder.finish(true, 3);
        assert_eq!(outcome.status, BatchStatus::PartialFailure);
        assert_eq!(outcome.status.status_code(), 207);
        assert!(outcome.interrupted);
        assert_eq!(outcome.unprocessed, 3);
    }
}

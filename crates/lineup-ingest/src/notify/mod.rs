//! Outcome notifications
//!
//! Delivery is best-effort: a notifier error is logged and never changes the
//! result of the invocation.

use std::fmt::Write as _;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::outcome::{BatchOutcome, BatchStatus};
use crate::source::ObjectLocation;

pub mod log;
pub mod sns;

pub use self::log::LogNotifier;
pub use self::sns::SnsNotifier;

pub const SUBJECT_SUCCESS: &str = "CSV Processing Successful";
pub const SUBJECT_PARTIAL: &str = "CSV Processing Partially Successful";
pub const SUBJECT_FAILED: &str = "CSV Processing Failed";

/// Rejection reasons quoted in a message
pub const MAX_SAMPLE_REASONS: usize = 5;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, message: &str) -> anyhow::Result<()>;
}

/// A rendered subject and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub message: String,
}

impl Notification {
    /// Summary of a finished batch
    pub fn for_outcome(location: &ObjectLocation, outcome: &BatchOutcome) -> Self {
        let subject = match outcome.status {
            BatchStatus::AllSucceeded => SUBJECT_SUCCESS,
            BatchStatus::PartialFailure => SUBJECT_PARTIAL,
            BatchStatus::TotalFailure => SUBJECT_FAILED,
        };

        let mut message = if outcome.status == BatchStatus::AllSucceeded {
            format!(
                "File {} was successfully processed: {} row(s) uploaded to DynamoDB.",
                location.key, outcome.succeeded
            )
        } else {
            format!(
                "File {} was processed: {} of {} row(s) stored, {} rejected.",
                location.key, outcome.succeeded, outcome.attempted, outcome.rejected
            )
        };

        if outcome.interrupted {
            let _ = write!(
                message,
                "\nProcessing stopped before the time limit; {} valid row(s) were not written.",
                outcome.unprocessed
            );
        }

        if !outcome.rejections.is_empty() {
            message.push_str("\nSample rejections:");
            let shown = outcome.rejections.len().min(MAX_SAMPLE_REASONS);
            for rejection in &outcome.rejections[..shown] {
                let _ = write!(message, "\n  row {}: {}", rejection.row_index, rejection.reason);
            }
            let omitted = outcome.rejected.saturating_sub(shown);
            if omitted > 0 {
                let _ = write!(message, "\n  ... and {omitted} more");
            }
        }

        Self {
            subject: subject.to_string(),
            message,
        }
    }

    /// The file could not be read at all
    pub fn for_fatal(location: &ObjectLocation, cause: &str) -> Self {
        Self {
            subject: SUBJECT_FAILED.to_string(),
            message: format!("Error processing CSV file {}: {cause}", location.key),
        }
    }
}

/// Send `notification`, logging instead of failing when delivery fails
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: &Notification) {
    match notifier
        .notify(&notification.subject, &notification.message)
        .await
    {
        Ok(()) => info!(subject = %notification.subject, "Notification sent"),
        Err(e) => warn!(
            subject = %notification.subject,
            error = %format!("{e:#}"),
            "Failed to send notification"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::RejectionReason;
    use crate::outcome::OutcomeRecorder;
    use std::sync::Mutex;

    fn location() -> ObjectLocation {
        ObjectLocation::new("uploads", "lineup.csv")
    }

    #[test]
    fn test_success_message() {
        let mut recorder = OutcomeRecorder::new(10);
        recorder.record_success();
        recorder.record_success();

        let n = Notification::for_outcome(&location(), &recorder.finish(false, 0));
        assert_eq!(n.subject, SUBJECT_SUCCESS);
        assert_eq!(
            n.message,
            "File lineup.csv was successfully processed: 2 row(s) uploaded to DynamoDB."
        );
    }

    #[test]
    fn test_partial_message_quotes_at_most_five_reasons() {
        let mut recorder = OutcomeRecorder::new(100);
        recorder.record_success();
        for row_index in 1..=7 {
            recorder.record_rejection(row_index, RejectionReason::missing("Performer"));
        }

        let n = Notification::for_outcome(&location(), &recorder.finish(false, 0));
        assert_eq!(n.subject, SUBJECT_PARTIAL);
        assert!(n.message.starts_with("File lineup.csv was processed: 1 of 8 row(s) stored, 7 rejected."));
        assert_eq!(n.message.matches("  row ").count(), MAX_SAMPLE_REASONS);
        assert!(n.message.contains("row 1: missing value for column 'Performer'"));
        assert!(n.message.ends_with("... and 2 more"));
    }

    #[test]
    fn test_omitted_count_follows_the_kept_rejections() {
        let mut recorder = OutcomeRecorder::new(2);
        recorder.record_success();
        for row_index in 1..=4 {
            recorder.record_rejection(row_index, RejectionReason::missing("End"));
        }

        let n = Notification::for_outcome(&location(), &recorder.finish(false, 0));
        assert!(n.message.contains("1 of 5 row(s) stored, 4 rejected."));
        assert_eq!(n.message.matches("  row ").count(), 2);
        assert!(n.message.ends_with("... and 2 more"));
    }

    #[test]
    fn test_total_failure_subject() {
        let mut recorder = OutcomeRecorder::new(10);
        recorder.record_rejection(0, RejectionReason::missing("Stage"));

        let n = Notification::for_outcome(&location(), &recorder.finish(false, 0));
        assert_eq!(n.subject, SUBJECT_FAILED);
    }

    #[test]
    fn test_interrupted_clean_batch_is_partial() {
        let mut recorder = OutcomeRecorder::new(10);
        recorder.record_success();

        let n = Notification::for_outcome(&location(), &recorder.finish(true, 4));
        assert_eq!(n.subject, SUBJECT_PARTIAL);
        assert!(n.message.contains("4 valid row(s) were not written"));
    }

    #[test]
    fn test_fatal_message_names_cause() {
        let n = Notification::for_fatal(&location(), "object not found: s3://uploads/lineup.csv");
        assert_eq!(n.subject, SUBJECT_FAILED);
        assert_eq!(
            n.message,
            "Error processing CSV file lineup.csv: object not found: s3://uploads/lineup.csv"
        );
    }

    struct BrokenNotifier {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Notifier for BrokenNotifier {
        async fn notify(&self, _subject: &str, _message: &str) -> anyhow::Result<()> {
            *self.calls.lock().unwrap() += 1;
            anyhow::bail!("topic does not exist")
        }
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let notifier = BrokenNotifier {
            calls: Mutex::new(0),
        };
        notify_best_effort(&notifier, &Notification::for_fatal(&location(), "boom")).await;
        assert_eq!(*notifier.calls.lock().unwrap(), 1);
    }
}

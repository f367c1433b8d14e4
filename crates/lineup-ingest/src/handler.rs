//! Invocation handling: S3 event in, notification and status code out
//!
//! [`IngestContext`] owns the injected collaborators. Each object goes
//! through fetch, CSV decode and the coordinator; a failure to fetch or
//! decode the header is the single fatal path and produces a 500 without
//! attempting any row.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use aws_config::BehaviorVersion;
use aws_lambda_events::event::s3::S3Event;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::IngestConfig;
use crate::coordinator::{BatchCoordinator, CoordinatorConfig};
use crate::notify::{notify_best_effort, LogNotifier, Notification, Notifier, SnsNotifier};
use crate::outcome::{BatchOutcome, BatchStatus};
use crate::source::s3::decode_event_key;
use crate::source::{CsvRowSource, ObjectLocation, ObjectReader, S3ObjectReader, SourceError};
use crate::store::{DynamoPerformanceStore, PerformanceStore};
use crate::upsert::UpsertEngine;

/// Status code for a file that could not be read at all
pub const STATUS_FATAL: u16 = 500;

/// Fatal failure for one object
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Reply returned to the trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    /// JSON-encoded [`InvocationBody`]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationBody {
    pub objects: Vec<ObjectReport>,
}

/// Result for one object of an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReport {
    pub bucket: String,
    pub key: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<BatchOutcome>,
    /// Fatal cause when the object could not be processed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ObjectReport {
    fn completed(location: &ObjectLocation, outcome: BatchOutcome) -> Self {
        Self {
            bucket: location.bucket.clone(),
            key: location.key.clone(),
            status_code: outcome.status.status_code(),
            outcome: Some(outcome),
            error: None,
        }
    }

    fn fatal(location: &ObjectLocation, cause: String) -> Self {
        Self {
            bucket: location.bucket.clone(),
            key: location.key.clone(),
            status_code: STATUS_FATAL,
            outcome: None,
            error: Some(cause),
        }
    }
}

impl InvocationResponse {
    /// Combine per-object reports; the worst status code wins
    pub fn from_reports(objects: Vec<ObjectReport>) -> Self {
        let status_code = objects
            .iter()
            .map(|report| report.status_code)
            .max()
            .unwrap_or_else(|| BatchStatus::AllSucceeded.status_code());

        let body = InvocationBody { objects };
        let body = serde_json::to_string(&body)
            .unwrap_or_else(|e| format!("{{\"error\":\"failed to encode report: {e}\"}}"));

        Self { status_code, body }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == BatchStatus::AllSucceeded.status_code()
    }
}

/// Long-lived collaborators shared by every invocation
#[derive(Clone)]
pub struct IngestContext {
    reader: Arc<dyn ObjectReader>,
    coordinator: BatchCoordinator,
    notifier: Arc<dyn Notifier>,
}

impl IngestContext {
    pub fn new(
        reader: Arc<dyn ObjectReader>,
        store: Arc<dyn PerformanceStore>,
        notifier: Arc<dyn Notifier>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            reader,
            coordinator: BatchCoordinator::new(UpsertEngine::new(store), config),
            notifier,
        }
    }

    /// Build AWS-backed collaborators from configuration
    pub async fn from_config(config: &IngestConfig) -> anyhow::Result<Self> {
        config.validate().context("Invalid ingest configuration")?;
        let aws_config = load_aws_config(config).await;

        let reader = Arc::new(S3ObjectReader::new(&aws_config, config.s3_path_style));
        let store = Arc::new(DynamoPerformanceStore::new(&aws_config, &config.table));

        Ok(Self::new(
            reader,
            store,
            notifier_for(config, &aws_config),
            config.coordinator_config(),
        ))
    }

    /// Process every object named in an S3 event, one after another
    pub async fn handle_event(&self, event: S3Event, cancel: &CancellationToken) -> InvocationResponse {
        debug!(?event, "Received event");
        let locations = event_locations(&event);
        info!(record_count = event.records.len(), objects = locations.len(), "Processing S3 event");

        let mut reports = Vec::with_capacity(locations.len());
        for location in &locations {
            reports.push(self.process_object(location, cancel).await);
        }

        InvocationResponse::from_reports(reports)
    }

    /// Ingest one object and send its notification
    pub async fn process_object(
        &self,
        location: &ObjectLocation,
        cancel: &CancellationToken,
    ) -> ObjectReport {
        let span = tracing::info_span!("process_object", bucket = %location.bucket, key = %location.key);

        async {
            info!("Processing file");

            match self.ingest(location, cancel).await {
                Ok(outcome) => {
                    let notification = Notification::for_outcome(location, &outcome);
                    notify_best_effort(self.notifier.as_ref(), &notification).await;
                    ObjectReport::completed(location, outcome)
                },
                Err(e) => {
                    error!(error = %e, "Error processing file");
                    let cause = e.to_string();
                    let notification = Notification::for_fatal(location, &cause);
                    notify_best_effort(self.notifier.as_ref(), &notification).await;
                    ObjectReport::fatal(location, cause)
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn ingest(
        &self,
        location: &ObjectLocation,
        cancel: &CancellationToken,
    ) -> Result<BatchOutcome, IngestError> {
        let bytes = self.reader.fetch(location).await?;
        let rows = CsvRowSource::from_bytes(bytes)?;

        let missing = rows.missing_columns();
        if !missing.is_empty() {
            warn!(?missing, headers = ?rows.headers(), "Header lacks required columns");
        }

        Ok(self.coordinator.run(rows, cancel).await)
    }
}

impl std::fmt::Debug for IngestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestContext")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

/// Shared AWS configuration with the optional endpoint override applied
pub async fn load_aws_config(config: &IngestConfig) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    loader.load().await
}

/// SNS when a topic is configured, the log otherwise
pub fn notifier_for(config: &IngestConfig, aws_config: &aws_config::SdkConfig) -> Arc<dyn Notifier> {
    match &config.sns_topic {
        Some(topic) => Arc::new(SnsNotifier::new(aws_config, topic)),
        None => {
            warn!("SNS_TOPIC is not set; notifications will only be logged");
            Arc::new(LogNotifier)
        },
    }
}

/// Object locations of every usable record, keys URL-decoded
pub fn event_locations(event: &S3Event) -> Vec<ObjectLocation> {
    event
        .records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            match (&record.s3.bucket.name, &record.s3.object.key) {
                (Some(bucket), Some(key)) if !bucket.is_empty() && !key.is_empty() => {
                    Some(ObjectLocation::new(bucket.clone(), decode_event_key(key)))
                },
                _ => {
                    warn!(record = index, "S3 record without bucket or key, skipping");
                    None
                },
            }
        })
        .collect()
}

/// Time left until a deadline given in milliseconds since the Unix epoch
pub fn remaining_until(deadline_epoch_ms: u64) -> Duration {
    let deadline = UNIX_EPOCH + Duration::from_millis(deadline_epoch_ms);
    deadline
        .duration_since(SystemTime::now())
        .unwrap_or(Duration::ZERO)
}

/// Cancels a token once `remaining - margin` has elapsed
///
/// Dropping the guard stops the timer without cancelling.
#[derive(Debug)]
pub struct DeadlineGuard {
    timer: JoinHandle<()>,
}

impl DeadlineGuard {
    pub fn start(cancel: CancellationToken, remaining: Duration, margin: Duration) -> Self {
        let budget = remaining.saturating_sub(margin);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(budget).await;
            warn!(
                budget_ms = budget.as_millis() as u64,
                margin_ms = margin.as_millis() as u64,
                "Approaching invocation deadline, stopping new writes"
            );
            cancel.cancel();
        });

        Self { timer }
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

/// Load configuration from the environment and build AWS-backed collaborators
pub async fn context_from_env() -> anyhow::Result<(IngestConfig, IngestContext)> {
    let config = IngestConfig::from_env().context("Failed to load configuration")?;
    let context = IngestContext::from_config(&config)
        .await
        .with_context(|| format!("Failed to initialize clients for table {}", config.table))?;
    Ok((config, context))
}

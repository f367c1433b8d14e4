//! Ingestion configuration

use std::str::FromStr;
use std::time::Duration;

use lineup_common::{LineupError, Result};

use crate::coordinator::{CoordinatorConfig, DEFAULT_WRITE_CONCURRENCY};
use crate::outcome::DEFAULT_MAX_REJECTIONS;
use crate::upsert::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

// ============================================================================
// Defaults
// ============================================================================

/// Default destination table.
pub const DEFAULT_TABLE: &str = "Performances";
/// Default first backoff delay in milliseconds.
pub const DEFAULT_RETRY_BASE_MS: u64 = 200;
/// Default backoff cap in milliseconds.
pub const DEFAULT_RETRY_MAX_MS: u64 = 5_000;
/// Default time reserved before the invocation deadline, in milliseconds.
pub const DEFAULT_DEADLINE_MARGIN_MS: u64 = 5_000;

pub const ENV_TABLE: &str = "DYNAMO_TABLE";
pub const ENV_SNS_TOPIC: &str = "SNS_TOPIC";
pub const ENV_MAX_ATTEMPTS: &str = "LINEUP_MAX_ATTEMPTS";
pub const ENV_RETRY_BASE_MS: &str = "LINEUP_RETRY_BASE_MS";
pub const ENV_RETRY_MAX_MS: &str = "LINEUP_RETRY_MAX_MS";
pub const ENV_WRITE_CONCURRENCY: &str = "LINEUP_WRITE_CONCURRENCY";
pub const ENV_MAX_REJECTIONS: &str = "LINEUP_MAX_REJECTIONS";
pub const ENV_DEADLINE_MARGIN_MS: &str = "LINEUP_DEADLINE_MARGIN_MS";
pub const ENV_S3_PATH_STYLE: &str = "LINEUP_S3_PATH_STYLE";
pub const ENV_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";

/// Runtime configuration for one ingestion process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub table: String,
    /// Topic ARN; `None` logs notifications instead of publishing
    pub sns_topic: Option<String>,
    pub retry: RetryPolicy,
    pub write_concurrency: usize,
    pub max_rejections: usize,
    /// Stop starting writes once less than this remains before the deadline
    pub deadline_margin: Duration,
    /// Endpoint override for all AWS clients (localstack)
    pub endpoint_url: Option<String>,
    pub s3_path_style: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            sns_topic: None,
            retry: RetryPolicy::default(),
            write_concurrency: DEFAULT_WRITE_CONCURRENCY,
            max_rejections: DEFAULT_MAX_REJECTIONS,
            deadline_margin: Duration::from_millis(DEFAULT_DEADLINE_MARGIN_MS),
            endpoint_url: None,
            s3_path_style: false,
        }
    }
}

impl IngestConfig {
    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source; unset or blank variables take
    /// their default
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Self {
            table: var(ENV_TABLE).unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            sns_topic: var(ENV_SNS_TOPIC),
            retry: RetryPolicy {
                max_attempts: parse_var(var(ENV_MAX_ATTEMPTS), ENV_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS)?,
                base_delay: Duration::from_millis(parse_var(
                    var(ENV_RETRY_BASE_MS),
                    ENV_RETRY_BASE_MS,
                    DEFAULT_RETRY_BASE_MS,
                )?),
                max_delay: Duration::from_millis(parse_var(
                    var(ENV_RETRY_MAX_MS),
                    ENV_RETRY_MAX_MS,
                    DEFAULT_RETRY_MAX_MS,
                )?),
            },
            write_concurrency: parse_var(
                var(ENV_WRITE_CONCURRENCY),
                ENV_WRITE_CONCURRENCY,
                DEFAULT_WRITE_CONCURRENCY,
            )?,
            max_rejections: parse_var(
                var(ENV_MAX_REJECTIONS),
                ENV_MAX_REJECTIONS,
                DEFAULT_MAX_REJECTIONS,
            )?,
            deadline_margin: Duration::from_millis(parse_var(
                var(ENV_DEADLINE_MARGIN_MS),
                ENV_DEADLINE_MARGIN_MS,
                DEFAULT_DEADLINE_MARGIN_MS,
            )?),
            endpoint_url: var(ENV_ENDPOINT_URL),
            s3_path_style: parse_var(var(ENV_S3_PATH_STYLE), ENV_S3_PATH_STYLE, false)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(LineupError::Config("Table name cannot be empty".into()));
        }

        if self.retry.max_attempts == 0 {
            return Err(LineupError::Config(
                "Max attempts must be greater than 0".into(),
            ));
        }

        if self.write_concurrency == 0 {
            return Err(LineupError::Config(
                "Write concurrency must be greater than 0".into(),
            ));
        }

        if self.retry.base_delay > self.retry.max_delay {
            return Err(LineupError::Config(format!(
                "Retry base delay ({:?}) cannot be greater than max delay ({:?})",
                self.retry.base_delay, self.retry.max_delay
            )));
        }

        Ok(())
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            retry: self.retry,
            max_rejections: self.max_rejections,
            write_concurrency: self.write_concurrency,
        }
    }
}

fn parse_var<T: FromStr>(value: Option<String>, name: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| LineupError::invalid_env(name, &raw, std::any::type_name::<T>())),
    }
}

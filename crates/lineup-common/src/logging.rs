//! Logging Configuration and Initialization
//!
//! Both binaries log through `tracing`. The Lambda entrypoint writes JSON lines
//! to stderr (CloudWatch picks them up as-is), the CLI writes human-readable
//! text to stderr or to a daily rolling file, keeping stdout for its report.
//!
//! Use structured fields rather than interpolated strings where the value is
//! something an operator would filter on:
//!
//! ```rust,ignore
//! warn!(row_index, reason = %reason, "Row rejected");
//! info!(bucket = %location.bucket, key = %location.key, "Fetching object");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lineup_common::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::for_cli("lineup-ingest").with_env_overrides().unwrap();
//! let _guard = init_logging(&config).unwrap();
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::error::{LineupError, Result};

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = LineupError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(LineupError::invalid_env("LOG_LEVEL", s, "log level")),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = LineupError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(LineupError::invalid_env("LOG_FORMAT", s, "log format")),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard error, leaving stdout for command output
    #[default]
    Console,
    /// Daily rolling file under [`LogConfig::log_dir`]
    File,
}

impl std::str::FromStr for LogOutput {
    type Err = LineupError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stderr" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            _ => Err(LineupError::invalid_env("LOG_OUTPUT", s, "log output")),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,

    /// Directory for log files (only used with [`LogOutput::File`])
    pub log_dir: PathBuf,

    /// Log file name prefix, e.g. "lineup-ingest" -> "lineup-ingest.2024-01-18"
    pub log_file_prefix: String,

    /// Additional filter directives, e.g. "aws_smithy_runtime=warn,lineup_ingest=debug"
    pub filter_directives: Option<String>,

    /// Colourise console output
    pub ansi: bool,

    /// Include target module names in log lines
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            output: LogOutput::Console,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "lineup".to_string(),
            filter_directives: None,
            ansi: true,
            include_targets: true,
        }
    }
}

impl LogConfig {
    /// Defaults for interactive command-line use
    pub fn for_cli(prefix: impl Into<String>) -> Self {
        Self {
            log_file_prefix: prefix.into(),
            filter_directives: Some(AWS_SDK_QUIET.to_string()),
            ..Self::default()
        }
    }

    /// Defaults for the Lambda runtime: JSON to stderr, no colour codes
    pub fn for_lambda() -> Self {
        Self {
            format: LogFormat::Json,
            ansi: false,
            include_targets: false,
            filter_directives: Some(AWS_SDK_QUIET.to_string()),
            ..Self::default()
        }
    }

    /// Apply environment variable overrides on top of `self`
    ///
    /// Environment variables:
    /// - `LOG_LEVEL`: trace, debug, info, warn, error
    /// - `LOG_FORMAT`: text, json
    /// - `LOG_OUTPUT`: console, file
    /// - `LOG_DIR`: directory for log files
    /// - `LOG_FILTER`: additional filter directives (appended)
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.level = level.parse()?;
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.format = format.parse()?;
        }

        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.output = output.parse()?;
        }

        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }

        if let Ok(filter) = std::env::var("LOG_FILTER") {
            self.filter_directives = Some(match self.filter_directives.take() {
                Some(existing) => format!("{existing},{filter}"),
                None => filter,
            });
        }

        Ok(self)
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }
}

/// The SDK logs every request at debug; keep it at warn unless asked
const AWS_SDK_QUIET: &str = "aws_smithy_runtime=warn,aws_config=warn,hyper=warn";

/// Keeps the background file writer alive; drop it last in `main`
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

fn build_filter(config: &LogConfig) -> Result<EnvFilter> {
    let mut filter =
        EnvFilter::from_default_env().add_directive(config.level.to_tracing_level().into());

    if let Some(ref directives) = config.filter_directives {
        for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
            let parsed = directive.trim().parse().map_err(|e| {
                LineupError::Config(format!("invalid log filter directive {directive:?}: {e}"))
            })?;
            filter = filter.add_directive(parsed);
        }
    }

    Ok(filter)
}

/// Install the global tracing subscriber
///
/// Call once at startup. A second call fails with [`LineupError::Logging`].
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let filter = build_filter(config)?;

    let (writer, file_guard) = match config.output {
        LogOutput::Console => (BoxMakeWriter::new(std::io::stderr), None),
        LogOutput::File => {
            std::fs::create_dir_all(&config.log_dir)?;
            let appender =
                tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        },
    };

    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(config.include_targets)
        .with_ansi(config.ansi && config.output == LogOutput::Console);

    let installed = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init(),
    };
    installed.map_err(|e| LineupError::Logging(e.to_string()))?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_format_and_output_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("stderr".parse::<LogOutput>().unwrap(), LogOutput::Console);
        assert_eq!("file".parse::<LogOutput>().unwrap(), LogOutput::File);
        assert!("syslog".parse::<LogOutput>().is_err());
    }

    #[test]
    fn test_lambda_defaults() {
        let config = LogConfig::for_lambda();
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.ansi);
        assert_eq!(config.output, LogOutput::Console);
    }

    #[test]
    fn test_filter_rejects_bad_directive() {
        let config = LogConfig {
            filter_directives: Some("lineup_ingest=notalevel".to_string()),
            ..LogConfig::default()
        };
        assert!(matches!(build_filter(&config), Err(LineupError::Config(_))));
    }

    #[test]
    fn test_filter_accepts_cli_defaults() {
        let config = LogConfig::for_cli("lineup-ingest").with_level(LogLevel::Debug);
        assert!(build_filter(&config).is_ok());
        assert_eq!(config.log_file_prefix, "lineup-ingest");
    }
}

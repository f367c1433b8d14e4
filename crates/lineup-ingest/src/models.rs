//! Performance schedule data models

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CSV column holding the stage name (partition key)
pub const COLUMN_STAGE: &str = "Stage";
/// CSV column holding the performance date (`YYYY-MM-DD`)
pub const COLUMN_DATE: &str = "Date";
/// CSV column holding the start time of day
pub const COLUMN_START: &str = "Start";
/// CSV column holding the performer name
pub const COLUMN_PERFORMER: &str = "Performer";
/// CSV column holding the end time of day
pub const COLUMN_END: &str = "End";

/// Columns every row must carry, in the order they are validated
pub const REQUIRED_COLUMNS: [&str; 5] = [
    COLUMN_STAGE,
    COLUMN_DATE,
    COLUMN_START,
    COLUMN_PERFORMER,
    COLUMN_END,
];

/// Separator between date and start time in the sort key
pub const SORT_KEY_SEPARATOR: char = '#';

/// One CSV data line as column name -> raw value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }

    /// Raw value for `column`, if the column was present
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RawRow
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Identity of a stored performance: `(stage, date#start)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub stage: String,
    pub date_start: String,
}

impl ItemKey {
    pub fn new(stage: impl Into<String>, date_start: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            date_start: date_start.into(),
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.stage, self.date_start)
    }
}

/// A validated schedule entry, ready to be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub stage: String,
    /// `"{date}#{start}"`
    pub date_start: String,
    pub performer: String,
    pub end: String,
}

impl PerformanceRecord {
    pub fn new(
        stage: impl Into<String>,
        date: &str,
        start: &str,
        performer: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            date_start: compose_date_start(date, start),
            performer: performer.into(),
            end: end.into(),
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.stage.clone(), self.date_start.clone())
    }

    /// Date half of the sort key
    pub fn date(&self) -> &str {
        self.date_start
            .split_once(SORT_KEY_SEPARATOR)
            .map_or(self.date_start.as_str(), |(date, _)| date)
    }

    /// Start-time half of the sort key
    pub fn start(&self) -> &str {
        self.date_start
            .split_once(SORT_KEY_SEPARATOR)
            .map_or("", |(_, start)| start)
    }
}

/// Build the sort key value from its two components
pub fn compose_date_start(date: &str, start: &str) -> String {
    format!("{date}{SORT_KEY_SEPARATOR}{start}")
}

/// Why a single row was not stored
///
/// Every variant is per-row: the row is skipped and the batch carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("missing value for column '{column}'")]
    MissingField { column: String },

    #[error("column '{column}' has malformed value {value:?}: expected {expected}")]
    MalformedValue {
        column: String,
        value: String,
        expected: String,
    },

    #[error("row could not be decoded: {detail}")]
    UnreadableRow { detail: String },

    #[error("storage unavailable after {attempts} attempt(s): {detail}")]
    StorageUnavailable { attempts: u32, detail: String },

    #[error("storage rejected the write: {detail}")]
    StorageRejected { detail: String },
}

impl RejectionReason {
    pub fn missing(column: &str) -> Self {
        RejectionReason::MissingField {
            column: column.to_string(),
        }
    }

    pub fn malformed(column: &str, value: &str, expected: impl Into<String>) -> Self {
        RejectionReason::MalformedValue {
            column: column.to_string(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Short stable label, used for grouping in summaries
    pub fn kind(&self) -> &'static str {
        match self {
            RejectionReason::MissingField { .. } => "missing_field",
            RejectionReason::MalformedValue { .. } => "malformed_value",
            RejectionReason::UnreadableRow { .. } => "unreadable_row",
            RejectionReason::StorageUnavailable { .. } => "storage_unavailable",
            RejectionReason::StorageRejected { .. } => "storage_rejected",
        }
    }
}

/// A rejected row and the reason it was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Zero-based index among data rows (header excluded)
    pub row_index: usize,
    pub reason: RejectionReason,
}

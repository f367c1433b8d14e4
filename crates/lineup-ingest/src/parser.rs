//! Row validation
//!
//! Turns a [`RawRow`] into a [`PerformanceRecord`] or says why it cannot be
//! stored. Values are trimmed; the trimmed text is what gets stored.
//!
//! # Accepted formats
//! - `Date`: `YYYY-MM-DD`
//! - `Start` / `End`: `HH:MM` or `HH:MM:SS`, 24-hour clock
//!
//! `End` must be strictly after `Start`. Sets that cross midnight must be
//! split into two rows.

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::models::{
    PerformanceRecord, RawRow, RejectionReason, COLUMN_DATE, COLUMN_END, COLUMN_PERFORMER,
    COLUMN_STAGE, COLUMN_START,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_EXPECTED: &str = "a calendar date formatted YYYY-MM-DD";
const TIME_EXPECTED: &str = "a time of day formatted HH:MM or HH:MM:SS";

/// Validate one row
pub fn parse(row: &RawRow) -> Result<PerformanceRecord, RejectionReason> {
    let stage = required(row, COLUMN_STAGE)?;
    let date = required(row, COLUMN_DATE)?;
    let start = required(row, COLUMN_START)?;
    let performer = required(row, COLUMN_PERFORMER)?;
    let end = required(row, COLUMN_END)?;

    parse_date(date)?;
    let start_time = parse_time(COLUMN_START, start)?;
    let end_time = parse_time(COLUMN_END, end)?;

    if end_time <= start_time {
        return Err(RejectionReason::malformed(
            COLUMN_END,
            end,
            format!("a time after Start ({start})"),
        ));
    }

    Ok(PerformanceRecord::new(stage, date, start, performer, end))
}

/// Trimmed, non-empty value of `column`
fn required<'a>(row: &'a RawRow, column: &str) -> Result<&'a str, RejectionReason> {
    match row.get(column).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(RejectionReason::missing(column)),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, RejectionReason> {
    // chrono accepts single-digit months and days; the sort key needs fixed width
    if value.len() != 10 {
        return Err(RejectionReason::malformed(COLUMN_DATE, value, DATE_EXPECTED));
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| RejectionReason::malformed(COLUMN_DATE, value, DATE_EXPECTED))
}

fn parse_time(column: &str, value: &str) -> Result<NaiveTime, RejectionReason> {
    let format = match value.len() {
        5 => "%H:%M",
        8 => "%H:%M:%S",
        _ => return Err(RejectionReason::malformed(column, value, TIME_EXPECTED)),
    };
    let time = NaiveTime::parse_from_str(value, format)
        .map_err(|_| RejectionReason::malformed(column, value, TIME_EXPECTED))?;

    // chrono represents a leap second (`:60`) as an overflowing nanosecond field
    if time.nanosecond() >= 1_000_000_000 {
        return Err(RejectionReason::malformed(column, value, TIME_EXPECTED));
    }
    Ok(time)
}

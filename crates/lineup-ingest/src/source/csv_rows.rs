//! Single-pass CSV row source
//!
//! Reads a header line and then yields one [`SourceRow`] per data line.
//! Records are flexible: a short line yields a row without the trailing
//! columns (which the parser reports as missing), extra trailing fields are
//! dropped. A line that cannot be decoded becomes an
//! [`RejectionReason::UnreadableRow`] instead of ending the iteration.

use std::collections::HashMap;
use std::io::Cursor;

use csv::{ReaderBuilder, StringRecordsIntoIter, Trim};

use super::SourceError;
use crate::models::{RawRow, RejectionReason, REQUIRED_COLUMNS};

/// One data line in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// Zero-based index among data rows
    pub row_index: usize,
    pub row: Result<RawRow, RejectionReason>,
}

pub struct CsvRowSource {
    headers: Vec<String>,
    records: StringRecordsIntoIter<Cursor<Vec<u8>>>,
    next_index: usize,
}

impl CsvRowSource {
    /// Decode the header of an in-memory CSV document
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SourceError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(Cursor::new(bytes));

        let headers = reader
            .headers()
            .map_err(|e| SourceError::InvalidHeader(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        Ok(Self {
            headers,
            records: reader.into_records(),
            next_index: 0,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Required columns the header does not declare
    pub fn missing_columns(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .into_iter()
            .filter(|column| !self.headers.iter().any(|h| h.as_str() == *column))
            .collect()
    }
}

impl Iterator for CsvRowSource {
    type Item = SourceRow;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        let row_index = self.next_index;
        self.next_index += 1;

        let row = match record {
            Ok(record) => {
                let fields: HashMap<String, String> = self
                    .headers
                    .iter()
                    .zip(record.iter())
                    .map(|(header, value)| (header.clone(), value.to_string()))
                    .collect();
                Ok(RawRow::new(fields))
            },
            Err(e) => Err(RejectionReason::UnreadableRow {
                detail: e.to_string(),
            }),
        };

        Some(SourceRow { row_index, row })
    }
}

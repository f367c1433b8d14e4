//! Lineup Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads performance schedules from CSV files into a key-value table.
//!
//! Each data row becomes one item keyed by `(stage, date#start)`. A row that
//! fails validation or storage is rejected on its own; every other row is
//! still written, and the file is classified as fully successful, partially
//! successful or failed.
//!
//! # Pipeline
//!
//! - [`source`]: fetch the object and decode CSV rows
//! - [`parser`]: validate a row into a [`models::PerformanceRecord`]
//! - [`upsert`]: write a record with bounded retries
//! - [`coordinator`]: drive the file and build the [`outcome::BatchOutcome`]
//! - [`notify`]: tell someone how it went
//! - [`handler`]: S3 event entrypoint wiring all of the above
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use lineup_ingest::coordinator::CoordinatorConfig;
//! use lineup_ingest::handler::IngestContext;
//! use lineup_ingest::notify::LogNotifier;
//! use lineup_ingest::source::{LocalFileReader, ObjectLocation};
//! use lineup_ingest::store::MemoryPerformanceStore;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let context = IngestContext::new(
//!         Arc::new(LocalFileReader::new(".")),
//!         Arc::new(MemoryPerformanceStore::new()),
//!         Arc::new(LogNotifier),
//!         CoordinatorConfig::default(),
//!     );
//!
//!     let report = context
//!         .process_object(&ObjectLocation::new("", "lineup.csv"), &CancellationToken::new())
//!         .await;
//!     println!("{}", report.status_code);
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod handler;
pub mod models;
pub mod notify;
pub mod outcome;
pub mod parser;
pub mod source;
pub mod store;
pub mod upsert;

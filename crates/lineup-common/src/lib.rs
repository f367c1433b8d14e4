//! Lineup Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the Lineup workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`LineupError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup for the CLI and the Lambda entrypoint
//!
//! # Example
//!
//! ```no_run
//! use lineup_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> lineup_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{LineupError, Result};

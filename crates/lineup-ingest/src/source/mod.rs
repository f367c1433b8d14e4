//! Object acquisition and CSV row decoding
//!
//! Fetching the object is the only fatal step of an invocation: if the bytes
//! cannot be read, no row is attempted. Once the header is decoded every
//! problem is per-row.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod csv_rows;
pub mod local;
pub mod s3;

pub use csv_rows::{CsvRowSource, SourceRow};
pub use local::LocalFileReader;
pub use s3::S3ObjectReader;

/// Bucket and key of an uploaded object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Fatal failure to obtain the rows of a file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectLocation),

    #[error("access denied to {0}")]
    AccessDenied(ObjectLocation),

    #[error("failed to read {location}: {detail}")]
    Read {
        location: ObjectLocation,
        detail: String,
    },

    #[error("CSV header could not be read: {0}")]
    InvalidHeader(String),
}

/// Fetches the full contents of an object
#[async_trait]
pub trait ObjectReader: Send + Sync {
    async fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>, SourceError>;
}

//! Filesystem object reader for local runs
//!
//! The bucket maps to a directory under `root` and the key to a relative
//! path inside it. The CLI uses an empty bucket so the key is a path
//! relative to `root`.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{ObjectLocation, ObjectReader, SourceError};

#[derive(Debug, Clone)]
pub struct LocalFileReader {
    root: PathBuf,
}

impl LocalFileReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, location: &ObjectLocation) -> PathBuf {
        self.root.join(&location.bucket).join(&location.key)
    }
}

#[async_trait]
impl ObjectReader for LocalFileReader {
    #[instrument(skip(self), fields(bucket = %location.bucket, key = %location.key))]
    async fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>, SourceError> {
        let path = self.path_for(location);
        debug!(path = %path.display(), "Reading local file");

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::ObjectNotFound(location.clone()),
            ErrorKind::PermissionDenied => SourceError::AccessDenied(location.clone()),
            _ => SourceError::Read {
                location: location.clone(),
                detail: format!("{}: {e}", path.display()),
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_file_under_bucket_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("uploads")).unwrap();
        std::fs::write(dir.path().join("uploads/lineup.csv"), b"Stage\nA\n").unwrap();

        let reader = LocalFileReader::new(dir.path());
        let bytes = reader
            .fetch(&ObjectLocation::new("uploads", "lineup.csv"))
            .await
            .unwrap();

        assert_eq!(bytes, b"Stage\nA\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_object_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let reader = LocalFileReader::new(dir.path());
        let location = ObjectLocation::new("", "absent.csv");

        let err = reader.fetch(&location).await.unwrap_err();
        assert_eq!(err, SourceError::ObjectNotFound(location));
    }

    #[tokio::test]
    async fn test_directory_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let reader = LocalFileReader::new(dir.path());

        let err = reader
            .fetch(&ObjectLocation::new("", "nested"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }
}

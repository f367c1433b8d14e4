//! S3 object reader

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client;
use tracing::{debug, info, instrument, warn};

use super::{ObjectLocation, ObjectReader, SourceError};

#[derive(Debug, Clone)]
pub struct S3ObjectReader {
    client: Client,
}

impl S3ObjectReader {
    /// Build a client from shared AWS config; `path_style` is needed for
    /// localstack/MinIO endpoints
    pub fn new(aws_config: &SdkConfig, path_style: bool) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(aws_config)
            .force_path_style(path_style)
            .build();

        Self::from_client(Client::from_conf(s3_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectReader for S3ObjectReader {
    #[instrument(skip(self), fields(bucket = %location.bucket, key = %location.key))]
    async fn fetch(&self, location: &ObjectLocation) -> Result<Vec<u8>, SourceError> {
        debug!("Downloading object");

        let response = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| classify_get_error(location, e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| SourceError::Read {
                location: location.clone(),
                detail: e.to_string(),
            })?
            .into_bytes()
            .to_vec();

        info!(size = data.len(), "Downloaded object");
        Ok(data)
    }
}

fn classify_get_error(location: &ObjectLocation, err: SdkError<GetObjectError>) -> SourceError {
    if let SdkError::ServiceError(service) = &err {
        let status = service.raw().status().as_u16();
        let code = service.err().code();

        if service.err().is_no_such_key() || status == 404 || code == Some("NotFound") {
            return SourceError::ObjectNotFound(location.clone());
        }
        if status == 403 || code == Some("AccessDenied") {
            return SourceError::AccessDenied(location.clone());
        }
    }

    SourceError::Read {
        location: location.clone(),
        detail: DisplayErrorContext(&err).to_string(),
    }
}

/// Decode an object key as delivered in S3 event notifications
///
/// Keys arrive form-encoded: `+` stands for a space and other reserved
/// characters are percent-escaped. A key that does not decode to UTF-8 is
/// used as delivered.
pub fn decode_event_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            warn!(key = raw, error = %e, "Object key is not valid percent-encoded UTF-8");
            raw.to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_event_key() {
        assert_eq!(decode_event_key("lineup.csv"), "lineup.csv");
        assert_eq!(decode_event_key("day+one/main+stage.csv"), "day one/main stage.csv");
        assert_eq!(decode_event_key("caf%C3%A9%2Bbar.csv"), "café+bar.csv");
    }

    #[test]
    fn test_undecodable_key_is_kept() {
        assert_eq!(decode_event_key("bad%FF.csv"), "bad%FF.csv");
    }
}

//! DynamoDB-backed performance table

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use tracing::{debug, instrument};

use super::{PerformanceStore, StorageError};
use crate::models::{ItemKey, PerformanceRecord};

/// Partition key attribute
pub const ATTR_STAGE: &str = "stage";
/// Sort key attribute
pub const ATTR_DATE_START: &str = "date#start";
pub const ATTR_PERFORMER: &str = "performer";
pub const ATTR_END: &str = "end";

/// Service error codes worth retrying
const TRANSIENT_ERROR_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "ThrottlingException",
    "InternalServerError",
    "ServiceUnavailable",
    "TransactionConflictException",
];

#[derive(Debug, Clone)]
pub struct DynamoPerformanceStore {
    client: Client,
    table: String,
}

impl DynamoPerformanceStore {
    pub fn new(aws_config: &SdkConfig, table: impl Into<String>) -> Self {
        Self::from_client(Client::new(aws_config), table)
    }

    pub fn from_client(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl PerformanceStore for DynamoPerformanceStore {
    #[instrument(skip(self, record), fields(table = %self.table, key = %record.key()))]
    async fn put(&self, record: &PerformanceRecord) -> Result<(), StorageError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(to_item(record)))
            .send()
            .await
            .map_err(classify_sdk_error)?;

        debug!("Item written");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn get(&self, key: &ItemKey) -> Result<Option<PerformanceRecord>, StorageError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(ATTR_STAGE, AttributeValue::S(key.stage.clone()))
            .key(ATTR_DATE_START, AttributeValue::S(key.date_start.clone()))
            .consistent_read(true)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        output.item().map(from_item).transpose()
    }
}

/// Full attribute set for one record
pub fn to_item(record: &PerformanceRecord) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (ATTR_STAGE.to_string(), AttributeValue::S(record.stage.clone())),
        (
            ATTR_DATE_START.to_string(),
            AttributeValue::S(record.date_start.clone()),
        ),
        (
            ATTR_PERFORMER.to_string(),
            AttributeValue::S(record.performer.clone()),
        ),
        (ATTR_END.to_string(), AttributeValue::S(record.end.clone())),
    ])
}

/// Rebuild a record from a stored item
pub fn from_item(item: &HashMap<String, AttributeValue>) -> Result<PerformanceRecord, StorageError> {
    Ok(PerformanceRecord {
        stage: string_attr(item, ATTR_STAGE)?,
        date_start: string_attr(item, ATTR_DATE_START)?,
        performer: string_attr(item, ATTR_PERFORMER)?,
        end: string_attr(item, ATTR_END)?,
    })
}

fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Result<String, StorageError> {
    match item.get(name) {
        Some(AttributeValue::S(value)) => Ok(value.clone()),
        Some(_) => Err(StorageError::Rejected(format!(
            "stored attribute '{name}' is not a string"
        ))),
        None => Err(StorageError::Rejected(format!(
            "stored item is missing attribute '{name}'"
        ))),
    }
}

/// Split SDK failures into retryable and permanent
fn classify_sdk_error<E>(err: SdkError<E>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();

    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StorageError::Unavailable(detail)
        },
        SdkError::ServiceError(service) => {
            let transient_code = service
                .err()
                .code()
                .is_some_and(|code| TRANSIENT_ERROR_CODES.contains(&code));

            if transient_code || service.raw().status().is_server_error() {
                StorageError::Unavailable(detail)
            } else {
                StorageError::Rejected(detail)
            }
        },
        _ => StorageError::Rejected(detail),
    }
}

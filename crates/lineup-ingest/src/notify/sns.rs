use anyhow::Context;
use async_trait::async_trait;
use aws_config::SdkConfig;
use tracing::instrument;

use super::Notifier;

/// Publishes to one SNS topic
#[derive(Clone, Debug)]
pub struct SnsNotifier {
    client: aws_sdk_sns::Client,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(aws_config: &SdkConfig, topic_arn: impl Into<String>) -> Self {
        Self::from_client(aws_sdk_sns::Client::new(aws_config), topic_arn)
    }

    pub fn from_client(client: aws_sdk_sns::Client, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    #[instrument(skip(self, message), fields(topic = %self.topic_arn))]
    async fn notify(&self, subject: &str, message: &str) -> anyhow::Result<()> {
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .with_context(|| format!("Failed to publish to {}", self.topic_arn))?;

        Ok(())
    }
}

use async_trait::async_trait;
use tracing::info;

use super::Notifier;

/// Writes notifications to the log; used when no topic is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, message: &str) -> anyhow::Result<()> {
        info!(subject, message, "Notification");
        Ok(())
    }
}

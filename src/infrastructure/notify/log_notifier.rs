use async_trait::async_trait;
use tracing::info;

use crate::domain::repositories::{Notifier, NotifyError};

/// [`Notifier`] that writes notifications to the log. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, id: &str, title: &str, message: &str) -> Result<(), NotifyError> {
        info!(notification_id = %id, title = %title, message = %message, "Notification");
        Ok(())
    }
}

//! User notification sink.

use async_trait::async_trait;

/// Error raised when a notification cannot be shown.
#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Fire-and-forget notification sink.
///
/// Callers log failures and carry on; a failed notification never affects
/// promotion state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, id: &str, title: &str, message: &str) -> Result<(), NotifyError>;
}

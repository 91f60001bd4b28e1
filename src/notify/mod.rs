//! Slack notification delivery

pub mod slack;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use slack::{
    is_valid_slack_webhook, ChangeNotification, NotificationResult, RetryPolicy, SlackNotifier,
    DEFAULT_RETRY_COUNT, MAX_RETRY_COUNT,
};
pub use transport::{HttpTransport, WebhookTransport};

/// Notification delivery errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Request error: {0}")]
    Request(String),
}

//! Slack webhook notifications with retry

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use url::Url;

use super::transport::WebhookTransport;
use super::NotifyError;

/// Attempts made by [`SlackNotifier::send_notification`]
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Upper bound on attempts for a single notification
pub const MAX_RETRY_COUNT: u32 = 6;

const SLACK_HOST: &str = "hooks.slack.com";
const TEST_MESSAGE: &str = ":white_check_mark: Sheetwatch test notification: this webhook is connected.";

fn services_path() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^/services/[A-Za-z0-9_-]+/[A-Za-z0-9_-]+/[A-Za-z0-9_-]+$")
            .expect("static webhook pattern is valid")
    })
}

/// True iff `url` is a `hooks.slack.com/services/<TEAM>/<BOT>/<TOKEN>` URL
pub fn is_valid_slack_webhook(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => {
            parsed.host_str() == Some(SLACK_HOST) && services_path().is_match(parsed.path())
        }
        Err(_) => false,
    }
}

/// Exponential backoff between attempts: `base * 2^(n-1)` after the n-th failure
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration) -> Self {
        Self { base_delay }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_RETRY_COUNT);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// Outcome of a delivery, returned to the caller and never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
}

impl NotificationResult {
    fn delivered(attempts: u32) -> Self {
        Self {
            success: true,
            error: None,
            attempts,
        }
    }

    fn failed(error: String, attempts: u32) -> Self {
        Self {
            success: false,
            error: Some(error),
            attempts,
        }
    }
}

/// A watched cell change to report
#[derive(Debug, Clone, Default)]
pub struct ChangeNotification {
    pub message: String,
    pub sheet_id: String,
    pub cell_range: String,
    pub old_value: String,
    pub new_value: String,
    pub spreadsheet_name: Option<String>,
    pub user_mention: Option<String>,
}

impl ChangeNotification {
    /// Slack payload: plain `text` fallback plus Block Kit sections
    pub fn to_payload(&self) -> serde_json::Value {
        let mention = self
            .user_mention
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .map(|m| format!("{} ", m.trim()))
            .unwrap_or_default();
        let delta = format!("{}: {} → {}", self.cell_range, self.old_value, self.new_value);
        let sheet_label = self
            .spreadsheet_name
            .clone()
            .unwrap_or_else(|| self.sheet_id.clone());

        let mut fields = vec![
            mrkdwn(format!("*Spreadsheet:*\n{}", sheet_label)),
            mrkdwn(format!("*Cell:*\n{}", self.cell_range)),
            mrkdwn(format!("*Old value:*\n{}", display_or_blank(&self.old_value))),
            mrkdwn(format!("*New value:*\n{}", display_or_blank(&self.new_value))),
        ];
        if let Some(link) = sheet_link(&self.sheet_id) {
            fields.push(mrkdwn(format!("*Open:*\n<{}|View sheet>", link)));
        }

        serde_json::json!({
            "text": format!("{}{}\n{}", mention, self.message, delta),
            "blocks": [
                {
                    "type": "section",
                    "text": mrkdwn(format!("{}*{}*", mention, self.message)),
                },
                {
                    "type": "section",
                    "fields": fields,
                },
                {
                    "type": "context",
                    "elements": [
                        mrkdwn(format!("Detected at {}", chrono::Utc::now().to_rfc3339())),
                    ],
                }
            ]
        })
    }
}

fn mrkdwn(text: String) -> serde_json::Value {
    serde_json::json!({ "type": "mrkdwn", "text": text })
}

fn display_or_blank(value: &str) -> &str {
    if value.is_empty() {
        "_(blank)_"
    } else {
        value
    }
}

fn sheet_link(sheet_id: &str) -> Option<String> {
    if sheet_id.is_empty() || sheet_id.starts_with(crate::sheets::FILE_SOURCE_PREFIX) {
        return None;
    }
    Some(format!("https://docs.google.com/spreadsheets/d/{}", sheet_id))
}

/// Sends notifications to one Slack webhook
#[derive(Clone)]
pub struct SlackNotifier {
    transport: Arc<dyn WebhookTransport>,
    webhook_url: String,
    retry: RetryPolicy,
}

impl SlackNotifier {
    pub fn new(transport: Arc<dyn WebhookTransport>, webhook_url: impl Into<String>) -> Self {
        Self {
            transport,
            webhook_url: webhook_url.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    /// Send with [`DEFAULT_RETRY_COUNT`] attempts
    pub async fn send_notification(&self, notification: &ChangeNotification) -> NotificationResult {
        self.send_notification_with_retry(notification, DEFAULT_RETRY_COUNT)
            .await
    }

    /// Attempt delivery up to `retry_count` times.
    ///
    /// `retry_count` is clamped to `1..=`[`MAX_RETRY_COUNT`]: zero still makes
    /// one attempt, and larger counts stop after [`MAX_RETRY_COUNT`]. The
    /// returned `attempts` is the number actually made.
    pub async fn send_notification_with_retry(
        &self,
        notification: &ChangeNotification,
        retry_count: u32,
    ) -> NotificationResult {
        let attempts = retry_count.clamp(1, MAX_RETRY_COUNT);
        let payload = notification.to_payload();
        let mut last_error = NotifyError::Webhook("no attempt made".to_string());

        for attempt in 1..=attempts {
            match self.transport.post_json(&self.webhook_url, &payload).await {
                Ok(()) => {
                    tracing::debug!(
                        cell = %notification.cell_range,
                        attempt,
                        "Slack notification sent"
                    );
                    return NotificationResult::delivered(attempt);
                }
                Err(e) => {
                    tracing::warn!(
                        cell = %notification.cell_range,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Slack notification attempt failed"
                    );
                    last_error = e;
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.retry.delay_after(attempt)).await;
            }
        }

        NotificationResult::failed(last_error.to_string(), attempts)
    }

    /// Send a fixed test message once, without retry
    pub async fn test_connection(&self) -> NotificationResult {
        let payload = serde_json::json!({ "text": TEST_MESSAGE });
        match self.transport.post_json(&self.webhook_url, &payload).await {
            Ok(()) => NotificationResult::delivered(1),
            Err(e) => NotificationResult::failed(e.to_string(), 1),
        }
    }
}

//! In-memory webhook transport for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::transport::WebhookTransport;
use super::NotifyError;

/// Records every delivery; the first `fail_first` calls fail, and so does
/// every call whose `text` contains `fail_text`
#[derive(Default)]
pub struct RecordingTransport {
    fail_first: usize,
    fail_text: Option<String>,
    calls: Mutex<Vec<Call>>,
}

struct Call {
    at: Instant,
    payload: serde_json::Value,
    delivered: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(fail_first: usize) -> Self {
        Self {
            fail_first,
            ..Self::default()
        }
    }

    pub fn failing_when_text_contains(fragment: &str) -> Self {
        Self {
            fail_text: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|c| c.at).collect()
    }

    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.calls.lock().iter().map(|c| c.payload.clone()).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.payloads().iter().filter_map(text_of).collect()
    }

    /// Texts of the calls that succeeded
    pub fn delivered_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.delivered)
            .filter_map(|c| text_of(&c.payload))
            .collect()
    }
}

fn text_of(payload: &serde_json::Value) -> Option<String> {
    payload["text"].as_str().map(String::from)
}

#[async_trait]
impl WebhookTransport for RecordingTransport {
    async fn post_json(&self, _url: &str, payload: &serde_json::Value) -> Result<(), NotifyError> {
        let mut calls = self.calls.lock();
        let attempt = calls.len() + 1;
        let rejected = attempt <= self.fail_first
            || matches!(
                (&self.fail_text, text_of(payload)),
                (Some(fragment), Some(text)) if text.contains(fragment.as_str())
            );

        calls.push(Call {
            at: Instant::now(),
            payload: payload.clone(),
            delivered: !rejected,
        });

        if rejected {
            return Err(NotifyError::Webhook(format!(
                "simulated failure on attempt {}",
                attempt
            )));
        }
        Ok(())
    }
}

//! A single monitored range and its read-evaluate-notify tick

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::condition::{evaluate_conditions, Condition, ConditionMatch};
use super::MonitorError;
use crate::notify::{is_valid_slack_webhook, ChangeNotification, SlackNotifier};
use crate::sheets::{CellRef, SheetRange, Snapshot, SnapshotReader};

/// User-supplied parameters for a monitoring job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    pub data_source_id: String,
    pub range: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub webhook_url: String,
    pub frequency_minutes: u32,
    #[serde(default)]
    pub spreadsheet_name: Option<String>,
    #[serde(default)]
    pub user_mention: Option<String>,
}

impl JobConfig {
    /// Check every field, returning the parsed range
    pub fn validate(&self) -> Result<SheetRange, MonitorError> {
        if self.data_source_id.trim().is_empty() {
            return Err(MonitorError::Validation(
                "dataSourceId must not be empty".to_string(),
            ));
        }
        if self.frequency_minutes < 1 {
            return Err(MonitorError::Validation(
                "frequencyMinutes must be at least 1".to_string(),
            ));
        }
        if self.range.trim().is_empty() {
            return Err(MonitorError::Validation("range must not be empty".to_string()));
        }
        let range = SheetRange::parse(&self.range)
            .map_err(|e| MonitorError::Validation(format!("range '{}': {}", self.range, e)))?;

        if !is_valid_slack_webhook(&self.webhook_url) {
            return Err(MonitorError::Validation(
                "webhookUrl is not a Slack incoming webhook URL".to_string(),
            ));
        }

        for condition in &self.conditions {
            let (sheet, cell) = CellRef::parse_qualified(&condition.cell).map_err(|e| {
                MonitorError::Validation(format!("condition '{}': {}", condition.id, e))
            })?;
            if sheet.is_some() && sheet != range.sheet {
                return Err(MonitorError::Validation(format!(
                    "condition '{}': cell {} is not on the monitored sheet",
                    condition.id, condition.cell
                )));
            }
            if !range.contains(&cell) {
                return Err(MonitorError::Validation(format!(
                    "condition '{}': cell {} is outside range {}",
                    condition.id, condition.cell, range
                )));
            }
        }

        Ok(range)
    }
}

/// Lifecycle state reported by list/get
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Stopped,
}

/// Observable counters for a job
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub read_failures: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Read-only view of a job returned by list/get
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub data_source_id: String,
    pub range: String,
    pub frequency_minutes: u32,
    pub condition_count: usize,
    pub spreadsheet_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub has_baseline: bool,
    #[serde(flatten)]
    pub stats: JobStats,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// First successful read, stored without comparing
    BaselineEstablished,
    /// Compared against the previous snapshot
    Evaluated {
        matched: usize,
        delivered: usize,
        failed: usize,
    },
    /// Read failed; baseline untouched
    ReadFailed(String),
}

#[derive(Debug, Default)]
struct TickGate {
    stopped: bool,
    in_flight: bool,
}

/// Result of asking the gate for permission to tick
pub enum TickAdmission {
    Admitted(TickGuard),
    Busy,
    Stopped,
}

/// Holds the job's single-flight slot until dropped
pub struct TickGuard {
    job: Arc<MonitoringJob>,
}

impl TickGuard {
    pub fn job(&self) -> &Arc<MonitoringJob> {
        &self.job
    }
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.job.gate.lock().in_flight = false;
    }
}

/// One tracked (data source, range, conditions, webhook, frequency) tuple
pub struct MonitoringJob {
    /// Registry-assigned id
    id: String,
    /// Validated user configuration
    config: JobConfig,
    /// `config.range`, parsed once at creation
    range: SheetRange,
    created_at: DateTime<Utc>,
    /// Delivers to `config.webhook_url`
    notifier: SlackNotifier,
    /// Single-flight and stop flags
    gate: Mutex<TickGate>,
    /// Prior successful read; `None` until the first tick succeeds
    last_snapshot: RwLock<Option<Arc<Snapshot>>>,
    stats: Mutex<JobStats>,
}

impl MonitoringJob {
    /// Validate `config` and build an idle job with no baseline
    pub fn new(
        id: impl Into<String>,
        config: JobConfig,
        notifier: SlackNotifier,
    ) -> Result<Self, MonitorError> {
        let range = config.validate()?;

        Ok(Self {
            id: id.into(),
            config,
            range,
            created_at: Utc::now(),
            notifier,
            gate: Mutex::new(TickGate::default()),
            last_snapshot: RwLock::new(None),
            stats: Mutex::new(JobStats::default()),
        })
    }

    /// Job id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Configuration the job was started with
    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Timer period
    pub fn period(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.frequency_minutes) * 60)
    }

    /// `Stopped` once [`stop`](Self::stop) has been called
    pub fn status(&self) -> JobStatus {
        if self.gate.lock().stopped {
            JobStatus::Stopped
        } else {
            JobStatus::Running
        }
    }

    /// Current baseline, if any
    pub fn last_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.last_snapshot.read().clone()
    }

    /// Copy of the tick counters
    pub fn stats(&self) -> JobStats {
        self.stats.lock().clone()
    }

    /// Snapshot of the job for list/get
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id.clone(),
            status: self.status(),
            data_source_id: self.config.data_source_id.clone(),
            range: self.config.range.clone(),
            frequency_minutes: self.config.frequency_minutes,
            condition_count: self.config.conditions.len(),
            spreadsheet_name: self.config.spreadsheet_name.clone(),
            created_at: self.created_at,
            has_baseline: self.last_snapshot.read().is_some(),
            stats: self.stats(),
        }
    }

    /// Claim the single-flight slot. Once [`stop`](Self::stop) has returned,
    /// no further tick is ever admitted.
    pub fn try_begin_tick(self: &Arc<Self>) -> TickAdmission {
        let mut gate = self.gate.lock();
        if gate.stopped {
            return TickAdmission::Stopped;
        }
        if gate.in_flight {
            drop(gate);
            self.stats.lock().skipped_ticks += 1;
            return TickAdmission::Busy;
        }
        gate.in_flight = true;
        TickAdmission::Admitted(TickGuard {
            job: Arc::clone(self),
        })
    }

    /// Close the gate; an in-flight tick is left to finish
    pub fn stop(&self) {
        self.gate.lock().stopped = true;
    }

    /// Read the range, compare with the baseline, notify on matches, replace the baseline
    pub async fn run_tick(&self, reader: &dyn SnapshotReader) -> TickOutcome {
        let fresh = match reader.read(&self.config.data_source_id, &self.range).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    job_id = %self.id,
                    data_source = %self.config.data_source_id,
                    error = %e,
                    "Snapshot read failed, keeping previous baseline"
                );
                let mut stats = self.stats.lock();
                stats.ticks += 1;
                stats.read_failures += 1;
                stats.last_tick_at = Some(Utc::now());
                stats.last_error = Some(e.to_string());
                return TickOutcome::ReadFailed(e.to_string());
            }
        };

        let previous = self.last_snapshot();
        let Some(previous) = previous else {
            tracing::info!(
                job_id = %self.id,
                cells = fresh.len(),
                "Baseline snapshot established"
            );
            *self.last_snapshot.write() = Some(Arc::new(fresh));
            self.record_tick(0, 0);
            return TickOutcome::BaselineEstablished;
        };

        let matches = evaluate_conditions(&previous, &fresh, &self.config.conditions);
        let matched = matches.len();

        let results = join_all(matches.iter().map(|m| self.deliver(m))).await;
        let delivered = results.iter().filter(|ok| **ok).count();
        let failed = matched - delivered;

        // Every evaluation above has read `previous`; only now is it replaced.
        *self.last_snapshot.write() = Some(Arc::new(fresh));
        self.record_tick(delivered as u64, failed as u64);

        if self.status() == JobStatus::Stopped {
            tracing::debug!(job_id = %self.id, "Tick finished after job was stopped");
        }

        TickOutcome::Evaluated {
            matched,
            delivered,
            failed,
        }
    }

    async fn deliver(&self, m: &ConditionMatch) -> bool {
        let notification = ChangeNotification {
            message: m.message.clone(),
            sheet_id: self.config.data_source_id.clone(),
            cell_range: m.cell.clone(),
            old_value: m.old_value.as_text(),
            new_value: m.new_value.as_text(),
            spreadsheet_name: self.config.spreadsheet_name.clone(),
            user_mention: self.config.user_mention.clone(),
        };

        let result = self.notifier.send_notification(&notification).await;
        if result.success {
            tracing::info!(
                job_id = %self.id,
                condition_id = %m.condition_id,
                delta = %m.delta,
                "Notification delivered"
            );
            true
        } else {
            let error = result.error.unwrap_or_default();
            tracing::error!(
                job_id = %self.id,
                condition_id = %m.condition_id,
                attempts = result.attempts,
                error = %error,
                "Notification failed after retries"
            );
            self.stats.lock().last_error = Some(format!("Notification for {} failed: {}", m.cell, error));
            false
        }
    }

    fn record_tick(&self, delivered: u64, failed: u64) {
        let mut stats = self.stats.lock();
        stats.ticks += 1;
        stats.notifications_sent += delivered;
        stats.notifications_failed += failed;
        stats.last_tick_at = Some(Utc::now());
        if failed == 0 {
            stats.last_error = None;
        }
    }
}

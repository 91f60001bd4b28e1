//! Job registry: owns active jobs and drives their timers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::job::{JobConfig, JobSummary, MonitoringJob, TickAdmission};
use super::MonitorError;
use crate::notify::{
    is_valid_slack_webhook, NotificationResult, RetryPolicy, SlackNotifier, WebhookTransport,
};
use crate::sheets::SnapshotReader;

/// A registered job and the task driving its timer
struct ActiveJob {
    job: Arc<MonitoringJob>,
    /// Aborted on stop
    timer: JoinHandle<()>,
}

/// Active monitoring jobs keyed by id
pub struct JobRegistry {
    jobs: DashMap<String, ActiveJob>,
    /// Shared by every job's ticks
    reader: Arc<dyn SnapshotReader>,
    /// Shared by every job's notifier
    transport: Arc<dyn WebhookTransport>,
    /// Backoff handed to each new job's notifier
    retry: RetryPolicy,
    /// Disambiguates ids created within the same millisecond
    next_seq: AtomicU64,
}

impl JobRegistry {
    /// Empty registry reading through `reader` and posting through `transport`
    pub fn new(reader: Arc<dyn SnapshotReader>, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            jobs: DashMap::new(),
            reader,
            transport,
            retry: RetryPolicy::default(),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Backoff used by jobs started after this call
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn generate_id(&self) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        format!("job_{}_{}", chrono::Utc::now().timestamp_millis(), seq)
    }

    /// Validate `config`, create the job and start its timer
    pub fn start(&self, config: JobConfig) -> Result<String, MonitorError> {
        let notifier = SlackNotifier::new(Arc::clone(&self.transport), config.webhook_url.clone())
            .with_retry_policy(self.retry);
        let id = self.generate_id();
        let job = Arc::new(MonitoringJob::new(id.clone(), config, notifier)?);

        let timer = self.spawn_timer(Arc::clone(&job));
        self.jobs.insert(id.clone(), ActiveJob { job: Arc::clone(&job), timer });

        tracing::info!(
            job_id = %id,
            data_source = %job.config().data_source_id,
            range = %job.config().range,
            frequency_minutes = job.config().frequency_minutes,
            conditions = job.config().conditions.len(),
            "Monitoring job started"
        );

        Ok(id)
    }

    fn spawn_timer(&self, job: Arc<MonitoringJob>) -> JoinHandle<()> {
        let reader = Arc::clone(&self.reader);

        tokio::spawn(async move {
            let mut ticker = interval(job.period());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match job.try_begin_tick() {
                    TickAdmission::Admitted(guard) => {
                        let reader = Arc::clone(&reader);
                        tokio::spawn(async move {
                            guard.job().run_tick(reader.as_ref()).await;
                            drop(guard);
                        });
                    }
                    TickAdmission::Busy => {
                        tracing::debug!(
                            job_id = %job.id(),
                            "Previous tick still in flight, skipping"
                        );
                    }
                    TickAdmission::Stopped => break,
                }
            }

            tracing::debug!(job_id = %job.id(), "Job timer exited");
        })
    }

    /// Summaries of all active jobs, oldest first
    pub fn list(&self) -> Vec<JobSummary> {
        let mut summaries: Vec<JobSummary> =
            self.jobs.iter().map(|entry| entry.job.summary()).collect();
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        summaries
    }

    /// Summary of one active job
    pub fn get(&self, id: &str) -> Option<JobSummary> {
        self.jobs.get(id).map(|entry| entry.job.summary())
    }

    /// Number of active jobs
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Cancel a job's timer and remove it. No tick is admitted after this returns.
    pub fn stop(&self, id: &str) -> Result<(), MonitorError> {
        let (_, active) = self
            .jobs
            .remove(id)
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;

        active.job.stop();
        active.timer.abort();

        tracing::info!(job_id = %id, "Monitoring job stopped");
        Ok(())
    }

    /// Stop every active job, returning how many were stopped
    pub fn stop_all(&self) -> usize {
        let ids: Vec<String> = self.jobs.iter().map(|entry| entry.key().clone()).collect();

        let stopped = ids.iter().filter(|id| self.stop(id).is_ok()).count();
        if stopped > 0 {
            tracing::info!(stopped, "All monitoring jobs stopped");
        }
        stopped
    }

    /// Send a one-off test message to `webhook_url`
    pub async fn test_webhook(&self, webhook_url: &str) -> Result<NotificationResult, MonitorError> {
        if !is_valid_slack_webhook(webhook_url) {
            return Err(MonitorError::Validation(
                "webhookUrl is not a Slack incoming webhook URL".to_string(),
            ));
        }
        let notifier = SlackNotifier::new(Arc::clone(&self.transport), webhook_url);
        Ok(notifier.test_connection().await)
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        for entry in self.jobs.iter() {
            entry.job.stop();
            entry.timer.abort();
        }
    }
}

//! Monitoring jobs and the scheduler that ticks them
//!
//! Each job periodically reads a cell range, compares it with the previous
//! read, and sends Slack notifications for conditions that fire.

pub mod condition;
pub mod job;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use condition::{describe_delta, evaluate_conditions, Condition, ConditionMatch, Operator};
pub use job::{JobConfig, JobStats, JobStatus, JobSummary, MonitoringJob, TickOutcome};
pub use registry::JobRegistry;

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    NotFound(String),
}

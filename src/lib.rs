//! Sheetwatch: Spreadsheet Cell Monitoring with Slack Notifications
//!
//! Watches a cell range in a Google Sheet or an uploaded workbook on a
//! polling schedule and posts to a Slack incoming webhook when watched cells
//! change or match user-defined conditions.
//!
//! # Features
//!
//! - **Per-job timers**: Every monitoring job ticks on its own schedule
//! - **Single-flight ticks**: A slow read never overlaps the next tick
//! - **Conditions**: equals, not_equals, greater_than, less_than, contains, changed
//! - **Reliable delivery**: Slack webhook posts retried with exponential backoff
//! - **Data sources**: Google Sheets values API and xlsx/xls/ods uploads
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sheetwatch::monitor::{Condition, JobConfig, JobRegistry, Operator};
//! use sheetwatch::notify::HttpTransport;
//! use sheetwatch::sheets::{DataSourceRouter, WorkbookReader};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = DataSourceRouter::new(None, WorkbookReader::new("./uploads"));
//! let transport = HttpTransport::new(Duration::from_secs(10))?;
//! let registry = JobRegistry::new(Arc::new(reader), Arc::new(transport));
//!
//! let job_id = registry.start(JobConfig {
//!     data_source_id: "file:budget.xlsx".to_string(),
//!     range: "Sheet1!A1:D20".to_string(),
//!     conditions: vec![Condition::new("total", "D20", Operator::GreaterThan, "10000")],
//!     webhook_url: "https://hooks.slack.com/services/T000/B000/XXXX".to_string(),
//!     frequency_minutes: 5,
//!     spreadsheet_name: Some("Budget".to_string()),
//!     user_mention: None,
//! })?;
//!
//! println!("Started {}", job_id);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod monitor;
pub mod notify;
pub mod sheets;

// Re-export commonly used types
pub use monitor::{Condition, JobConfig, JobRegistry, MonitorError, Operator};
pub use notify::{is_valid_slack_webhook, NotificationResult, SlackNotifier};
pub use sheets::{CellValue, ReadError, SheetRange, Snapshot, SnapshotReader};

//! Core logger types and traits

pub mod appender;
pub mod dispatcher;
pub mod error;
pub mod layout;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod overflow_policy;

pub use appender::Appender;
pub use dispatcher::{AsyncConfig, Dispatcher, DEFAULT_SHUTDOWN_TIMEOUT};
pub use error::{LoggerError, Result};
pub use layout::{FormattedTimestamp, Layout, OutputFormat, TimestampFormat};
pub use log_entry::{thread_label, LogEntry, LogEvent};
pub use log_level::LogLevel;
pub use logger::Logger;
pub use metrics::{LoggerMetrics, LoggerMetricsSnapshot};
pub use overflow_policy::{OverflowCallback, OverflowPolicy};

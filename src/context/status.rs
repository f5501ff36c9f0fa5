//! Internal status channel
//!
//! Problems inside the logging system itself (bad configuration, a factory
//! that cannot be resolved) cannot be logged through the pipeline they
//! concern. They are kept here and echoed to stderr instead.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Records kept before the oldest ones are evicted
pub const DEFAULT_STATUS_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Warn,
    Error,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLevel::Warn => f.write_str("WARNING"),
            StatusLevel::Error => f.write_str("ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub level: StatusLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded record of the logging system's own warnings and errors
#[derive(Debug)]
pub struct StatusLogger {
    records: Mutex<VecDeque<StatusRecord>>,
    capacity: usize,
    echo: bool,
}

impl StatusLogger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STATUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_STATUS_CAPACITY))),
            capacity: capacity.max(1),
            echo: true,
        }
    }

    /// Keep records without printing them to stderr
    #[must_use = "builder methods return a new value"]
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(StatusLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(StatusLevel::Error, message.into());
    }

    fn record(&self, level: StatusLevel, message: String) {
        if self.echo {
            eprintln!("[LOGGER {}] {}", level, message);
        }

        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(StatusRecord {
            level,
            message,
            timestamp: Utc::now(),
        });
    }

    /// All retained records, oldest first
    pub fn records(&self) -> Vec<StatusRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn errors(&self) -> Vec<StatusRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.level == StatusLevel::Error)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Default for StatusLogger {
    fn default() -> Self {
        Self::new()
    }
}

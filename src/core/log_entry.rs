//! Log events
//!
//! [`LogEvent`] borrows its text from the message handle that is on loan for
//! the duration of a log call. Anything that must outlive the call, such as
//! the async queue, takes an owned [`LogEntry`] copy instead.

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    static THREAD_LABEL: RefCell<Option<Arc<str>>> = const { RefCell::new(None) };
}

/// Name of the calling thread, or its id when unnamed
///
/// Computed once per thread; later calls only bump a reference count.
pub fn thread_label() -> Arc<str> {
    THREAD_LABEL
        .try_with(|cache| {
            cache
                .borrow_mut()
                .get_or_insert_with(compute_thread_label)
                .clone()
        })
        .unwrap_or_else(|_| compute_thread_label())
}

fn compute_thread_label() -> Arc<str> {
    let current = std::thread::current();
    match current.name() {
        Some(name) => Arc::from(name),
        None => Arc::from(format!("{:?}", current.id())),
    }
}

/// A log event as seen by appenders, valid for one call
#[derive(Debug, Clone, Copy)]
pub struct LogEvent<'a> {
    pub level: LogLevel,
    pub logger: &'a str,
    pub message: &'a str,
    /// Template or flow method name the message was built from
    pub template: &'a str,
    pub timestamp: DateTime<Utc>,
    pub thread: &'a str,
}

impl<'a> LogEvent<'a> {
    pub fn new(level: LogLevel, logger: &'a str, message: &'a str, thread: &'a str) -> Self {
        Self {
            level,
            logger,
            message,
            template: message,
            timestamp: Utc::now(),
            thread,
        }
    }

    #[must_use]
    pub fn with_template(mut self, template: &'a str) -> Self {
        self.template = template;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn to_entry(&self) -> LogEntry {
        LogEntry::from_event(self)
    }
}

/// Owned copy of a [`LogEvent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub logger: String,
    pub message: String,
    pub template: String,
    pub timestamp: DateTime<Utc>,
    pub thread: String,
}

impl LogEntry {
    pub fn from_event(event: &LogEvent<'_>) -> Self {
        Self {
            level: event.level,
            logger: event.logger.to_string(),
            message: event.message.to_string(),
            template: event.template.to_string(),
            timestamp: event.timestamp,
            thread: event.thread.to_string(),
        }
    }

    pub fn as_event(&self) -> LogEvent<'_> {
        LogEvent {
            level: self.level,
            logger: &self.logger,
            message: &self.message,
            template: &self.template,
            timestamp: self.timestamp,
            thread: &self.thread,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_copies_event() {
        let mut buffer = String::from("payload 1");
        let entry = {
            let event = LogEvent::new(LogLevel::Warn, "db", &buffer, "main")
                .with_template("payload {}");
            event.to_entry()
        };
        buffer.clear();

        assert_eq!(entry.message, "payload 1");
        assert_eq!(entry.template, "payload {}");
        assert_eq!(entry.logger, "db");

        let event = entry.as_event();
        assert_eq!(event.level, LogLevel::Warn);
        assert_eq!(event.timestamp, entry.timestamp);
    }

    #[test]
    fn test_thread_label_uses_name() {
        let label = std::thread::Builder::new()
            .name("worker-7".to_string())
            .spawn(|| thread_label())
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(&*label, "worker-7");
    }

    #[test]
    fn test_thread_label_is_cached() {
        let first = thread_label();
        let second = thread_label();
        assert!(Arc::ptr_eq(&first, &second));
    }
}

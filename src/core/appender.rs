//! Appender trait for log output destinations

use super::{error::Result, log_entry::LogEvent};

/// Output stage of the pipeline
///
/// `append` receives an event that borrows from a recycled message; an
/// appender that keeps anything past the call must copy it.
pub trait Appender: Send {
    fn append(&mut self, event: &LogEvent<'_>) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}

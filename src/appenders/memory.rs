//! In-memory appender

use crate::core::{Appender, Layout, LogEntry, LogEvent, Result};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Captured {
    entries: Vec<LogEntry>,
    lines: Vec<String>,
}

/// Keeps a copy of every event it sees
///
/// Clones of the handle returned by [`MemoryAppender::captured`] stay valid
/// after the appender has been moved into a context.
pub struct MemoryAppender {
    layout: Layout,
    captured: CapturedEvents,
    buffer: Vec<u8>,
}

impl MemoryAppender {
    pub fn new() -> Self {
        Self::with_layout(Layout::text())
    }

    pub fn with_layout(layout: Layout) -> Self {
        Self {
            layout,
            captured: CapturedEvents::default(),
            buffer: Vec::with_capacity(256),
        }
    }

    pub fn captured(&self) -> CapturedEvents {
        self.captured.clone()
    }
}

impl Default for MemoryAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for MemoryAppender {
    fn append(&mut self, event: &LogEvent<'_>) -> Result<()> {
        self.buffer.clear();
        self.layout.render(event, &mut self.buffer)?;
        let line = String::from_utf8_lossy(&self.buffer).trim_end().to_string();

        let mut captured = self.captured.inner.lock();
        captured.entries.push(event.to_entry());
        captured.lines.push(line);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Shared view of what a [`MemoryAppender`] captured
#[derive(Debug, Clone, Default)]
pub struct CapturedEvents {
    inner: Arc<Mutex<Captured>>,
}

impl CapturedEvents {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.lock().entries.clone()
    }

    /// Messages in arrival order
    pub fn messages(&self) -> Vec<String> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    /// Rendered lines without their trailing newline
    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().lines.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, message: &str) -> bool {
        self.inner
            .lock()
            .entries
            .iter()
            .any(|entry| entry.message == message)
    }

    pub fn clear(&self) {
        let mut captured = self.inner.lock();
        captured.entries.clear();
        captured.lines.clear();
    }
}

//! Console appender implementation

use crate::core::{Appender, Layout, LogEvent, LogLevel, OutputFormat, Result, TimestampFormat};
#[cfg(feature = "console")]
use colored::Colorize;
use std::io::Write;

/// Writes to stdout, and to stderr for Error and Fatal events
pub struct ConsoleAppender {
    layout: Layout,
    use_colors: bool,
    buffer: Vec<u8>,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self::with_colors(cfg!(feature = "console"))
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            layout: Layout::text(),
            use_colors,
            buffer: Vec::with_capacity(256),
        }
    }

    /// # Example
    ///
    /// ```
    /// use recycling_logger::appenders::ConsoleAppender;
    /// use recycling_logger::core::OutputFormat;
    ///
    /// let appender = ConsoleAppender::new().with_output_format(OutputFormat::Json);
    /// ```
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.layout.format = format;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.layout.timestamp = format;
        self
    }

    fn render(&mut self, event: &LogEvent<'_>) -> Result<()> {
        self.buffer.clear();

        #[cfg(feature = "console")]
        if self.use_colors && self.layout.format == OutputFormat::Text {
            let level = event.level.padded().color(event.level.color_code());
            return self.layout.render_text(event, &level, &mut self.buffer);
        }

        self.layout.render(event, &mut self.buffer)
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, event: &LogEvent<'_>) -> Result<()> {
        self.render(event)?;

        match event.level {
            LogLevel::Error | LogLevel::Fatal => std::io::stderr().lock().write_all(&self.buffer)?,
            _ => std::io::stdout().lock().write_all(&self.buffer)?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

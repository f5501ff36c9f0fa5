//! Appender over any `std::io::Write`

use crate::core::{Appender, Layout, LogEvent, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Renders events with a [`Layout`] into a writer
///
/// One render buffer is kept for the appender's lifetime.
pub struct WriterAppender<W: Write + Send> {
    writer: W,
    layout: Layout,
    buffer: Vec<u8>,
    name: String,
}

impl<W: Write + Send> WriterAppender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            layout: Layout::default(),
            buffer: Vec::with_capacity(256),
            name: "writer".to_string(),
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterAppender<BufWriter<File>> {
    /// Append to the file at `path`, creating it when missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)).with_name("file"))
    }
}

impl<W: Write + Send> Appender for WriterAppender<W> {
    fn append(&mut self, event: &LogEvent<'_>) -> Result<()> {
        self.buffer.clear();
        self.layout.render(event, &mut self.buffer)?;
        self.writer.write_all(&self.buffer)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

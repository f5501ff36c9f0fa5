//! Appender implementations

pub mod console;
pub mod memory;
pub mod writer;

pub use console::ConsoleAppender;
pub use memory::{CapturedEvents, MemoryAppender};
pub use writer::WriterAppender;

pub use crate::core::Appender;

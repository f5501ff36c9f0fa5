//! # Recycling Logger
//!
//! A logging pipeline whose hot path reuses its message buffers instead of
//! allocating them per call.
//!
//! ## Features
//!
//! - **Pluggable recycling**: thread-local, bounded shared queue, or none,
//!   selectable by name at runtime
//! - **Environment-aware defaults**: thread-locals in standalone processes,
//!   a shared pool inside containers that own their threads
//! - **Panic-safe loans**: recycled instances go back on every exit path
//! - **Sync or async dispatch** with configurable overflow handling
//!
//! ## Example
//!
//! ```
//! use recycling_logger::prelude::*;
//! use recycling_logger::info;
//!
//! let context = LoggingContext::builder()
//!     .appender(MemoryAppender::new())
//!     .build()
//!     .unwrap();
//!
//! let logger = context.logger("app");
//! info!(logger, "started with {} workers", 4);
//!
//! println!("{}", context.diagnostics().to_json().unwrap());
//! ```

pub mod appenders;
pub mod context;
pub mod core;
pub mod macros;
pub mod message;
pub mod recycler;

pub mod prelude {
    pub use crate::appenders::{ConsoleAppender, MemoryAppender, WriterAppender};
    pub use crate::context::{
        ContainerDetector, Diagnostics, FixedDetector, LoggingContext, LoggingContextBuilder,
        PropertySource, RuntimeContext, StandaloneDetector,
    };
    pub use crate::core::{
        Appender, Layout, LogEntry, LogEvent, LogLevel, Logger, LoggerError, LoggerMetrics,
        OutputFormat, OverflowCallback, OverflowPolicy, Result, TimestampFormat,
        DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::message::{FlowMessageFactory, MessageFactoryKind, ReusableMessage};
    pub use crate::recycler::{
        DummyRecyclerFactory, Loan, QueueingRecyclerFactory, Recycler, RecyclerFactory,
        RecyclerFactoryRegistry, ThreadLocalRecyclerFactory, TypedRecycler,
    };
}

pub use crate::context::{LoggingContext, LoggingContextBuilder};
pub use crate::core::{LogLevel, Logger, LoggerError, Result};

//! Logging macros
//!
//! The macros take a `{}` template and arguments. Arguments are only
//! rendered when the level is enabled, directly into a recycled message.
//!
//! # Examples
//!
//! ```
//! use recycling_logger::context::LoggingContext;
//! use recycling_logger::{info, warn};
//!
//! let context = LoggingContext::builder().build().unwrap();
//! let logger = context.logger("server");
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! warn!(logger, "User {} retried {} times", "alice", 3);
//! ```

/// Log at an explicit level.
///
/// ```
/// # use recycling_logger::context::LoggingContext;
/// use recycling_logger::core::LogLevel;
/// use recycling_logger::log;
/// # let logger = LoggingContext::builder().build().unwrap().logger("app");
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $template:expr $(, $arg:expr)* $(,)?) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled(level) {
            logger.log_args(level, $template, &[$(&$arg as &dyn ::std::fmt::Display),*]);
        }
    }};
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Trace, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
///
/// ```
/// # use recycling_logger::context::LoggingContext;
/// use recycling_logger::fatal;
/// # let logger = LoggingContext::builder().build().unwrap().logger("app");
/// fatal!(logger, "Unrecoverable state in {}", "scheduler");
/// ```
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Fatal, $($arg)+)
    };
}

//! Named logger handed out by a logging context

use super::{
    dispatcher::Dispatcher,
    log_entry::{thread_label, LogEvent},
    log_level::LogLevel,
    metrics::LoggerMetrics,
};
use crate::message::{FlowMessageFactory, MessageFactoryKind, MessageSource, ReusableMessage};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Logger for one component
///
/// Every log call borrows a message handle from the context, renders into
/// it, hands the result to the dispatcher and gives the handle back before
/// returning, also when an appender panics.
pub struct Logger {
    name: String,
    min_level: Arc<RwLock<LogLevel>>,
    messages: Arc<MessageSource>,
    flow: Arc<FlowMessageFactory>,
    dispatcher: Arc<Dispatcher>,
}

impl Logger {
    pub(crate) fn new(
        name: impl Into<String>,
        min_level: Arc<RwLock<LogLevel>>,
        messages: Arc<MessageSource>,
        flow: Arc<FlowMessageFactory>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            name: name.into(),
            min_level,
            messages,
            flow,
            dispatcher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= *self.min_level.read()
    }

    /// Kind of message handles this logger's calls use
    pub fn message_factory(&self) -> MessageFactoryKind {
        self.messages.kind()
    }

    /// Source of this logger's message handles, shared across the context
    pub fn message_source(&self) -> &Arc<MessageSource> {
        &self.messages
    }

    pub fn flow_message_factory(&self) -> &Arc<FlowMessageFactory> {
        &self.flow
    }

    /// Dispatch metrics, shared by every logger of the context
    pub fn metrics(&self) -> &LoggerMetrics {
        self.dispatcher.metrics()
    }

    /// Render `template` with `args` into a borrowed message and pass it to
    /// `invoke`
    ///
    /// The message goes back to its recycler when this returns or unwinds;
    /// `invoke` must copy anything it wants to keep.
    pub fn with_reusable_message<R>(
        &self,
        template: &str,
        args: &[&dyn fmt::Display],
        invoke: impl FnOnce(&ReusableMessage) -> R,
    ) -> R {
        let mut message = self.messages.lease();
        message.set(template, args);
        invoke(&*message)
    }

    /// Log `template` with `{}` placeholders filled from `args`
    pub fn log_args(&self, level: LogLevel, template: &str, args: &[&dyn fmt::Display]) {
        if !self.is_enabled(level) {
            return;
        }
        self.with_reusable_message(template, args, |message| self.emit(level, message));
    }

    /// Log a message as is
    pub fn log(&self, level: LogLevel, message: &str) {
        if !self.is_enabled(level) {
            return;
        }
        let mut handle = self.messages.lease();
        handle.set_with(message, |out| out.push_str(message));
        self.emit(level, &handle);
    }

    fn emit(&self, level: LogLevel, message: &ReusableMessage) {
        let thread = thread_label();
        let event = LogEvent::new(level, &self.name, message.formatted(), &thread)
            .with_template(message.template());
        self.dispatcher.dispatch(&event);
    }

    /// Trace entry into `name` with its parameters: `Enter name(a, b)`
    pub fn trace_entry(&self, name: &str, params: &[&dyn fmt::Display]) {
        if !self.is_enabled(LogLevel::Trace) {
            return;
        }
        let mut message = self.messages.lease();
        self.flow.entry_message(&mut message, name, params);
        self.emit(LogLevel::Trace, &message);
    }

    /// Trace exit from `name`: `Exit name: result`
    pub fn trace_exit(&self, name: &str, result: Option<&dyn fmt::Display>) {
        if !self.is_enabled(LogLevel::Trace) {
            return;
        }
        let mut message = self.messages.lease();
        self.flow.exit_message(&mut message, name, result);
        self.emit(LogLevel::Trace, &message);
    }

    #[inline]
    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    pub fn fatal(&self, message: &str) {
        self.log(LogLevel::Fatal, message);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("min_level", &*self.min_level.read())
            .field("message_factory", &self.messages.kind())
            .finish()
    }
}

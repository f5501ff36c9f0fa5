//! Logging contexts
//!
//! A [`LoggingContext`] owns everything a set of loggers shares: the
//! configuration it was built from, the recycler factory chosen for it, the
//! recyclers created from that factory, the message factories and the
//! dispatcher. Contexts are independent of each other; tests build as many as
//! they need instead of mutating process-wide state.
//!
//! The recycler factory is resolved on first use and never changes afterwards.
//!
//! # Example
//!
//! ```
//! use recycling_logger::appenders::MemoryAppender;
//! use recycling_logger::context::{LoggingContext, PropertySource};
//! use recycling_logger::info;
//!
//! let appender = MemoryAppender::new();
//! let captured = appender.captured();
//!
//! let context = LoggingContext::builder()
//!     .properties(PropertySource::new().with("logging.recyclerFactory", "queue:4"))
//!     .appender(appender)
//!     .build()
//!     .unwrap();
//!
//! let logger = context.logger("orders");
//! info!(logger, "order {} shipped", 1042);
//!
//! assert_eq!(context.recycler_factory().name(), "queue:4");
//! assert_eq!(captured.messages(), vec!["order 1042 shipped"]);
//! ```

mod runtime;
mod status;

pub use runtime::{
    env_var_name, ContainerDetector, DefaultSelection, EnvironmentDefaultSelector, FixedDetector,
    PropertySource, RuntimeContext, SelectionSource, StandaloneDetector,
    ENABLE_THREAD_LOCALS_PROPERTY, IS_CONTAINER_PROPERTY, KNOWN_PROPERTIES,
    RECYCLER_FACTORY_PROPERTY,
};
pub use status::{StatusLevel, StatusLogger, StatusRecord, DEFAULT_STATUS_CAPACITY};

use crate::appenders::ConsoleAppender;
use crate::core::{
    Appender, AsyncConfig, Dispatcher, LogLevel, Logger, LoggerMetrics, LoggerMetricsSnapshot,
    OverflowCallback, OverflowPolicy, Result,
};
use crate::message::{FlowMessageFactory, MessageFactoryKind, MessageSource};
use crate::recycler::{
    RecyclerFactory, RecyclerFactoryRegistry, RecyclerMetricsSnapshot, TypedRecycler,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

type RecyclerCache = HashMap<(String, TypeId), Arc<dyn Any + Send + Sync>>;

struct ResolvedDefaults {
    runtime: RuntimeContext,
    selection: DefaultSelection,
    messages: Arc<MessageSource>,
}

struct ContextInner {
    name: String,
    properties: PropertySource,
    detector: Box<dyn ContainerDetector>,
    registry: RecyclerFactoryRegistry,
    status: StatusLogger,
    defaults: OnceLock<ResolvedDefaults>,
    recyclers: RwLock<RecyclerCache>,
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
    min_level: Arc<RwLock<LogLevel>>,
    flow: Arc<FlowMessageFactory>,
    dispatcher: Arc<Dispatcher>,
}

/// Shared state of a family of loggers
///
/// Cheap to clone; clones refer to the same context.
#[derive(Clone)]
pub struct LoggingContext {
    inner: Arc<ContextInner>,
}

impl LoggingContext {
    #[must_use]
    pub fn builder() -> LoggingContextBuilder {
        LoggingContextBuilder::new()
    }

    /// Process-wide context configured from the environment, logging to the
    /// console
    pub fn global() -> &'static LoggingContext {
        static GLOBAL: OnceLock<LoggingContext> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            LoggingContextBuilder::new()
                .name("global")
                .properties(PropertySource::from_env())
                .appender(ConsoleAppender::new())
                .assemble(Dispatcher::sync)
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn defaults(&self) -> &ResolvedDefaults {
        self.inner.defaults.get_or_init(|| {
            let inner = &*self.inner;
            let runtime = RuntimeContext::resolve(&inner.properties, &*inner.detector, &inner.status);
            let selection =
                EnvironmentDefaultSelector::new(&inner.registry, &inner.status).select(&runtime);
            let messages = Arc::new(MessageSource::new(selection.message_factory, &selection.factory));
            ResolvedDefaults {
                runtime,
                selection,
                messages,
            }
        })
    }

    /// Signals the defaults were chosen from
    pub fn runtime(&self) -> &RuntimeContext {
        &self.defaults().runtime
    }

    /// Factory every recycler of this context comes from
    pub fn recycler_factory(&self) -> &Arc<dyn RecyclerFactory> {
        &self.defaults().selection.factory
    }

    pub fn selection_source(&self) -> SelectionSource {
        self.defaults().selection.source
    }

    pub fn message_factory(&self) -> MessageFactoryKind {
        self.defaults().selection.message_factory
    }

    pub fn flow_message_factory(&self) -> &Arc<FlowMessageFactory> {
        &self.inner.flow
    }

    /// The context's own warnings and errors
    pub fn status(&self) -> &StatusLogger {
        &self.inner.status
    }

    pub fn registry(&self) -> &RecyclerFactoryRegistry {
        &self.inner.registry
    }

    /// Recycler for `T` registered under `key`, created on first request
    ///
    /// Later calls with the same key and type return the same recycler.
    pub fn recycler<T, C, R>(&self, key: &str, constructor: C, reset: R) -> Arc<TypedRecycler<T>>
    where
        T: Send + 'static,
        C: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        let cache_key = (key.to_string(), TypeId::of::<T>());
        if let Some(existing) = self.cached_recycler::<T>(&cache_key) {
            return existing;
        }

        let mut recyclers = self.inner.recyclers.write();
        // Another thread may have won the race since the read above.
        if let Some(existing) = recyclers
            .get(&cache_key)
            .and_then(|entry| Arc::clone(entry).downcast::<TypedRecycler<T>>().ok())
        {
            return existing;
        }

        let recycler = Arc::new(self.recycler_factory().create(constructor, reset));
        recyclers.insert(cache_key, Arc::clone(&recycler) as Arc<dyn Any + Send + Sync>);
        recycler
    }

    fn cached_recycler<T: Send + 'static>(
        &self,
        key: &(String, TypeId),
    ) -> Option<Arc<TypedRecycler<T>>> {
        let recyclers = self.inner.recyclers.read();
        let entry = recyclers.get(key)?;
        Arc::clone(entry).downcast::<TypedRecycler<T>>().ok()
    }

    /// Logger named `name`, created on first request
    pub fn logger(&self, name: &str) -> Arc<Logger> {
        if let Some(logger) = self.inner.loggers.read().get(name) {
            return Arc::clone(logger);
        }

        let messages = Arc::clone(&self.defaults().messages);
        let mut loggers = self.inner.loggers.write();
        let logger = loggers.entry(name.to_string()).or_insert_with(|| {
            Arc::new(Logger::new(
                name,
                Arc::clone(&self.inner.min_level),
                messages,
                Arc::clone(&self.inner.flow),
                Arc::clone(&self.inner.dispatcher),
            ))
        });
        Arc::clone(logger)
    }

    pub fn min_level(&self) -> LogLevel {
        *self.inner.min_level.read()
    }

    /// Applies to every logger of the context, existing ones included
    pub fn set_min_level(&self, level: LogLevel) {
        *self.inner.min_level.write() = level;
    }

    pub fn add_appender<A: Appender + 'static>(&self, appender: A) {
        self.inner.dispatcher.add_appender(Box::new(appender));
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        self.inner.dispatcher.metrics()
    }

    pub fn is_async(&self) -> bool {
        self.inner.dispatcher.is_async()
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.dispatcher.flush()
    }

    /// Drain pending events and stop the worker thread
    ///
    /// Later log calls are written synchronously.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.inner.dispatcher.shutdown(timeout)
    }

    /// Read-only view of what this context resolved to
    pub fn diagnostics(&self) -> Diagnostics {
        let defaults = self.defaults();
        Diagnostics {
            context: self.inner.name.clone(),
            recycler_factory: defaults.selection.factory.name(),
            message_factory: defaults.selection.message_factory,
            message_recycler: defaults.messages.factory_name().to_string(),
            flow_message_factory: FlowMessageFactory::NAME.to_string(),
            thread_locals_enabled: defaults.runtime.thread_locals_enabled(),
            container_detected: defaults.runtime.container_detected(),
            selection_source: defaults.selection.source,
            runtime: defaults.runtime.clone(),
            messages: defaults.messages.metrics().snapshot(),
            dispatch: self.metrics().snapshot(),
            status_errors: self.inner.status.errors().len(),
        }
    }
}

impl fmt::Debug for LoggingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("LoggingContext");
        debug.field("name", &self.inner.name);
        if let Some(defaults) = self.inner.defaults.get() {
            debug
                .field("recycler_factory", &defaults.selection.factory.name())
                .field("message_factory", &defaults.selection.message_factory);
        }
        debug.field("dispatcher", &self.inner.dispatcher).finish()
    }
}

/// Snapshot returned by [`LoggingContext::diagnostics`]
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub context: String,
    pub recycler_factory: String,
    pub message_factory: MessageFactoryKind,
    /// Factory backing the message handles
    pub message_recycler: String,
    pub flow_message_factory: String,
    pub thread_locals_enabled: bool,
    pub container_detected: bool,
    pub selection_source: SelectionSource,
    pub runtime: RuntimeContext,
    pub messages: RecyclerMetricsSnapshot,
    pub dispatch: LoggerMetricsSnapshot,
    pub status_errors: usize,
}

impl Diagnostics {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for [`LoggingContext`]
///
/// # Example
///
/// ```
/// use recycling_logger::appenders::MemoryAppender;
/// use recycling_logger::context::{FixedDetector, LoggingContext};
/// use recycling_logger::core::{LogLevel, OverflowPolicy};
/// use std::time::Duration;
///
/// let context = LoggingContext::builder()
///     .name("service")
///     .detector(FixedDetector(true))
///     .min_level(LogLevel::Debug)
///     .appender(MemoryAppender::new())
///     .async_mode(1024)
///     .overflow_policy(OverflowPolicy::BlockWithTimeout(Duration::from_millis(50)))
///     .build()
///     .unwrap();
///
/// assert!(!context.recycler_factory().is_thread_local());
/// assert!(context.shutdown(Duration::from_secs(1)));
/// ```
pub struct LoggingContextBuilder {
    name: String,
    properties: PropertySource,
    detector: Box<dyn ContainerDetector>,
    registry: RecyclerFactoryRegistry,
    status: StatusLogger,
    min_level: LogLevel,
    appenders: Vec<Box<dyn Appender>>,
    async_config: Option<AsyncConfig>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    flow: FlowMessageFactory,
}

impl LoggingContextBuilder {
    pub fn new() -> Self {
        Self {
            name: "default".to_string(),
            properties: PropertySource::new(),
            detector: Box::new(StandaloneDetector),
            registry: RecyclerFactoryRegistry::new(),
            status: StatusLogger::new(),
            min_level: LogLevel::Info,
            appenders: Vec::new(),
            async_config: None,
            overflow_policy: OverflowPolicy::default(),
            on_overflow: None,
            flow: FlowMessageFactory::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn properties(mut self, properties: PropertySource) -> Self {
        self.properties = properties;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn detector<D: ContainerDetector + 'static>(mut self, detector: D) -> Self {
        self.detector = Box::new(detector);
        self
    }

    /// Registry used to resolve `logging.recyclerFactory`
    #[must_use = "builder methods return a new value"]
    pub fn registry(mut self, registry: RecyclerFactoryRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Keep status records without echoing them to stderr
    #[must_use = "builder methods return a new value"]
    pub fn quiet_status(mut self) -> Self {
        self.status = self.status.quiet();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.appenders.push(Box::new(appender));
        self
    }

    /// Hand events to a worker thread through a queue of `buffer_size`
    ///
    /// Without this, appenders run on the logging thread.
    #[must_use = "builder methods return a new value"]
    pub fn async_mode(mut self, buffer_size: usize) -> Self {
        self.async_config = Some(AsyncConfig::new(buffer_size));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Called with the running drop count when events are dropped
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn flow_message_factory(mut self, flow: FlowMessageFactory) -> Self {
        self.flow = flow;
        self
    }

    /// Fails only when the async worker thread cannot be spawned
    pub fn build(mut self) -> Result<LoggingContext> {
        match self.async_config.take() {
            Some(mut config) => {
                config.overflow_policy = self.overflow_policy;
                config.on_overflow = self.on_overflow.take();
                let dispatcher = Dispatcher::with_async(std::mem::take(&mut self.appenders), config)?;
                Ok(self.assemble(|_| dispatcher))
            }
            None => Ok(self.assemble(Dispatcher::sync)),
        }
    }

    fn assemble(
        self,
        dispatcher: impl FnOnce(Vec<Box<dyn Appender>>) -> Dispatcher,
    ) -> LoggingContext {
        LoggingContext {
            inner: Arc::new(ContextInner {
                name: self.name,
                properties: self.properties,
                detector: self.detector,
                registry: self.registry,
                status: self.status,
                defaults: OnceLock::new(),
                recyclers: RwLock::new(HashMap::new()),
                loggers: RwLock::new(HashMap::new()),
                min_level: Arc::new(RwLock::new(self.min_level)),
                flow: Arc::new(self.flow),
                dispatcher: Arc::new(dispatcher(self.appenders)),
            }),
        }
    }
}

impl Default for LoggingContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

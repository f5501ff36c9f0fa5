//! Integration tests for recycling_logger
//!
//! These tests verify:
//! - Default recycler factory selection from configuration and detection
//! - Custom factories resolved through the registry
//! - Fallback to the dummy factory on bad configuration
//! - Sync and async logging end to end
//! - Release of recycled messages on every exit path
//! - Diagnostics and file output

use recycling_logger::appenders::{MemoryAppender, WriterAppender};
use recycling_logger::context::{
    FixedDetector, LoggingContext, PropertySource, SelectionSource, StatusLevel,
    ENABLE_THREAD_LOCALS_PROPERTY, IS_CONTAINER_PROPERTY, RECYCLER_FACTORY_PROPERTY,
};
use recycling_logger::core::{Layout, LogLevel, LoggerError, OverflowPolicy};
use recycling_logger::message::MessageFactoryKind;
use recycling_logger::recycler::{
    Constructor, DummyRecyclerFactory, Erased, Recycler, RecyclerFactory, RecyclerFactoryRegistry,
    Reset,
};
use recycling_logger::{info, warn};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn context_with(properties: PropertySource, container: bool) -> LoggingContext {
    LoggingContext::builder()
        .properties(properties)
        .detector(FixedDetector(container))
        .quiet_status()
        .build()
        .expect("Failed to build context")
}

/// Custom strategy delegating to no pooling at all
#[derive(Debug)]
struct CustomFactory;

impl RecyclerFactory for CustomFactory {
    fn name(&self) -> String {
        "custom".to_string()
    }

    fn create_erased(
        &self,
        constructor: Constructor<Erased>,
        reset: Reset<Erased>,
    ) -> Arc<dyn Recycler<Erased>> {
        DummyRecyclerFactory.create_erased(constructor, reset)
    }
}

#[test]
fn test_standalone_defaults_to_thread_local() {
    let context = context_with(PropertySource::new(), false);

    assert!(context.recycler_factory().is_thread_local());
    assert_eq!(context.recycler_factory().name(), "threadlocal");
    assert_eq!(context.message_factory(), MessageFactoryKind::Reusable);
    assert_eq!(context.selection_source(), SelectionSource::Detected);
    assert!(context.status().is_empty());
}

#[test]
fn test_container_defaults_to_queue() {
    let context = context_with(PropertySource::new(), true);

    assert!(!context.recycler_factory().is_thread_local());
    assert!(context.recycler_factory().name().starts_with("queue:"));
    assert_eq!(context.message_factory(), MessageFactoryKind::Parameterized);
}

#[test]
fn test_explicit_flag_beats_detection() {
    let enabled = context_with(
        PropertySource::new().with(ENABLE_THREAD_LOCALS_PROPERTY, "true"),
        true,
    );
    assert!(enabled.recycler_factory().is_thread_local());
    assert_eq!(enabled.selection_source(), SelectionSource::ExplicitFlag);

    let disabled = context_with(
        PropertySource::new().with(ENABLE_THREAD_LOCALS_PROPERTY, "false"),
        false,
    );
    assert!(!disabled.recycler_factory().is_thread_local());
    assert_eq!(disabled.message_factory(), MessageFactoryKind::Parameterized);
}

#[test]
fn test_container_property_overrides_detector() {
    let context = context_with(PropertySource::new().with(IS_CONTAINER_PROPERTY, "true"), false);

    assert!(context.runtime().container_detected());
    assert!(!context.recycler_factory().is_thread_local());
}

#[test]
fn test_override_beats_flag_and_detection() {
    let context = context_with(
        PropertySource::new()
            .with(RECYCLER_FACTORY_PROPERTY, "queue:capacity=3")
            .with(ENABLE_THREAD_LOCALS_PROPERTY, "true"),
        false,
    );

    assert_eq!(context.recycler_factory().name(), "queue:3");
    assert_eq!(context.selection_source(), SelectionSource::Override);
    // Message kind still follows the thread-local decision.
    assert_eq!(context.message_factory(), MessageFactoryKind::Reusable);
}

#[test]
fn test_custom_factory_constructed_once() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&constructed);
    let registry = RecyclerFactoryRegistry::new().with("custom", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CustomFactory) as Arc<dyn RecyclerFactory>)
    });

    let context = LoggingContext::builder()
        .properties(PropertySource::new().with(RECYCLER_FACTORY_PROPERTY, "custom"))
        .registry(registry)
        .quiet_status()
        .build()
        .unwrap();

    let first = Arc::clone(context.recycler_factory());
    let buffers = context.recycler("buffers", Vec::<u8>::new, Vec::clear);
    let logger = context.logger("custom");
    logger.info("through the custom factory");
    let second = Arc::clone(context.recycler_factory());

    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name(), "custom");
    assert_eq!(buffers.factory_name(), "custom");
}

#[test]
fn test_unknown_factory_falls_back_to_dummy() {
    let context = context_with(
        PropertySource::new().with(RECYCLER_FACTORY_PROPERTY, "nonexistent"),
        false,
    );

    assert_eq!(context.recycler_factory().name(), "dummy");
    assert_eq!(context.selection_source(), SelectionSource::Fallback);

    // Resolution happens once, so the error is reported once.
    let _ = context.recycler_factory();
    let errors = context.status().errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, StatusLevel::Error);
    assert!(errors[0].message.contains("nonexistent"));
}

#[test]
fn test_bad_queue_capacity_falls_back_to_dummy() {
    let context = context_with(PropertySource::new().with(RECYCLER_FACTORY_PROPERTY, "queue:0"), true);

    assert_eq!(context.recycler_factory().name(), "dummy");
    assert!(context.status().errors()[0].message.contains("queue:0"));
}

#[test]
fn test_failing_custom_factory_falls_back_to_dummy() {
    let registry = RecyclerFactoryRegistry::new()
        .with("broken", |_| Err(LoggerError::other("pool backend unavailable")));

    let context = LoggingContext::builder()
        .properties(PropertySource::new().with(RECYCLER_FACTORY_PROPERTY, "broken"))
        .registry(registry)
        .quiet_status()
        .build()
        .unwrap();

    assert_eq!(context.recycler_factory().name(), "dummy");
    assert!(context.status().errors()[0]
        .message
        .contains("pool backend unavailable"));
}

#[test]
fn test_invalid_boolean_is_warned_and_ignored() {
    let context = context_with(
        PropertySource::new().with(ENABLE_THREAD_LOCALS_PROPERTY, "sometimes"),
        true,
    );

    assert!(!context.recycler_factory().is_thread_local());
    assert_eq!(context.selection_source(), SelectionSource::Detected);
    let records = context.status().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, StatusLevel::Warn);
}

#[test]
fn test_sync_logging_end_to_end() {
    let appender = MemoryAppender::new();
    let captured = appender.captured();
    let context = LoggingContext::builder()
        .min_level(LogLevel::Debug)
        .appender(appender)
        .build()
        .unwrap();
    let logger = context.logger("orders");

    info!(logger, "order {} placed by {}", 1042, "alice");
    warn!(logger, "stock low: {} left", 3);
    logger.debug("cache warm");
    logger.trace("invisible");

    let entries = captured.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].message, "order 1042 placed by alice");
    assert_eq!(entries[0].template, "order {} placed by {}");
    assert_eq!(entries[1].level, LogLevel::Warn);
    assert_eq!(entries[2].logger, "orders");
    assert_eq!(context.metrics().total_logged(), 3);
}

#[test]
fn test_messages_released_after_each_call() {
    let context = context_with(PropertySource::new().with(RECYCLER_FACTORY_PROPERTY, "queue:4"), false);
    let logger = context.logger("app");

    for i in 0..10 {
        info!(logger, "iteration {}", i);
    }

    let diagnostics = context.diagnostics();
    assert_eq!(diagnostics.messages.acquired(), 10);
    assert_eq!(diagnostics.messages.released(), 10);
    // One instance serves every sequential call.
    assert_eq!(diagnostics.messages.created, 1);
}

#[test]
fn test_message_released_when_caller_panics() {
    let context = context_with(PropertySource::new().with(RECYCLER_FACTORY_PROPERTY, "queue:4"), false);
    let logger = context.logger("app");

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        logger.with_reusable_message("request {}", &[&7], |message| {
            assert_eq!(message.formatted(), "request 7");
            panic!("handler failed");
        })
    }));
    assert!(result.is_err());

    let next = logger.with_reusable_message("request {}", &[&8], |message| {
        message.formatted().to_string()
    });
    assert_eq!(next, "request 8");

    let diagnostics = context.diagnostics();
    assert_eq!(diagnostics.messages.acquired(), diagnostics.messages.released());
    assert_eq!(diagnostics.messages.reused, 1);
}

#[test]
fn test_async_logging_drains_on_shutdown() {
    let appender = MemoryAppender::new();
    let captured = appender.captured();
    let context = LoggingContext::builder()
        .appender(appender)
        .async_mode(256)
        .overflow_policy(OverflowPolicy::Block)
        .build()
        .unwrap();
    assert!(context.is_async());

    let logger = context.logger("worker");
    for i in 0..100 {
        info!(logger, "job {} done", i);
    }

    assert!(context.shutdown(Duration::from_secs(5)));
    assert_eq!(captured.len(), 100);
    assert!(captured.contains("job 99 done"));

    // After shutdown, logging continues synchronously.
    logger.info("after shutdown");
    assert!(captured.contains("after shutdown"));
}

#[test]
fn test_flow_tracing_end_to_end() {
    let appender = MemoryAppender::new();
    let captured = appender.captured();
    let context = LoggingContext::builder()
        .min_level(LogLevel::Trace)
        .appender(appender)
        .build()
        .unwrap();
    let logger = context.logger("db");

    logger.trace_entry("query", &[&"users", &10]);
    logger.trace_exit("query", Some(&3));
    logger.trace_exit("close", None);

    assert_eq!(
        captured.messages(),
        vec!["Enter query(users, 10)", "Exit query: 3", "Exit close"]
    );
}

#[test]
fn test_loggers_share_context_message_source() {
    let properties = PropertySource::new()
        .with(IS_CONTAINER_PROPERTY, "false")
        .with(ENABLE_THREAD_LOCALS_PROPERTY, "true");
    let context = LoggingContext::builder()
        .properties(properties)
        .quiet_status()
        .build()
        .unwrap();

    let orders = context.logger("orders");
    let billing = context.logger("billing");

    assert!(Arc::ptr_eq(orders.message_source(), billing.message_source()));
    assert_eq!(orders.message_factory(), MessageFactoryKind::Reusable);
    for logger in [&orders, &billing] {
        assert!(Arc::ptr_eq(
            logger.flow_message_factory(),
            context.flow_message_factory()
        ));
    }
}

/// Argument whose formatting logs through the same logger
struct LogsWhileFormatting {
    logger: Arc<recycling_logger::core::Logger>,
}

impl std::fmt::Display for LogsWhileFormatting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.logger.info("nested");
        f.write_str("x")
    }
}

#[test]
fn test_argument_logging_while_formatted() {
    let appender = MemoryAppender::new();
    let captured = appender.captured();
    let context = LoggingContext::builder()
        .detector(FixedDetector(false))
        .appender(appender)
        .quiet_status()
        .build()
        .unwrap();
    let logger = context.logger("app");
    let arg = LogsWhileFormatting {
        logger: Arc::clone(&logger),
    };

    info!(logger, "outer arg {}", arg);

    assert_eq!(captured.messages(), vec!["nested", "outer arg x"]);
    let diagnostics = context.diagnostics();
    assert_eq!(diagnostics.messages.reentrant, 1);
    assert_eq!(diagnostics.messages.acquired(), diagnostics.messages.released());

    // The outer instance is the one kept for the thread.
    info!(logger, "plain {}", 1);
    assert_eq!(context.diagnostics().messages.reused, 1);
}

#[test]
fn test_diagnostics_report_selection() {
    let context = context_with(PropertySource::new().with(RECYCLER_FACTORY_PROPERTY, "queue:9"), true);
    let logger = context.logger("app");
    logger.info("one");

    let json: serde_json::Value =
        serde_json::from_str(&context.diagnostics().to_json().unwrap()).unwrap();

    assert_eq!(json["recycler_factory"], "queue:9");
    assert_eq!(json["selection_source"], "override");
    assert_eq!(json["message_factory"], "parameterized");
    assert_eq!(json["message_recycler"], "dummy");
    assert_eq!(json["container_detected"], true);
    assert_eq!(json["thread_locals_enabled"], false);
    assert_eq!(json["dispatch"]["total_logged"], 1);
    assert_eq!(json["status_errors"], 0);
}

#[test]
fn test_file_output_escapes_injection() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("app.log");

    let appender = WriterAppender::open(&log_file).expect("Failed to open log file");
    let context = LoggingContext::builder().appender(appender).build().unwrap();
    let logger = context.logger("auth");

    info!(logger, "login from {}", "user\nERROR [2024-10-17] forged");
    context.flush().expect("Failed to flush");

    let content = fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1, "Log should be a single line, not multiple");
    assert!(lines[0].contains("[INFO ]"));
    assert!(lines[0].contains("auth - login from user\\nERROR"));
}

#[test]
fn test_json_file_output() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("app.json");

    let appender = WriterAppender::open(&log_file)
        .expect("Failed to open log file")
        .with_layout(Layout::json());
    let context = LoggingContext::builder().appender(appender).build().unwrap();
    let logger = context.logger("billing");

    info!(logger, "invoice {} sent", 77);
    logger.warn("plain");
    context.flush().unwrap();

    let content = fs::read_to_string(&log_file).unwrap();
    let records: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is a JSON object"))
        .collect();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["message"], "invoice 77 sent");
    assert_eq!(records[0]["template"], "invoice {} sent");
    assert_eq!(records[0]["logger"], "billing");
    assert!(records[1].get("template").is_none());
}

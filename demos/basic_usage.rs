//! Basic usage example
//!
//! Demonstrates picking a recycler factory, logging through recycled
//! messages and reading back what the context resolved to.
//!
//! Run with: cargo run --example basic_usage
//!
//! Try `LOGGING_RECYCLER_FACTORY=queue:16` or `LOGGING_IS_CONTAINER=true` to
//! see the defaults change.

use recycling_logger::context::PropertySource;
use recycling_logger::prelude::*;
use recycling_logger::{debug, error, info, warn};
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Recycling Logger - Basic Usage Example ===\n");

    let context = LoggingContext::builder()
        .name("demo")
        .properties(PropertySource::from_env())
        .min_level(LogLevel::Trace)
        .appender(ConsoleAppender::new())
        .build()?;

    println!(
        "1. Resolved recycler factory: {} ({})",
        context.recycler_factory().name(),
        context.selection_source()
    );
    println!("   Message factory: {}\n", context.message_factory());

    println!("2. Logging at different levels:");
    let logger = context.logger("demo");
    debug!(logger, "Loaded {} settings", 12);
    info!(logger, "Listening on {}:{}", "0.0.0.0", 8080);
    warn!(logger, "Cache hit rate {}% is below {}%", 41, 60);
    error!(logger, "Upstream {} answered {}", "billing", 503);

    println!("\n3. Flow tracing:");
    logger.trace_entry("checkout", &[&"cart-17", &3]);
    logger.trace_exit("checkout", Some(&"ok"));

    println!("\n4. Reusing a recycler for your own buffers:");
    let buffers = context.recycler("scratch", || String::with_capacity(128), String::clear);
    for order in 0..3 {
        let mut buffer = buffers.lease();
        buffer.push_str("order-");
        buffer.push_str(&order.to_string());
        info!(logger, "Built key {}", &*buffer);
    }
    println!(
        "   scratch buffers created: {}, reused: {}",
        buffers.metrics().created(),
        buffers.metrics().reused()
    );

    println!("\n5. Async dispatch:");
    let async_context = LoggingContext::builder()
        .name("demo-async")
        .appender(ConsoleAppender::new())
        .async_mode(1024)
        .overflow_policy(OverflowPolicy::Block)
        .build()?;
    let worker = async_context.logger("worker");
    for job in 0..5 {
        info!(worker, "Job {} finished", job);
    }
    async_context.shutdown(Duration::from_secs(1));

    println!("\n6. Diagnostics:");
    println!("{}", context.diagnostics().to_json()?);

    println!("\n=== Example completed successfully! ===");

    Ok(())
}

//! Hands events to appenders, synchronously or through a worker thread

use super::{
    appender::Appender,
    error::Result,
    log_entry::{LogEntry, LogEvent},
    log_level::LogLevel,
    metrics::LoggerMetrics,
    overflow_policy::{OverflowCallback, OverflowPolicy},
};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Time a dropped context waits for the worker to drain its queue
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const BATCH_SIZE: usize = 50;
const BATCH_TIMEOUT: Duration = Duration::from_millis(10);

type Appenders = Arc<Mutex<Vec<Box<dyn Appender>>>>;

thread_local! {
    static APPENDING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running appenders until dropped
struct AppendingGuard;

impl AppendingGuard {
    /// `None` when the thread is already inside an appender
    fn enter() -> Option<Self> {
        // Thread-local storage is gone during thread teardown; let those events through.
        APPENDING
            .try_with(|flag| (!flag.replace(true)).then_some(AppendingGuard))
            .unwrap_or(Some(AppendingGuard))
    }
}

impl Drop for AppendingGuard {
    fn drop(&mut self) {
        let _ = APPENDING.try_with(|flag| flag.set(false));
    }
}

/// Async settings
#[derive(Clone)]
pub struct AsyncConfig {
    pub buffer_size: usize,
    pub overflow_policy: OverflowPolicy,
    pub on_overflow: Option<OverflowCallback>,
}

impl AsyncConfig {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            overflow_policy: OverflowPolicy::default(),
            on_overflow: None,
        }
    }
}

impl std::fmt::Debug for AsyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncConfig")
            .field("buffer_size", &self.buffer_size)
            .field("overflow_policy", &self.overflow_policy)
            .field("on_overflow", &self.on_overflow.is_some())
            .finish()
    }
}

/// Routes events to appenders
///
/// In synchronous mode appenders run on the logging thread and see the
/// borrowed event while its message is still on loan. In async mode the event
/// is copied into a [`LogEntry`] first, since the worker sees it after the
/// message has gone back to its recycler.
pub struct Dispatcher {
    appenders: Appenders,
    sender: RwLock<Option<Sender<LogEntry>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    metrics: Arc<LoggerMetrics>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    reentry_reported: AtomicBool,
}

impl Dispatcher {
    pub fn sync(appenders: Vec<Box<dyn Appender>>) -> Self {
        Self {
            appenders: Arc::new(Mutex::new(appenders)),
            sender: RwLock::new(None),
            worker: Mutex::new(None),
            metrics: Arc::new(LoggerMetrics::new()),
            overflow_policy: OverflowPolicy::default(),
            on_overflow: None,
            reentry_reported: AtomicBool::new(false),
        }
    }

    pub fn with_async(appenders: Vec<Box<dyn Appender>>, config: AsyncConfig) -> Result<Self> {
        let (sender, receiver) = bounded(config.buffer_size.max(1));
        let appenders: Appenders = Arc::new(Mutex::new(appenders));
        let metrics = Arc::new(LoggerMetrics::new());

        let worker = {
            let appenders = Arc::clone(&appenders);
            let metrics = Arc::clone(&metrics);
            thread::Builder::new()
                .name("logger-dispatch".to_string())
                .spawn(move || Self::run_worker(receiver, &appenders, &metrics))?
        };

        Ok(Self {
            appenders,
            sender: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            metrics,
            overflow_policy: config.overflow_policy,
            on_overflow: config.on_overflow,
            reentry_reported: AtomicBool::new(false),
        })
    }

    fn run_worker(receiver: Receiver<LogEntry>, appenders: &Appenders, metrics: &LoggerMetrics) {
        let mut batch = Vec::with_capacity(BATCH_SIZE);

        loop {
            match receiver.recv() {
                Ok(entry) => batch.push(entry),
                Err(_) => break,
            }

            while batch.len() < BATCH_SIZE {
                match receiver.try_recv() {
                    Ok(entry) => batch.push(entry),
                    Err(_) => break,
                }
            }

            if batch.len() < BATCH_SIZE {
                // Small batch, give producers a moment to fill it.
                thread::sleep(BATCH_TIMEOUT);
                while batch.len() < BATCH_SIZE {
                    match receiver.try_recv() {
                        Ok(entry) => batch.push(entry),
                        Err(_) => break,
                    }
                }
            }

            Self::process_batch(appenders, &batch, metrics);
            batch.clear();
        }
    }

    fn process_batch(appenders: &Appenders, batch: &[LogEntry], metrics: &LoggerMetrics) {
        let _appending = AppendingGuard::enter();
        let mut appenders = appenders.lock();
        for entry in batch {
            Self::append_all(&mut appenders, &entry.as_event(), metrics);
        }
        Self::flush_all(&mut appenders);
    }

    /// Run every appender, isolating failures and panics from each other
    fn append_all(appenders: &mut [Box<dyn Appender>], event: &LogEvent<'_>, metrics: &LoggerMetrics) {
        let mut has_error = false;

        for (idx, appender) in appenders.iter_mut().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                appender.append(event)
            }));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!("[LOGGER ERROR] Appender #{} ({}) failed: {}", idx, appender.name(), e);
                    has_error = true;
                }
                Err(panic) => {
                    eprintln!(
                        "[LOGGER CRITICAL] Appender #{} panicked: {}. \
                         Other appenders continue to function.",
                        idx,
                        panic_message(&*panic)
                    );
                    has_error = true;
                }
            }
        }

        if has_error {
            metrics.record_dropped();
        } else {
            metrics.record_logged();
        }
    }

    fn flush_all(appenders: &mut [Box<dyn Appender>]) {
        for (idx, appender) in appenders.iter_mut().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| appender.flush()));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => eprintln!("[LOGGER ERROR] Appender #{} flush failed: {}", idx, e),
                Err(panic) => eprintln!(
                    "[LOGGER CRITICAL] Appender #{} panicked during flush: {}",
                    idx,
                    panic_message(&*panic)
                ),
            }
        }
    }

    pub fn is_async(&self) -> bool {
        self.sender.read().is_some()
    }

    pub fn add_appender(&self, appender: Box<dyn Appender>) {
        self.appenders.lock().push(appender);
    }

    pub fn appender_count(&self) -> usize {
        self.appenders.lock().len()
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }

    /// Deliver one event
    ///
    /// Events logged from inside an appender, on the thread running it, are
    /// dropped: the outer call already holds the appenders.
    pub fn dispatch(&self, event: &LogEvent<'_>) {
        let Some(_appending) = AppendingGuard::enter() else {
            self.reject_reentry(event);
            return;
        };

        let guard = self.sender.read();
        if let Some(sender) = guard.as_ref() {
            match sender.try_send(event.to_entry()) {
                Ok(()) => {}
                Err(TrySendError::Full(entry)) => self.handle_overflow(sender, entry),
                Err(TrySendError::Disconnected(_)) => {
                    self.metrics.record_dropped();
                }
            }
            return;
        }
        drop(guard);

        let mut appenders = self.appenders.lock();
        Self::append_all(&mut appenders, event, &self.metrics);
    }

    fn handle_overflow(&self, sender: &Sender<LogEntry>, entry: LogEntry) {
        self.metrics.record_queue_full();

        if entry.level >= LogLevel::Error {
            self.metrics.record_critical_preserved();
            let mut appenders = self.appenders.lock();
            Self::append_all(&mut appenders, &entry.as_event(), &self.metrics);
            return;
        }

        match self.overflow_policy {
            OverflowPolicy::DropNewest => {
                self.metrics.record_dropped();
            }
            OverflowPolicy::Block => {
                self.metrics.record_block();
                if sender.send(entry).is_err() {
                    self.metrics.record_dropped();
                }
            }
            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.metrics.record_block();
                match sender.send_timeout(entry, timeout) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(_)) => self.alert_and_drop(),
                    Err(SendTimeoutError::Disconnected(_)) => {
                        self.metrics.record_dropped();
                    }
                }
            }
            OverflowPolicy::AlertAndDrop => self.alert_and_drop(),
        }
    }

    fn reject_reentry(&self, event: &LogEvent<'_>) {
        self.metrics.record_dropped();
        if !self.reentry_reported.swap(true, Ordering::Relaxed) {
            eprintln!(
                "[LOGGER WARNING] Recursive call from an appender dropped (logger '{}'). \
                 Further recursive calls are dropped silently.",
                event.logger
            );
        }
    }

    fn alert_and_drop(&self) {
        let dropped = self.metrics.record_dropped() + 1;

        // Alert on the first drop and every thousandth after.
        if dropped == 1 || dropped % 1000 == 0 {
            eprintln!(
                "[LOGGER WARNING] Queue full, {} logs dropped. \
                 Consider increasing buffer size or using a different overflow policy.",
                dropped
            );
            if let Some(ref callback) = self.on_overflow {
                callback(dropped);
            }
        }
    }

    pub fn flush(&self) -> Result<()> {
        let mut appenders = self.appenders.lock();
        for appender in appenders.iter_mut() {
            appender.flush()?;
        }
        Ok(())
    }

    /// Stop the worker after it drained the queue, then flush
    ///
    /// Returns `false` when the worker did not finish within `timeout` or a
    /// flush failed. Events dispatched afterwards are written synchronously.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        drop(self.sender.write().take());

        if let Some(handle) = self.worker.lock().take() {
            let start = Instant::now();
            loop {
                if handle.is_finished() {
                    if let Err(e) = handle.join() {
                        eprintln!(
                            "[LOGGER ERROR] Async worker thread panicked during shutdown: {}",
                            panic_message(&*e)
                        );
                        return false;
                    }
                    break;
                }

                if start.elapsed() >= timeout {
                    eprintln!(
                        "[LOGGER WARNING] Async worker thread did not finish within {:?}. \
                         Some logs may be lost.",
                        timeout
                    );
                    return false;
                }

                thread::sleep(Duration::from_millis(5));
            }
        }

        if let Err(e) = self.flush() {
            eprintln!("[LOGGER ERROR] Failed to flush during shutdown: {}", e);
            return false;
        }
        true
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger shutting down with {} dropped logs (drop rate: {:.2}%)",
                dropped,
                self.metrics.drop_rate()
            );
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("async", &self.is_async())
            .field("appenders", &self.appender_count())
            .field("overflow_policy", &self.overflow_policy)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

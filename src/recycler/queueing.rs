//! Bounded shared-pool recycling strategy
//!
//! Free instances sit in a lock-free bounded queue. Acquire pops one or
//! constructs; release pushes back, and when the queue is already full the
//! instance is dropped. Nothing ever waits on pool capacity.

use super::{Constructor, Erased, Recycler, RecyclerFactory, RecyclerMetrics, Reset};
use crate::core::{LoggerError, Result};
use crossbeam_queue::ArrayQueue;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Pool size used when no capacity is configured:
/// `max(2 * available_parallelism + 1, 8)`
pub fn default_queue_capacity() -> NonZeroUsize {
    let cpus = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    NonZeroUsize::new((2 * cpus + 1).max(8)).unwrap_or(NonZeroUsize::MIN)
}

/// Recycler backed by a bounded concurrent queue
pub struct QueueingRecycler<T> {
    queue: ArrayQueue<T>,
    constructor: Constructor<T>,
    reset: Reset<T>,
    metrics: RecyclerMetrics,
}

impl<T> QueueingRecycler<T> {
    pub fn new(capacity: NonZeroUsize, constructor: Constructor<T>, reset: Reset<T>) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.get()),
            constructor,
            reset,
            metrics: RecyclerMetrics::new(),
        }
    }

    /// Maximum number of instances retained
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Number of free instances currently retained
    pub fn pooled(&self) -> usize {
        self.queue.len()
    }
}

impl<T: Send> Recycler<T> for QueueingRecycler<T> {
    #[inline]
    fn acquire(&self) -> T {
        match self.queue.pop() {
            Some(mut value) => {
                (self.reset)(&mut value);
                self.metrics.record_reused();
                value
            }
            None => {
                self.metrics.record_created();
                (self.constructor)()
            }
        }
    }

    #[inline]
    fn release(&self, value: T) {
        match self.queue.push(value) {
            Ok(()) => {
                self.metrics.record_retained();
            }
            Err(overflow) => {
                self.metrics.record_discarded();
                drop(overflow);
            }
        }
    }

    fn metrics(&self) -> &RecyclerMetrics {
        &self.metrics
    }
}

impl<T> fmt::Debug for QueueingRecycler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueingRecycler")
            .field("capacity", &self.queue.capacity())
            .field("pooled", &self.queue.len())
            .field("metrics", &self.metrics)
            .finish()
    }
}

/// Factory for [`QueueingRecycler`]s of a fixed capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueingRecyclerFactory {
    capacity: NonZeroUsize,
}

impl QueueingRecyclerFactory {
    pub const NAME: &'static str = "queue";

    pub fn new(capacity: NonZeroUsize) -> Self {
        Self { capacity }
    }

    /// Build from a configuration argument: `None`, `"<n>"` or `"capacity=<n>"`
    pub fn parse(argument: Option<&str>) -> Result<Self> {
        let Some(argument) = argument.map(str::trim).filter(|a| !a.is_empty()) else {
            return Ok(Self::default());
        };

        let raw = match argument.split_once('=') {
            Some((key, value)) if key.trim() == "capacity" => value.trim(),
            Some((key, _)) => {
                return Err(LoggerError::config(
                    Self::NAME,
                    format!("unknown parameter '{}'", key.trim()),
                ))
            }
            None => argument,
        };

        raw.parse::<NonZeroUsize>()
            .map(Self::new)
            .map_err(|_| LoggerError::queue_capacity(raw))
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Typed recycler without erasure
    pub fn recycler<T, C, R>(&self, constructor: C, reset: R) -> QueueingRecycler<T>
    where
        T: Send + 'static,
        C: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        QueueingRecycler::new(self.capacity, Arc::new(constructor), Arc::new(reset))
    }
}

impl Default for QueueingRecyclerFactory {
    fn default() -> Self {
        Self::new(default_queue_capacity())
    }
}

impl RecyclerFactory for QueueingRecyclerFactory {
    fn name(&self) -> String {
        format!("{}:{}", Self::NAME, self.capacity)
    }

    fn create_erased(
        &self,
        constructor: Constructor<Erased>,
        reset: Reset<Erased>,
    ) -> Arc<dyn Recycler<Erased>> {
        Arc::new(QueueingRecycler::new(self.capacity, constructor, reset))
    }
}

//! Non-pooling strategy
//!
//! Every acquire constructs, every release drops. Used wherever pooling is
//! disabled and as the fallback for misconfigured factories.

use super::{Constructor, Erased, Recycler, RecyclerFactory, RecyclerMetrics, Reset};
use std::fmt;
use std::sync::Arc;

pub struct DummyRecycler<T> {
    constructor: Constructor<T>,
    metrics: RecyclerMetrics,
}

impl<T> DummyRecycler<T> {
    /// `reset` is accepted for signature parity; fresh instances never need it.
    pub fn new(constructor: Constructor<T>, _reset: Reset<T>) -> Self {
        Self {
            constructor,
            metrics: RecyclerMetrics::new(),
        }
    }
}

impl<T: Send> Recycler<T> for DummyRecycler<T> {
    #[inline]
    fn acquire(&self) -> T {
        self.metrics.record_created();
        (self.constructor)()
    }

    #[inline]
    fn release(&self, value: T) {
        self.metrics.record_discarded();
        drop(value);
    }

    fn metrics(&self) -> &RecyclerMetrics {
        &self.metrics
    }
}

impl<T> fmt::Debug for DummyRecycler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyRecycler")
            .field("metrics", &self.metrics)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DummyRecyclerFactory;

impl DummyRecyclerFactory {
    pub const NAME: &'static str = "dummy";

    pub fn recycler<T, C>(&self, constructor: C) -> DummyRecycler<T>
    where
        T: Send + 'static,
        C: Fn() -> T + Send + Sync + 'static,
    {
        DummyRecycler::new(Arc::new(constructor), Arc::new(|_: &mut T| {}))
    }
}

impl RecyclerFactory for DummyRecyclerFactory {
    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn create_erased(
        &self,
        constructor: Constructor<Erased>,
        reset: Reset<Erased>,
    ) -> Arc<dyn Recycler<Erased>> {
        Arc::new(DummyRecycler::new(constructor, reset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_acquire_is_distinct() {
        let recycler = DummyRecyclerFactory.recycler(|| Box::new(0u64));

        let held: Vec<Box<u64>> = (0..16).map(|_| recycler.acquire()).collect();
        let addresses: HashSet<usize> = held.iter().map(|b| &**b as *const u64 as usize).collect();
        assert_eq!(addresses.len(), 16);

        for value in held {
            recycler.release(value);
        }
        assert_eq!(recycler.metrics().created(), 16);
        assert_eq!(recycler.metrics().discarded(), 16);
        assert_eq!(recycler.metrics().retained(), 0);
    }

    #[test]
    fn test_release_does_not_retain() {
        let recycler = DummyRecyclerFactory.recycler(String::new);

        let mut value = recycler.acquire();
        value.push_str("dropped");
        recycler.release(value);

        assert!(recycler.acquire().is_empty());
        assert_eq!(recycler.metrics().reused(), 0);
    }
}

//! Thread-local recycling strategy
//!
//! Each recycler keeps at most one instance per thread. Slots live in a
//! per-thread map keyed by recycler id, so any number of recyclers (of any
//! element type) can share the same thread-local storage.
//!
//! A slot counts outstanding loans. Only the outermost loan on a thread gets
//! the thread's own instance; a nested acquire (a log call made while another
//! one is formatting on the same thread) gets a transient instance that is
//! dropped on release.

use super::{Constructor, Erased, Recycler, RecyclerFactory, RecyclerMetrics, Reset};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_RECYCLER_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static SLOTS: RefCell<HashMap<u64, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

struct ThreadSlot<T> {
    value: Option<T>,
    outstanding: usize,
}

enum Checkout<T> {
    /// The thread's own instance, needs a reset
    Owned(T),
    /// First acquire on this thread
    First,
    /// The thread's instance is already on loan
    Nested,
    /// Thread-local storage is being torn down
    Unavailable,
}

/// Recycler keeping one instance per calling thread
pub struct ThreadLocalRecycler<T> {
    id: u64,
    constructor: Constructor<T>,
    reset: Reset<T>,
    metrics: RecyclerMetrics,
}

impl<T: 'static> ThreadLocalRecycler<T> {
    pub fn new(constructor: Constructor<T>, reset: Reset<T>) -> Self {
        Self {
            id: NEXT_RECYCLER_ID.fetch_add(1, Ordering::Relaxed),
            constructor,
            reset,
            metrics: RecyclerMetrics::new(),
        }
    }

    fn checkout(&self) -> Checkout<T> {
        let result = SLOTS.try_with(|slots| {
            let mut slots = slots.borrow_mut();
            let slot = slots
                .entry(self.id)
                .or_insert_with(|| {
                    Box::new(ThreadSlot::<T> {
                        value: None,
                        outstanding: 0,
                    })
                })
                .downcast_mut::<ThreadSlot<T>>();

            match slot {
                Some(slot) => {
                    slot.outstanding += 1;
                    if slot.outstanding > 1 {
                        return Checkout::Nested;
                    }
                    match slot.value.take() {
                        Some(value) => Checkout::Owned(value),
                        None => Checkout::First,
                    }
                }
                None => Checkout::Unavailable,
            }
        });

        result.unwrap_or(Checkout::Unavailable)
    }

    /// Put `value` back into the thread slot, handing it back if the slot
    /// cannot take it.
    fn checkin(&self, value: T) -> Option<T> {
        let mut value = Some(value);
        let _ = SLOTS.try_with(|slots| {
            let mut slots = slots.borrow_mut();
            let Some(slot) = slots
                .get_mut(&self.id)
                .and_then(|slot| slot.downcast_mut::<ThreadSlot<T>>())
            else {
                return;
            };

            slot.outstanding = slot.outstanding.saturating_sub(1);
            if slot.outstanding == 0 && slot.value.is_none() {
                slot.value = value.take();
            }
        });
        value
    }

    /// Undo a checkout whose value never reached the caller
    fn abandon(&self) {
        let _ = SLOTS.try_with(|slots| {
            let mut slots = slots.borrow_mut();
            if let Some(slot) = slots
                .get_mut(&self.id)
                .and_then(|slot| slot.downcast_mut::<ThreadSlot<T>>())
            {
                slot.outstanding = slot.outstanding.saturating_sub(1);
            }
        });
    }

    /// Whether the calling thread currently holds a pooled instance
    pub fn has_thread_instance(&self) -> bool {
        SLOTS
            .try_with(|slots| {
                slots
                    .borrow()
                    .get(&self.id)
                    .and_then(|slot| slot.downcast_ref::<ThreadSlot<T>>())
                    .is_some_and(|slot| slot.value.is_some())
            })
            .unwrap_or(false)
    }
}

/// Abandons the checkout if reset or construction unwinds
struct CheckoutGuard<'a, T: 'static> {
    recycler: &'a ThreadLocalRecycler<T>,
    armed: bool,
}

impl<T: 'static> Drop for CheckoutGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.recycler.abandon();
        }
    }
}

impl<T: Send + 'static> Recycler<T> for ThreadLocalRecycler<T> {
    fn acquire(&self) -> T {
        let checkout = self.checkout();
        let mut guard = CheckoutGuard {
            recycler: self,
            armed: !matches!(checkout, Checkout::Unavailable),
        };

        let value = match checkout {
            Checkout::Owned(mut value) => {
                (self.reset)(&mut value);
                self.metrics.record_reused();
                value
            }
            Checkout::Nested => {
                self.metrics.record_reentrant();
                self.metrics.record_created();
                (self.constructor)()
            }
            Checkout::First | Checkout::Unavailable => {
                self.metrics.record_created();
                (self.constructor)()
            }
        };

        guard.armed = false;
        value
    }

    fn release(&self, value: T) {
        match self.checkin(value) {
            None => {
                self.metrics.record_retained();
            }
            Some(rejected) => {
                self.metrics.record_discarded();
                drop(rejected);
            }
        }
    }

    fn metrics(&self) -> &RecyclerMetrics {
        &self.metrics
    }
}

impl<T> Drop for ThreadLocalRecycler<T> {
    fn drop(&mut self) {
        // Slots on other threads go away when those threads exit.
        let removed = SLOTS
            .try_with(|slots| slots.borrow_mut().remove(&self.id))
            .ok()
            .flatten();
        drop(removed);
    }
}

impl<T> fmt::Debug for ThreadLocalRecycler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadLocalRecycler")
            .field("id", &self.id)
            .field("metrics", &self.metrics)
            .finish()
    }
}

/// Factory for [`ThreadLocalRecycler`]s
///
/// Fastest option for standalone processes. In hosts that own long-lived
/// thread pools the per-thread instances outlive the logging context, which
/// is why the environment selector avoids it there.
///
/// Dropping a recycler only clears the dropping thread's slot. Every other
/// thread that used it keeps a slot, with its last instance, until that
/// thread exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLocalRecyclerFactory;

impl ThreadLocalRecyclerFactory {
    pub const NAME: &'static str = "threadlocal";

    /// Typed recycler without erasure
    pub fn recycler<T, C, R>(&self, constructor: C, reset: R) -> ThreadLocalRecycler<T>
    where
        T: Send + 'static,
        C: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        ThreadLocalRecycler::new(Arc::new(constructor), Arc::new(reset))
    }
}

impl RecyclerFactory for ThreadLocalRecyclerFactory {
    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn is_thread_local(&self) -> bool {
        true
    }

    fn create_erased(
        &self,
        constructor: Constructor<Erased>,
        reset: Reset<Erased>,
    ) -> Arc<dyn Recycler<Erased>> {
        Arc::new(ThreadLocalRecycler::new(constructor, reset))
    }
}

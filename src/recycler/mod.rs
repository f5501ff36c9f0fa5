//! Object recycling for the garbage-free logging path
//!
//! A [`Recycler`] lends mutable instances to callers and takes them back, so
//! hot paths can reuse buffers instead of allocating per call. Recyclers are
//! produced by a [`RecyclerFactory`], the pluggable strategy:
//!
//! - [`ThreadLocalRecyclerFactory`]: one instance per thread per recycler
//! - [`QueueingRecyclerFactory`]: a bounded pool shared by all threads
//! - [`DummyRecyclerFactory`]: no pooling at all
//!
//! Factories are object safe so they can be picked by name at runtime
//! (see [`RecyclerFactoryRegistry`]). They work on type-erased values; use
//! [`dyn RecyclerFactory::create`](trait.RecyclerFactory.html#method.create) to
//! get a [`TypedRecycler`] back.
//!
//! # Example
//!
//! ```
//! use recycling_logger::recycler::{QueueingRecyclerFactory, RecyclerFactory};
//! use std::sync::Arc;
//!
//! let factory: Arc<dyn RecyclerFactory> = Arc::new(QueueingRecyclerFactory::default());
//! let buffers = factory.create(|| Vec::<u8>::with_capacity(256), |buf: &mut Vec<u8>| buf.clear());
//!
//! {
//!     let mut buf = buffers.lease();
//!     buf.extend_from_slice(b"hello");
//! } // returned to the pool here
//!
//! assert!(buffers.lease().is_empty());
//! ```

mod dummy;
mod metrics;
mod queueing;
mod registry;
mod thread_local;

pub use dummy::{DummyRecycler, DummyRecyclerFactory};
pub use metrics::{RecyclerMetrics, RecyclerMetricsSnapshot};
pub use queueing::{default_queue_capacity, QueueingRecycler, QueueingRecyclerFactory};
pub use registry::{FactoryConstructor, RecyclerFactoryRegistry};
pub use thread_local::{ThreadLocalRecycler, ThreadLocalRecyclerFactory};

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Builds a new instance of `T`
pub type Constructor<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Restores an instance to its freshly-constructed state
pub type Reset<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// Type-erased value handled by factories
pub type Erased = Box<dyn Any + Send>;

/// Lends and reclaims instances of `T`
///
/// `acquire` never fails: when nothing can be reused it constructs a new
/// instance. Every instance handed out has been reset. `release` consumes the
/// instance; the caller must not keep anything borrowed from it.
pub trait Recycler<T>: Send + Sync {
    fn acquire(&self) -> T;

    fn release(&self, value: T);

    fn metrics(&self) -> &RecyclerMetrics;
}

/// Strategy producing recyclers
pub trait RecyclerFactory: Send + Sync + fmt::Debug {
    /// Identifier this factory answers to in configuration, e.g. `queue:17`
    fn name(&self) -> String;

    /// Whether recyclers keep per-thread state
    fn is_thread_local(&self) -> bool {
        false
    }

    fn create_erased(
        &self,
        constructor: Constructor<Erased>,
        reset: Reset<Erased>,
    ) -> Arc<dyn Recycler<Erased>>;
}

impl dyn RecyclerFactory {
    /// Create a typed recycler from this factory
    pub fn create<T, C, R>(&self, constructor: C, reset: R) -> TypedRecycler<T>
    where
        T: Send + 'static,
        C: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        let constructor: Constructor<T> = Arc::new(constructor);

        let erased_constructor: Constructor<Erased> = {
            let constructor = Arc::clone(&constructor);
            Arc::new(move || Box::new(constructor()) as Erased)
        };
        let erased_reset: Reset<Erased> = Arc::new(move |value: &mut Erased| {
            if let Some(value) = value.downcast_mut::<T>() {
                reset(value);
            }
        });

        TypedRecycler {
            inner: self.create_erased(erased_constructor, erased_reset),
            constructor,
            factory: self.name(),
            _marker: PhantomData,
        }
    }
}

/// Typed view over a recycler produced by a [`RecyclerFactory`]
///
/// Instances are boxed so that handing them out and taking them back only
/// moves a pointer; the box itself is what gets recycled.
pub struct TypedRecycler<T> {
    inner: Arc<dyn Recycler<Erased>>,
    constructor: Constructor<T>,
    factory: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> TypedRecycler<T> {
    #[inline]
    pub fn acquire(&self) -> Box<T> {
        match self.inner.acquire().downcast::<T>() {
            Ok(value) => value,
            // A custom factory handed out something else; never fail the caller.
            Err(_) => Box::new((self.constructor)()),
        }
    }

    #[inline]
    pub fn release(&self, value: Box<T>) {
        self.inner.release(value);
    }

    /// Acquire an instance that goes back to the recycler when dropped
    #[inline]
    pub fn lease(&self) -> Loan<'_, T> {
        Loan {
            recycler: self,
            value: Some(self.acquire()),
        }
    }

    pub fn metrics(&self) -> &RecyclerMetrics {
        self.inner.metrics()
    }

    /// Name of the factory this recycler came from
    pub fn factory_name(&self) -> &str {
        &self.factory
    }
}

impl<T: Send + 'static> Recycler<Box<T>> for TypedRecycler<T> {
    fn acquire(&self) -> Box<T> {
        TypedRecycler::acquire(self)
    }

    fn release(&self, value: Box<T>) {
        TypedRecycler::release(self, value);
    }

    fn metrics(&self) -> &RecyclerMetrics {
        self.inner.metrics()
    }
}

impl<T> fmt::Debug for TypedRecycler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedRecycler")
            .field("factory", &self.factory)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// Exclusive loan of a recycled instance
///
/// Dereferences to the instance and releases it on drop, including when the
/// holder unwinds.
pub struct Loan<'a, T: Send + 'static> {
    recycler: &'a TypedRecycler<T>,
    value: Option<Box<T>>,
}

impl<T: Send + 'static> Deref for Loan<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_deref().expect("loan holds its value until dropped")
    }
}

impl<T: Send + 'static> DerefMut for Loan<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value
            .as_deref_mut()
            .expect("loan holds its value until dropped")
    }
}

impl<T: Send + 'static> Drop for Loan<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.recycler.release(value);
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for Loan<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Loan").field(&self.value).finish()
    }
}

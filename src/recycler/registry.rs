//! Name-to-factory registry
//!
//! Configuration names a recycler factory with an identifier such as
//! `threadlocal`, `dummy`, `queue` or `queue:64`. The part before the first
//! `:` selects a registered constructor; the rest is passed to it as its
//! argument. Custom strategies register their own names.

use super::{DummyRecyclerFactory, QueueingRecyclerFactory, RecyclerFactory, ThreadLocalRecyclerFactory};
use crate::core::{LoggerError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a factory from the identifier's optional argument
pub type FactoryConstructor =
    Arc<dyn Fn(Option<&str>) -> Result<Arc<dyn RecyclerFactory>> + Send + Sync>;

#[derive(Clone)]
pub struct RecyclerFactoryRegistry {
    constructors: HashMap<String, FactoryConstructor>,
}

impl RecyclerFactoryRegistry {
    /// Registry without any entries
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the built-in strategies
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(ThreadLocalRecyclerFactory::NAME, |argument| {
            reject_argument(ThreadLocalRecyclerFactory::NAME, argument)?;
            Ok(Arc::new(ThreadLocalRecyclerFactory) as Arc<dyn RecyclerFactory>)
        });
        registry.register(DummyRecyclerFactory::NAME, |argument| {
            reject_argument(DummyRecyclerFactory::NAME, argument)?;
            Ok(Arc::new(DummyRecyclerFactory) as Arc<dyn RecyclerFactory>)
        });
        registry.register(QueueingRecyclerFactory::NAME, |argument| {
            Ok(Arc::new(QueueingRecyclerFactory::parse(argument)?) as Arc<dyn RecyclerFactory>)
        });
        registry
    }

    /// Register `constructor` under `name`, replacing any previous entry
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(Option<&str>) -> Result<Arc<dyn RecyclerFactory>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Builder-style [`register`](Self::register)
    #[must_use = "builder methods return a new value"]
    pub fn with<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(Option<&str>) -> Result<Arc<dyn RecyclerFactory>> + Send + Sync + 'static,
    {
        self.register(name, constructor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve an identifier into a new factory instance
    ///
    /// Every call runs the registered constructor once.
    pub fn resolve(&self, identifier: &str) -> Result<Arc<dyn RecyclerFactory>> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(LoggerError::config("recycler factory", "empty identifier"));
        }

        let (name, argument) = match identifier.split_once(':') {
            Some((name, argument)) => (name.trim(), Some(argument.trim())),
            None => (identifier, None),
        };

        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| LoggerError::unknown_factory(identifier, self.constructors.keys()))?;
        constructor(argument)
    }
}

impl Default for RecyclerFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecyclerFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecyclerFactoryRegistry")
            .field("names", &self.names())
            .finish()
    }
}

fn reject_argument(name: &str, argument: Option<&str>) -> Result<()> {
    match argument {
        Some(argument) if !argument.is_empty() => Err(LoggerError::config(
            name,
            format!("takes no arguments, got '{}'", argument),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builtin_names() {
        let registry = RecyclerFactoryRegistry::new();
        assert_eq!(registry.names(), vec!["dummy", "queue", "threadlocal"]);
    }

    #[test]
    fn test_resolve_builtins() {
        let registry = RecyclerFactoryRegistry::new();

        assert_eq!(registry.resolve("threadlocal").unwrap().name(), "threadlocal");
        assert!(registry.resolve("threadlocal").unwrap().is_thread_local());
        assert_eq!(registry.resolve(" dummy ").unwrap().name(), "dummy");
        assert_eq!(registry.resolve("queue:12").unwrap().name(), "queue:12");
        assert_eq!(registry.resolve("queue:capacity=3").unwrap().name(), "queue:3");
        assert!(registry.resolve("queue").unwrap().name().starts_with("queue:"));
    }

    #[test]
    fn test_resolve_errors() {
        let registry = RecyclerFactoryRegistry::new();

        assert!(matches!(
            registry.resolve("pooled"),
            Err(LoggerError::UnknownRecyclerFactory { .. })
        ));
        assert!(matches!(
            registry.resolve(""),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            registry.resolve("dummy:5"),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            registry.resolve("queue:-2"),
            Err(LoggerError::InvalidQueueCapacity { .. })
        ));
    }

    #[test]
    fn test_custom_factory_constructed_per_resolve() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = RecyclerFactoryRegistry::new().with("counting", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(DummyRecyclerFactory) as Arc<dyn RecyclerFactory>)
        });

        registry.resolve("counting").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.contains("counting"));
    }

    #[test]
    fn test_custom_factory_receives_argument() {
        let registry = RecyclerFactoryRegistry::empty().with("sized", |argument| {
            let capacity = argument.unwrap_or("1");
            QueueingRecyclerFactory::parse(Some(capacity))
                .map(|f| Arc::new(f) as Arc<dyn RecyclerFactory>)
        });

        assert_eq!(registry.resolve("sized:9").unwrap().name(), "queue:9");
        assert_eq!(registry.resolve("sized").unwrap().name(), "queue:1");
    }
}

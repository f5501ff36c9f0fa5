//! Runtime signals and default recycler selection
//!
//! A [`RuntimeContext`] captures, once per logging context, the three inputs
//! that decide which recycling strategy is used when nothing is configured
//! explicitly: a factory override, a thread-local override and whether the
//! process runs inside a container that owns its thread pools.

use super::StatusLogger;
use crate::message::MessageFactoryKind;
use crate::recycler::{
    DummyRecyclerFactory, QueueingRecyclerFactory, RecyclerFactory, RecyclerFactoryRegistry,
    ThreadLocalRecyclerFactory,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const RECYCLER_FACTORY_PROPERTY: &str = "logging.recyclerFactory";
pub const ENABLE_THREAD_LOCALS_PROPERTY: &str = "logging.enableThreadLocals";
pub const IS_CONTAINER_PROPERTY: &str = "logging.isContainer";

/// Properties [`PropertySource::from_env`] looks up
pub const KNOWN_PROPERTIES: [&str; 3] = [
    RECYCLER_FACTORY_PROPERTY,
    ENABLE_THREAD_LOCALS_PROPERTY,
    IS_CONTAINER_PROPERTY,
];

/// String key/value configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySource {
    values: HashMap<String, String>,
}

impl PropertySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Read the known properties from their environment variables
    ///
    /// `logging.recyclerFactory` is read from `LOGGING_RECYCLER_FACTORY`, and
    /// so on.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the known properties through `lookup`, keyed by variable name
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let values = KNOWN_PROPERTIES
            .iter()
            .filter_map(|key| lookup(&env_var_name(key)).map(|value| (key.to_string(), value)))
            .collect();
        Self { values }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Value of `key`, trimmed; blank values count as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Environment variable holding a property: `logging.isContainer` becomes
/// `LOGGING_IS_CONTAINER`
pub fn env_var_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        match c {
            '.' | '-' => name.push('_'),
            c if c.is_ascii_uppercase() => {
                if !name.is_empty() && !name.ends_with('_') {
                    name.push('_');
                }
                name.push(c);
            }
            c => name.push(c.to_ascii_uppercase()),
        }
    }
    name
}

/// Best-effort guess whether the process runs inside a container that owns
/// its threads
pub trait ContainerDetector: Send + Sync {
    fn is_container(&self) -> bool;
}

/// Detector for plain processes; never reports a container
#[derive(Debug, Clone, Copy, Default)]
pub struct StandaloneDetector;

impl ContainerDetector for StandaloneDetector {
    fn is_container(&self) -> bool {
        false
    }
}

/// Detector with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct FixedDetector(pub bool);

impl ContainerDetector for FixedDetector {
    fn is_container(&self) -> bool {
        self.0
    }
}

impl<F> ContainerDetector for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_container(&self) -> bool {
        self()
    }
}

/// Signals read once when a logging context first needs its defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeContext {
    thread_locals_override: Option<bool>,
    container_detected: bool,
    factory_override: Option<String>,
}

impl RuntimeContext {
    pub fn new(
        thread_locals_override: Option<bool>,
        container_detected: bool,
        factory_override: Option<String>,
    ) -> Self {
        Self {
            thread_locals_override,
            container_detected,
            factory_override,
        }
    }

    /// Build from configuration and a detector
    ///
    /// The detector only runs when `logging.isContainer` is not set.
    /// Unparseable booleans are reported to `status` and treated as unset.
    pub fn resolve(
        properties: &PropertySource,
        detector: &dyn ContainerDetector,
        status: &StatusLogger,
    ) -> Self {
        let thread_locals_override = read_flag(properties, ENABLE_THREAD_LOCALS_PROPERTY, status);
        let container_detected = read_flag(properties, IS_CONTAINER_PROPERTY, status)
            .unwrap_or_else(|| detector.is_container());
        let factory_override = properties.get(RECYCLER_FACTORY_PROPERTY).map(str::to_string);

        Self::new(thread_locals_override, container_detected, factory_override)
    }

    pub fn thread_locals_override(&self) -> Option<bool> {
        self.thread_locals_override
    }

    pub fn container_detected(&self) -> bool {
        self.container_detected
    }

    pub fn factory_override(&self) -> Option<&str> {
        self.factory_override.as_deref()
    }

    /// An explicit flag wins over detection
    pub fn thread_locals_enabled(&self) -> bool {
        self.thread_locals_override.unwrap_or(!self.container_detected)
    }
}

fn read_flag(properties: &PropertySource, key: &str, status: &StatusLogger) -> Option<bool> {
    let raw = properties.get(key)?;
    match parse_bool(raw) {
        Some(value) => Some(value),
        None => {
            status.warn(format!(
                "Property {} has invalid boolean value '{}', ignoring it",
                key, raw
            ));
            None
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Which signal decided the default factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// `logging.recyclerFactory` named a factory
    Override,
    /// `logging.recyclerFactory` could not be resolved
    Fallback,
    /// `logging.enableThreadLocals` was set
    ExplicitFlag,
    /// Container detection decided
    Detected,
}

impl fmt::Display for SelectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectionSource::Override => "override",
            SelectionSource::Fallback => "fallback",
            SelectionSource::ExplicitFlag => "explicit_flag",
            SelectionSource::Detected => "detected",
        };
        f.write_str(name)
    }
}

/// Outcome of default selection
#[derive(Debug, Clone)]
pub struct DefaultSelection {
    pub factory: Arc<dyn RecyclerFactory>,
    pub message_factory: MessageFactoryKind,
    pub source: SelectionSource,
}

/// Picks the default recycler factory for a [`RuntimeContext`]
///
/// First match wins:
/// 1. a factory override, resolved through the registry
/// 2. an explicit thread-local flag
/// 3. container detection
///
/// The message factory kind follows the thread-local decision alone.
#[derive(Debug, Clone, Copy)]
pub struct EnvironmentDefaultSelector<'a> {
    registry: &'a RecyclerFactoryRegistry,
    status: &'a StatusLogger,
}

impl<'a> EnvironmentDefaultSelector<'a> {
    pub fn new(registry: &'a RecyclerFactoryRegistry, status: &'a StatusLogger) -> Self {
        Self { registry, status }
    }

    pub fn select(&self, runtime: &RuntimeContext) -> DefaultSelection {
        let thread_locals = runtime.thread_locals_enabled();
        let message_factory = if thread_locals {
            MessageFactoryKind::Reusable
        } else {
            MessageFactoryKind::Parameterized
        };

        if let Some(identifier) = runtime.factory_override() {
            let (factory, source) = match self.registry.resolve(identifier) {
                Ok(factory) => (factory, SelectionSource::Override),
                Err(e) => {
                    self.status.error(format!(
                        "Cannot use recycler factory '{}': {}; falling back to {} recycler factory",
                        identifier,
                        e,
                        DummyRecyclerFactory::NAME
                    ));
                    (
                        Arc::new(DummyRecyclerFactory) as Arc<dyn RecyclerFactory>,
                        SelectionSource::Fallback,
                    )
                }
            };
            return DefaultSelection {
                factory,
                message_factory,
                source,
            };
        }

        let source = if runtime.thread_locals_override().is_some() {
            SelectionSource::ExplicitFlag
        } else {
            SelectionSource::Detected
        };
        let factory: Arc<dyn RecyclerFactory> = if thread_locals {
            Arc::new(ThreadLocalRecyclerFactory)
        } else {
            Arc::new(QueueingRecyclerFactory::default())
        };

        DefaultSelection {
            factory,
            message_factory,
            source,
        }
    }
}

//! Error types for the logger system

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// No recycler factory is registered under the requested name
    #[error("Unknown recycler factory '{identifier}' (known: {known})")]
    UnknownRecyclerFactory { identifier: String, known: String },

    /// Queue capacity that is not a positive integer
    #[error("Invalid queue capacity '{value}': expected a positive integer")]
    InvalidQueueCapacity { value: String },

    /// Failure reported by a custom recycler factory
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an unknown recycler factory error listing the registered names
    pub fn unknown_factory<I, S>(identifier: impl Into<String>, known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = known.into_iter().map(|s| s.as_ref().to_string()).collect();
        names.sort();
        LoggerError::UnknownRecyclerFactory {
            identifier: identifier.into(),
            known: names.join(", "),
        }
    }

    /// Create an invalid queue capacity error
    pub fn queue_capacity(value: impl Into<String>) -> Self {
        LoggerError::InvalidQueueCapacity {
            value: value.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }
}

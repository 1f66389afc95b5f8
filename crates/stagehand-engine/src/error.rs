//! Error types for the routing engine.
//!
//! Only setup-time failures surface as `Err`; once the engine is running,
//! failures are logged or counted and the offending event is dropped.

use thiserror::Error;

/// Error type for engine construction and control operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("unknown backend: {0}")]
    InvalidBackendName(String),

    #[error("invalid port pattern '{pattern}': {source}")]
    BadRegex {
        pattern: String,
        source: regex::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("no scenes defined")]
    NoScenes,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a user callback.
///
/// A synchronous callback returning this drops the event it was invoked
/// with; an asynchronous one is logged and ignored.
#[derive(Error, Debug)]
#[error("user callback failed: {0}")]
pub struct CallbackError(pub String);

impl From<String> for CallbackError {
    fn from(msg: String) -> Self {
        CallbackError(msg)
    }
}

impl From<&str> for CallbackError {
    fn from(msg: &str) -> Self {
        CallbackError(msg.to_string())
    }
}

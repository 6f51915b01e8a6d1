//! Routing error types.

use std::io;
use thiserror::Error;

/// Errors surfaced by a route operation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Broken or incomplete configuration: missing file, missing required
    /// field, unknown backend type. Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Every candidate backend failed its readiness probe (or the route
    /// deadline elapsed before one succeeded).
    #[error("no configured backend is available")]
    BackendUnavailable,

    /// The write itself failed after a successful `prepare`. Terminal for
    /// the route operation; the next candidate is not attempted.
    #[error("store failed on backend '{backend}': {source}")]
    StoreFailure {
        /// Name of the backend whose write failed
        backend: String,
        #[source]
        source: io::Error,
    },

    /// A naming policy could not find a collision-free name within its
    /// retry bound.
    #[error("naming policy gave up on '{name}' after {attempts} attempts")]
    Policy {
        /// The desired file name
        name: String,
        /// Attempts made before giving up
        attempts: usize,
    },

    /// I/O error outside a backend write (e.g. reading the source file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for route operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, StoreError::Config(_))
    }

    /// Check if this is candidate exhaustion.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::BackendUnavailable)
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::Config(err.to_string())
    }
}

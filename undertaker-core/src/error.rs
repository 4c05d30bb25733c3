//! Error types for Undertaker

use thiserror::Error;

use crate::ContainerId;

/// Undertaker error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A policy string is not a valid regular expression
    #[error("invalid pattern [{pattern}]: {message}")]
    InvalidPattern {
        /// Raw pattern text as supplied
        pattern: String,
        /// Compiler diagnostic
        message: String,
    },

    /// A single record in a snapshot cannot be classified
    #[error("inconsistent record for container {container}: {reason}")]
    InputInconsistency {
        /// Offending container
        container: ContainerId,
        /// What could not be resolved
        reason: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Container runtime request failed
    #[error("Runtime error: {message}")]
    Runtime {
        /// Error message
        message: String,
    },
}

/// Result type alias for Undertaker operations
pub type Result<T> = std::result::Result<T, Error>;

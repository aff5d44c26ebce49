//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while installing the logging sink.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Configuration error (bad level or directive).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Initialization error.
    #[error("Initialization error: {0}")]
    InitError(String),

    /// A sink was already installed for this process.
    #[error("logging already initialized (target: {target})")]
    AlreadyInitialized {
        /// The target of the sink that won.
        target: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

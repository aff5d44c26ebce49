//! Binding error types.

use std::path::PathBuf;

/// Errors from binding operations.
#[derive(Debug, thiserror::Error)]
pub enum BindingError {
    /// A manifest declared no module sources.
    #[error("manifest must declare at least one wasm module")]
    EmptyManifest,

    /// The manifest could not be serialized for the engine.
    #[error("manifest serialization failed: {0}")]
    ManifestSerialization(String),

    /// Failed to parse a manifest document.
    #[error("manifest parse error in {path}: {message}")]
    ManifestParse {
        /// Path to the manifest file (empty for in-memory documents).
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// A module's bytes did not match its declared hash.
    #[error("integrity mismatch for module {module}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        /// Module name, path or URL.
        module: String,
        /// Declared SHA-256 hex digest.
        expected: String,
        /// Actual SHA-256 hex digest.
        actual: String,
    },

    /// A `.wat` module source failed to compile.
    #[error("invalid module text in {path}: {message}")]
    InvalidModuleText {
        /// Path of the text module.
        path: PathBuf,
        /// Compiler message.
        message: String,
    },

    /// The engine rejected instantiation.
    #[error("unable to load plugin: {0}")]
    Instantiate(String),

    /// Operation on a disposed plugin.
    #[error("plugin already freed")]
    PluginFreed,

    /// Guest invoked a host function whose handle was disposed.
    #[error("host function `{0}` already freed")]
    FunctionFreed(String),

    /// The guest returned a non-zero code or trapped.
    #[error("plugin error: {message}, code: {code}")]
    CallFailed {
        /// Engine diagnostic, or `<unset by plugin>`.
        message: String,
        /// Engine return code.
        code: i32,
    },

    /// Guest linear memory could not satisfy an allocation.
    #[error("guest memory allocation of {requested} bytes failed: {message}")]
    OutOfMemory {
        /// Requested length in bytes.
        requested: u64,
        /// Engine diagnostic.
        message: String,
    },

    /// A memory handle does not name a live allocation.
    #[error("invalid memory handle: {0:#x}")]
    InvalidHandle(u64),

    /// Any other guest memory failure reported by the engine.
    #[error("guest memory error: {0}")]
    Memory(String),

    /// Guest bytes were expected to be UTF-8.
    #[error("guest memory is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging sink error.
    #[error(transparent)]
    Telemetry(#[from] wasmbind_telemetry::TelemetryError),
}

/// Result type for binding operations.
pub type BindingResult<T> = Result<T, BindingError>;

/// Placeholder message for failed calls where the guest set no error.
pub(crate) const UNSET_ERROR: &str = "<unset by plugin>";

//! wasmbind Telemetry - the process-wide logging sink shared by every plugin.
//!
//! The engine and the binding both emit `tracing` events. Installing a sink
//! here routes all of them, for every plugin in the process, to one place:
//!
//! - [`set_log_file`]: the classic "path + level" entry point (`"stdout"` and
//!   `"stderr"` are recognised as special paths)
//! - [`setup_logging`]: full control through [`LogConfig`]
//!
//! A sink can be installed once per process. Later attempts fail with
//! [`TelemetryError::AlreadyInitialized`] rather than racing the first one.
//!
//! # Example
//!
//! ```rust,no_run
//! use wasmbind_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), wasmbind_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("wasmtime=warn");
//!
//! setup_logging(&config)?;
//! tracing::info!("plugin host ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, active_target, set_log_file, setup_logging};

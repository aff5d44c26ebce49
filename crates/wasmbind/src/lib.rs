//! Host binding for WebAssembly plugins running on the Extism engine.
//!
//! Provides the typed layer between a host process and its guest modules:
//!
//! - [`Manifest`] / [`ModuleSource`]: Which modules to load and the sandbox policy around them
//! - [`Plugin`]: An instantiated module with call, config and introspection operations
//! - [`HostFunction`]: A host callback plus host-owned state that guests import
//! - [`CurrentPlugin`] / [`MemoryWindow`]: Guest memory access from inside a host callback
//! - [`ValAccess`]: Untagged reads and writes of scalar value slots
//! - [`CancelHandle`]: Abort an in-flight call from another thread
//! - [`PluginContext`]: Owns several plugins addressed by index
//! - [`set_log_file`] / [`version`] / [`binding_version`]: Process-wide logging sink, engine
//!   version and binding version
//!
//! # Lifetimes
//!
//! A [`Plugin`] is single-owner and is disposed explicitly or on drop; after
//! disposal every operation fails with [`BindingError::PluginFreed`].
//! A [`HostFunction`] is shared by every plugin it was given to. Disposing it
//! drops its state once for all of them, and guests that call it afterwards
//! trap with [`BindingError::FunctionFreed`].
//!
//! # Example
//!
//! ```rust,no_run
//! use wasmbind::{HostFunction, Manifest, ModuleSource, Plugin, ValueType};
//!
//! # fn main() -> wasmbind::BindingResult<()> {
//! let upper = HostFunction::new(
//!     "transform",
//!     [ValueType::PTR],
//!     [ValueType::PTR],
//!     (),
//!     |plugin, inputs, outputs, _: &mut ()| {
//!         let text = plugin.input_string(&inputs[0])?.to_uppercase();
//!         plugin.return_string(&mut outputs[0], &text)?;
//!         Ok(())
//!     },
//! );
//!
//! let manifest = Manifest::new([ModuleSource::from_path("plugin.wasm")?]);
//! let mut plugin = Plugin::from_manifest(manifest, &[upper], true)?;
//! let output = plugin.call("run", b"hello")?;
//! # let _ = output;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod cancel;
pub mod context;
pub mod current;
pub mod error;
pub mod function;
pub mod manifest;
pub mod memory;
pub mod plugin;
pub mod runtime;
pub mod value;

pub use cancel::CancelHandle;
pub use context::{PluginContext, PluginIndex};
pub use current::CurrentPlugin;
pub use error::{BindingError, BindingResult};
pub use function::{DEFAULT_NAMESPACE, HostFunction};
pub use manifest::{Manifest, MemoryOptions, ModuleMeta, ModuleSource};
pub use memory::{MemoryHandle, MemoryWindow};
pub use plugin::Plugin;
pub use runtime::{binding_version, engine_name, set_log_file, version};
pub use value::{ValAccess, ValueType};

pub use extism::{Error, Val};

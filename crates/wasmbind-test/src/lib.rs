//! wasmbind Test - shared guest fixtures and helpers for wasmbind tests.
//!
//! Guest modules are kept as WebAssembly text and compiled with `wat` at test
//! time, so no prebuilt binaries live in the repository. Every fixture talks
//! to the engine only through the `extism:host/env` kernel imports.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! wasmbind-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! let wasm = wasmbind_test::echo_module();
//! let mut plugin = wasmbind::Plugin::new(&wasm, &[], false)?;
//! assert_eq!(plugin.call("echo", b"hello")?, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod files;
pub mod guests;

pub use files::*;
pub use guests::*;

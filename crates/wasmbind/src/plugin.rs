//! The plugin handle.
//!
//! A [`Plugin`] owns one engine instance together with everything needed to
//! rebuild it: the manifest, the host functions and the WASI flag. The state
//! machine is `Live -> Disposed`; once disposed, every operation fails with
//! [`BindingError::PluginFreed`] (or answers `false`) without reaching the
//! engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use extism::PluginBuilder;
use uuid::Uuid;

use crate::cancel::{CancelHandle, CancelSlot};
use crate::error::{BindingError, BindingResult, UNSET_ERROR};
use crate::function::HostFunction;
use crate::manifest::Manifest;

enum PluginState {
    Live(Box<extism::Plugin>),
    Disposed,
}

fn live(state: &mut PluginState) -> BindingResult<&mut extism::Plugin> {
    match state {
        PluginState::Live(plugin) => Ok(plugin),
        PluginState::Disposed => Err(BindingError::PluginFreed),
    }
}

/// An instantiated guest module.
pub struct Plugin {
    id: Uuid,
    state: PluginState,
    manifest: Manifest,
    functions: Vec<HostFunction>,
    wasi: bool,
    cancel: Arc<CancelSlot>,
}

impl Plugin {
    /// Instantiate raw module bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::Instantiate`] if the engine rejects the module
    /// or a host function signature.
    pub fn new(
        module: impl Into<Vec<u8>>,
        functions: &[HostFunction],
        wasi: bool,
    ) -> BindingResult<Self> {
        Self::from_manifest(Manifest::from(module.into()), functions, wasi)
    }

    /// Instantiate from a manifest.
    ///
    /// The manifest is validated and its declared hashes verified before the
    /// engine sees it. The plugin keeps its own clone of each host function
    /// handle; disposing the plugin does not dispose them.
    ///
    /// # Errors
    ///
    /// Fails on an empty manifest, an integrity mismatch, a serialization
    /// failure, or when the engine rejects instantiation.
    pub fn from_manifest(
        manifest: Manifest,
        functions: &[HostFunction],
        wasi: bool,
    ) -> BindingResult<Self> {
        let id = Uuid::new_v4();
        let functions = functions.to_vec();
        let engine = instantiate(&manifest, &functions, wasi).inspect_err(|e| {
            tracing::warn!(plugin = %id, error = %e, "plugin instantiation failed");
        })?;
        let cancel = CancelSlot::new(engine.cancel_handle());

        tracing::info!(
            plugin = %id,
            modules = manifest.wasm.len(),
            functions = functions.len(),
            wasi,
            "plugin instantiated"
        );

        Ok(Self {
            id,
            state: PluginState::Live(Box::new(engine)),
            manifest,
            functions,
            wasi,
            cancel,
        })
    }

    /// Unique id of this handle, used in log events.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self.state, PluginState::Disposed)
    }

    /// The configuration currently visible to the guest.
    #[must_use]
    pub fn config(&self) -> &BTreeMap<String, String> {
        &self.manifest.config
    }

    /// Replace the guest's configuration.
    ///
    /// The new map replaces the whole configuration, including keys
    /// declared in the manifest. Keys absent from `config` are no longer
    /// visible to the guest.
    ///
    /// The engine reads configuration at instantiation, so the plugin is
    /// rebuilt with the same modules, host functions and WASI flag. Guest
    /// globals and variables start fresh. Cancel handles obtained earlier
    /// follow the new instance. If rebuilding fails, the previous instance
    /// and configuration stay in place.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::PluginFreed`] after disposal, or the
    /// instantiation error.
    pub fn set_config<K, V>(&mut self, config: impl IntoIterator<Item = (K, V)>) -> BindingResult<()>
    where
        K: Into<String>,
        V: Into<String>,
    {
        live(&mut self.state)?;

        let mut manifest = self.manifest.clone();
        manifest.config = config
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let engine = instantiate(&manifest, &self.functions, self.wasi).inspect_err(|e| {
            tracing::warn!(plugin = %self.id, error = %e, "config install failed");
        })?;
        self.cancel.replace(engine.cancel_handle());
        self.state = PluginState::Live(Box::new(engine));
        tracing::debug!(plugin = %self.id, keys = manifest.config.len(), "config installed");
        self.manifest = manifest;
        Ok(())
    }

    /// Whether the module exports `name`. Always `false` after disposal.
    #[must_use]
    pub fn function_exists(&self, name: &str) -> bool {
        match &self.state {
            PluginState::Live(plugin) => plugin.function_exists(name),
            PluginState::Disposed => false,
        }
    }

    /// Call the export `name` with `input` and return the guest's output.
    ///
    /// Blocks until the guest returns, traps, times out or is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::PluginFreed`] after disposal, or
    /// [`BindingError::CallFailed`] when the guest fails. A guest that
    /// returns a non-zero code without setting an error message reports
    /// that code with the `<unset by plugin>` message. Failures carrying an
    /// engine or guest message report code `-1`.
    pub fn call(&mut self, name: &str, input: impl AsRef<[u8]>) -> BindingResult<Vec<u8>> {
        let plugin = live(&mut self.state)?;
        tracing::trace!(plugin = %self.id, function = name, "calling export");
        match plugin.call::<&[u8], &[u8]>(name, input.as_ref()) {
            Ok(output) => Ok(output.to_vec()),
            Err(e) => {
                let err = call_failure(&e);
                tracing::debug!(plugin = %self.id, function = name, error = %err, "call failed");
                Err(err)
            },
        }
    }

    /// [`call`](Self::call) with UTF-8 input and output.
    ///
    /// # Errors
    ///
    /// As [`call`](Self::call), plus [`BindingError::InvalidUtf8`] if the
    /// output is not text.
    pub fn call_str(&mut self, name: &str, input: &str) -> BindingResult<String> {
        let output = self.call(name, input)?;
        String::from_utf8(output).map_err(|e| BindingError::InvalidUtf8(e.utf8_error()))
    }

    /// A token that can abort the running call from another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(&self.cancel)
    }

    /// Release the engine instance. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let PluginState::Live(_) = std::mem::replace(&mut self.state, PluginState::Disposed) {
            self.cancel.clear();
            tracing::info!(plugin = %self.id, "plugin disposed");
        }
    }
}

impl Drop for Plugin {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .field("modules", &self.manifest.wasm.len())
            .field("functions", &self.functions)
            .field("wasi", &self.wasi)
            .finish_non_exhaustive()
    }
}

/// Engine wording for a guest that returned non-zero without an error.
const NON_ZERO_EXIT: &str = "Returned non-zero exit code: ";

fn call_failure(e: &extism::Error) -> BindingError {
    let text = format!("{e:#}");
    if let Some(code) = text
        .strip_prefix(NON_ZERO_EXIT)
        .and_then(|rest| rest.trim().parse::<i32>().ok())
    {
        return BindingError::CallFailed {
            message: UNSET_ERROR.to_string(),
            code,
        };
    }
    BindingError::CallFailed {
        message: if text.is_empty() { UNSET_ERROR.to_string() } else { text },
        code: -1,
    }
}

fn instantiate(
    manifest: &Manifest,
    functions: &[HostFunction],
    wasi: bool,
) -> BindingResult<extism::Plugin> {
    let engine_manifest = manifest.to_engine()?;
    let builder = functions
        .iter()
        .fold(PluginBuilder::new(engine_manifest).with_wasi(wasi), |builder, f| {
            f.register(builder)
        });
    builder
        .build()
        .map_err(|e| BindingError::Instantiate(format!("{e:#}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_exit_code_is_recovered() {
        let err = call_failure(&extism::Error::msg("Returned non-zero exit code: 7"));
        match err {
            BindingError::CallFailed { message, code } => {
                assert_eq!(code, 7);
                assert_eq!(message, UNSET_ERROR);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn guest_message_keeps_text() {
        let err = call_failure(&extism::Error::msg("boom"));
        assert!(matches!(
            err,
            BindingError::CallFailed { ref message, code: -1 } if message == "boom"
        ));
    }
}

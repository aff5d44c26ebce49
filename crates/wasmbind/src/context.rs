//! A container owning several plugins.
//!
//! Plugins are addressed by a [`PluginIndex`] handed out at creation. Indices
//! are never reused within one context, so a stale index fails with
//! [`BindingError::PluginFreed`] instead of reaching another plugin.

use std::collections::BTreeMap;

use crate::error::{BindingError, BindingResult};
use crate::function::HostFunction;
use crate::manifest::Manifest;
use crate::plugin::Plugin;

/// Index of a plugin inside a [`PluginContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginIndex(u64);

impl std::fmt::Display for PluginIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns a set of plugins and disposes them together.
#[derive(Debug, Default)]
pub struct PluginContext {
    plugins: BTreeMap<PluginIndex, Plugin>,
    next: u64,
}

impl PluginContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate a plugin and keep it in this context.
    ///
    /// # Errors
    ///
    /// See [`Plugin::from_manifest`].
    pub fn new_plugin(
        &mut self,
        manifest: Manifest,
        functions: &[HostFunction],
        wasi: bool,
    ) -> BindingResult<PluginIndex> {
        let plugin = Plugin::from_manifest(manifest, functions, wasi)?;
        let index = PluginIndex(self.next);
        self.next = self.next.wrapping_add(1);
        tracing::debug!(%index, plugin = %plugin.id(), "plugin added to context");
        self.plugins.insert(index, plugin);
        Ok(index)
    }

    /// The plugin at `index`.
    #[must_use]
    pub fn get(&self, index: PluginIndex) -> Option<&Plugin> {
        self.plugins.get(&index)
    }

    /// The plugin at `index`, mutably.
    pub fn get_mut(&mut self, index: PluginIndex) -> Option<&mut Plugin> {
        self.plugins.get_mut(&index)
    }

    /// Call an export on the plugin at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::PluginFreed`] for unknown or removed indices,
    /// otherwise see [`Plugin::call`].
    pub fn call(
        &mut self,
        index: PluginIndex,
        name: &str,
        input: impl AsRef<[u8]>,
    ) -> BindingResult<Vec<u8>> {
        self.plugins
            .get_mut(&index)
            .ok_or(BindingError::PluginFreed)?
            .call(name, input)
    }

    /// Dispose and forget one plugin. Returns `false` if it was not here.
    pub fn remove(&mut self, index: PluginIndex) -> bool {
        match self.plugins.remove(&index) {
            Some(mut plugin) => {
                plugin.dispose();
                true
            },
            None => false,
        }
    }

    /// Dispose every plugin. The context stays usable.
    pub fn reset(&mut self) {
        let count = self.plugins.len();
        for plugin in self.plugins.values_mut() {
            plugin.dispose();
        }
        self.plugins.clear();
        tracing::debug!(count, "plugin context reset");
    }

    /// Number of plugins held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the context holds no plugins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Engine version string.
    #[must_use]
    pub fn version(&self) -> &'static str {
        crate::runtime::version()
    }
}

//! Host function registry.
//!
//! A [`HostFunction`] pairs a callback with host-owned state and the import
//! signature the guest declares for it. Handles are cheap to clone and can be
//! handed to any number of plugins. [`HostFunction::dispose`] drops the state
//! for every clone at once; a guest that still calls the import afterwards
//! gets a [`BindingError::FunctionFreed`] trap instead of reaching freed data.

use std::sync::Arc;

use extism::{Error, PluginBuilder, UserData, Val, ValType};

use crate::current::CurrentPlugin;
use crate::error::BindingError;
use crate::value::ValueType;

/// Import module used when a function has no explicit namespace.
pub const DEFAULT_NAMESPACE: &str = "extism:host/user";

/// Type-erased half of a [`HostFunction`].
trait ErasedFunction: Send + Sync {
    fn register<'b>(&self, builder: PluginBuilder<'b>, namespace: Option<&str>)
    -> PluginBuilder<'b>;

    /// Drop the user data. Returns `false` if it was already gone.
    fn release(&self) -> bool;

    fn is_released(&self) -> bool;
}

struct TypedFunction<T, F> {
    name: String,
    inputs: Vec<ValueType>,
    outputs: Vec<ValueType>,
    user_data: UserData<Option<T>>,
    callback: Arc<F>,
}

impl<T, F> ErasedFunction for TypedFunction<T, F>
where
    T: Send + Sync + 'static,
    F: Fn(&mut CurrentPlugin<'_>, &[Val], &mut [Val], &mut T) -> Result<(), Error>
        + Send
        + Sync
        + 'static,
{
    fn register<'b>(
        &self,
        builder: PluginBuilder<'b>,
        namespace: Option<&str>,
    ) -> PluginBuilder<'b> {
        let name = self.name.clone();
        let callback = Arc::clone(&self.callback);
        let trampoline = move |plugin: &mut extism::CurrentPlugin,
                               inputs: &[Val],
                               outputs: &mut [Val],
                               user_data: UserData<Option<T>>|
              -> Result<(), Error> {
            let slot = user_data.get()?;
            let mut state = slot
                .lock()
                .map_err(|e| Error::msg(format!("host function `{name}` state poisoned: {e}")))?;
            let Some(data) = state.as_mut() else {
                tracing::warn!(function = %name, "guest invoked a disposed host function");
                return Err(BindingError::FunctionFreed(name.clone()).into());
            };
            let mut current = CurrentPlugin::new(plugin);
            callback(&mut current, inputs, outputs, data)
        };

        let args: Vec<ValType> = self.inputs.iter().copied().map(ValType::from).collect();
        let rets: Vec<ValType> = self.outputs.iter().copied().map(ValType::from).collect();

        match namespace {
            Some(ns) => builder.with_function_in_namespace(
                ns,
                self.name.clone(),
                args,
                rets,
                self.user_data.clone(),
                trampoline,
            ),
            None => builder.with_function(
                self.name.clone(),
                args,
                rets,
                self.user_data.clone(),
                trampoline,
            ),
        }
    }

    fn release(&self) -> bool {
        let Ok(slot) = self.user_data.get() else {
            return false;
        };
        let mut state = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.take().is_some()
    }

    fn is_released(&self) -> bool {
        let Ok(slot) = self.user_data.get() else {
            return true;
        };
        let state = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.is_none()
    }
}

/// A host capability the guest can import.
///
/// # Example
///
/// ```rust,no_run
/// use wasmbind::{HostFunction, ValueType};
///
/// let counter = HostFunction::new(
///     "count",
///     [ValueType::PTR],
///     [ValueType::PTR],
///     0_u64,
///     |plugin, inputs, outputs, calls: &mut u64| {
///         *calls += 1;
///         let text = plugin.input_string(&inputs[0])?.to_uppercase();
///         plugin.return_string(&mut outputs[0], &text)?;
///         Ok(())
///     },
/// );
/// ```
#[derive(Clone)]
pub struct HostFunction {
    name: String,
    namespace: Option<String>,
    inputs: Vec<ValueType>,
    outputs: Vec<ValueType>,
    inner: Arc<dyn ErasedFunction>,
}

impl HostFunction {
    /// Describe a host function `name` with the given signature.
    ///
    /// `callback` runs on the thread that issued the plugin call, once per
    /// guest invocation, with exclusive access to `user_data`.
    pub fn new<T, F>(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = ValueType>,
        outputs: impl IntoIterator<Item = ValueType>,
        user_data: T,
        callback: F,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut CurrentPlugin<'_>, &[Val], &mut [Val], &mut T) -> Result<(), Error>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let inputs: Vec<ValueType> = inputs.into_iter().collect();
        let outputs: Vec<ValueType> = outputs.into_iter().collect();
        let inner = TypedFunction {
            name: name.clone(),
            inputs: inputs.clone(),
            outputs: outputs.clone(),
            user_data: UserData::new(Some(user_data)),
            callback: Arc::new(callback),
        };
        Self {
            name,
            namespace: None,
            inputs,
            outputs,
            inner: Arc::new(inner),
        }
    }

    /// Import this function from `namespace` instead of the default module.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.set_namespace(namespace);
        self
    }

    /// Set the import module name on this handle.
    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = Some(namespace.into());
    }

    /// The import module this handle registers under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// The import name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter types.
    #[must_use]
    pub fn input_types(&self) -> &[ValueType] {
        &self.inputs
    }

    /// Declared result types.
    #[must_use]
    pub fn output_types(&self) -> &[ValueType] {
        &self.outputs
    }

    /// Whether the user data has been released.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_released()
    }

    /// Release the user data for this handle and all of its clones.
    ///
    /// Plugins that still import the function stay valid; calls that reach
    /// it afterwards fail with [`BindingError::FunctionFreed`].
    pub fn dispose(self) {
        if self.inner.release() {
            tracing::debug!(function = %self.name, namespace = self.namespace(), "host function disposed");
        } else {
            tracing::warn!(function = %self.name, "host function disposed twice");
        }
    }

    pub(crate) fn register<'b>(&self, builder: PluginBuilder<'b>) -> PluginBuilder<'b> {
        self.inner.register(builder, self.namespace.as_deref())
    }
}

impl std::fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("namespace", &self.namespace())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop() -> HostFunction {
        HostFunction::new(
            "noop",
            [ValueType::I64],
            [],
            (),
            |_plugin, _inputs, _outputs, _data: &mut ()| Ok(()),
        )
    }

    /// Counts how many times its value is dropped.
    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn default_namespace() {
        let f = noop();
        assert_eq!(f.name(), "noop");
        assert_eq!(f.namespace(), DEFAULT_NAMESPACE);
        assert_eq!(f.input_types(), &[ValueType::I64]);
        assert!(f.output_types().is_empty());
    }

    #[test]
    fn namespace_is_per_handle() {
        let base = noop();
        let namespaced = base.clone().with_namespace("custom");
        assert_eq!(namespaced.namespace(), "custom");
        assert_eq!(base.namespace(), DEFAULT_NAMESPACE);

        let mut renamed = base;
        renamed.set_namespace("other");
        assert_eq!(renamed.namespace(), "other");
    }

    #[test]
    fn dispose_releases_user_data_once_for_all_clones() {
        let drops = Arc::new(AtomicUsize::new(0));
        let f = HostFunction::new(
            "tracked",
            [],
            [],
            DropCounter(Arc::clone(&drops)),
            |_plugin, _inputs, _outputs, _data: &mut DropCounter| Ok(()),
        );
        let clone = f.clone();
        assert!(!clone.is_disposed());

        f.dispose();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(clone.is_disposed());

        clone.dispose();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_last_handle_releases_user_data() {
        let drops = Arc::new(AtomicUsize::new(0));
        let f = HostFunction::new(
            "tracked",
            [],
            [],
            DropCounter(Arc::clone(&drops)),
            |_plugin, _inputs, _outputs, _data: &mut DropCounter| Ok(()),
        );
        drop(f);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_reports_disposal() {
        let f = noop();
        let rendered = format!("{f:?}");
        assert!(rendered.contains("noop"));
        assert!(rendered.contains("disposed: false"));
    }
}

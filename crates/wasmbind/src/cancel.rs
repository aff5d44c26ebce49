//! Cross-thread cancellation of in-flight calls.

use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Holds the engine's cancel handle for the live instance of a plugin.
///
/// Owned by the plugin. Handles given out to callers only keep a weak
/// reference, so dropping the plugin invalidates them.
#[derive(Default)]
pub(crate) struct CancelSlot {
    engine: Mutex<Option<extism::CancelHandle>>,
}

impl CancelSlot {
    pub(crate) fn new(handle: extism::CancelHandle) -> Arc<Self> {
        Arc::new(Self {
            engine: Mutex::new(Some(handle)),
        })
    }

    /// Point the slot at a new engine instance.
    pub(crate) fn replace(&self, handle: extism::CancelHandle) {
        *self.engine.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Detach from the engine. Later cancel requests are refused.
    pub(crate) fn clear(&self) {
        *self.engine.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn cancel(&self) -> bool {
        let engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        match engine.as_ref() {
            Some(handle) => match handle.cancel() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "engine refused cancel request");
                    false
                },
            },
            None => false,
        }
    }
}

/// Token that aborts the call currently running on a plugin.
///
/// Cheap to clone and safe to send to another thread. A handle never keeps
/// the plugin alive; once the plugin is disposed, [`cancel`](Self::cancel)
/// returns `false`.
#[derive(Clone)]
pub struct CancelHandle {
    slot: Weak<CancelSlot>,
}

impl CancelHandle {
    pub(crate) fn new(slot: &Arc<CancelSlot>) -> Self {
        Self {
            slot: Arc::downgrade(slot),
        }
    }

    /// Request that the in-flight call stop.
    ///
    /// Returns whether the engine accepted the request. The running guest
    /// observes it at its next interruption point and the call returns an
    /// error.
    pub fn cancel(&self) -> bool {
        let accepted = self.slot.upgrade().is_some_and(|slot| slot.cancel());
        tracing::debug!(accepted, "cancel requested");
        accepted
    }

    /// Whether the plugin this handle targets is still alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.slot
            .upgrade()
            .is_some_and(|slot| slot.engine.lock().unwrap_or_else(PoisonError::into_inner).is_some())
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_handle_refuses() {
        let slot = Arc::new(CancelSlot::default());
        let handle = CancelHandle::new(&slot);
        assert!(!handle.is_attached());
        assert!(!handle.cancel());
    }

    #[test]
    fn dropped_slot_refuses() {
        let slot = Arc::new(CancelSlot::default());
        let handle = CancelHandle::new(&slot);
        drop(slot);
        assert!(!handle.cancel());
        assert!(!handle.is_attached());
    }

    #[test]
    fn handle_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CancelHandle>();
    }
}

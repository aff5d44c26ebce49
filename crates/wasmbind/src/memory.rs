//! Memory window over a guest instance's linear memory.
//!
//! Blocks are addressed by [`MemoryHandle`], an offset into the engine's
//! allocator. The window never caches addresses or lengths: every call asks
//! the engine again, because guest memory may grow and move between calls.
//! Views returned by [`MemoryWindow::bytes`] borrow the window mutably, so a
//! view cannot outlive the next window call.

use extism::{CurrentPlugin as EngineCurrentPlugin, Val};

use crate::error::{BindingError, BindingResult};

/// Offset of a block in a guest instance's memory.
///
/// Only meaningful for the guest instance that produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryHandle(u64);

impl MemoryHandle {
    /// The empty block.
    pub const NULL: Self = Self(0);

    /// Wrap a raw offset received from the guest.
    #[must_use]
    pub const fn from_offset(offset: u64) -> Self {
        Self(offset)
    }

    /// The raw offset.
    #[must_use]
    pub const fn offset(self) -> u64 {
        self.0
    }

    /// Whether this is the empty block.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<MemoryHandle> for Val {
    #[allow(clippy::cast_possible_wrap)]
    fn from(handle: MemoryHandle) -> Self {
        Val::I64(handle.0 as i64)
    }
}

fn memory_err(e: impl std::fmt::Display) -> BindingError {
    BindingError::Memory(e.to_string())
}

/// Allocate, free, measure and view blocks of one guest instance's memory.
pub struct MemoryWindow<'a> {
    plugin: &'a mut EngineCurrentPlugin,
}

impl<'a> MemoryWindow<'a> {
    pub(crate) fn new(plugin: &'a mut EngineCurrentPlugin) -> Self {
        Self { plugin }
    }

    /// Allocate a block of `len` bytes. A zero-length request yields
    /// [`MemoryHandle::NULL`] without touching the engine.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::OutOfMemory`] if the guest cannot grow.
    pub fn alloc(&mut self, len: u64) -> BindingResult<MemoryHandle> {
        if len == 0 {
            return Ok(MemoryHandle::NULL);
        }
        let handle = self
            .plugin
            .memory_alloc(len)
            .map_err(|e| BindingError::OutOfMemory {
                requested: len,
                message: e.to_string(),
            })?;
        tracing::trace!(offset = handle.offset(), len, "guest block allocated");
        Ok(MemoryHandle(handle.offset()))
    }

    /// Release a block. Freeing [`MemoryHandle::NULL`] is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle does not name a live block.
    pub fn free(&mut self, handle: MemoryHandle) -> BindingResult<()> {
        if handle.is_null() {
            return Ok(());
        }
        let engine_handle = self.resolve(handle)?;
        self.plugin.memory_free(engine_handle).map_err(memory_err)
    }

    /// Length in bytes of the block at `handle`, as recorded by the
    /// allocator.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot look the block up.
    pub fn length(&mut self, handle: MemoryHandle) -> BindingResult<u64> {
        if handle.is_null() {
            return Ok(0);
        }
        self.plugin.memory_length(handle.0).map_err(memory_err)
    }

    /// Mutable view of the block at `handle`. Writes are visible to the
    /// guest immediately.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::InvalidHandle`] for unknown offsets.
    pub fn bytes(&mut self, handle: MemoryHandle) -> BindingResult<&mut [u8]> {
        if handle.is_null() {
            return Ok(&mut []);
        }
        let engine_handle = self.resolve(handle)?;
        self.plugin.memory_bytes_mut(engine_handle).map_err(memory_err)
    }

    /// Allocate a block and copy `data` into it.
    ///
    /// # Errors
    ///
    /// Fails like [`alloc`](Self::alloc) and [`bytes`](Self::bytes).
    pub fn alloc_bytes(&mut self, data: &[u8]) -> BindingResult<MemoryHandle> {
        let handle = self.alloc(data.len() as u64)?;
        let view = self.bytes(handle)?;
        let target = view
            .get_mut(..data.len())
            .ok_or(BindingError::InvalidHandle(handle.0))?;
        target.copy_from_slice(data);
        Ok(handle)
    }

    fn resolve(&mut self, handle: MemoryHandle) -> BindingResult<extism::convert::MemoryHandle> {
        self.plugin
            .memory_handle(handle.0)
            .ok_or(BindingError::InvalidHandle(handle.0))
    }
}

impl std::fmt::Debug for MemoryWindow<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryWindow").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValAccess;

    #[test]
    fn null_handle() {
        assert!(MemoryHandle::NULL.is_null());
        assert_eq!(MemoryHandle::default(), MemoryHandle::NULL);
        assert!(!MemoryHandle::from_offset(8).is_null());
    }

    #[test]
    fn handle_travels_as_i64() {
        let handle = MemoryHandle::from_offset(0x1_0000);
        let val = Val::from(handle);
        assert!(matches!(val, Val::I64(0x1_0000)));
        assert_eq!(MemoryHandle::from_offset(val.get_u64()), handle);
    }
}

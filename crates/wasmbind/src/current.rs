//! Context handed to host functions while a guest call is in progress.
//!
//! Guests exchange variable-length data with the host through a single
//! 64-bit handle per value: the guest allocates a block, passes its offset,
//! and the host recovers the length from the allocator. The helpers here
//! implement both directions of that convention.

use extism::Val;

use crate::error::BindingResult;
use crate::memory::{MemoryHandle, MemoryWindow};
use crate::value::ValAccess;

/// The guest instance currently calling into the host.
#[derive(Debug)]
pub struct CurrentPlugin<'a> {
    window: MemoryWindow<'a>,
}

impl<'a> CurrentPlugin<'a> {
    pub(crate) fn new(plugin: &'a mut extism::CurrentPlugin) -> Self {
        Self {
            window: MemoryWindow::new(plugin),
        }
    }

    /// The memory window scoped to this guest instance.
    pub fn window(&mut self) -> &mut MemoryWindow<'a> {
        &mut self.window
    }

    /// View the block at `handle`.
    ///
    /// # Errors
    ///
    /// See [`MemoryWindow::bytes`].
    pub fn memory(&mut self, handle: MemoryHandle) -> BindingResult<&mut [u8]> {
        self.window.bytes(handle)
    }

    /// Allocate a block of `len` bytes.
    ///
    /// # Errors
    ///
    /// See [`MemoryWindow::alloc`].
    pub fn alloc(&mut self, len: u64) -> BindingResult<MemoryHandle> {
        self.window.alloc(len)
    }

    /// Release the block at `handle`.
    ///
    /// # Errors
    ///
    /// See [`MemoryWindow::free`].
    pub fn free(&mut self, handle: MemoryHandle) -> BindingResult<()> {
        self.window.free(handle)
    }

    /// Length of the block at `handle`.
    ///
    /// # Errors
    ///
    /// See [`MemoryWindow::length`].
    pub fn length(&mut self, handle: MemoryHandle) -> BindingResult<u64> {
        self.window.length(handle)
    }

    /// Copy `bytes` into a new guest block and store its handle in `slot`
    /// as a 64-bit integer.
    ///
    /// # Errors
    ///
    /// Fails if the guest cannot allocate the block.
    pub fn return_bytes(&mut self, slot: &mut Val, bytes: &[u8]) -> BindingResult<MemoryHandle> {
        let handle = self.window.alloc_bytes(bytes)?;
        *slot = Val::from(handle);
        Ok(handle)
    }

    /// [`return_bytes`](Self::return_bytes) for UTF-8 text.
    ///
    /// # Errors
    ///
    /// Fails if the guest cannot allocate the block.
    pub fn return_string(&mut self, slot: &mut Val, s: &str) -> BindingResult<MemoryHandle> {
        self.return_bytes(slot, s.as_bytes())
    }

    /// Resolve the handle stored in an input slot to the block it names.
    ///
    /// # Errors
    ///
    /// Fails if the slot does not hold a live handle.
    pub fn input_bytes(&mut self, slot: &Val) -> BindingResult<&[u8]> {
        let handle = MemoryHandle::from_offset(slot.get_u64());
        let bytes: &[u8] = self.window.bytes(handle)?;
        Ok(bytes)
    }

    /// [`input_bytes`](Self::input_bytes) decoded as UTF-8.
    ///
    /// # Errors
    ///
    /// Fails if the slot does not hold a live handle or the block is not
    /// valid UTF-8.
    pub fn input_string(&mut self, slot: &Val) -> BindingResult<&str> {
        let bytes = self.input_bytes(slot)?;
        Ok(std::str::from_utf8(bytes)?)
    }
}

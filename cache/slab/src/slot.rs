//! Cache slots: fixed-length regions inside a page.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::page::Page;

/// A slot behind its mutex, shared between a slab's free list and the key
/// map of the slab cache built on top of it.
pub type SlotRef = Arc<Mutex<CacheSlot>>;

/// A fixed-length byte region inside a page, sized to its slab.
///
/// A slot carries no key; the key lives in the slab cache's map. The mutex
/// wrapping every slot is the slot mutex of the locking discipline: slot
/// bytes are read and written only while it is held, which the lock guard
/// enforces structurally.
#[derive(Debug)]
pub struct CacheSlot {
    page: Arc<Page>,
    offset: usize,
    len: usize,
}

impl CacheSlot {
    pub(crate) fn new(page: Arc<Page>, offset: usize, len: usize) -> SlotRef {
        debug_assert!(offset + len <= page.len());
        Arc::new(Mutex::new(Self { page, offset, len }))
    }

    /// Slot capacity in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the slot holds zero bytes. Slab slots never do.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The slot's bytes.
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: this method is only reachable through the slot's lock
        // guard, and the region was bounds-checked at construction.
        unsafe { self.page.region_mut(self.offset, self.len) }
    }

    /// The slot's bytes, writable.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as in `bytes`, with the guard held exclusively.
        unsafe { self.page.region_mut(self.offset, self.len) }
    }
}

//! Per-size slot allocator backed by pool pages.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::page::{Page, PagePool};
use crate::slot::{CacheSlot, SlotRef};

/// A per-slot-size allocator.
///
/// A slab requests pages from the [`PagePool`] on demand and splits each
/// page into `page size / slot size` slots on a free list. Pages acquired
/// by a slab are never given back. Once the pool reports empty, the slab
/// remembers that and stops asking; from then on only recycled slots can
/// satisfy allocations.
#[derive(Debug)]
pub struct Slab {
    slot_size: usize,
    pool: Arc<PagePool>,
    inner: Mutex<SlabInner>,
}

#[derive(Debug)]
struct SlabInner {
    free: VecDeque<SlotRef>,
    pages: Vec<Arc<Page>>,
    pool_exhausted: bool,
}

impl Slab {
    /// Create a slab for `slot_size`-byte slots drawing from `pool`.
    ///
    /// `slot_size` must evenly divide the pool's page size.
    pub fn new(slot_size: usize, pool: Arc<PagePool>) -> Self {
        debug_assert!(slot_size > 0);
        debug_assert_eq!(crate::config::PAGE_SIZE % slot_size, 0);
        Self {
            slot_size,
            pool,
            inner: Mutex::new(SlabInner {
                free: VecDeque::new(),
                pages: Vec::new(),
                pool_exhausted: false,
            }),
        }
    }

    /// Slot capacity of this slab in bytes.
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Hand out a free slot.
    ///
    /// When the free list is empty the slab asks the pool for a page and
    /// splits it. Returns `None` once both the free list and the pool are
    /// dry; the caller is expected to recycle a slot of its own (eviction).
    pub fn get_slot(&self) -> Option<SlotRef> {
        let mut inner = self.inner.lock();
        if inner.free.is_empty() && !inner.pool_exhausted {
            match self.pool.acquire() {
                Some(page) => {
                    let slots_per_page = page.len() / self.slot_size;
                    for i in 0..slots_per_page {
                        inner.free.push_back(CacheSlot::new(
                            page.clone(),
                            i * self.slot_size,
                            self.slot_size,
                        ));
                    }
                    inner.pages.push(page);
                }
                None => {
                    tracing::debug!(slot_size = self.slot_size, "page pool exhausted");
                    inner.pool_exhausted = true;
                }
            }
        }
        inner.free.pop_front()
    }

    /// Return a slot to the free list, making it immediately reusable.
    pub fn put_slot(&self, slot: SlotRef) {
        self.inner.lock().free.push_back(slot);
    }

    /// Number of slots currently on the free list.
    pub fn free_slots(&self) -> usize {
        self.inner.lock().free.len()
    }

    /// Number of pages this slab has acquired.
    pub fn page_count(&self) -> usize {
        self.inner.lock().pages.len()
    }
}

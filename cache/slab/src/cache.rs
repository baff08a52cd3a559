//! A slab extended into a self-contained cache: a key map and an LRU list
//! over slot storage.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use ahash::RandomState;
use cache_core::{Cache, CacheValue};
use parking_lot::Mutex;

use crate::page::PagePool;
use crate::slab::Slab;
use crate::slot::SlotRef;

type Key = Arc<[u8]>;

/// Keys ordered by recency of use, oldest at the head. Every key in the
/// cache's map appears here exactly once.
#[derive(Debug, Default)]
struct LruList {
    keys: VecDeque<Key>,
}

impl LruList {
    fn push_newest(&mut self, key: Key) {
        self.keys.push_back(key);
    }

    fn pop_oldest(&mut self) -> Option<Key> {
        self.keys.pop_front()
    }

    fn remove(&mut self, key: &[u8]) -> bool {
        match self.keys.iter().position(|k| k.as_ref() == key) {
            Some(idx) => {
                self.keys.remove(idx);
                true
            }
            None => false,
        }
    }

    fn promote(&mut self, key: &[u8]) {
        let idx = self.keys.iter().position(|k| k.as_ref() == key);
        debug_assert!(idx.is_some(), "promoted key missing from LRU list");
        if let Some(idx) = idx
            && let Some(key) = self.keys.remove(idx)
        {
            self.keys.push_back(key);
        }
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<Key, SlotRef, RandomState>,
    lru: LruList,
}

/// One slab turned into a cache with strict LRU eviction, scoped to one
/// slot size.
///
/// # Locking discipline
///
/// One mutex (the map lock) guards the key map and the LRU list as a single
/// consistent pair. Each slot has its own mutex. The order is strict: take
/// the map lock, then the slot mutex, then release the map lock before any
/// slot I/O. The map lock is never acquired while a slot mutex is held.
#[derive(Debug)]
pub struct SlabCache {
    slab: Slab,
    inner: Mutex<CacheInner>,
}

impl SlabCache {
    /// Create a cache for `slot_size`-byte slots drawing from `pool`.
    pub fn new(slot_size: usize, pool: Arc<PagePool>) -> Self {
        tracing::debug!(slot_size, "slab cache created");
        Self {
            slab: Slab::new(slot_size, pool),
            inner: Mutex::new(CacheInner {
                map: HashMap::default(),
                lru: LruList::default(),
            }),
        }
    }

    /// Slot capacity of this cache's slab in bytes.
    pub fn slot_size(&self) -> usize {
        self.slab.slot_size()
    }

    /// Number of live entries. The map and the LRU list agree at every
    /// observable moment.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        debug_assert_eq!(inner.map.len(), inner.lru.len());
        inner.map.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the value stored for `key` and mark it most recently used.
    pub fn get(&self, key: &[u8]) -> Option<CacheValue> {
        let guard = {
            let mut inner = self.inner.lock();
            let slot = inner.map.get(key)?.clone();
            // Take the slot mutex before giving up the map lock so an
            // eviction cannot hand these bytes to another key mid-read.
            let guard = slot.lock_arc();
            inner.lru.promote(key);
            guard
        };

        match CacheValue::deserialize(guard.bytes()) {
            Ok(value) => Some(value),
            Err(e) => {
                // Only complete serialized values are ever installed, so
                // this indicates slot corruption.
                tracing::error!(slot_size = self.slot_size(), error = %e, "corrupt slot contents");
                None
            }
        }
    }

    /// Store `value` under `key`.
    ///
    /// A slot is taken in this order: rewrite the key's existing slot,
    /// else a free slot from the slab, else the slot of the least recently
    /// used entry. Returns `false` when the value exceeds the slot size or
    /// no slot could be obtained (the pool was consumed by other slabs
    /// before this one ever stored an entry).
    pub fn set(&self, key: &[u8], value: &CacheValue) -> bool {
        if value.serialized_size() > self.slot_size() {
            return false;
        }

        let (key, slot, mut guard) = {
            let mut inner = self.inner.lock();
            let (key, slot) = match inner.map.remove_entry(key) {
                Some((existing, slot)) => {
                    // Rewrite in place; the key rejoins the LRU tail once
                    // the new bytes are in.
                    let removed = inner.lru.remove(&existing);
                    debug_assert!(removed, "mapped key missing from LRU list");
                    (existing, slot)
                }
                None => {
                    let fresh: Key = Arc::from(key);
                    match self.slab.get_slot() {
                        Some(slot) => (fresh, slot),
                        None => {
                            tracing::debug!(
                                slot_size = self.slot_size(),
                                "slab full, recycling LRU entry"
                            );
                            let Some(victim) = inner.lru.pop_oldest() else {
                                // Other slabs took the whole pool before
                                // this slab ever held an entry.
                                tracing::debug!(
                                    slot_size = self.slot_size(),
                                    "no memory for set"
                                );
                                return false;
                            };
                            let Some(slot) = inner.map.remove(&victim) else {
                                debug_assert!(false, "LRU key missing from map");
                                return false;
                            };
                            (fresh, slot)
                        }
                    }
                }
            };
            // Lock the slot while still under the map lock: a reader that
            // found the old mapping may still be draining these bytes, and
            // it releases the slot mutex when done.
            let guard = slot.lock_arc();
            (key, slot, guard)
        };

        let result = value.serialize_into(guard.bytes_mut());
        // Release the slot mutex before retaking the map lock; the lock
        // order forbids holding both in the other direction.
        drop(guard);

        match result {
            Ok(()) => {
                let mut inner = self.inner.lock();
                inner.lru.push_newest(key.clone());
                inner.map.insert(key, slot);
                true
            }
            Err(e) => {
                // Unreachable given the size precondition; hand the slot
                // back rather than leaking it.
                tracing::error!(slot_size = self.slot_size(), error = %e, "slot serialize failed");
                self.slab.put_slot(slot);
                false
            }
        }
    }
}

impl Cache for SlabCache {
    fn get(&self, key: &[u8]) -> Option<CacheValue> {
        SlabCache::get(self, key)
    }

    fn set(&self, key: &[u8], value: &CacheValue) -> bool {
        SlabCache::set(self, key, value)
    }
}

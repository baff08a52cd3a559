//! Routes `set` by size class and broadcasts `get` across every slab.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use cache_core::{Cache, CacheValue, ConfigError};
use crossbeam_channel::{Receiver, Sender, bounded};

use crate::cache::SlabCache;
use crate::config::{DEFAULT_MAX_BYTES, SLOT_SIZES, select_slab};
use crate::page::PagePool;

const LOOKUP_QUEUE_DEPTH: usize = 1024;

/// Work item for the broadcast lookup pool.
#[derive(Debug)]
struct Lookup {
    slab: Arc<SlabCache>,
    key: Arc<[u8]>,
    reply: Sender<Option<CacheValue>>,
    cancelled: Arc<AtomicBool>,
}

/// Fixed pool of threads running per-slab lookups for broadcast `get`.
///
/// Cancellation is advisory: a lookup checks the flag at entry, and one
/// that already started completes normally.
#[derive(Debug)]
struct LookupPool {
    jobs: Option<Sender<Lookup>>,
    threads: Vec<JoinHandle<()>>,
}

impl LookupPool {
    fn new(thread_count: usize) -> Self {
        let (tx, rx) = bounded::<Lookup>(LOOKUP_QUEUE_DEPTH);
        let threads = (0..thread_count.max(1))
            .map(|id| {
                let rx: Receiver<Lookup> = rx.clone();
                std::thread::Builder::new()
                    .name(format!("lookup-{}", id))
                    .spawn(move || {
                        for job in rx.iter() {
                            let value = if job.cancelled.load(Ordering::Acquire) {
                                None
                            } else {
                                job.slab.get(&job.key)
                            };
                            // The requester returns as soon as it has a
                            // hit; a dropped receiver is not an error.
                            let _ = job.reply.send(value);
                        }
                    })
                    .expect("failed to spawn lookup thread")
            })
            .collect();
        Self {
            jobs: Some(tx),
            threads,
        }
    }

    fn submit(&self, job: Lookup) {
        if let Some(jobs) = &self.jobs {
            let _ = jobs.send(job);
        }
    }
}

impl Drop for LookupPool {
    fn drop(&mut self) {
        drop(self.jobs.take());
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Owns every [`SlabCache`], ascending by slot size.
///
/// `set` picks the slab with the smallest slot size that fits the
/// serialized value. `get` carries no size hint, so it is broadcast to all
/// slabs in parallel and the first non-null answer wins.
///
/// A `set` never migrates a key between slabs: storing an existing key with
/// a value that serializes into a different class installs the new copy in
/// the new slab and leaves the old copy behind. Readers observe exactly one
/// of the copies per lookup; which one is not specified.
#[derive(Debug)]
pub struct SlabRouter {
    slabs: Vec<Arc<SlabCache>>,
    lookups: LookupPool,
}

impl SlabRouter {
    /// Start building a router.
    pub fn builder() -> SlabRouterBuilder {
        SlabRouterBuilder::default()
    }

    /// The slab caches, ascending by slot size.
    pub fn slabs(&self) -> &[Arc<SlabCache>] {
        &self.slabs
    }

    fn broadcast_get(&self, key: &[u8]) -> Option<CacheValue> {
        let key: Arc<[u8]> = Arc::from(key);
        let cancelled = Arc::new(AtomicBool::new(false));
        let (reply, results) = bounded(self.slabs.len());

        for slab in &self.slabs {
            self.lookups.submit(Lookup {
                slab: slab.clone(),
                key: key.clone(),
                reply: reply.clone(),
                cancelled: cancelled.clone(),
            });
        }
        drop(reply);

        let mut hit = None;
        for value in results.iter() {
            if let Some(value) = value {
                hit = Some(value);
                break;
            }
        }
        // A key lives in at most one slab, so the remaining lookups can
        // only report misses; cancel them.
        cancelled.store(true, Ordering::Release);
        tracing::trace!(hit = hit.is_some(), "broadcast get finished");
        hit
    }
}

impl Cache for SlabRouter {
    fn get(&self, key: &[u8]) -> Option<CacheValue> {
        self.broadcast_get(key)
    }

    fn set(&self, key: &[u8], value: &CacheValue) -> bool {
        let size = value.serialized_size();
        let Some(idx) = select_slab(size) else {
            tracing::debug!(size, "value exceeds the largest slab class");
            return false;
        };
        self.slabs[idx].set(key, value)
    }
}

/// Builder for [`SlabRouter`].
#[derive(Debug, Clone)]
pub struct SlabRouterBuilder {
    max_bytes: usize,
    lookup_threads: usize,
}

impl Default for SlabRouterBuilder {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            lookup_threads: num_cpus::get(),
        }
    }
}

impl SlabRouterBuilder {
    /// Set the global memory budget in bytes.
    pub fn max_bytes(mut self, bytes: usize) -> Self {
        self.max_bytes = bytes;
        self
    }

    /// Set the number of threads serving broadcast lookups.
    pub fn lookup_threads(mut self, threads: usize) -> Self {
        self.lookup_threads = threads;
        self
    }

    /// Build the router and its page pool.
    pub fn build(self) -> Result<SlabRouter, ConfigError> {
        let pool = Arc::new(PagePool::new(self.max_bytes)?);
        let slabs = SLOT_SIZES
            .iter()
            .map(|&slot_size| Arc::new(SlabCache::new(slot_size, pool.clone())))
            .collect();
        Ok(SlabRouter {
            slabs,
            lookups: LookupPool::new(self.lookup_threads),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAX_SLABS, PAGE_SIZE};

    fn create_test_router() -> SlabRouter {
        SlabRouter::builder()
            .max_bytes(PAGE_SIZE)
            .lookup_threads(2)
            .build()
            .expect("failed to build router")
    }

    #[test]
    fn test_builder_rejects_small_budget() {
        let err = SlabRouter::builder().max_bytes(1024).build().unwrap_err();
        assert!(matches!(err, ConfigError::BudgetTooSmall { .. }));
    }

    #[test]
    fn test_router_has_all_classes() {
        let router = create_test_router();
        assert_eq!(router.slabs().len(), MAX_SLABS);
        for (slab, &slot_size) in router.slabs().iter().zip(SLOT_SIZES.iter()) {
            assert_eq!(slab.slot_size(), slot_size);
        }
    }

    #[test]
    fn test_set_routes_to_smallest_fitting_class() {
        let router = create_test_router();

        // 10 payload bytes serialize to 16: exactly the smallest class.
        assert!(router.set(b"tiny", &CacheValue::new(0, vec![0u8; 10])));
        assert_eq!(router.slabs()[0].len(), 1);

        // One more payload byte spills into the 64-byte class.
        assert!(router.set(b"small", &CacheValue::new(0, vec![0u8; 11])));
        assert_eq!(router.slabs()[1].len(), 1);
    }

    #[test]
    fn test_oversize_value_is_refused() {
        let router = create_test_router();
        // Serialized size is one byte over the 4 MiB class.
        let oversize = CacheValue::new(0, vec![0u8; 4 * 1024 * 1024 - 5]);
        assert!(!router.set(b"big", &oversize));
        for slab in router.slabs() {
            assert_eq!(slab.len(), 0);
        }
    }

    #[test]
    fn test_broadcast_get_finds_any_class() {
        let router = create_test_router();
        let tiny = CacheValue::new(1, vec![1u8; 4]);
        let large = CacheValue::new(2, vec![2u8; 100_000]);

        assert!(router.set(b"tiny", &tiny));
        assert!(router.set(b"large", &large));

        assert_eq!(router.get(b"tiny"), Some(tiny));
        assert_eq!(router.get(b"large"), Some(large));
        assert!(router.get(b"missing").is_none());
    }

    #[test]
    fn test_resize_across_classes_keeps_stale_copy() {
        let router = create_test_router();
        let small = CacheValue::new(1, vec![1u8; 4]);
        let large = CacheValue::new(2, vec![2u8; 1000]);

        assert!(router.set(b"key", &small));
        assert!(router.set(b"key", &large));

        // The router does not purge the copy in the smaller class; a reader
        // sees exactly one of the two values.
        assert_eq!(router.slabs()[0].len(), 1);
        let got = router.get(b"key").expect("some copy answers");
        assert!(got == small || got == large);
    }
}

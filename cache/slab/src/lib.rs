//! Slab-paged cache with per-slab LRU eviction.
//!
//! This crate provides a cache built from a fixed memory budget carved into
//! equal-sized pages, with per-size slabs that partition pages into
//! equal-sized slots.
//!
//! # Architecture
//!
//! ```text
//! +---------------------------------------------+
//! |                 SlabRouter                  |
//! |  set: smallest class that fits the value    |
//! |  get: broadcast to every slab, first hit    |
//! |                                             |
//! |  +---------------------------------------+  |
//! |  | SlabCache (16B slots)                 |  |
//! |  | - key -> slot map + LRU list          |  |
//! |  +---------------------------------------+  |
//! |  | SlabCache (64B slots)                 |  |
//! |  +---------------------------------------+  |
//! |  | ...                                   |  |
//! |  +---------------------------------------+  |
//! |  | SlabCache (4MB slots)                 |  |
//! |  +---------------------------------------+  |
//! |        |                                    |
//! |        v                                    |
//! |  +---------------------------------------+  |
//! |  | PagePool (16MB pages, handed out once)|  |
//! |  +---------------------------------------+  |
//! +---------------------------------------------+
//! ```
//!
//! Pages are permanent property of the first slab that acquires them; there
//! is no rebalancing between slabs. Each slab evicts strictly by LRU within
//! its own slot size once the pool is dry.
//!
//! # Example
//!
//! ```ignore
//! use cache_core::{Cache, CacheValue};
//! use slab_cache::SlabRouter;
//!
//! let cache = SlabRouter::builder()
//!     .max_bytes(160 * 1024 * 1024)
//!     .build()?;
//!
//! cache.set(b"key", &CacheValue::new(0, b"value".to_vec()));
//! if let Some(value) = cache.get(b"key") {
//!     println!("flags: {}", value.flags());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod config;
mod page;
mod router;
mod slab;
mod slot;

pub use cache::SlabCache;
pub use config::{DEFAULT_MAX_BYTES, MAX_SLABS, PAGE_SIZE, SLOT_SIZES, select_slab};
pub use page::{Page, PagePool};
pub use router::{SlabRouter, SlabRouterBuilder};
pub use slab::Slab;
pub use slot::{CacheSlot, SlotRef};

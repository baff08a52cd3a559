//! Kiln cache server.
//!
//! A cache server speaking the `get`/`set` subset of the memcached text
//! protocol, backed by a slab-paged cache with per-slab LRU eviction. A
//! non-blocking acceptor feeds a bounded worker pool; workers parse,
//! execute and reply on the connection without ever blocking the acceptor.

pub mod config;
pub mod dispatch;
pub mod framer;
pub mod listener;
pub mod logging;
pub mod metrics;
pub mod signal;
pub mod workers;

pub use config::Config;
pub use listener::{ServerHandle, spawn};

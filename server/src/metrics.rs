//! Cache server metrics.

use metriken::{Counter, Gauge, metric};

// Connection metrics

#[metric(
    name = "connections_accepted",
    description = "Total number of connections accepted"
)]
pub static CONNECTIONS_ACCEPTED: Counter = Counter::new();

#[metric(
    name = "connections_active",
    description = "Number of currently active connections"
)]
pub static CONNECTIONS_ACTIVE: Gauge = Gauge::new();

// Operation counters

#[metric(name = "cache_gets", description = "Total GET operations")]
pub static GETS: Counter = Counter::new();

#[metric(name = "cache_sets", description = "Total SET operations")]
pub static SETS: Counter = Counter::new();

// Cache effectiveness

#[metric(name = "cache_hits", description = "Total cache hits")]
pub static HITS: Counter = Counter::new();

#[metric(name = "cache_misses", description = "Total cache misses")]
pub static MISSES: Counter = Counter::new();

#[metric(
    name = "cache_sets_refused",
    description = "Total SETs the cache refused (value too large or no memory)"
)]
pub static SETS_REFUSED: Counter = Counter::new();

// Errors

#[metric(name = "protocol_errors", description = "Total protocol parse errors")]
pub static PROTOCOL_ERRORS: Counter = Counter::new();

#[metric(
    name = "server_errors",
    description = "Total internal failures reported to clients"
)]
pub static SERVER_ERRORS: Counter = Counter::new();

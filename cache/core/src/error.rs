//! Error types for cache construction and the slot codec.

use std::fmt;

/// Errors raised while constructing a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The memory budget is smaller than a single page.
    BudgetTooSmall {
        /// The requested budget in bytes.
        budget: usize,
        /// The fixed page size in bytes.
        page_size: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetTooSmall { budget, page_size } => write!(
                f,
                "memory budget ({budget} bytes) is smaller than one page ({page_size} bytes)"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors raised by the slot codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The slot does not hold a complete encoded value.
    Truncated,
    /// The value does not fit in the destination slot.
    Overflow,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated value"),
            Self::Overflow => write!(f, "value exceeds slot size"),
        }
    }
}

impl std::error::Error for CodecError {}

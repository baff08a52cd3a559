//! Slab class table and sizing constants.

/// Size of every page handed out by the pool: 16 MiB.
pub const PAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default global memory budget: 160 MiB (ten pages).
pub const DEFAULT_MAX_BYTES: usize = 160 * 1024 * 1024;

/// Number of slab classes.
pub const MAX_SLABS: usize = 10;

/// Slot sizes of the slab classes: powers of two from 16 bytes to 4 MiB,
/// consecutive classes differing by a factor of four.
pub const SLOT_SIZES: [usize; MAX_SLABS] = [
    1 << 4,
    1 << 6,
    1 << 8,
    1 << 10,
    1 << 12,
    1 << 14,
    1 << 16,
    1 << 18,
    1 << 20,
    1 << 22,
];

/// Index of the smallest slab class whose slots fit `size` bytes, or `None`
/// when `size` exceeds the largest class.
pub fn select_slab(size: usize) -> Option<usize> {
    SLOT_SIZES.iter().position(|&slot_size| size <= slot_size)
}

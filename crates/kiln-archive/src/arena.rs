//! Scratch arena backing one deserialization call.

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

/// Growable bump allocator owning every variable-length piece (names, arrays,
/// bytecode) of the descriptions decoded during one unpack call.
///
/// There is no per-allocation free; everything is released at once when the
/// arena is dropped. One arena per in-flight call, never shared across threads.
pub struct ScratchArena {
    bump: Bump,
}

impl ScratchArena {
    /// Initial block size; the arena grows by whole blocks as needed.
    pub const DEFAULT_BLOCK_SIZE: usize = 1 << 10;

    pub fn new() -> Self {
        Self::with_block_size(Self::DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            bump: Bump::with_capacity(block_size),
        }
    }

    /// Allocate `size` zeroed bytes.
    pub fn allocate(&self, size: usize) -> &mut [u8] {
        self.bump.alloc_slice_fill_copy(size, 0u8)
    }

    #[inline]
    pub fn alloc_str(&self, s: &str) -> &str {
        self.bump.alloc_str(s)
    }

    #[inline]
    pub fn alloc_bytes(&self, bytes: &[u8]) -> &[u8] {
        self.bump.alloc_slice_copy(bytes)
    }

    /// Start an arena-backed vector.
    #[inline]
    pub fn vec_with_capacity<T>(&self, capacity: usize) -> BumpVec<'_, T> {
        BumpVec::with_capacity_in(capacity, &self.bump)
    }

    /// Total bytes reserved from the system across all blocks.
    #[inline]
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

impl Default for ScratchArena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScratchArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchArena")
            .field("allocated_bytes", &self.allocated_bytes())
            .finish()
    }
}

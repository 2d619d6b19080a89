//! Dearchiver and load configuration.

use kiln_archive::ScratchArena;

/// Settings fixed for the lifetime of a [`Dearchiver`](crate::Dearchiver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DearchiverConfig {
    /// Block size of the scratch arena each unpack call decodes into.
    pub arena_block_size: usize,
}

impl Default for DearchiverConfig {
    fn default() -> Self {
        Self {
            arena_block_size: ScratchArena::DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Per-archive load settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Reject the archive unless its content version matches.
    pub expected_content_version: Option<u32>,
}

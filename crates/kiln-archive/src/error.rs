//! Error types for the archive crate.

use thiserror::Error;

use crate::{BackendId, ResourceCategory};

/// Errors that can occur when reading (or building) a device object archive.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] kiln_common::Error),

    /// Not a kiln archive.
    #[error("invalid archive magic: expected 'KILN', got {actual:?}")]
    InvalidMagic { actual: [u8; 4] },

    /// Archive written by an incompatible format revision.
    #[error("unsupported archive version: {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Stored checksum does not match the archive body.
    #[error("archive checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// Archive content version differs from the one the caller asked for.
    #[error("archive content version {found} does not match expected {expected}")]
    ContentVersionMismatch { found: u32, expected: u32 },

    /// Unknown backend identifier.
    #[error("unknown backend id: {0}")]
    UnknownBackend(u8),

    /// Unknown resource category tag.
    #[error("unknown resource category: {0}")]
    UnknownCategory(u32),

    /// Same name listed twice within one category.
    #[error("duplicate {category} name '{name}'")]
    DuplicateName {
        category: ResourceCategory,
        name: String,
    },

    /// Same backend listed twice for one resource.
    #[error("duplicate {backend} payload for {category} '{name}'")]
    DuplicateBackend {
        category: ResourceCategory,
        name: String,
        backend: BackendId,
    },

    /// Same backend shader section listed twice.
    #[error("duplicate {0} shader section")]
    DuplicateShaderSection(BackendId),

    /// A resource header is filed under one category but tagged with another.
    #[error("resource header tagged {found}, expected {expected}")]
    CategoryMismatch {
        expected: ResourceCategory,
        found: ResourceCategory,
    },

    /// A decoded field holds a value outside its domain.
    #[error("invalid {what}: {value}")]
    InvalidValue { what: &'static str, value: u64 },

    /// A region decoded without consuming all of its bytes.
    #[error("{what} has {remaining} undecoded trailing bytes")]
    TrailingBytes { what: &'static str, remaining: usize },

    /// Builder was asked to attach data to an entry it does not hold.
    #[error("no {category} named '{name}' in builder")]
    UnknownEntry {
        category: ResourceCategory,
        name: String,
    },
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for kiln-common.

use thiserror::Error;

/// Low-level errors shared by every kiln crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A read ran past the end of its buffer.
    #[error("truncated data: {needed} bytes needed, {available} left")]
    Truncated { needed: usize, available: usize },

    /// Region does not fit inside the buffer it addresses.
    #[error("region {offset}+{size} exceeds buffer of {len} bytes")]
    RegionOutOfBounds { offset: u64, size: u64, len: usize },

    /// A length or count does not fit the on-disk integer width.
    #[error("{what} length {len} exceeds the format limit of {max}")]
    LengthOverflow {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A length-prefixed string is not valid UTF-8.
    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

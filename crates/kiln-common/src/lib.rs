//! Common utilities for kiln.
//!
//! This crate provides foundational types and utilities used across all kiln crates:
//!
//! - [`BinaryReader`] - Zero-copy binary reading from byte slices
//! - [`BinaryWriter`] - Little-endian binary writing into a growable buffer
//! - [`ArchiveRegion`] - `{offset, size}` addressing into an archive byte store
//! - [`crc`] - CRC32C checksum utilities

mod error;
mod reader;
mod region;
mod writer;

pub mod crc;

pub use error::{Error, Result};
pub use reader::BinaryReader;
pub use region::{ArchiveRegion, RawRegion};
pub use writer::BinaryWriter;

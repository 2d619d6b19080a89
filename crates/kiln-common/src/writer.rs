//! Little-endian binary writer, the counterpart of [`BinaryReader`](crate::BinaryReader).

use byteorder::{LittleEndian, WriteBytesExt};
use zerocopy::{Immutable, IntoBytes};

use crate::{Error, Result};

/// Appends little-endian primitives to an owned buffer.
///
/// Offsets that are only known after later sections are laid out can be
/// reserved with a placeholder and filled in with [`patch_u32`](Self::patch_u32).
#[derive(Debug, Default, Clone)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write position (equal to the number of bytes written).
    #[inline]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.buf.write_u8(value)?;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.buf.write_u16::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.buf.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.buf.write_f32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a u32 element count, failing if `len` does not fit.
    pub fn write_count(&mut self, len: usize) -> Result<()> {
        let count = u32::try_from(len).map_err(|_| Error::LengthOverflow {
            what: "array",
            len,
            max: u32::MAX as usize,
        })?;
        self.write_u32(count)
    }

    /// Write a string prefixed with its u16 byte length.
    pub fn write_str16(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| Error::LengthOverflow {
            what: "string",
            len: value.len(),
            max: u16::MAX as usize,
        })?;
        self.write_u16(len)?;
        self.write_bytes(value.as_bytes());
        Ok(())
    }

    /// Write a byte blob prefixed with its u32 length.
    pub fn write_blob32(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_count(bytes.len())?;
        self.write_bytes(bytes);
        Ok(())
    }

    /// Write a zerocopy struct verbatim.
    pub fn write_struct<T: IntoBytes + Immutable>(&mut self, value: &T) {
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Overwrite four bytes at `at` with a little-endian u32.
    pub fn patch_u32(&mut self, at: usize, value: u32) -> Result<()> {
        let available = self.buf.len().saturating_sub(at);
        let slot = self
            .buf
            .get_mut(at..at + 4)
            .ok_or(Error::Truncated { needed: 4, available })?;
        slot.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

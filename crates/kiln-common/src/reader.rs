//! Cursor over a borrowed byte slice.
//!
//! Every archive region (index, resource header, backend payload, shader) is
//! decoded through a [`BinaryReader`]. Strings and blobs are returned as
//! sub-slices of the input; nothing is copied.

use zerocopy::FromBytes;

use crate::{Error, Result};

/// Little-endian reader over a byte slice.
///
/// # Example
///
/// ```
/// use kiln_common::BinaryReader;
///
/// let data = [0x03, 0x00, b'v', b's', b'0', 0x2A];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_str16().unwrap(), "vs0");
/// assert_eq!(reader.read_u8().unwrap(), 42);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Offset of the next byte to be read.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if count > available {
            return Err(Error::Truncated {
                needed: count,
                available,
            });
        }
        let start = self.position;
        self.position += count;
        Ok(&self.data[start..self.position])
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_array::<1>().map(|[b]| b)
    }

    /// Any non-zero byte is `true`.
    #[inline]
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// String prefixed with its `u16` byte length.
    pub fn read_str16(&mut self) -> Result<&'a str> {
        let len = self.read_u16()? as usize;
        Ok(std::str::from_utf8(self.read_bytes(len)?)?)
    }

    /// Blob prefixed with its `u32` byte length.
    pub fn read_blob32(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// Read a fixed-layout struct. Works for packed structs at any alignment.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::Truncated {
            needed: size,
            available: bytes.len(),
        })
    }
}

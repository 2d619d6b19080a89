//! Byte-range addressing into an archive byte store.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// On-disk form of an [`ArchiveRegion`].
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct RawRegion {
    /// Absolute offset from the start of the archive.
    pub offset: u32,
    /// Size in bytes.
    pub size: u32,
}

/// A validated `{offset, size}` range inside one archive's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ArchiveRegion {
    pub offset: u32,
    pub size: u32,
}

impl ArchiveRegion {
    #[inline]
    pub const fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    /// One past the last byte of the region.
    #[inline]
    pub const fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }

    /// Convert a raw region read from disk, checking it fits in `len` bytes.
    pub fn from_raw(raw: RawRegion, len: usize) -> Result<Self> {
        let region = Self::new(raw.offset, raw.size);
        region.check(len)?;
        Ok(region)
    }

    /// Fail unless the region lies entirely within a buffer of `len` bytes.
    pub fn check(&self, len: usize) -> Result<()> {
        if self.end() > len as u64 {
            return Err(Error::RegionOutOfBounds {
                offset: self.offset as u64,
                size: self.size as u64,
                len,
            });
        }
        Ok(())
    }

    /// Borrow the bytes this region addresses.
    pub fn slice<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        self.check(data.len())?;
        Ok(&data[self.offset as usize..self.end() as usize])
    }

    #[inline]
    pub fn to_raw(self) -> RawRegion {
        RawRegion {
            offset: self.offset,
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_within_bounds() {
        let data = [0u8, 1, 2, 3, 4, 5];
        let region = ArchiveRegion::new(2, 3);
        assert_eq!(region.slice(&data).unwrap(), &[2, 3, 4]);
    }

    #[test]
    fn test_region_past_end_rejected() {
        let raw = RawRegion { offset: 4, size: 8 };
        assert!(matches!(
            ArchiveRegion::from_raw(raw, 10),
            Err(Error::RegionOutOfBounds { offset: 4, size: 8, len: 10 })
        ));
    }

    #[test]
    fn test_region_end_does_not_overflow() {
        let region = ArchiveRegion::new(u32::MAX, u32::MAX);
        assert_eq!(region.end(), 2 * u32::MAX as u64);
        assert!(region.check(16).is_err());
    }
}

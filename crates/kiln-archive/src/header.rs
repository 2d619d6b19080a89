//! Fixed-size on-disk headers.

use bitflags::bitflags;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Archive file header.
///
/// Followed by the index (six category tables, then shader sections) and the
/// data area the index points into.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ArchiveHeader {
    /// Always [`ArchiveHeader::MAGIC`].
    pub magic: [u8; 4],
    /// Format revision.
    pub version: u32,
    /// User-assigned content version, checked on request at load time.
    pub content_version: u32,
    /// CRC32C of every byte after this header.
    pub checksum: u32,
}

impl ArchiveHeader {
    pub const MAGIC: [u8; 4] = *b"KILN";

    pub const VERSION: u32 = 1;

    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Byte offset of [`checksum`](Self::checksum) within the header.
    pub const CHECKSUM_OFFSET: usize = 12;
}

/// Header at the start of every resource header region.
///
/// The common description follows immediately and must fill the rest of the
/// region.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ResourceHeader {
    /// [`ResourceCategory`](crate::ResourceCategory) tag.
    pub category: u32,
    /// [`HeaderFlags`] bits.
    pub flags: u32,
}

bitflags! {
    /// Per-resource header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HeaderFlags: u32 {
        /// The pipeline's signature list names private implicit signatures.
        const IMPLICIT_SIGNATURE = 1 << 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_sizes() {
        assert_eq!(ArchiveHeader::SIZE, 16);
        assert_eq!(std::mem::size_of::<ResourceHeader>(), 8);
    }

    #[test]
    fn test_checksum_offset() {
        let header = ArchiveHeader {
            magic: ArchiveHeader::MAGIC,
            version: ArchiveHeader::VERSION,
            content_version: 0,
            checksum: 0xAABB_CCDD,
        };
        let bytes = header.as_bytes();
        let at = ArchiveHeader::CHECKSUM_OFFSET;
        assert_eq!(&bytes[at..at + 4], &0xAABB_CCDDu32.to_le_bytes());
    }
}

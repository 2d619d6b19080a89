//! Immutable archive byte storage.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use crate::Result;

/// The bytes of one loaded archive.
///
/// Never mutated after construction, so every concurrent unpack reads it
/// without locking.
pub enum ByteStore {
    /// Bytes held in memory (shared, so callers may keep their own handle).
    Shared(Arc<[u8]>),
    /// Memory-mapped archive file.
    Mapped(Mmap),
}

impl ByteStore {
    /// Memory-map an archive file.
    pub fn map_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: archives are treated as read-only; truncating the file while
        // it is mapped is outside the supported contract.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self::Mapped(mmap))
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Shared(bytes) => bytes,
            Self::Mapped(mmap) => mmap,
        }
    }
}

impl Deref for ByteStore {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Vec<u8>> for ByteStore {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Shared(bytes.into())
    }
}

impl From<Arc<[u8]>> for ByteStore {
    fn from(bytes: Arc<[u8]>) -> Self {
        Self::Shared(bytes)
    }
}

impl From<&[u8]> for ByteStore {
    fn from(bytes: &[u8]) -> Self {
        Self::Shared(bytes.into())
    }
}

impl std::fmt::Debug for ByteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Shared(_) => "Shared",
            Self::Mapped(_) => "Mapped",
        };
        f.debug_struct("ByteStore")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

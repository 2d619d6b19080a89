//! Archive Index: the parsed top-level layout of one device object archive.
//!
//! Parsing validates every region up front, so lookups afterwards are plain
//! map reads that never touch bytes outside the store. The index is immutable
//! once built and can be shared across threads without locking.

use std::hash::BuildHasherDefault;
use std::path::Path;

use hashbrown::HashMap as FastHashMap;
use kiln_common::{crc, ArchiveRegion, BinaryReader, RawRegion};
use rustc_hash::FxHasher;

use crate::{ArchiveHeader, BackendId, ByteStore, Error, ResourceCategory, Result};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Index entry for one named resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Resource header followed by the common description.
    pub header: ArchiveRegion,
    /// Backend payloads; `None` for backends the resource was not built for.
    pub payloads: [Option<ArchiveRegion>; BackendId::COUNT],
}

impl ResourceEntry {
    #[inline]
    pub fn payload(&self, backend: BackendId) -> Option<ArchiveRegion> {
        self.payloads[backend.index()]
    }

    /// Backends this resource carries a payload for.
    pub fn backends(&self) -> impl Iterator<Item = BackendId> + '_ {
        BackendId::ALL
            .into_iter()
            .filter(|b| self.payloads[b.index()].is_some())
    }
}

/// A loaded device object archive.
pub struct ObjectArchive {
    store: ByteStore,
    header: ArchiveHeader,
    resources: [FxHashMap<String, ResourceEntry>; ResourceCategory::COUNT],
    /// Per-backend shader sections, addressed by position.
    shaders: [Vec<ArchiveRegion>; BackendId::COUNT],
}

impl ObjectArchive {
    /// Memory-map and parse an archive file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(ByteStore::map_file(path)?)
    }

    /// Parse and validate an archive held in `store`.
    pub fn parse(store: ByteStore) -> Result<Self> {
        let data = store.as_slice();
        let mut reader = BinaryReader::new(data);

        let header: ArchiveHeader = reader.read_struct()?;
        let magic = header.magic;
        if magic != ArchiveHeader::MAGIC {
            return Err(Error::InvalidMagic { actual: magic });
        }
        let version = header.version;
        if version != ArchiveHeader::VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                expected: ArchiveHeader::VERSION,
            });
        }
        let stored = header.checksum;
        let computed = crc::hash_bytes(&data[ArchiveHeader::SIZE..]);
        if stored != computed {
            return Err(Error::ChecksumMismatch { stored, computed });
        }

        let resources = Self::parse_resource_tables(&mut reader, data.len())?;
        let shaders = Self::parse_shader_sections(&mut reader, data.len())?;

        let archive = Self {
            store,
            header,
            resources,
            shaders,
        };
        log::debug!("parsed {:?}", archive);
        Ok(archive)
    }

    fn parse_resource_tables(
        reader: &mut BinaryReader<'_>,
        len: usize,
    ) -> Result<[FxHashMap<String, ResourceEntry>; ResourceCategory::COUNT]> {
        let mut tables: [FxHashMap<String, ResourceEntry>; ResourceCategory::COUNT] =
            Default::default();

        for category in ResourceCategory::ALL {
            let count = reader.read_u32()? as usize;
            let table = &mut tables[category.index()];
            table.reserve(count.min(reader.remaining()));

            for _ in 0..count {
                let name = reader.read_str16()?.to_owned();
                let header = ArchiveRegion::from_raw(reader.read_struct::<RawRegion>()?, len)?;

                let mut payloads = [None; BackendId::COUNT];
                let backend_count = reader.read_u8()?;
                for _ in 0..backend_count {
                    let backend = BackendId::try_from(reader.read_u8()?)?;
                    let region = ArchiveRegion::from_raw(reader.read_struct::<RawRegion>()?, len)?;
                    let slot = &mut payloads[backend.index()];
                    if slot.is_some() {
                        return Err(Error::DuplicateBackend {
                            category,
                            name,
                            backend,
                        });
                    }
                    *slot = Some(region);
                }

                if table.contains_key(&name) {
                    return Err(Error::DuplicateName { category, name });
                }
                table.insert(name, ResourceEntry { header, payloads });
            }
        }

        Ok(tables)
    }

    fn parse_shader_sections(
        reader: &mut BinaryReader<'_>,
        len: usize,
    ) -> Result<[Vec<ArchiveRegion>; BackendId::COUNT]> {
        let mut sections: [Vec<ArchiveRegion>; BackendId::COUNT] = Default::default();
        let mut seen = [false; BackendId::COUNT];

        let section_count = reader.read_u8()?;
        for _ in 0..section_count {
            let backend = BackendId::try_from(reader.read_u8()?)?;
            if std::mem::replace(&mut seen[backend.index()], true) {
                return Err(Error::DuplicateShaderSection(backend));
            }
            let count = reader.read_u32()? as usize;
            let section = &mut sections[backend.index()];
            section.reserve(count.min(reader.remaining()));
            for _ in 0..count {
                section.push(ArchiveRegion::from_raw(reader.read_struct::<RawRegion>()?, len)?);
            }
        }

        Ok(sections)
    }

    /// Raw archive bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.store.as_slice()
    }

    #[inline]
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    #[inline]
    pub fn content_version(&self) -> u32 {
        self.header.content_version
    }

    /// Names stored under `category`, in no particular order.
    pub fn names(&self, category: ResourceCategory) -> impl Iterator<Item = &str> + '_ {
        self.resources[category.index()].keys().map(String::as_str)
    }

    #[inline]
    pub fn resource_count(&self, category: ResourceCategory) -> usize {
        self.resources[category.index()].len()
    }

    #[inline]
    pub fn entry(&self, category: ResourceCategory, name: &str) -> Option<&ResourceEntry> {
        self.resources[category.index()].get(name)
    }

    #[inline]
    pub fn contains(&self, category: ResourceCategory, name: &str) -> bool {
        self.resources[category.index()].contains_key(name)
    }

    /// Header region of a resource, or `None` if the name is not in the archive.
    pub fn locate_header(&self, category: ResourceCategory, name: &str) -> Option<ArchiveRegion> {
        self.entry(category, name).map(|e| e.header)
    }

    /// Header bytes of a resource.
    pub fn header_bytes(&self, category: ResourceCategory, name: &str) -> Option<&[u8]> {
        let region = self.locate_header(category, name)?;
        region.slice(self.bytes()).ok()
    }

    /// Payload bytes of a resource for one backend.
    ///
    /// `None` both when the name is absent and when the resource was not built
    /// for `backend`; callers decide which of those is fatal.
    pub fn locate_backend_payload(
        &self,
        category: ResourceCategory,
        name: &str,
        backend: BackendId,
    ) -> Option<&[u8]> {
        let region = self.entry(category, name)?.payload(backend)?;
        region.slice(self.bytes()).ok()
    }

    /// Number of shaders in the backend's shader section.
    #[inline]
    pub fn shader_count(&self, backend: BackendId) -> usize {
        self.shaders[backend.index()].len()
    }

    /// Bytes of the shader at `position` in the backend's shader section.
    pub fn shader_bytes(&self, backend: BackendId, position: u32) -> Option<&[u8]> {
        let region = self.shaders[backend.index()].get(position as usize)?;
        region.slice(self.bytes()).ok()
    }
}

impl std::fmt::Debug for ObjectArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(ResourceCategory, usize)> = ResourceCategory::ALL
            .into_iter()
            .map(|c| (c, self.resource_count(c)))
            .collect();
        f.debug_struct("ObjectArchive")
            .field("len", &self.bytes().len())
            .field("content_version", &self.content_version())
            .field("resources", &counts)
            .finish()
    }
}

//! Builder for synthesising device object archives.
//!
//! Packing real archives belongs to the offline toolchain; this builder exists
//! so tests and tools can produce well-formed (or deliberately broken) inputs.
//!
//! # Example
//!
//! ```
//! use kiln_archive::builder::ArchiveBuilder;
//! use kiln_archive::desc::{SignatureDesc, SignatureInternalData};
//! use kiln_archive::{BackendId, ByteStore, ObjectArchive, ResourceCategory};
//!
//! let desc = SignatureDesc {
//!     name: "Globals",
//!     resources: &[],
//!     immutable_samplers: &[],
//!     binding_index: 0,
//!     use_combined_texture_samplers: false,
//!     combined_sampler_suffix: "_sampler",
//!     srb_allocation_granularity: 1,
//! };
//! let internal = SignatureInternalData {
//!     resource_attribs: &[],
//!     immutable_sampler_attribs: &[],
//!     dynamic_buffer_count: 0,
//! };
//!
//! let mut builder = ArchiveBuilder::new();
//! builder.add_signature(&desc).unwrap();
//! builder
//!     .add_signature_payload("Globals", BackendId::Vulkan, None, &internal)
//!     .unwrap();
//!
//! let archive = ObjectArchive::parse(ByteStore::from(builder.build().unwrap())).unwrap();
//! assert!(archive.contains(ResourceCategory::Signature, "Globals"));
//! ```

use kiln_common::{crc, BinaryWriter, RawRegion};

use crate::desc::{
    PipelineDesc, PipelineInternalData, RenderPassDesc, ShaderCreateInfo, SignatureDesc,
    SignatureInternalData,
};
use crate::{
    encode, ArchiveHeader, BackendId, Error, HeaderFlags, PipelineKind, ResourceCategory, Result,
};

#[derive(Debug, Clone)]
struct PendingEntry {
    name: String,
    header: Vec<u8>,
    payloads: Vec<(BackendId, Vec<u8>)>,
}

/// Accumulates resources and shaders, then lays them out as one archive.
#[derive(Debug, Default, Clone)]
pub struct ArchiveBuilder {
    content_version: u32,
    entries: [Vec<PendingEntry>; ResourceCategory::COUNT],
    shaders: [Vec<Vec<u8>>; BackendId::COUNT],
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content version stamped into the archive header.
    pub fn content_version(&mut self, version: u32) -> &mut Self {
        self.content_version = version;
        self
    }

    /// Add a shader to the backend's section and return its position.
    ///
    /// Byte-identical shaders share one position.
    pub fn add_shader(&mut self, backend: BackendId, info: &ShaderCreateInfo<'_>) -> Result<u32> {
        let mut w = BinaryWriter::new();
        encode::shader_create_info(&mut w, info)?;
        self.add_raw_shader(backend, w.into_inner())
    }

    /// Add pre-encoded shader bytes and return their position.
    pub fn add_raw_shader(&mut self, backend: BackendId, bytes: Vec<u8>) -> Result<u32> {
        let section = &mut self.shaders[backend.index()];
        if let Some(position) = section.iter().position(|s| *s == bytes) {
            return Ok(position as u32);
        }
        section.push(bytes);
        u32::try_from(section.len() - 1).map_err(|_| {
            Error::Common(kiln_common::Error::LengthOverflow {
                what: "shader section",
                len: section.len(),
                max: u32::MAX as usize,
            })
        })
    }

    pub fn add_signature(&mut self, desc: &SignatureDesc<'_>) -> Result<()> {
        let mut w = BinaryWriter::new();
        encode::resource_header(&mut w, ResourceCategory::Signature, HeaderFlags::empty());
        encode::signature_desc(&mut w, desc)?;
        self.add_raw(ResourceCategory::Signature, desc.name, w.into_inner())
    }

    /// Attach a backend payload to a signature. `variant` replaces the common
    /// description for this backend.
    pub fn add_signature_payload(
        &mut self,
        name: &str,
        backend: BackendId,
        variant: Option<&SignatureDesc<'_>>,
        internal: &SignatureInternalData<'_>,
    ) -> Result<()> {
        let mut w = BinaryWriter::new();
        w.write_bool(variant.is_some())?;
        if let Some(variant) = variant {
            encode::signature_desc(&mut w, variant)?;
        }
        encode::signature_internal_data(&mut w, internal)?;
        self.add_raw_payload(ResourceCategory::Signature, name, backend, w.into_inner())
    }

    pub fn add_render_pass(&mut self, desc: &RenderPassDesc<'_>) -> Result<()> {
        let mut w = BinaryWriter::new();
        encode::resource_header(&mut w, ResourceCategory::RenderPass, HeaderFlags::empty());
        encode::render_pass_desc(&mut w, desc)?;
        self.add_raw(ResourceCategory::RenderPass, desc.name, w.into_inner())
    }

    pub fn add_render_pass_payload(
        &mut self,
        name: &str,
        backend: BackendId,
        variant: Option<&RenderPassDesc<'_>>,
    ) -> Result<()> {
        let mut w = BinaryWriter::new();
        w.write_bool(variant.is_some())?;
        if let Some(variant) = variant {
            encode::render_pass_desc(&mut w, variant)?;
        }
        self.add_raw_payload(ResourceCategory::RenderPass, name, backend, w.into_inner())
    }

    /// Add a pipeline; its category follows from the description's state.
    pub fn add_pipeline(&mut self, desc: &PipelineDesc<'_>, flags: HeaderFlags) -> Result<()> {
        let category = desc.kind().category();
        let mut w = BinaryWriter::new();
        encode::resource_header(&mut w, category, flags);
        encode::pipeline_desc(&mut w, desc)?;
        self.add_raw(category, desc.name, w.into_inner())
    }

    pub fn add_pipeline_payload(
        &mut self,
        kind: PipelineKind,
        name: &str,
        backend: BackendId,
        variant: Option<&PipelineDesc<'_>>,
        internal: &PipelineInternalData<'_>,
    ) -> Result<()> {
        let mut w = BinaryWriter::new();
        w.write_bool(variant.is_some())?;
        if let Some(variant) = variant {
            encode::pipeline_desc(&mut w, variant)?;
        }
        encode::pipeline_internal_data(&mut w, internal)?;
        self.add_raw_payload(kind.category(), name, backend, w.into_inner())
    }

    /// Add an entry with pre-encoded header bytes.
    pub fn add_raw(&mut self, category: ResourceCategory, name: &str, header: Vec<u8>) -> Result<()> {
        let entries = &mut self.entries[category.index()];
        if entries.iter().any(|e| e.name == name) {
            return Err(Error::DuplicateName {
                category,
                name: name.to_owned(),
            });
        }
        entries.push(PendingEntry {
            name: name.to_owned(),
            header,
            payloads: Vec::new(),
        });
        Ok(())
    }

    /// Attach pre-encoded payload bytes to an existing entry.
    pub fn add_raw_payload(
        &mut self,
        category: ResourceCategory,
        name: &str,
        backend: BackendId,
        payload: Vec<u8>,
    ) -> Result<()> {
        let entry = self.entries[category.index()]
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::UnknownEntry {
                category,
                name: name.to_owned(),
            })?;
        if entry.payloads.iter().any(|(b, _)| *b == backend) {
            return Err(Error::DuplicateBackend {
                category,
                name: name.to_owned(),
                backend,
            });
        }
        entry.payloads.push((backend, payload));
        Ok(())
    }

    /// Lay out header, index and data, then stamp the checksum.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut w = BinaryWriter::new();
        w.write_struct(&ArchiveHeader {
            magic: ArchiveHeader::MAGIC,
            version: ArchiveHeader::VERSION,
            content_version: self.content_version,
            checksum: 0,
        });

        // Regions are written as placeholders and patched once the data area
        // is laid out.
        let mut pending: Vec<(usize, &[u8])> = Vec::new();

        for entries in &self.entries {
            w.write_count(entries.len())?;
            for entry in entries {
                w.write_str16(&entry.name)?;
                pending.push(reserve_region(&mut w, &entry.header));
                w.write_u8(entry.payloads.len() as u8)?;
                for (backend, payload) in &entry.payloads {
                    w.write_u8(*backend as u8)?;
                    pending.push(reserve_region(&mut w, payload));
                }
            }
        }

        let sections: Vec<(BackendId, &Vec<Vec<u8>>)> = BackendId::ALL
            .into_iter()
            .map(|b| (b, &self.shaders[b.index()]))
            .filter(|(_, s)| !s.is_empty())
            .collect();
        w.write_u8(sections.len() as u8)?;
        for (backend, shaders) in sections {
            w.write_u8(backend as u8)?;
            w.write_count(shaders.len())?;
            for shader in shaders {
                pending.push(reserve_region(&mut w, shader));
            }
        }

        for (slot, bytes) in pending {
            let offset = to_u32(w.position(), "archive")?;
            let size = to_u32(bytes.len(), "region")?;
            w.write_bytes(bytes);
            w.patch_u32(slot, offset)?;
            w.patch_u32(slot + 4, size)?;
        }

        let checksum = crc::hash_bytes(&w.as_slice()[ArchiveHeader::SIZE..]);
        w.patch_u32(ArchiveHeader::CHECKSUM_OFFSET, checksum)?;
        Ok(w.into_inner())
    }
}

fn reserve_region<'b>(w: &mut BinaryWriter, bytes: &'b [u8]) -> (usize, &'b [u8]) {
    let slot = w.position();
    w.write_struct(&RawRegion { offset: 0, size: 0 });
    (slot, bytes)
}

fn to_u32(len: usize, what: &'static str) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        Error::Common(kiln_common::Error::LengthOverflow {
            what,
            len,
            max: u32::MAX as usize,
        })
    })
}

//! Decoding of header and payload regions into arena-backed descriptions.
//!
//! Layout conventions: integers are little-endian, strings are `u16`-length
//! prefixed, arrays are `u32`-count prefixed, optional values carry a leading
//! `u8` presence flag.

use kiln_common::BinaryReader;
use zerocopy::FromBytes;

use crate::desc::*;
use crate::{Error, HeaderFlags, PipelineKind, ResourceCategory, ResourceHeader, Result, ScratchArena};

/// Cursor over one archive region that allocates decoded data in a
/// [`ScratchArena`].
///
/// Call [`finish`](Self::finish) once decoding is done: a region that still has
/// bytes left is corrupt or was written by a different format revision.
pub struct DescDecoder<'r, 'a> {
    reader: BinaryReader<'r>,
    arena: &'a ScratchArena,
    what: &'static str,
}

impl<'r, 'a> DescDecoder<'r, 'a> {
    /// `what` names the region in errors, e.g. `"signature payload"`.
    pub fn new(bytes: &'r [u8], arena: &'a ScratchArena, what: &'static str) -> Self {
        Self {
            reader: BinaryReader::new(bytes),
            arena,
            what,
        }
    }

    #[inline]
    pub fn arena(&self) -> &'a ScratchArena {
        self.arena
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.reader.remaining()
    }

    /// Fail if any bytes of the region were left undecoded.
    pub fn finish(self) -> Result<()> {
        if !self.reader.is_empty() {
            return Err(Error::TrailingBytes {
                what: self.what,
                remaining: self.reader.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        Ok(self.reader.read_struct()?)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.reader.read_u8()?)
    }

    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.reader.read_bool()?)
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(self.reader.read_u16()?)
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(self.reader.read_u32()?)
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(self.reader.read_f32()?)
    }

    /// Read a string into the arena.
    pub fn str(&mut self) -> Result<&'a str> {
        let s = self.reader.read_str16()?;
        Ok(self.arena.alloc_str(s))
    }

    pub fn opt_str(&mut self) -> Result<Option<&'a str>> {
        if self.bool()? {
            self.str().map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn opt_u32(&mut self) -> Result<Option<u32>> {
        if self.bool()? {
            self.u32().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a length-prefixed blob into the arena.
    pub fn blob(&mut self) -> Result<&'a [u8]> {
        let bytes = self.reader.read_blob32()?;
        Ok(self.arena.alloc_bytes(bytes))
    }

    /// Read a count-prefixed array, decoding each element with `item`.
    pub fn array<T, F>(&mut self, mut item: F) -> Result<&'a [T]>
    where
        F: FnMut(&mut Self) -> Result<T>,
    {
        let count = self.u32()? as usize;
        let arena = self.arena;
        // Every element takes at least one byte, so a count beyond the
        // remaining bytes can only fail; do not reserve for it.
        let mut items = arena.vec_with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(item(self)?);
        }
        Ok(items.into_bump_slice())
    }

    /// Read a `u8`-encoded enum.
    pub fn enum_u8<T>(&mut self, what: &'static str, from: fn(u8) -> Option<T>) -> Result<T> {
        let raw = self.u8()?;
        from(raw).ok_or(Error::InvalidValue {
            what,
            value: raw as u64,
        })
    }

    pub fn stages(&mut self) -> Result<ShaderStages> {
        let raw = self.u32()?;
        ShaderStages::from_bits(raw).ok_or(Error::InvalidValue {
            what: "shader stages",
            value: raw as u64,
        })
    }
}

/// Read the [`ResourceHeader`] at the start of a header region and check that
/// it is tagged with the category it was filed under.
pub fn resource_header(dec: &mut DescDecoder<'_, '_>, expected: ResourceCategory) -> Result<HeaderFlags> {
    let header: ResourceHeader = dec.read_struct()?;
    let found = ResourceCategory::try_from(header.category)?;
    if found != expected {
        return Err(Error::CategoryMismatch { expected, found });
    }
    HeaderFlags::from_bits(header.flags).ok_or(Error::InvalidValue {
        what: "header flags",
        value: header.flags as u64,
    })
}

// ============================================================================
// Signatures
// ============================================================================

fn sampler_desc(dec: &mut DescDecoder<'_, '_>) -> Result<SamplerDesc> {
    Ok(SamplerDesc {
        min_filter: dec.enum_u8("filter type", FilterType::from_u8)?,
        mag_filter: dec.enum_u8("filter type", FilterType::from_u8)?,
        mip_filter: dec.enum_u8("filter type", FilterType::from_u8)?,
        address_u: dec.enum_u8("address mode", AddressMode::from_u8)?,
        address_v: dec.enum_u8("address mode", AddressMode::from_u8)?,
        address_w: dec.enum_u8("address mode", AddressMode::from_u8)?,
        mip_lod_bias: dec.f32()?,
        max_anisotropy: dec.u32()?,
    })
}

pub fn signature_desc<'a>(dec: &mut DescDecoder<'_, 'a>) -> Result<SignatureDesc<'a>> {
    let name = dec.str()?;
    let binding_index = dec.u8()?;
    let use_combined_texture_samplers = dec.bool()?;
    let combined_sampler_suffix = dec.str()?;

    let resources = dec.array(|d| {
        Ok(ResourceDesc {
            name: d.str()?,
            shader_stages: d.stages()?,
            array_size: d.u32()?,
            resource_type: d.enum_u8("resource type", ResourceType::from_u8)?,
            var_type: d.enum_u8("variable type", VariableType::from_u8)?,
            flags: {
                let raw = d.u8()?;
                ResourceFlags::from_bits(raw).ok_or(Error::InvalidValue {
                    what: "resource flags",
                    value: raw as u64,
                })?
            },
        })
    })?;

    let immutable_samplers = dec.array(|d| {
        Ok(ImmutableSamplerDesc {
            shader_stages: d.stages()?,
            sampler_or_texture_name: d.str()?,
            desc: sampler_desc(d)?,
        })
    })?;

    Ok(SignatureDesc {
        name,
        resources,
        immutable_samplers,
        binding_index,
        use_combined_texture_samplers,
        combined_sampler_suffix,
        srb_allocation_granularity: 1,
    })
}

fn resource_attribs(dec: &mut DescDecoder<'_, '_>) -> Result<ResourceAttribs> {
    Ok(ResourceAttribs {
        binding: dec.u32()?,
        space: dec.u16()?,
    })
}

pub fn signature_internal_data<'a>(dec: &mut DescDecoder<'_, 'a>) -> Result<SignatureInternalData<'a>> {
    Ok(SignatureInternalData {
        resource_attribs: dec.array(resource_attribs)?,
        immutable_sampler_attribs: dec.array(resource_attribs)?,
        dynamic_buffer_count: dec.u32()?,
    })
}

// ============================================================================
// Render passes
// ============================================================================

fn attachment_ref(dec: &mut DescDecoder<'_, '_>) -> Result<AttachmentRef> {
    Ok(AttachmentRef {
        attachment_index: dec.u32()?,
        state: dec.u32()?,
    })
}

pub fn render_pass_desc<'a>(dec: &mut DescDecoder<'_, 'a>) -> Result<RenderPassDesc<'a>> {
    let name = dec.str()?;

    let attachments = dec.array(|d| {
        Ok(AttachmentDesc {
            format: d.u16()?,
            sample_count: d.u8()?,
            load_op: d.enum_u8("load op", LoadOp::from_u8)?,
            store_op: d.enum_u8("store op", StoreOp::from_u8)?,
            stencil_load_op: d.enum_u8("load op", LoadOp::from_u8)?,
            stencil_store_op: d.enum_u8("store op", StoreOp::from_u8)?,
            initial_state: d.u32()?,
            final_state: d.u32()?,
        })
    })?;

    let subpasses = dec.array(|d| {
        Ok(SubpassDesc {
            input_attachments: d.array(attachment_ref)?,
            render_target_attachments: d.array(attachment_ref)?,
            resolve_attachments: d.array(attachment_ref)?,
            depth_stencil_attachment: if d.bool()? {
                Some(attachment_ref(d)?)
            } else {
                None
            },
        })
    })?;

    let dependencies = dec.array(|d| {
        Ok(SubpassDependency {
            src_subpass: d.u32()?,
            dst_subpass: d.u32()?,
            src_stage_mask: d.u32()?,
            dst_stage_mask: d.u32()?,
            src_access_mask: d.u32()?,
            dst_access_mask: d.u32()?,
        })
    })?;

    Ok(RenderPassDesc {
        name,
        attachments,
        subpasses,
        dependencies,
    })
}

// ============================================================================
// Pipelines
// ============================================================================

fn rtv_formats(dec: &mut DescDecoder<'_, '_>) -> Result<[u16; MAX_RENDER_TARGETS]> {
    let mut formats = [0u16; MAX_RENDER_TARGETS];
    for format in &mut formats {
        *format = dec.u16()?;
    }
    Ok(formats)
}

fn graphics_state<'a>(dec: &mut DescDecoder<'_, 'a>) -> Result<GraphicsState<'a>> {
    let primitive_topology = dec.u8()?;
    let cull_mode = dec.u8()?;
    let depth_enable = dec.bool()?;
    let num_render_targets = dec.u8()?;
    if num_render_targets as usize > MAX_RENDER_TARGETS {
        return Err(Error::InvalidValue {
            what: "render target count",
            value: num_render_targets as u64,
        });
    }
    let rtv_formats = rtv_formats(dec)?;
    let dsv_format = dec.u16()?;
    let sample_count = dec.u8()?;
    let input_layout = dec.array(|d| {
        Ok(LayoutElement {
            input_index: d.u32()?,
            buffer_slot: d.u32()?,
            num_components: d.u8()?,
            value_type: d.u8()?,
            is_normalized: d.bool()?,
            relative_offset: d.u32()?,
            stride: d.u32()?,
            per_instance: d.bool()?,
        })
    })?;
    let render_pass = dec.opt_str()?;
    let subpass_index = dec.u8()?;

    Ok(GraphicsState {
        primitive_topology,
        cull_mode,
        depth_enable,
        num_render_targets,
        rtv_formats,
        dsv_format,
        sample_count,
        input_layout,
        render_pass,
        subpass_index,
    })
}

fn tile_state(dec: &mut DescDecoder<'_, '_>) -> Result<TileState> {
    let num_render_targets = dec.u8()?;
    if num_render_targets as usize > MAX_RENDER_TARGETS {
        return Err(Error::InvalidValue {
            what: "render target count",
            value: num_render_targets as u64,
        });
    }
    Ok(TileState {
        num_render_targets,
        rtv_formats: rtv_formats(dec)?,
        sample_count: dec.u8()?,
    })
}

fn ray_tracing_state<'a>(dec: &mut DescDecoder<'_, 'a>) -> Result<RayTracingState<'a>> {
    Ok(RayTracingState {
        max_recursion_depth: dec.u8()?,
        shader_record_size: dec.u16()?,
        general_shaders: dec.array(|d| {
            Ok(RtGeneralShaderGroup {
                name: d.str()?,
                shader: d.u32()?,
            })
        })?,
        triangle_hit_shaders: dec.array(|d| {
            Ok(RtTriangleHitGroup {
                name: d.str()?,
                closest_hit: d.u32()?,
                any_hit: d.opt_u32()?,
            })
        })?,
        procedural_hit_shaders: dec.array(|d| {
            Ok(RtProceduralHitGroup {
                name: d.str()?,
                intersection: d.u32()?,
                closest_hit: d.opt_u32()?,
                any_hit: d.opt_u32()?,
            })
        })?,
    })
}

pub fn pipeline_desc<'a>(dec: &mut DescDecoder<'_, 'a>, kind: PipelineKind) -> Result<PipelineDesc<'a>> {
    let name = dec.str()?;
    let default_variable_type = dec.enum_u8("variable type", VariableType::from_u8)?;
    let signature_names = dec.array(|d| d.str())?;

    let state = match kind {
        PipelineKind::Graphics => PipelineState::Graphics(graphics_state(dec)?),
        PipelineKind::Compute => PipelineState::Compute,
        PipelineKind::Tile => PipelineState::Tile(tile_state(dec)?),
        PipelineKind::RayTracing => PipelineState::RayTracing(ray_tracing_state(dec)?),
    };

    Ok(PipelineDesc {
        name,
        srb_allocation_granularity: 1,
        immediate_context_mask: 1,
        default_variable_type,
        signature_names,
        state,
    })
}

pub fn pipeline_internal_data<'a>(dec: &mut DescDecoder<'_, 'a>) -> Result<PipelineInternalData<'a>> {
    Ok(PipelineInternalData {
        shader_positions: dec.array(|d| d.u32())?,
    })
}

// ============================================================================
// Shaders
// ============================================================================

pub fn shader_create_info<'a>(dec: &mut DescDecoder<'_, 'a>) -> Result<ShaderCreateInfo<'a>> {
    let name = dec.str()?;
    let stage = dec.stages()?;
    if stage.bits().count_ones() != 1 {
        return Err(Error::InvalidValue {
            what: "shader stage",
            value: stage.bits() as u64,
        });
    }
    let entry_point = dec.str()?;
    let source_language = dec.enum_u8("source language", SourceLanguage::from_u8)?;
    let bytecode = dec.blob()?;
    let reflection = if dec.bool()? {
        Some(dec.array(|d| {
            Ok(ShaderResourceDesc {
                name: d.str()?,
                resource_type: d.enum_u8("resource type", ResourceType::from_u8)?,
                array_size: d.u32()?,
            })
        })?)
    } else {
        None
    };

    Ok(ShaderCreateInfo {
        name,
        stage,
        entry_point,
        source_language,
        bytecode,
        reflection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::BinaryWriter;

    #[test]
    fn test_trailing_bytes_detected() {
        let mut writer = BinaryWriter::new();
        writer.write_count(1).unwrap();
        writer.write_u32(5).unwrap();
        writer.write_u8(0xEE).unwrap();
        let bytes = writer.into_inner();

        let arena = ScratchArena::new();
        let mut dec = DescDecoder::new(&bytes, &arena, "pipeline payload");
        let internal = pipeline_internal_data(&mut dec).unwrap();
        assert_eq!(internal.shader_positions, [5]);
        assert!(matches!(
            dec.finish(),
            Err(Error::TrailingBytes { what: "pipeline payload", remaining: 1 })
        ));
    }

    #[test]
    fn test_huge_count_fails_without_reserving() {
        let mut writer = BinaryWriter::new();
        writer.write_u32(u32::MAX).unwrap();
        let bytes = writer.into_inner();

        let arena = ScratchArena::new();
        let mut dec = DescDecoder::new(&bytes, &arena, "pipeline payload");
        assert!(matches!(
            pipeline_internal_data(&mut dec),
            Err(Error::Common(kiln_common::Error::Truncated { .. }))
        ));
    }

    #[test]
    fn test_header_category_mismatch() {
        let mut writer = BinaryWriter::new();
        writer.write_struct(&ResourceHeader {
            category: ResourceCategory::RenderPass as u32,
            flags: 0,
        });
        let bytes = writer.into_inner();

        let arena = ScratchArena::new();
        let mut dec = DescDecoder::new(&bytes, &arena, "signature header");
        assert!(matches!(
            resource_header(&mut dec, ResourceCategory::Signature),
            Err(Error::CategoryMismatch {
                expected: ResourceCategory::Signature,
                found: ResourceCategory::RenderPass,
            })
        ));
    }

    #[test]
    fn test_shader_with_two_stage_bits_rejected() {
        let mut writer = BinaryWriter::new();
        writer.write_str16("vs").unwrap();
        writer
            .write_u32((ShaderStages::VERTEX | ShaderStages::PIXEL).bits())
            .unwrap();
        let bytes = writer.into_inner();

        let arena = ScratchArena::new();
        let mut dec = DescDecoder::new(&bytes, &arena, "shader");
        assert!(matches!(
            shader_create_info(&mut dec),
            Err(Error::InvalidValue { what: "shader stage", .. })
        ));
    }
}

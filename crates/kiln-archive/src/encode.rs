//! Encoding of descriptions, the mirror image of [`decode`](crate::decode).
//!
//! Only the writer can fail here (oversized strings or arrays), so these
//! functions return the common error type.

use kiln_common::{BinaryWriter, Result};

use crate::desc::*;
use crate::{HeaderFlags, ResourceCategory, ResourceHeader};

fn write_opt_u32(w: &mut BinaryWriter, value: Option<u32>) -> Result<()> {
    w.write_bool(value.is_some())?;
    if let Some(value) = value {
        w.write_u32(value)?;
    }
    Ok(())
}

fn write_opt_str(w: &mut BinaryWriter, value: Option<&str>) -> Result<()> {
    w.write_bool(value.is_some())?;
    if let Some(value) = value {
        w.write_str16(value)?;
    }
    Ok(())
}

fn write_array<T>(
    w: &mut BinaryWriter,
    items: &[T],
    mut item: impl FnMut(&mut BinaryWriter, &T) -> Result<()>,
) -> Result<()> {
    w.write_count(items.len())?;
    for value in items {
        item(w, value)?;
    }
    Ok(())
}

pub fn resource_header(w: &mut BinaryWriter, category: ResourceCategory, flags: HeaderFlags) {
    w.write_struct(&ResourceHeader {
        category: category as u32,
        flags: flags.bits(),
    });
}

fn sampler_desc(w: &mut BinaryWriter, desc: &SamplerDesc) -> Result<()> {
    w.write_u8(desc.min_filter as u8)?;
    w.write_u8(desc.mag_filter as u8)?;
    w.write_u8(desc.mip_filter as u8)?;
    w.write_u8(desc.address_u as u8)?;
    w.write_u8(desc.address_v as u8)?;
    w.write_u8(desc.address_w as u8)?;
    w.write_f32(desc.mip_lod_bias)?;
    w.write_u32(desc.max_anisotropy)
}

pub fn signature_desc(w: &mut BinaryWriter, desc: &SignatureDesc<'_>) -> Result<()> {
    w.write_str16(desc.name)?;
    w.write_u8(desc.binding_index)?;
    w.write_bool(desc.use_combined_texture_samplers)?;
    w.write_str16(desc.combined_sampler_suffix)?;
    write_array(w, desc.resources, |w, r| {
        w.write_str16(r.name)?;
        w.write_u32(r.shader_stages.bits())?;
        w.write_u32(r.array_size)?;
        w.write_u8(r.resource_type as u8)?;
        w.write_u8(r.var_type as u8)?;
        w.write_u8(r.flags.bits())
    })?;
    write_array(w, desc.immutable_samplers, |w, s| {
        w.write_u32(s.shader_stages.bits())?;
        w.write_str16(s.sampler_or_texture_name)?;
        sampler_desc(w, &s.desc)
    })
}

fn resource_attribs(w: &mut BinaryWriter, attribs: &ResourceAttribs) -> Result<()> {
    w.write_u32(attribs.binding)?;
    w.write_u16(attribs.space)
}

pub fn signature_internal_data(w: &mut BinaryWriter, data: &SignatureInternalData<'_>) -> Result<()> {
    write_array(w, data.resource_attribs, resource_attribs)?;
    write_array(w, data.immutable_sampler_attribs, resource_attribs)?;
    w.write_u32(data.dynamic_buffer_count)
}

fn attachment_ref(w: &mut BinaryWriter, r: &AttachmentRef) -> Result<()> {
    w.write_u32(r.attachment_index)?;
    w.write_u32(r.state)
}

pub fn render_pass_desc(w: &mut BinaryWriter, desc: &RenderPassDesc<'_>) -> Result<()> {
    w.write_str16(desc.name)?;
    write_array(w, desc.attachments, |w, a| {
        w.write_u16(a.format)?;
        w.write_u8(a.sample_count)?;
        w.write_u8(a.load_op as u8)?;
        w.write_u8(a.store_op as u8)?;
        w.write_u8(a.stencil_load_op as u8)?;
        w.write_u8(a.stencil_store_op as u8)?;
        w.write_u32(a.initial_state)?;
        w.write_u32(a.final_state)
    })?;
    write_array(w, desc.subpasses, |w, s| {
        write_array(w, s.input_attachments, attachment_ref)?;
        write_array(w, s.render_target_attachments, attachment_ref)?;
        write_array(w, s.resolve_attachments, attachment_ref)?;
        w.write_bool(s.depth_stencil_attachment.is_some())?;
        match &s.depth_stencil_attachment {
            Some(r) => attachment_ref(w, r),
            None => Ok(()),
        }
    })?;
    write_array(w, desc.dependencies, |w, d| {
        w.write_u32(d.src_subpass)?;
        w.write_u32(d.dst_subpass)?;
        w.write_u32(d.src_stage_mask)?;
        w.write_u32(d.dst_stage_mask)?;
        w.write_u32(d.src_access_mask)?;
        w.write_u32(d.dst_access_mask)
    })
}

fn rtv_formats(w: &mut BinaryWriter, formats: &[u16; MAX_RENDER_TARGETS]) -> Result<()> {
    for &format in formats {
        w.write_u16(format)?;
    }
    Ok(())
}

/// Encode a pipeline description. The kind is implied by the category the
/// pipeline is filed under.
pub fn pipeline_desc(w: &mut BinaryWriter, desc: &PipelineDesc<'_>) -> Result<()> {
    w.write_str16(desc.name)?;
    w.write_u8(desc.default_variable_type as u8)?;
    write_array(w, desc.signature_names, |w, name| w.write_str16(name))?;

    match &desc.state {
        PipelineState::Graphics(g) => {
            w.write_u8(g.primitive_topology)?;
            w.write_u8(g.cull_mode)?;
            w.write_bool(g.depth_enable)?;
            w.write_u8(g.num_render_targets)?;
            rtv_formats(w, &g.rtv_formats)?;
            w.write_u16(g.dsv_format)?;
            w.write_u8(g.sample_count)?;
            write_array(w, g.input_layout, |w, e| {
                w.write_u32(e.input_index)?;
                w.write_u32(e.buffer_slot)?;
                w.write_u8(e.num_components)?;
                w.write_u8(e.value_type)?;
                w.write_bool(e.is_normalized)?;
                w.write_u32(e.relative_offset)?;
                w.write_u32(e.stride)?;
                w.write_bool(e.per_instance)
            })?;
            write_opt_str(w, g.render_pass)?;
            w.write_u8(g.subpass_index)
        }
        PipelineState::Compute => Ok(()),
        PipelineState::Tile(t) => {
            w.write_u8(t.num_render_targets)?;
            rtv_formats(w, &t.rtv_formats)?;
            w.write_u8(t.sample_count)
        }
        PipelineState::RayTracing(rt) => {
            w.write_u8(rt.max_recursion_depth)?;
            w.write_u16(rt.shader_record_size)?;
            write_array(w, rt.general_shaders, |w, g| {
                w.write_str16(g.name)?;
                w.write_u32(g.shader)
            })?;
            write_array(w, rt.triangle_hit_shaders, |w, g| {
                w.write_str16(g.name)?;
                w.write_u32(g.closest_hit)?;
                write_opt_u32(w, g.any_hit)
            })?;
            write_array(w, rt.procedural_hit_shaders, |w, g| {
                w.write_str16(g.name)?;
                w.write_u32(g.intersection)?;
                write_opt_u32(w, g.closest_hit)?;
                write_opt_u32(w, g.any_hit)
            })
        }
    }
}

pub fn pipeline_internal_data(w: &mut BinaryWriter, data: &PipelineInternalData<'_>) -> Result<()> {
    write_array(w, data.shader_positions, |w, &p| w.write_u32(p))
}

pub fn shader_create_info(w: &mut BinaryWriter, info: &ShaderCreateInfo<'_>) -> Result<()> {
    w.write_str16(info.name)?;
    w.write_u32(info.stage.bits())?;
    w.write_str16(info.entry_point)?;
    w.write_u8(info.source_language as u8)?;
    w.write_blob32(info.bytecode)?;
    w.write_bool(info.reflection.is_some())?;
    if let Some(reflection) = info.reflection {
        write_array(w, reflection, |w, r| {
            w.write_str16(r.name)?;
            w.write_u8(r.resource_type as u8)?;
            w.write_u32(r.array_size)
        })?;
    }
    Ok(())
}

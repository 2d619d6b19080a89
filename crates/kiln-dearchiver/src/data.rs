//! Typed data holders for a single unpack call.
//!
//! Each holder borrows the archive's header and payload regions and the
//! [`ScratchArena`] the call decodes into. The arena is owned by the unpack
//! call, so everything a holder points at is released together when the call
//! returns, on success or failure alike.

use kiln_archive::decode::{self, DescDecoder};
use kiln_archive::desc::{
    PipelineDesc, PipelineInternalData, RenderPassDesc, ShaderCreateInfo, SignatureDesc,
    SignatureInternalData,
};
use kiln_archive::{HeaderFlags, PipelineKind, ResourceCategory, Result, ScratchArena};

/// Decode one region with `f` and require that it consumed every byte.
pub(crate) fn decode_region<'a, T>(
    bytes: &'a [u8],
    arena: &'a ScratchArena,
    what: &'static str,
    f: impl FnOnce(&mut DescDecoder<'a, 'a>) -> Result<T>,
) -> Result<T> {
    let mut dec = DescDecoder::new(bytes, arena, what);
    let value = f(&mut dec)?;
    dec.finish()?;
    Ok(value)
}

/// Read the override flag at the start of a backend payload, returning the
/// variant description if one is present.
fn desc_override<'a, T>(
    dec: &mut DescDecoder<'a, 'a>,
    variant: impl FnOnce(&mut DescDecoder<'a, 'a>) -> Result<T>,
) -> Result<Option<T>> {
    if dec.bool()? {
        variant(dec).map(Some)
    } else {
        Ok(None)
    }
}

#[derive(Debug)]
pub struct SignatureData<'a> {
    /// Header region in the archive.
    pub header: &'a [u8],
    pub flags: HeaderFlags,
    pub desc: SignatureDesc<'a>,
    pub internal: SignatureInternalData<'a>,
}

impl<'a> SignatureData<'a> {
    pub fn decode(arena: &'a ScratchArena, header: &'a [u8], payload: &'a [u8]) -> Result<Self> {
        let (flags, common) = decode_region(header, arena, "signature header", |d| {
            let flags = decode::resource_header(d, ResourceCategory::Signature)?;
            Ok((flags, decode::signature_desc(d)?))
        })?;
        let (desc, internal) = decode_region(payload, arena, "signature payload", |d| {
            let desc = desc_override(d, decode::signature_desc)?.unwrap_or(common);
            Ok((desc, decode::signature_internal_data(d)?))
        })?;
        Ok(Self {
            header,
            flags,
            desc,
            internal,
        })
    }
}

#[derive(Debug)]
pub struct RenderPassData<'a> {
    pub header: &'a [u8],
    pub flags: HeaderFlags,
    pub desc: RenderPassDesc<'a>,
}

impl<'a> RenderPassData<'a> {
    pub fn decode(arena: &'a ScratchArena, header: &'a [u8], payload: &'a [u8]) -> Result<Self> {
        let (flags, common) = decode_region(header, arena, "render pass header", |d| {
            let flags = decode::resource_header(d, ResourceCategory::RenderPass)?;
            Ok((flags, decode::render_pass_desc(d)?))
        })?;
        let desc = decode_region(payload, arena, "render pass payload", |d| {
            Ok(desc_override(d, decode::render_pass_desc)?.unwrap_or(common))
        })?;
        Ok(Self {
            header,
            flags,
            desc,
        })
    }
}

/// Decoded pipeline of any of the four kinds; the kind lives in
/// [`PipelineDesc::state`].
#[derive(Debug)]
pub struct PipelineData<'a> {
    pub header: &'a [u8],
    pub flags: HeaderFlags,
    pub desc: PipelineDesc<'a>,
    pub internal: PipelineInternalData<'a>,
}

impl<'a> PipelineData<'a> {
    pub fn decode(
        arena: &'a ScratchArena,
        kind: PipelineKind,
        header: &'a [u8],
        payload: &'a [u8],
    ) -> Result<Self> {
        let (flags, common) = decode_region(header, arena, "pipeline header", |d| {
            let flags = decode::resource_header(d, kind.category())?;
            Ok((flags, decode::pipeline_desc(d, kind)?))
        })?;
        let (desc, internal) = decode_region(payload, arena, "pipeline payload", |d| {
            let desc = desc_override(d, |d| decode::pipeline_desc(d, kind))?.unwrap_or(common);
            Ok((desc, decode::pipeline_internal_data(d)?))
        })?;
        Ok(Self {
            header,
            flags,
            desc,
            internal,
        })
    }

    /// Render pass referenced by a graphics pipeline.
    pub fn render_pass(&self) -> Option<&'a str> {
        match &self.desc.state {
            kiln_archive::desc::PipelineState::Graphics(graphics) => graphics.render_pass,
            _ => None,
        }
    }
}

/// Decode the shader stored in one shader section slot.
pub fn decode_shader<'a>(arena: &'a ScratchArena, bytes: &'a [u8]) -> Result<ShaderCreateInfo<'a>> {
    decode_region(bytes, arena, "shader", decode::shader_create_info)
}

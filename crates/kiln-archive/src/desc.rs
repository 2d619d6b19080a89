//! Backend-agnostic object descriptions.
//!
//! Every variable-length field borrows from the [`ScratchArena`](crate::ScratchArena)
//! the description was decoded into, so a whole description is torn down in one
//! step when the arena goes away.

use bitflags::bitflags;

use crate::PipelineKind;

/// Maximum number of simultaneously bound render targets.
pub const MAX_RENDER_TARGETS: usize = 8;

bitflags! {
    /// Set of shader stages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const PIXEL = 1 << 1;
        const GEOMETRY = 1 << 2;
        const HULL = 1 << 3;
        const DOMAIN = 1 << 4;
        const COMPUTE = 1 << 5;
        const AMPLIFICATION = 1 << 6;
        const MESH = 1 << 7;
        const RAY_GEN = 1 << 8;
        const RAY_MISS = 1 << 9;
        const RAY_CLOSEST_HIT = 1 << 10;
        const RAY_ANY_HIT = 1 << 11;
        const RAY_INTERSECTION = 1 << 12;
        const CALLABLE = 1 << 13;
        const TILE = 1 << 14;
    }
}

bitflags! {
    /// Extra properties of a signature resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u8 {
        const NO_DYNAMIC_BUFFERS = 1 << 0;
        const COMBINED_SAMPLER = 1 << 1;
        const FORMATTED_BUFFER = 1 << 2;
        const RUNTIME_ARRAY = 1 << 3;
        const GENERAL_INPUT_ATTACHMENT = 1 << 4;
    }
}

/// Kind of shader-visible resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResourceType {
    ConstantBuffer = 0,
    TextureSrv = 1,
    BufferSrv = 2,
    TextureUav = 3,
    BufferUav = 4,
    Sampler = 5,
    InputAttachment = 6,
    AccelStruct = 7,
}

impl ResourceType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ConstantBuffer),
            1 => Some(Self::TextureSrv),
            2 => Some(Self::BufferSrv),
            3 => Some(Self::TextureUav),
            4 => Some(Self::BufferUav),
            5 => Some(Self::Sampler),
            6 => Some(Self::InputAttachment),
            7 => Some(Self::AccelStruct),
            _ => None,
        }
    }
}

/// How often a resource variable may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum VariableType {
    #[default]
    Static = 0,
    Mutable = 1,
    Dynamic = 2,
}

impl VariableType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Static),
            1 => Some(Self::Mutable),
            2 => Some(Self::Dynamic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FilterType {
    #[default]
    Point = 0,
    Linear = 1,
    Anisotropic = 2,
}

impl FilterType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Point),
            1 => Some(Self::Linear),
            2 => Some(Self::Anisotropic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AddressMode {
    #[default]
    Wrap = 0,
    Mirror = 1,
    Clamp = 2,
    Border = 3,
}

impl AddressMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Wrap),
            1 => Some(Self::Mirror),
            2 => Some(Self::Clamp),
            3 => Some(Self::Border),
            _ => None,
        }
    }
}

// ============================================================================
// Resource signatures
// ============================================================================

/// One resource declared by a signature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceDesc<'a> {
    pub name: &'a str,
    pub shader_stages: ShaderStages,
    pub array_size: u32,
    pub resource_type: ResourceType,
    pub var_type: VariableType,
    pub flags: ResourceFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SamplerDesc {
    pub min_filter: FilterType,
    pub mag_filter: FilterType,
    pub mip_filter: FilterType,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
}

/// A sampler baked into the signature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImmutableSamplerDesc<'a> {
    pub shader_stages: ShaderStages,
    /// Sampler name, or texture name when combined samplers are used.
    pub sampler_or_texture_name: &'a str,
    pub desc: SamplerDesc,
}

/// Resource-binding signature description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignatureDesc<'a> {
    pub name: &'a str,
    pub resources: &'a [ResourceDesc<'a>],
    pub immutable_samplers: &'a [ImmutableSamplerDesc<'a>],
    pub binding_index: u8,
    pub use_combined_texture_samplers: bool,
    pub combined_sampler_suffix: &'a str,
    /// Shader resource binding allocation granularity. Not archived; set from
    /// the unpack request.
    pub srb_allocation_granularity: u32,
}

/// Backend binding location of one signature resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceAttribs {
    pub binding: u32,
    pub space: u16,
}

/// Backend-specific part of a signature payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureInternalData<'a> {
    /// One entry per [`SignatureDesc::resources`] element.
    pub resource_attribs: &'a [ResourceAttribs],
    /// One entry per [`SignatureDesc::immutable_samplers`] element.
    pub immutable_sampler_attribs: &'a [ResourceAttribs],
    pub dynamic_buffer_count: u32,
}

// ============================================================================
// Render passes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LoadOp {
    #[default]
    Load = 0,
    Clear = 1,
    Discard = 2,
}

impl LoadOp {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Load),
            1 => Some(Self::Clear),
            2 => Some(Self::Discard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StoreOp {
    #[default]
    Store = 0,
    Discard = 1,
}

impl StoreOp {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Store),
            1 => Some(Self::Discard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachmentDesc {
    /// Texture format id as understood by the rendering runtime.
    pub format: u16,
    pub sample_count: u8,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_state: u32,
    pub final_state: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachmentRef {
    pub attachment_index: u32,
    pub state: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubpassDesc<'a> {
    pub input_attachments: &'a [AttachmentRef],
    pub render_target_attachments: &'a [AttachmentRef],
    pub resolve_attachments: &'a [AttachmentRef],
    pub depth_stencil_attachment: Option<AttachmentRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubpassDependency {
    pub src_subpass: u32,
    pub dst_subpass: u32,
    pub src_stage_mask: u32,
    pub dst_stage_mask: u32,
    pub src_access_mask: u32,
    pub dst_access_mask: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassDesc<'a> {
    pub name: &'a str,
    pub attachments: &'a [AttachmentDesc],
    pub subpasses: &'a [SubpassDesc<'a>],
    pub dependencies: &'a [SubpassDependency],
}

// ============================================================================
// Pipelines
// ============================================================================

/// One vertex input element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutElement {
    pub input_index: u32,
    pub buffer_slot: u32,
    pub num_components: u8,
    pub value_type: u8,
    pub is_normalized: bool,
    pub relative_offset: u32,
    pub stride: u32,
    pub per_instance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsState<'a> {
    pub primitive_topology: u8,
    pub cull_mode: u8,
    pub depth_enable: bool,
    pub num_render_targets: u8,
    pub rtv_formats: [u16; MAX_RENDER_TARGETS],
    pub dsv_format: u16,
    pub sample_count: u8,
    pub input_layout: &'a [LayoutElement],
    /// Render pass to draw within, by name. `None` for implicit passes.
    pub render_pass: Option<&'a str>,
    pub subpass_index: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileState {
    pub num_render_targets: u8,
    pub rtv_formats: [u16; MAX_RENDER_TARGETS],
    pub sample_count: u8,
}

/// Ray generation, miss or callable group. Shader fields index the
/// pipeline's resolved shader list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtGeneralShaderGroup<'a> {
    pub name: &'a str,
    pub shader: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtTriangleHitGroup<'a> {
    pub name: &'a str,
    pub closest_hit: u32,
    pub any_hit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtProceduralHitGroup<'a> {
    pub name: &'a str,
    pub intersection: u32,
    pub closest_hit: Option<u32>,
    pub any_hit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayTracingState<'a> {
    pub max_recursion_depth: u8,
    pub shader_record_size: u16,
    pub general_shaders: &'a [RtGeneralShaderGroup<'a>],
    pub triangle_hit_shaders: &'a [RtTriangleHitGroup<'a>],
    pub procedural_hit_shaders: &'a [RtProceduralHitGroup<'a>],
}

impl RayTracingState<'_> {
    /// Every shader index referenced by any group.
    pub fn shader_indices(&self) -> impl Iterator<Item = u32> + '_ {
        let general = self.general_shaders.iter().map(|g| g.shader);
        let triangle = self
            .triangle_hit_shaders
            .iter()
            .flat_map(|g| std::iter::once(g.closest_hit).chain(g.any_hit));
        let procedural = self.procedural_hit_shaders.iter().flat_map(|g| {
            std::iter::once(g.intersection)
                .chain(g.closest_hit)
                .chain(g.any_hit)
        });
        general.chain(triangle).chain(procedural)
    }
}

/// Kind-specific pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState<'a> {
    Graphics(GraphicsState<'a>),
    Compute,
    Tile(TileState),
    RayTracing(RayTracingState<'a>),
}

impl PipelineState<'_> {
    pub fn kind(&self) -> PipelineKind {
        match self {
            Self::Graphics(_) => PipelineKind::Graphics,
            Self::Compute => PipelineKind::Compute,
            Self::Tile(_) => PipelineKind::Tile,
            Self::RayTracing(_) => PipelineKind::RayTracing,
        }
    }
}

/// Pipeline state description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineDesc<'a> {
    pub name: &'a str,
    /// Not archived; set from the unpack request.
    pub srb_allocation_granularity: u32,
    /// Not archived; set from the unpack request.
    pub immediate_context_mask: u64,
    pub default_variable_type: VariableType,
    /// Signatures to resolve by name, in binding order. Empty means the backend
    /// derives an implicit signature from shader reflection.
    pub signature_names: &'a [&'a str],
    pub state: PipelineState<'a>,
}

impl PipelineDesc<'_> {
    #[inline]
    pub fn kind(&self) -> PipelineKind {
        self.state.kind()
    }
}

/// Backend-specific part of a pipeline payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineInternalData<'a> {
    /// Positions in the backend's shader section, in stage order.
    pub shader_positions: &'a [u32],
}

// ============================================================================
// Shaders
// ============================================================================

/// Format of the archived shader code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SourceLanguage {
    Hlsl = 0,
    Glsl = 1,
    Spirv = 2,
    Dxbc = 3,
    Dxil = 4,
    Msl = 5,
    Mtlb = 6,
    Wgsl = 7,
}

impl SourceLanguage {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Hlsl),
            1 => Some(Self::Glsl),
            2 => Some(Self::Spirv),
            3 => Some(Self::Dxbc),
            4 => Some(Self::Dxil),
            5 => Some(Self::Msl),
            6 => Some(Self::Mtlb),
            7 => Some(Self::Wgsl),
            _ => None,
        }
    }
}

/// A resource the shader reflects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderResourceDesc<'a> {
    pub name: &'a str,
    pub resource_type: ResourceType,
    pub array_size: u32,
}

/// Everything needed to recreate one compiled shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderCreateInfo<'a> {
    pub name: &'a str,
    /// Exactly one stage bit.
    pub stage: ShaderStages,
    pub entry_point: &'a str,
    pub source_language: SourceLanguage,
    pub bytecode: &'a [u8],
    /// `None` when reflection was stripped at packing time.
    pub reflection: Option<&'a [ShaderResourceDesc<'a>]>,
}

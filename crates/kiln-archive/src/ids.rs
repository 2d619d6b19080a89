//! Resource category and backend identifiers.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Kind of archived resource. Names are unique within a category only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum ResourceCategory {
    Signature = 0,
    RenderPass = 1,
    GraphicsPipeline = 2,
    ComputePipeline = 3,
    TilePipeline = 4,
    RayTracingPipeline = 5,
}

impl ResourceCategory {
    pub const COUNT: usize = 6;

    /// All categories in on-disk index order.
    pub const ALL: [ResourceCategory; Self::COUNT] = [
        Self::Signature,
        Self::RenderPass,
        Self::GraphicsPipeline,
        Self::ComputePipeline,
        Self::TilePipeline,
        Self::RayTracingPipeline,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The pipeline kind for pipeline categories.
    pub const fn pipeline_kind(self) -> Option<PipelineKind> {
        match self {
            Self::GraphicsPipeline => Some(PipelineKind::Graphics),
            Self::ComputePipeline => Some(PipelineKind::Compute),
            Self::TilePipeline => Some(PipelineKind::Tile),
            Self::RayTracingPipeline => Some(PipelineKind::RayTracing),
            Self::Signature | Self::RenderPass => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::RenderPass => "render-pass",
            Self::GraphicsPipeline => "graphics-pipeline",
            Self::ComputePipeline => "compute-pipeline",
            Self::TilePipeline => "tile-pipeline",
            Self::RayTracingPipeline => "ray-tracing-pipeline",
        }
    }
}

impl TryFrom<u32> for ResourceCategory {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(Error::UnknownCategory(value))
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown resource category '{s}'"))
    }
}

/// The four pipeline state flavours. Each maps onto its own category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PipelineKind {
    Graphics,
    Compute,
    Tile,
    RayTracing,
}

impl PipelineKind {
    pub const COUNT: usize = 4;

    pub const ALL: [PipelineKind; 4] = [
        Self::Graphics,
        Self::Compute,
        Self::Tile,
        Self::RayTracing,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn category(self) -> ResourceCategory {
        match self {
            Self::Graphics => ResourceCategory::GraphicsPipeline,
            Self::Compute => ResourceCategory::ComputePipeline,
            Self::Tile => ResourceCategory::TilePipeline,
            Self::RayTracing => ResourceCategory::RayTracingPipeline,
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category().as_str())
    }
}

/// Native graphics API a payload was compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum BackendId {
    OpenGl = 0,
    Direct3D11 = 1,
    Direct3D12 = 2,
    Vulkan = 3,
    MetalIos = 4,
    MetalMacos = 5,
    WebGpu = 6,
}

impl BackendId {
    pub const COUNT: usize = 7;

    pub const ALL: [BackendId; Self::COUNT] = [
        Self::OpenGl,
        Self::Direct3D11,
        Self::Direct3D12,
        Self::Vulkan,
        Self::MetalIos,
        Self::MetalMacos,
        Self::WebGpu,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenGl => "opengl",
            Self::Direct3D11 => "d3d11",
            Self::Direct3D12 => "d3d12",
            Self::Vulkan => "vulkan",
            Self::MetalIos => "metal-ios",
            Self::MetalMacos => "metal-macos",
            Self::WebGpu => "webgpu",
        }
    }
}

impl TryFrom<u8> for BackendId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(Error::UnknownBackend(value))
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown backend '{s}'"))
    }
}

//! The backend factory seam.
//!
//! A [`RenderDevice`] turns decoded descriptions into live backend objects. The
//! dearchiver never looks inside the objects it gets back; it only shares them
//! behind [`Arc`]s and caches weak handles to them.

use std::sync::Arc;

use kiln_archive::desc::{
    PipelineDesc, PipelineInternalData, RenderPassDesc, ShaderCreateInfo, SignatureDesc,
    SignatureInternalData,
};
use kiln_archive::BackendId;

/// Error returned by device factory methods.
pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// Everything a device needs to build a pipeline.
///
/// Signatures are in binding order. Shaders follow the order of the positions
/// stored in the pipeline payload.
pub struct PipelineCreateInfo<'a, D: RenderDevice + ?Sized> {
    pub desc: PipelineDesc<'a>,
    pub internal: PipelineInternalData<'a>,
    pub signatures: Vec<Arc<D::Signature>>,
    pub shaders: Vec<Arc<D::Shader>>,
    /// Only set for graphics pipelines that reference a render pass.
    pub render_pass: Option<Arc<D::RenderPass>>,
}

/// A rendering device that can create objects for one backend.
pub trait RenderDevice {
    type Signature;
    type RenderPass;
    type Shader;
    type Pipeline;

    /// Backend whose payloads this device consumes.
    fn backend(&self) -> BackendId;

    /// Create a resource signature. Implicit signatures belong to a single
    /// pipeline and are never shared.
    fn create_signature(
        &self,
        desc: &SignatureDesc<'_>,
        internal: &SignatureInternalData<'_>,
        is_implicit: bool,
    ) -> Result<Self::Signature, DeviceError>;

    fn create_render_pass(&self, desc: &RenderPassDesc<'_>) -> Result<Self::RenderPass, DeviceError>;

    fn create_shader(&self, info: &ShaderCreateInfo<'_>) -> Result<Self::Shader, DeviceError>;

    /// Create a pipeline. An empty signature list asks the device to derive an
    /// implicit signature from shader reflection.
    fn create_pipeline(&self, info: &PipelineCreateInfo<'_, Self>) -> Result<Self::Pipeline, DeviceError>;
}

//! The dearchiver: loads archives and reconstructs objects from them on demand.

use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

use hashbrown::HashMap as FastHashMap;
use kiln_archive::{
    BackendId, ByteStore, HeaderFlags, ObjectArchive, PipelineKind, ResourceCategory, ScratchArena,
};
use rustc_hash::FxHasher;

use crate::cache::NamedResourceCache;
use crate::data::{self, PipelineData, RenderPassData, SignatureData};
use crate::device::{PipelineCreateInfo, RenderDevice};
use crate::shader_cache::ShaderCache;
use crate::{DearchiverConfig, Error, LoadOptions, Result};

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Request to unpack a named resource signature.
pub struct SignatureUnpackInfo<'a, D: RenderDevice> {
    pub device: &'a D,
    pub name: &'a str,
    /// Written into the description before the device sees it.
    pub srb_allocation_granularity: u32,
}

impl<'a, D: RenderDevice> SignatureUnpackInfo<'a, D> {
    pub fn new(device: &'a D, name: &'a str) -> Self {
        Self {
            device,
            name,
            srb_allocation_granularity: 1,
        }
    }

    pub fn with_srb_allocation_granularity(mut self, granularity: u32) -> Self {
        self.srb_allocation_granularity = granularity;
        self
    }
}

/// Request to unpack a named render pass.
pub struct RenderPassUnpackInfo<'a, D: RenderDevice> {
    pub device: &'a D,
    pub name: &'a str,
}

impl<'a, D: RenderDevice> RenderPassUnpackInfo<'a, D> {
    pub fn new(device: &'a D, name: &'a str) -> Self {
        Self { device, name }
    }
}

/// Request to unpack a named pipeline of one kind.
pub struct PipelineUnpackInfo<'a, D: RenderDevice> {
    pub device: &'a D,
    pub kind: PipelineKind,
    pub name: &'a str,
    /// Applied to the pipeline and to the signatures it references.
    pub srb_allocation_granularity: u32,
    pub immediate_context_mask: u64,
    /// Edits the create info just before the device builds the pipeline.
    /// The result is caller-specific, so it is neither looked up in nor
    /// published to the pipeline cache.
    pub modify_create_info: Option<&'a dyn Fn(&mut PipelineCreateInfo<'_, D>)>,
}

impl<'a, D: RenderDevice> PipelineUnpackInfo<'a, D> {
    pub fn new(device: &'a D, kind: PipelineKind, name: &'a str) -> Self {
        Self {
            device,
            kind,
            name,
            srb_allocation_granularity: 1,
            immediate_context_mask: 1,
            modify_create_info: None,
        }
    }

    pub fn with_srb_allocation_granularity(mut self, granularity: u32) -> Self {
        self.srb_allocation_granularity = granularity;
        self
    }

    pub fn with_immediate_context_mask(mut self, mask: u64) -> Self {
        self.immediate_context_mask = mask;
        self
    }

    pub fn with_modify_create_info(mut self, modify: &'a dyn Fn(&mut PipelineCreateInfo<'_, D>)) -> Self {
        self.modify_create_info = Some(modify);
        self
    }
}

/// One loaded archive together with the shaders reconstructed from it.
pub struct LoadedArchive<D: RenderDevice> {
    archive: ObjectArchive,
    shaders: ShaderCache<D::Shader>,
}

impl<D: RenderDevice> LoadedArchive<D> {
    #[inline]
    pub fn archive(&self) -> &ObjectArchive {
        &self.archive
    }

    #[inline]
    pub fn shaders(&self) -> &ShaderCache<D::Shader> {
        &self.shaders
    }
}

/// Regions of a resolved resource for one backend.
struct Located<'s, D: RenderDevice> {
    loaded: &'s LoadedArchive<D>,
    header: &'s [u8],
    payload: &'s [u8],
}

/// Reconstructs live device objects from any number of loaded archives.
///
/// Names resolve to the first loaded archive that defines them. Reconstructed
/// signatures, render passes and pipelines are cached weakly by name, so
/// repeated requests return the same object for as long as a caller keeps it
/// alive.
///
/// Loading and resetting need `&mut self`; unpacking only needs `&self` and
/// may run on any number of threads at once.
pub struct Dearchiver<D: RenderDevice> {
    config: DearchiverConfig,
    archives: Vec<LoadedArchive<D>>,
    /// Per category: name to index into `archives`.
    resolution: [FxHashMap<String, usize>; ResourceCategory::COUNT],
    signatures: NamedResourceCache<D::Signature>,
    render_passes: NamedResourceCache<D::RenderPass>,
    pipelines: [NamedResourceCache<D::Pipeline>; PipelineKind::COUNT],
}

impl<D: RenderDevice> Dearchiver<D> {
    pub fn new(config: DearchiverConfig) -> Self {
        Self {
            config,
            archives: Vec::new(),
            resolution: Default::default(),
            signatures: NamedResourceCache::new(),
            render_passes: NamedResourceCache::new(),
            pipelines: std::array::from_fn(|_| NamedResourceCache::new()),
        }
    }

    #[inline]
    pub fn config(&self) -> &DearchiverConfig {
        &self.config
    }

    /// Parse `store` and make its resources available for unpacking.
    pub fn load_archive(&mut self, store: ByteStore) -> Result<()> {
        self.load_archive_with(store, LoadOptions::default())
    }

    /// Like [`load_archive`](Self::load_archive) with extra checks.
    ///
    /// On failure the dearchiver is left exactly as it was.
    pub fn load_archive_with(&mut self, store: ByteStore, options: LoadOptions) -> Result<()> {
        let archive = ObjectArchive::parse(store)?;
        if let Some(expected) = options.expected_content_version {
            let found = archive.content_version();
            if found != expected {
                return Err(kiln_archive::Error::ContentVersionMismatch { found, expected }.into());
            }
        }

        let index = self.archives.len();
        let mut registered = 0;
        for category in ResourceCategory::ALL {
            let table = &mut self.resolution[category.index()];
            for name in archive.names(category) {
                if let Some(&owner) = table.get(name) {
                    log::debug!("{category} '{name}' already provided by archive {owner}");
                    continue;
                }
                table.insert(name.to_owned(), index);
                registered += 1;
            }
        }
        log::debug!("loaded archive {index}: {registered} resources registered");

        let shaders = ShaderCache::new(&archive);
        self.archives.push(LoadedArchive { archive, shaders });
        Ok(())
    }

    /// Drop every cache entry and every loaded archive.
    ///
    /// Objects already handed out stay valid; later requests miss until
    /// archives are loaded again.
    pub fn reset(&mut self) {
        self.signatures.clear();
        self.render_passes.clear();
        for cache in &self.pipelines {
            cache.clear();
        }
        self.archives.clear();
        for table in &mut self.resolution {
            table.clear();
        }
        log::debug!("dearchiver reset");
    }

    #[inline]
    pub fn archive_count(&self) -> usize {
        self.archives.len()
    }

    pub fn archives(&self) -> impl Iterator<Item = &ObjectArchive> + '_ {
        self.archives.iter().map(|loaded| &loaded.archive)
    }

    /// Loaded archive at `index`, in load order.
    pub fn loaded_archive(&self, index: usize) -> Option<&LoadedArchive<D>> {
        self.archives.get(index)
    }

    /// Whether any loaded archive provides `name` in `category`.
    pub fn contains(&self, category: ResourceCategory, name: &str) -> bool {
        self.resolution[category.index()].contains_key(name)
    }

    /// Index of the archive `name` resolves to.
    pub fn resolve(&self, category: ResourceCategory, name: &str) -> Option<usize> {
        self.resolution[category.index()].get(name).copied()
    }

    pub fn signature_cache(&self) -> &NamedResourceCache<D::Signature> {
        &self.signatures
    }

    pub fn render_pass_cache(&self) -> &NamedResourceCache<D::RenderPass> {
        &self.render_passes
    }

    pub fn pipeline_cache(&self, kind: PipelineKind) -> &NamedResourceCache<D::Pipeline> {
        &self.pipelines[kind.index()]
    }

    /// Unpack a shared, cached resource signature.
    ///
    /// Returns `Ok(None)` if no loaded archive defines `name`.
    pub fn unpack_signature(&self, info: &SignatureUnpackInfo<'_, D>) -> Result<Option<Arc<D::Signature>>> {
        self.unpack_signature_impl(info, false)
    }

    /// Unpack a resource signature. Implicit signatures are private to one
    /// pipeline: they bypass the cache entirely.
    pub fn unpack_signature_impl(
        &self,
        info: &SignatureUnpackInfo<'_, D>,
        is_implicit: bool,
    ) -> Result<Option<Arc<D::Signature>>> {
        const CATEGORY: ResourceCategory = ResourceCategory::Signature;
        let name = info.name;

        if !is_implicit {
            if let Some(signature) = self.signatures.get(name) {
                log::trace!("{CATEGORY} '{name}': cache hit");
                return Ok(Some(signature));
            }
        }

        let Some(found) = self.locate(CATEGORY, name, info.device.backend())? else {
            return Ok(None);
        };
        log::trace!("{CATEGORY} '{name}': reconstructing");

        let arena = self.arena();
        let mut data = SignatureData::decode(&arena, found.header, found.payload)
            .map_err(|source| Error::consistency(CATEGORY, name, source))?;
        data.desc.srb_allocation_granularity = info.srb_allocation_granularity;

        let signature = info
            .device
            .create_signature(&data.desc, &data.internal, is_implicit)
            .map_err(|source| Error::construction(CATEGORY.as_str(), name, source))?;
        let signature = Arc::new(signature);

        if is_implicit {
            return Ok(Some(signature));
        }
        Ok(Some(self.signatures.get_or_publish(name, signature)))
    }

    /// Unpack a render pass.
    ///
    /// Returns `Ok(None)` if no loaded archive defines `name`.
    pub fn unpack_render_pass(&self, info: &RenderPassUnpackInfo<'_, D>) -> Result<Option<Arc<D::RenderPass>>> {
        const CATEGORY: ResourceCategory = ResourceCategory::RenderPass;
        let name = info.name;

        if let Some(render_pass) = self.render_passes.get(name) {
            log::trace!("{CATEGORY} '{name}': cache hit");
            return Ok(Some(render_pass));
        }

        let Some(found) = self.locate(CATEGORY, name, info.device.backend())? else {
            return Ok(None);
        };
        log::trace!("{CATEGORY} '{name}': reconstructing");

        let arena = self.arena();
        let data = RenderPassData::decode(&arena, found.header, found.payload)
            .map_err(|source| Error::consistency(CATEGORY, name, source))?;

        let render_pass = info
            .device
            .create_render_pass(&data.desc)
            .map_err(|source| Error::construction(CATEGORY.as_str(), name, source))?;
        Ok(Some(self.render_passes.get_or_publish(name, Arc::new(render_pass))))
    }

    /// Unpack a pipeline together with the signatures, shaders and render pass
    /// it references.
    ///
    /// Returns `Ok(None)` if no loaded archive defines `name`. A missing
    /// dependency is an error: no pipeline is built from a partial graph.
    pub fn unpack_pipeline(&self, info: &PipelineUnpackInfo<'_, D>) -> Result<Option<Arc<D::Pipeline>>> {
        let category = info.kind.category();
        let name = info.name;
        let cache = &self.pipelines[info.kind.index()];
        let uses_cache = info.modify_create_info.is_none();

        if uses_cache {
            if let Some(pipeline) = cache.get(name) {
                log::trace!("{category} '{name}': cache hit");
                return Ok(Some(pipeline));
            }
        }

        let device = info.device;
        let Some(found) = self.locate(category, name, device.backend())? else {
            return Ok(None);
        };
        log::trace!("{category} '{name}': reconstructing");

        let arena = self.arena();
        let mut data = PipelineData::decode(&arena, info.kind, found.header, found.payload)
            .map_err(|source| Error::consistency(category, name, source))?;
        data.desc.srb_allocation_granularity = info.srb_allocation_granularity;
        data.desc.immediate_context_mask = info.immediate_context_mask;

        let signatures = self.unpack_pipeline_signatures(info, &data)?;
        let shaders = data
            .internal
            .shader_positions
            .iter()
            .map(|&position| self.unpack_shader(found.loaded, device, position))
            .collect::<Result<Vec<_>>>()?;
        let render_pass = match data.render_pass() {
            Some(render_pass) => {
                let request = RenderPassUnpackInfo::new(device, render_pass);
                let resolved = self.unpack_render_pass(&request)?.ok_or_else(|| Error::MissingDependency {
                    category,
                    name: name.to_owned(),
                    dependency_category: ResourceCategory::RenderPass,
                    dependency: render_pass.to_owned(),
                })?;
                Some(resolved)
            }
            None => None,
        };

        let mut create_info = PipelineCreateInfo {
            desc: data.desc,
            internal: data.internal,
            signatures,
            shaders,
            render_pass,
        };
        if let Some(modify) = info.modify_create_info {
            modify(&mut create_info);
        }

        let pipeline = device
            .create_pipeline(&create_info)
            .map_err(|source| Error::construction(category.as_str(), name, source))?;
        let pipeline = Arc::new(pipeline);

        if !uses_cache {
            return Ok(Some(pipeline));
        }
        Ok(Some(cache.get_or_publish(name, pipeline)))
    }

    fn unpack_pipeline_signatures(
        &self,
        info: &PipelineUnpackInfo<'_, D>,
        data: &PipelineData<'_>,
    ) -> Result<Vec<Arc<D::Signature>>> {
        let is_implicit = data.flags.contains(HeaderFlags::IMPLICIT_SIGNATURE);
        data.desc
            .signature_names
            .iter()
            .map(|&signature| {
                let request = SignatureUnpackInfo::new(info.device, signature)
                    .with_srb_allocation_granularity(info.srb_allocation_granularity);
                self.unpack_signature_impl(&request, is_implicit)?
                    .ok_or_else(|| Error::MissingDependency {
                        category: info.kind.category(),
                        name: info.name.to_owned(),
                        dependency_category: ResourceCategory::Signature,
                        dependency: signature.to_owned(),
                    })
            })
            .collect()
    }

    fn unpack_shader(&self, loaded: &LoadedArchive<D>, device: &D, position: u32) -> Result<Arc<D::Shader>> {
        let backend = device.backend();
        if let Some(shader) = loaded.shaders.get(backend, position) {
            log::trace!("{backend} shader {position}: cache hit");
            return Ok(shader);
        }

        let bytes = loaded
            .archive
            .shader_bytes(backend, position)
            .ok_or(Error::MissingShader { backend, position })?;
        let arena = self.arena();
        let info = data::decode_shader(&arena, bytes).map_err(|source| Error::InvalidShader {
            backend,
            position,
            source,
        })?;
        let shader = device
            .create_shader(&info)
            .map_err(|source| Error::construction("shader", info.name, source))?;
        Ok(loaded.shaders.get_or_insert(backend, position, Arc::new(shader)))
    }

    /// Find the header and `backend` payload of a resolved resource.
    fn locate(&self, category: ResourceCategory, name: &str, backend: BackendId) -> Result<Option<Located<'_, D>>> {
        let Some(index) = self.resolve(category, name) else {
            log::trace!("{category} '{name}': not found");
            return Ok(None);
        };
        let loaded = &self.archives[index];
        let Some(header) = loaded.archive.header_bytes(category, name) else {
            return Ok(None);
        };
        let Some(payload) = loaded.archive.locate_backend_payload(category, name, backend) else {
            log::warn!("{category} '{name}' has no {backend} payload in archive {index}");
            return Err(Error::MissingBackendData {
                category,
                name: name.to_owned(),
                backend,
            });
        };
        Ok(Some(Located {
            loaded,
            header,
            payload,
        }))
    }

    fn arena(&self) -> ScratchArena {
        ScratchArena::with_block_size(self.config.arena_block_size)
    }
}

impl<D: RenderDevice> Default for Dearchiver<D> {
    fn default() -> Self {
        Self::new(DearchiverConfig::default())
    }
}

impl<D: RenderDevice> fmt::Debug for Dearchiver<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dearchiver")
            .field("config", &self.config)
            .field("archives", &self.archives.len())
            .field("signatures", &self.signatures)
            .field("render_passes", &self.render_passes)
            .field("pipelines", &self.pipelines)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use kiln_archive::builder::ArchiveBuilder;
    use kiln_archive::desc::{
        GraphicsState, PipelineDesc, PipelineInternalData, PipelineState, RayTracingState,
        RenderPassDesc, RtGeneralShaderGroup, RtTriangleHitGroup, ShaderCreateInfo, ShaderStages,
        SignatureDesc, SignatureInternalData, SourceLanguage, TileState, VariableType,
        MAX_RENDER_TARGETS,
    };

    use super::*;
    use crate::device::DeviceError;

    #[derive(Debug)]
    struct MockSignature {
        name: String,
        binding_index: u8,
        srb_allocation_granularity: u32,
        is_implicit: bool,
    }

    #[derive(Debug)]
    struct MockRenderPass {
        name: String,
    }

    #[derive(Debug)]
    struct MockShader {
        name: String,
    }

    #[derive(Debug)]
    struct MockPipeline {
        name: String,
        kind: PipelineKind,
        /// Tile sample count or ray-tracing recursion depth.
        state_detail: Option<u8>,
        immediate_context_mask: u64,
        signatures: Vec<Arc<MockSignature>>,
        shaders: Vec<Arc<MockShader>>,
        render_pass: Option<Arc<MockRenderPass>>,
    }

    /// Device that records how often each factory method runs.
    struct MockDevice {
        backend: BackendId,
        reject_pipelines: bool,
        signatures: AtomicUsize,
        render_passes: AtomicUsize,
        shaders: AtomicUsize,
        pipelines: AtomicUsize,
    }

    impl MockDevice {
        fn new(backend: BackendId) -> Self {
            Self {
                backend,
                reject_pipelines: false,
                signatures: AtomicUsize::new(0),
                render_passes: AtomicUsize::new(0),
                shaders: AtomicUsize::new(0),
                pipelines: AtomicUsize::new(0),
            }
        }

        fn counts(&self) -> [usize; 4] {
            [
                self.signatures.load(Ordering::SeqCst),
                self.render_passes.load(Ordering::SeqCst),
                self.shaders.load(Ordering::SeqCst),
                self.pipelines.load(Ordering::SeqCst),
            ]
        }
    }

    impl RenderDevice for MockDevice {
        type Signature = MockSignature;
        type RenderPass = MockRenderPass;
        type Shader = MockShader;
        type Pipeline = MockPipeline;

        fn backend(&self) -> BackendId {
            self.backend
        }

        fn create_signature(
            &self,
            desc: &SignatureDesc<'_>,
            _internal: &SignatureInternalData<'_>,
            is_implicit: bool,
        ) -> std::result::Result<MockSignature, DeviceError> {
            self.signatures.fetch_add(1, Ordering::SeqCst);
            Ok(MockSignature {
                name: desc.name.to_owned(),
                binding_index: desc.binding_index,
                srb_allocation_granularity: desc.srb_allocation_granularity,
                is_implicit,
            })
        }

        fn create_render_pass(&self, desc: &RenderPassDesc<'_>) -> std::result::Result<MockRenderPass, DeviceError> {
            self.render_passes.fetch_add(1, Ordering::SeqCst);
            Ok(MockRenderPass {
                name: desc.name.to_owned(),
            })
        }

        fn create_shader(&self, info: &ShaderCreateInfo<'_>) -> std::result::Result<MockShader, DeviceError> {
            self.shaders.fetch_add(1, Ordering::SeqCst);
            Ok(MockShader {
                name: info.name.to_owned(),
            })
        }

        fn create_pipeline(
            &self,
            info: &PipelineCreateInfo<'_, Self>,
        ) -> std::result::Result<MockPipeline, DeviceError> {
            if self.reject_pipelines {
                return Err("pipeline rejected".into());
            }
            self.pipelines.fetch_add(1, Ordering::SeqCst);
            let state_detail = match &info.desc.state {
                PipelineState::Tile(tile) => Some(tile.sample_count),
                PipelineState::RayTracing(rt) => Some(rt.max_recursion_depth),
                _ => None,
            };
            Ok(MockPipeline {
                name: info.desc.name.to_owned(),
                kind: info.desc.kind(),
                state_detail,
                immediate_context_mask: info.desc.immediate_context_mask,
                signatures: info.signatures.clone(),
                shaders: info.shaders.clone(),
                render_pass: info.render_pass.clone(),
            })
        }
    }

    fn signature(name: &str, binding_index: u8) -> SignatureDesc<'_> {
        SignatureDesc {
            name,
            resources: &[],
            immutable_samplers: &[],
            binding_index,
            use_combined_texture_samplers: false,
            combined_sampler_suffix: "_sampler",
            srb_allocation_granularity: 1,
        }
    }

    const NO_ATTRIBS: SignatureInternalData<'static> = SignatureInternalData {
        resource_attribs: &[],
        immutable_sampler_attribs: &[],
        dynamic_buffer_count: 0,
    };

    fn shader(name: &'static str, stage: ShaderStages) -> ShaderCreateInfo<'static> {
        ShaderCreateInfo {
            name,
            stage,
            entry_point: "main",
            source_language: SourceLanguage::Spirv,
            bytecode: name.as_bytes(),
            reflection: None,
        }
    }

    fn graphics<'a>(name: &'a str, signatures: &'a [&'a str], render_pass: Option<&'a str>) -> PipelineDesc<'a> {
        PipelineDesc {
            name,
            srb_allocation_granularity: 1,
            immediate_context_mask: 1,
            default_variable_type: VariableType::Static,
            signature_names: signatures,
            state: PipelineState::Graphics(GraphicsState {
                primitive_topology: 3,
                cull_mode: 2,
                depth_enable: true,
                num_render_targets: 1,
                rtv_formats: [0; MAX_RENDER_TARGETS],
                dsv_format: 0,
                sample_count: 1,
                input_layout: &[],
                render_pass,
                subpass_index: 0,
            }),
        }
    }

    fn compute<'a>(name: &'a str, signatures: &'a [&'a str]) -> PipelineDesc<'a> {
        PipelineDesc {
            name,
            srb_allocation_granularity: 1,
            immediate_context_mask: 1,
            default_variable_type: VariableType::Static,
            signature_names: signatures,
            state: PipelineState::Compute,
        }
    }

    fn tile<'a>(name: &'a str, signatures: &'a [&'a str]) -> PipelineDesc<'a> {
        PipelineDesc {
            name,
            srb_allocation_granularity: 1,
            immediate_context_mask: 1,
            default_variable_type: VariableType::Static,
            signature_names: signatures,
            state: PipelineState::Tile(TileState {
                num_render_targets: 1,
                rtv_formats: [0; MAX_RENDER_TARGETS],
                sample_count: 4,
            }),
        }
    }

    const RAY_GEN_GROUPS: &[RtGeneralShaderGroup<'static>] = &[RtGeneralShaderGroup {
        name: "RayGen",
        shader: 0,
    }];

    const HIT_GROUPS: &[RtTriangleHitGroup<'static>] = &[RtTriangleHitGroup {
        name: "Hit",
        closest_hit: 1,
        any_hit: None,
    }];

    fn ray_tracing<'a>(name: &'a str, signatures: &'a [&'a str]) -> PipelineDesc<'a> {
        PipelineDesc {
            name,
            srb_allocation_granularity: 1,
            immediate_context_mask: 1,
            default_variable_type: VariableType::Static,
            signature_names: signatures,
            state: PipelineState::RayTracing(RayTracingState {
                max_recursion_depth: 2,
                shader_record_size: 32,
                general_shaders: RAY_GEN_GROUPS,
                triangle_hit_shaders: HIT_GROUPS,
                procedural_hit_shaders: &[],
            }),
        }
    }

    fn add_pipeline(
        builder: &mut ArchiveBuilder,
        desc: &PipelineDesc<'_>,
        flags: HeaderFlags,
        positions: &[u32],
    ) {
        builder.add_pipeline(desc, flags).unwrap();
        builder
            .add_pipeline_payload(
                desc.kind(),
                desc.name,
                BackendId::Vulkan,
                None,
                &PipelineInternalData {
                    shader_positions: positions,
                },
            )
            .unwrap();
    }

    /// Signature "Base", render pass "Main", shaders vs/ps/cs0/cs1 at 0..=3,
    /// and pipelines built for Vulkan only:
    /// - "PSO1": graphics, {"Base"}, shaders {0, 1}
    /// - "Forward": graphics, {"Base"}, shaders {0, 1}, render pass "Main"
    /// - "Dup": compute, {"Base"}, shaders {3, 3}
    /// - "Implicit": compute, implicit {"Base"}, shaders {2}
    /// - "Orphan": compute, {"Ghost"}, shaders {2}
    /// - "PSO1": tile, {"Base"}, shaders {4}
    /// - "Trace": ray tracing, {"Base"}, shaders {5, 6}
    fn sample_archive() -> Vec<u8> {
        let mut builder = ArchiveBuilder::new();
        builder.content_version(3);

        builder.add_signature(&signature("Base", 0)).unwrap();
        builder
            .add_signature_payload("Base", BackendId::Vulkan, None, &NO_ATTRIBS)
            .unwrap();

        let main = RenderPassDesc {
            name: "Main",
            attachments: &[],
            subpasses: &[],
            dependencies: &[],
        };
        builder.add_render_pass(&main).unwrap();
        builder
            .add_render_pass_payload("Main", BackendId::Vulkan, None)
            .unwrap();

        for (name, stage) in [
            ("vs", ShaderStages::VERTEX),
            ("ps", ShaderStages::PIXEL),
            ("cs0", ShaderStages::COMPUTE),
            ("cs1", ShaderStages::COMPUTE),
            ("tile", ShaderStages::TILE),
            ("rgen", ShaderStages::RAY_GEN),
            ("rchit", ShaderStages::RAY_CLOSEST_HIT),
        ] {
            builder.add_shader(BackendId::Vulkan, &shader(name, stage)).unwrap();
        }

        let base = ["Base"];
        add_pipeline(&mut builder, &graphics("PSO1", &base, None), HeaderFlags::empty(), &[0, 1]);
        add_pipeline(
            &mut builder,
            &graphics("Forward", &base, Some("Main")),
            HeaderFlags::empty(),
            &[0, 1],
        );
        add_pipeline(&mut builder, &compute("Dup", &base), HeaderFlags::empty(), &[3, 3]);
        add_pipeline(
            &mut builder,
            &compute("Implicit", &base),
            HeaderFlags::IMPLICIT_SIGNATURE,
            &[2],
        );
        add_pipeline(&mut builder, &compute("Orphan", &["Ghost"]), HeaderFlags::empty(), &[2]);
        add_pipeline(&mut builder, &tile("PSO1", &base), HeaderFlags::empty(), &[4]);
        add_pipeline(&mut builder, &ray_tracing("Trace", &base), HeaderFlags::empty(), &[5, 6]);

        builder.build().unwrap()
    }

    fn signature_archive(name: &str, binding_index: u8) -> Vec<u8> {
        let mut builder = ArchiveBuilder::new();
        builder.add_signature(&signature(name, binding_index)).unwrap();
        builder
            .add_signature_payload(name, BackendId::Vulkan, None, &NO_ATTRIBS)
            .unwrap();
        builder.build().unwrap()
    }

    fn loaded(bytes: Vec<u8>) -> Dearchiver<MockDevice> {
        let mut dearchiver = Dearchiver::default();
        dearchiver.load_archive(ByteStore::from(bytes)).unwrap();
        dearchiver
    }

    #[test]
    fn test_signature_cache_hit_identity() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);
        let info = SignatureUnpackInfo::new(&device, "Base");

        let first = dearchiver.unpack_signature(&info).unwrap().unwrap();
        let second = dearchiver.unpack_signature(&info).unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name, "Base");
        assert!(!first.is_implicit);
        assert_eq!(device.counts(), [1, 0, 0, 0]);
    }

    #[test]
    fn test_released_object_is_reconstructed() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);
        let info = SignatureUnpackInfo::new(&device, "Base");

        drop(dearchiver.unpack_signature(&info).unwrap().unwrap());
        assert!(dearchiver.signature_cache().get("Base").is_none());

        let fresh = dearchiver.unpack_signature(&info).unwrap();
        assert!(fresh.is_some());
        assert_eq!(device.counts()[0], 2);
    }

    #[test]
    fn test_unknown_name_is_none() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);

        assert!(dearchiver
            .unpack_signature(&SignatureUnpackInfo::new(&device, "Nope"))
            .unwrap()
            .is_none());
        assert!(dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Compute, "PSO1"))
            .unwrap()
            .is_none());
        assert_eq!(device.counts(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_first_loaded_archive_wins() {
        let device = MockDevice::new(BackendId::Vulkan);

        let mut dearchiver = Dearchiver::default();
        dearchiver.load_archive(signature_archive("S", 1).into()).unwrap();
        dearchiver.load_archive(signature_archive("S", 2).into()).unwrap();
        assert_eq!(dearchiver.resolve(ResourceCategory::Signature, "S"), Some(0));
        let s = dearchiver
            .unpack_signature(&SignatureUnpackInfo::new(&device, "S"))
            .unwrap()
            .unwrap();
        assert_eq!(s.binding_index, 1);

        let mut reversed = Dearchiver::default();
        reversed.load_archive(signature_archive("S", 2).into()).unwrap();
        reversed.load_archive(signature_archive("S", 1).into()).unwrap();
        let s = reversed
            .unpack_signature(&SignatureUnpackInfo::new(&device, "S"))
            .unwrap()
            .unwrap();
        assert_eq!(s.binding_index, 2);
    }

    #[test]
    fn test_pipeline_scenario() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);
        let info = PipelineUnpackInfo::new(&device, PipelineKind::Graphics, "PSO1");

        let first = dearchiver.unpack_pipeline(&info).unwrap().unwrap();
        assert_eq!(device.counts(), [1, 0, 2, 1]);
        assert_eq!(first.signatures.len(), 1);
        assert_eq!(first.signatures[0].name, "Base");
        let shader_names: Vec<_> = first.shaders.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(shader_names, ["vs", "ps"]);
        assert!(first.render_pass.is_none());

        let second = dearchiver.unpack_pipeline(&info).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(device.counts(), [1, 0, 2, 1]);

        let shared = dearchiver.signature_cache().get("Base").unwrap();
        assert!(Arc::ptr_eq(&shared, &first.signatures[0]));
    }

    #[test]
    fn test_tile_pipeline_unpacked() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);
        let info = PipelineUnpackInfo::new(&device, PipelineKind::Tile, "PSO1");

        let first = dearchiver.unpack_pipeline(&info).unwrap().unwrap();
        assert_eq!(first.kind, PipelineKind::Tile);
        assert_eq!(first.state_detail, Some(4));
        assert_eq!(first.shaders[0].name, "tile");
        assert_eq!(first.signatures[0].name, "Base");

        let second = dearchiver.unpack_pipeline(&info).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(device.counts(), [1, 0, 1, 1]);
    }

    #[test]
    fn test_ray_tracing_pipeline_unpacked() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);
        let info = PipelineUnpackInfo::new(&device, PipelineKind::RayTracing, "Trace");

        let first = dearchiver.unpack_pipeline(&info).unwrap().unwrap();
        assert_eq!(first.kind, PipelineKind::RayTracing);
        assert_eq!(first.state_detail, Some(2));
        let shader_names: Vec<_> = first.shaders.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(shader_names, ["rgen", "rchit"]);

        let second = dearchiver.unpack_pipeline(&info).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(device.counts(), [1, 0, 2, 1]);
        assert_eq!(dearchiver.pipeline_cache(PipelineKind::RayTracing).live_count(), 1);
    }

    #[test]
    fn test_pipeline_names_scoped_per_kind() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);

        let graphics = dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Graphics, "PSO1"))
            .unwrap()
            .unwrap();
        let tile = dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Tile, "PSO1"))
            .unwrap()
            .unwrap();

        assert!(!Arc::ptr_eq(&graphics, &tile));
        assert_eq!(graphics.kind, PipelineKind::Graphics);
        assert_eq!(tile.kind, PipelineKind::Tile);
        assert_eq!(device.pipelines.load(Ordering::SeqCst), 2);

        let cached = dearchiver.pipeline_cache(PipelineKind::Tile).get("PSO1").unwrap();
        assert!(Arc::ptr_eq(&cached, &tile));
        assert!(dearchiver.pipeline_cache(PipelineKind::Compute).get("PSO1").is_none());
        assert!(dearchiver.pipeline_cache(PipelineKind::RayTracing).is_empty());
    }

    #[test]
    fn test_repeated_shader_position_built_once() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);

        let pipeline = dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Compute, "Dup"))
            .unwrap()
            .unwrap();

        assert_eq!(pipeline.shaders.len(), 2);
        assert!(Arc::ptr_eq(&pipeline.shaders[0], &pipeline.shaders[1]));
        assert_eq!(pipeline.shaders[0].name, "cs1");
        assert_eq!(device.shaders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shaders_shared_across_pipelines() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);

        let pso = dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Graphics, "PSO1"))
            .unwrap()
            .unwrap();
        let forward = dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Graphics, "Forward"))
            .unwrap()
            .unwrap();

        assert!(Arc::ptr_eq(&pso.shaders[0], &forward.shaders[0]));
        assert_eq!(device.shaders.load(Ordering::SeqCst), 2);
        let cache = dearchiver.loaded_archive(0).unwrap().shaders();
        assert_eq!(cache.cached_count(BackendId::Vulkan), 2);
    }

    #[test]
    fn test_missing_backend_data_not_cached() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Direct3D12);

        let err = dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Graphics, "PSO1"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingBackendData {
                category: ResourceCategory::GraphicsPipeline,
                backend: BackendId::Direct3D12,
                ..
            }
        ));
        assert!(dearchiver
            .pipeline_cache(PipelineKind::Graphics)
            .is_empty());
        assert_eq!(device.counts(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_reset_forgets_archives() {
        let mut dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);
        let info = SignatureUnpackInfo::new(&device, "Base");

        let pipeline = dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Graphics, "PSO1"))
            .unwrap()
            .unwrap();
        assert!(dearchiver.unpack_signature(&info).unwrap().is_some());

        dearchiver.reset();

        assert_eq!(dearchiver.archive_count(), 0);
        assert!(!dearchiver.contains(ResourceCategory::Signature, "Base"));
        assert!(dearchiver.unpack_signature(&info).unwrap().is_none());
        assert!(dearchiver.loaded_archive(0).is_none());
        // Already reconstructed objects outlive the archive they came from.
        assert_eq!(pipeline.shaders.len(), 2);
        assert_eq!(Arc::strong_count(&pipeline.shaders[0]), 1);
    }

    #[test]
    fn test_render_pass_resolved_for_graphics_pipeline() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);

        let pipeline = dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Graphics, "Forward"))
            .unwrap()
            .unwrap();
        let render_pass = pipeline.render_pass.clone().unwrap();
        assert_eq!(render_pass.name, "Main");

        let direct = dearchiver
            .unpack_render_pass(&RenderPassUnpackInfo::new(&device, "Main"))
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&render_pass, &direct));
        assert_eq!(device.render_passes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_implicit_signatures_are_private() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);

        let shared = dearchiver
            .unpack_signature(&SignatureUnpackInfo::new(&device, "Base"))
            .unwrap()
            .unwrap();
        let pipeline = dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Compute, "Implicit"))
            .unwrap()
            .unwrap();

        let private = &pipeline.signatures[0];
        assert!(private.is_implicit);
        assert!(!Arc::ptr_eq(private, &shared));
        assert!(Arc::ptr_eq(
            &dearchiver.signature_cache().get("Base").unwrap(),
            &shared
        ));
        assert_eq!(device.signatures.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_signature_aborts_pipeline() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);

        let err = dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Compute, "Orphan"))
            .unwrap_err();
        match err {
            Error::MissingDependency {
                name, dependency, ..
            } => {
                assert_eq!(name, "Orphan");
                assert_eq!(dependency, "Ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(device.pipelines.load(Ordering::SeqCst), 0);
        assert!(dearchiver.pipeline_cache(PipelineKind::Compute).is_empty());
    }

    #[test]
    fn test_construction_error_propagates() {
        let dearchiver = loaded(sample_archive());
        let mut device = MockDevice::new(BackendId::Vulkan);
        device.reject_pipelines = true;

        let err = dearchiver
            .unpack_pipeline(&PipelineUnpackInfo::new(&device, PipelineKind::Graphics, "PSO1"))
            .unwrap_err();
        assert!(matches!(err, Error::Construction { what: "graphics-pipeline", .. }));
        assert!(dearchiver.pipeline_cache(PipelineKind::Graphics).is_empty());
    }

    #[test]
    fn test_overrides_reach_device() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);

        let pipeline = dearchiver
            .unpack_pipeline(
                &PipelineUnpackInfo::new(&device, PipelineKind::Graphics, "PSO1")
                    .with_srb_allocation_granularity(16)
                    .with_immediate_context_mask(0b110),
            )
            .unwrap()
            .unwrap();

        assert_eq!(pipeline.immediate_context_mask, 0b110);
        assert_eq!(pipeline.signatures[0].srb_allocation_granularity, 16);
    }

    #[test]
    fn test_modify_hook_bypasses_cache() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);
        fn set_mask(info: &mut PipelineCreateInfo<'_, MockDevice>) {
            info.desc.immediate_context_mask = 0xF0;
        }
        let info = PipelineUnpackInfo::new(&device, PipelineKind::Graphics, "PSO1").with_modify_create_info(&set_mask);

        let first = dearchiver.unpack_pipeline(&info).unwrap().unwrap();
        let second = dearchiver.unpack_pipeline(&info).unwrap().unwrap();

        assert_eq!(first.immediate_context_mask, 0xF0);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(dearchiver
            .pipeline_cache(PipelineKind::Graphics)
            .get("PSO1")
            .is_none());
    }

    #[test]
    fn test_corrupt_payload_is_consistency_error() {
        let mut builder = ArchiveBuilder::new();
        builder.add_signature(&signature("S", 0)).unwrap();
        // Override flag and internal data, then one stray byte.
        let mut payload = vec![0];
        payload.extend_from_slice(&[0; 12]);
        payload.push(0xAB);
        builder
            .add_raw_payload(ResourceCategory::Signature, "S", BackendId::Vulkan, payload)
            .unwrap();
        let dearchiver = loaded(builder.build().unwrap());
        let device = MockDevice::new(BackendId::Vulkan);

        let err = dearchiver
            .unpack_signature(&SignatureUnpackInfo::new(&device, "S"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Consistency {
                source: kiln_archive::Error::TrailingBytes { remaining: 1, .. },
                ..
            }
        ));
        assert_eq!(device.counts(), [0, 0, 0, 0]);
        assert!(dearchiver.signature_cache().is_empty());
    }

    #[test]
    fn test_failed_load_leaves_state_unchanged() {
        let mut dearchiver = loaded(sample_archive());

        let mut corrupt = signature_archive("Other", 0);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        assert!(matches!(
            dearchiver.load_archive(corrupt.into()),
            Err(Error::Archive(kiln_archive::Error::ChecksumMismatch { .. }))
        ));

        let mismatched = dearchiver.load_archive_with(
            signature_archive("Other", 0).into(),
            LoadOptions {
                expected_content_version: Some(9),
            },
        );
        assert!(matches!(
            mismatched,
            Err(Error::Archive(kiln_archive::Error::ContentVersionMismatch {
                found: 0,
                expected: 9
            }))
        ));

        assert_eq!(dearchiver.archive_count(), 1);
        assert!(!dearchiver.contains(ResourceCategory::Signature, "Other"));
    }

    #[test]
    fn test_content_version_accepted() {
        let mut dearchiver: Dearchiver<MockDevice> = Dearchiver::default();
        dearchiver
            .load_archive_with(
                sample_archive().into(),
                LoadOptions {
                    expected_content_version: Some(3),
                },
            )
            .unwrap();
        assert_eq!(dearchiver.archives().next().unwrap().content_version(), 3);
    }

    #[test]
    fn test_concurrent_unpack_single_instance() {
        let dearchiver = loaded(sample_archive());
        let device = MockDevice::new(BackendId::Vulkan);

        let pipelines: Vec<Arc<MockPipeline>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let (dearchiver, device) = (&dearchiver, &device);
                    s.spawn(move || {
                        let info = PipelineUnpackInfo::new(device, PipelineKind::Graphics, "PSO1");
                        dearchiver.unpack_pipeline(&info).unwrap().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(pipelines.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(pipelines[0].name, "PSO1");
        let cache = dearchiver.loaded_archive(0).unwrap().shaders();
        assert_eq!(cache.cached_count(BackendId::Vulkan), 2);
    }
}

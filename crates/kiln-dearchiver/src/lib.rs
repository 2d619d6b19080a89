//! Reconstruction of live GPU objects from device object archives.
//!
//! A [`Dearchiver`] owns any number of loaded archives and rebuilds resource
//! signatures, render passes and pipelines from them on request, handing the
//! decoded descriptions to a [`RenderDevice`]. Pipelines pull in the
//! signatures, shaders and render pass they reference.
//!
//! Reconstructed objects are cached by name behind weak handles: while a caller
//! holds one, repeated requests return the same instance. Shaders are cached
//! per archive and backend by their position in the archive.
//!
//! # Example
//!
//! ```ignore
//! use kiln_archive::{ByteStore, PipelineKind};
//! use kiln_dearchiver::{Dearchiver, DearchiverConfig, PipelineUnpackInfo};
//!
//! let mut dearchiver = Dearchiver::new(DearchiverConfig::default());
//! dearchiver.load_archive(ByteStore::map_file("pipelines.kiln")?)?;
//!
//! let info = PipelineUnpackInfo::new(&device, PipelineKind::Graphics, "Opaque");
//! let pipeline = dearchiver.unpack_pipeline(&info)?.expect("pipeline not in archive");
//! ```

mod cache;
mod config;
mod data;
mod dearchiver;
mod device;
mod error;
mod shader_cache;

pub use cache::NamedResourceCache;
pub use config::{DearchiverConfig, LoadOptions};
pub use data::{PipelineData, RenderPassData, SignatureData};
pub use dearchiver::{
    Dearchiver, LoadedArchive, PipelineUnpackInfo, RenderPassUnpackInfo, SignatureUnpackInfo,
};
pub use device::{DeviceError, PipelineCreateInfo, RenderDevice};
pub use error::{Error, Result};
pub use shader_cache::ShaderCache;

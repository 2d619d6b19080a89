//! Device object archive format.
//!
//! A kiln archive packs precompiled descriptions of GPU objects (resource
//! signatures, render passes and four kinds of pipeline state) for one or more
//! backends. Each resource has a backend-agnostic header region and one payload
//! region per backend it was built for; shaders live in per-backend sections and
//! are addressed by position.
//!
//! This crate only reads archives. The `builder` feature adds
//! [`builder::ArchiveBuilder`], used by tests and tooling to synthesise them.
//!
//! # Example
//!
//! ```no_run
//! use kiln_archive::{BackendId, ByteStore, ObjectArchive, ResourceCategory};
//!
//! let archive = ObjectArchive::parse(ByteStore::map_file("pipelines.kiln")?)?;
//!
//! for name in archive.names(ResourceCategory::GraphicsPipeline) {
//!     let has_vulkan = archive
//!         .locate_backend_payload(ResourceCategory::GraphicsPipeline, name, BackendId::Vulkan)
//!         .is_some();
//!     println!("{name}: vulkan={has_vulkan}");
//! }
//! # Ok::<(), kiln_archive::Error>(())
//! ```

mod archive;
mod arena;
mod error;
mod header;
mod ids;
mod store;

pub mod decode;
pub mod desc;

#[cfg(feature = "builder")]
pub mod builder;
#[cfg(feature = "builder")]
pub mod encode;

pub use archive::{ObjectArchive, ResourceEntry};
pub use arena::ScratchArena;
pub use error::{Error, Result};
pub use header::{ArchiveHeader, HeaderFlags, ResourceHeader};
pub use ids::{BackendId, PipelineKind, ResourceCategory};
pub use store::ByteStore;

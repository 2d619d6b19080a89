//! Kiln - device object archives for multi-backend renderers.
//!
//! This crate provides a unified interface to the kiln crates.
//!
//! # Crates
//!
//! - [`kiln_common`] - Binary reading/writing, regions, CRC32C
//! - [`kiln_archive`] - Archive format, description types and decoding
//! - [`kiln_dearchiver`] - Cached reconstruction of signatures, render passes and pipelines
//!
//! # Example
//!
//! ```no_run
//! use kiln::prelude::*;
//!
//! let archive = ObjectArchive::open("pipelines.kiln")?;
//! for category in ResourceCategory::ALL {
//!     println!("{category}: {}", archive.resource_count(category));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use kiln_archive as archive;
pub use kiln_common as common;
pub use kiln_dearchiver as dearchiver;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use kiln_archive::{BackendId, ByteStore, ObjectArchive, PipelineKind, ResourceCategory};
    pub use kiln_dearchiver::{
        Dearchiver, DearchiverConfig, LoadOptions, PipelineCreateInfo, PipelineUnpackInfo,
        RenderDevice, RenderPassUnpackInfo, SignatureUnpackInfo,
    };
}

pub use kiln_dearchiver::Dearchiver;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

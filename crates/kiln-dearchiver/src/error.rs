//! Error types for archive loading and object reconstruction.

use kiln_archive::{BackendId, ResourceCategory};
use thiserror::Error;

use crate::device::DeviceError;

/// Errors that can occur while loading archives or unpacking objects.
///
/// A name that is not present in any loaded archive is not an error; unpack
/// calls report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    /// The archive bytes failed format validation.
    #[error("invalid archive: {0}")]
    Archive(#[from] kiln_archive::Error),

    /// The name resolved, but the archive has no payload for the device's backend.
    #[error("{category} '{name}' has no {backend} data in its archive")]
    MissingBackendData {
        category: ResourceCategory,
        name: String,
        backend: BackendId,
    },

    /// A header or payload region failed to decode or was not fully consumed.
    #[error("corrupt {category} '{name}': {source}")]
    Consistency {
        category: ResourceCategory,
        name: String,
        source: kiln_archive::Error,
    },

    /// A pipeline references a signature or render pass that no loaded archive provides.
    #[error("{category} '{name}' references missing {dependency_category} '{dependency}'")]
    MissingDependency {
        category: ResourceCategory,
        name: String,
        dependency_category: ResourceCategory,
        dependency: String,
    },

    /// A pipeline references a shader position past the end of the backend's section.
    #[error("no {backend} shader at position {position}")]
    MissingShader { backend: BackendId, position: u32 },

    /// A shader region failed to decode.
    #[error("corrupt {backend} shader at position {position}: {source}")]
    InvalidShader {
        backend: BackendId,
        position: u32,
        source: kiln_archive::Error,
    },

    /// The device rejected a decoded description.
    #[error("device failed to create {what} '{name}': {source}")]
    Construction {
        what: &'static str,
        name: String,
        source: DeviceError,
    },
}

impl Error {
    pub(crate) fn consistency(
        category: ResourceCategory,
        name: &str,
        source: kiln_archive::Error,
    ) -> Self {
        Self::Consistency {
            category,
            name: name.to_owned(),
            source,
        }
    }

    pub(crate) fn construction(what: &'static str, name: &str, source: DeviceError) -> Self {
        Self::Construction {
            what,
            name: name.to_owned(),
            source,
        }
    }
}

/// Result type for dearchiver operations.
pub type Result<T> = std::result::Result<T, Error>;

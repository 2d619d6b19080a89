//! Positional shader cache, one per loaded archive.

use std::fmt;
use std::sync::Arc;

use kiln_archive::{BackendId, ObjectArchive};
use parking_lot::Mutex;

/// Shaders already reconstructed from one archive, per backend, indexed by
/// their position in the backend's shader section.
///
/// Unlike the named caches this one holds strong references: shaders live as
/// long as the archive stays loaded.
pub struct ShaderCache<S> {
    sections: [Mutex<Vec<Option<Arc<S>>>>; BackendId::COUNT],
}

impl<S> ShaderCache<S> {
    /// Empty cache sized for the shader sections of `archive`.
    pub fn new(archive: &ObjectArchive) -> Self {
        Self {
            sections: std::array::from_fn(|i| {
                let len = archive.shader_count(BackendId::ALL[i]);
                let mut slots = Vec::new();
                slots.resize_with(len, || None);
                Mutex::new(slots)
            }),
        }
    }

    pub fn get(&self, backend: BackendId, position: u32) -> Option<Arc<S>> {
        self.sections[backend.index()]
            .lock()
            .get(position as usize)
            .and_then(Option::clone)
    }

    /// Store `shader` at `position` unless a shader is already there, and
    /// return whichever one ends up cached.
    ///
    /// Positions past the end of the section are not cached.
    pub fn get_or_insert(&self, backend: BackendId, position: u32, shader: Arc<S>) -> Arc<S> {
        let mut section = self.sections[backend.index()].lock();
        match section.get_mut(position as usize) {
            Some(Some(existing)) => Arc::clone(existing),
            Some(slot) => {
                *slot = Some(Arc::clone(&shader));
                shader
            }
            None => shader,
        }
    }

    /// Number of shaders reconstructed so far for `backend`.
    pub fn cached_count(&self, backend: BackendId) -> usize {
        self.sections[backend.index()]
            .lock()
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }
}

impl<S> fmt::Debug for ShaderCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_map();
        for backend in BackendId::ALL {
            let cached = self.cached_count(backend);
            if cached > 0 {
                list.entry(&backend, &cached);
            }
        }
        list.finish()
    }
}

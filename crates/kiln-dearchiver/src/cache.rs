//! Named Resource Cache: name to weak handle, one per resource category.

use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::{Arc, Weak};

use hashbrown::HashMap as FastHashMap;
use parking_lot::Mutex;
use rustc_hash::FxHasher;

type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// Thread-safe map from resource name to a weak handle on the object
/// reconstructed for it.
///
/// The cache never keeps an object alive. Once every external [`Arc`] is gone
/// the entry goes stale and the next lookup misses.
pub struct NamedResourceCache<T> {
    entries: Mutex<FxHashMap<String, Weak<T>>>,
}

impl<T> NamedResourceCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Strong handle on the live object cached under `name`, if any.
    ///
    /// A stale entry found here is removed.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        let mut entries = self.entries.lock();
        let object = entries.get(name)?.upgrade();
        if object.is_none() {
            entries.remove(name);
        }
        object
    }

    /// Cache `object` under `name`, replacing any previous entry.
    pub fn set(&self, name: &str, object: &Arc<T>) {
        self.entries
            .lock()
            .insert(name.to_owned(), Arc::downgrade(object));
    }

    /// Publish a freshly built object unless another thread got there first.
    ///
    /// Returns the live object now cached under `name`: `object` itself, or the
    /// instance published earlier, in which case `object` is dropped after the
    /// lock is released.
    pub fn get_or_publish(&self, name: &str, object: Arc<T>) -> Arc<T> {
        let existing = {
            let mut entries = self.entries.lock();
            match entries.get(name).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    entries.insert(name.to_owned(), Arc::downgrade(&object));
                    return object;
                }
            }
        };
        log::warn!("'{name}' was reconstructed concurrently; discarding the duplicate");
        drop(object);
        existing
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries, including stale ones.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries whose object is still alive.
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl<T> Default for NamedResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for NamedResourceCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedResourceCache")
            .field("entries", &self.len())
            .field("live", &self.live_count())
            .finish()
    }
}

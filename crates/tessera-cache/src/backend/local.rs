//! In-process LRU backend

use super::{CacheBackend, NamedCache};
use crate::metrics::{CacheCounters, CacheStats};
use crate::value::{CacheKey, CacheValue};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Backend keeping every cache in process memory
///
/// Opening the same name twice returns the same cache.
#[derive(Default)]
pub struct LocalBackend {
    caches: Mutex<HashMap<String, Arc<LocalCache>>>,
}

impl LocalBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for LocalBackend {
    fn open(&self, name: &str, capacity: usize) -> Arc<dyn NamedCache> {
        let mut caches = self.caches.lock();
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(LocalCache::new(name, capacity)));
        cache.clone()
    }

    fn shutdown(&self) {
        let mut caches = self.caches.lock();
        for cache in caches.values() {
            cache.clear();
        }
        caches.clear();
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

/// A bounded LRU map guarded by a mutex
pub(crate) struct LocalCache {
    name: String,
    entries: Mutex<LruCache<CacheKey, CacheValue>>,
    counters: CacheCounters,
}

impl LocalCache {
    pub(crate) fn new(name: &str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: name.to_string(),
            entries: Mutex::new(LruCache::new(capacity)),
            counters: CacheCounters::new(),
        }
    }
}

impl NamedCache for LocalCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        // LRU lookups reorder the list, so reads take the lock exclusively
        let value = self.entries.lock().get(key).cloned();
        self.counters.record_lookup(value.is_some());
        value
    }

    fn put(&self, key: CacheKey, value: CacheValue) {
        let displaced = self.entries.lock().push(key.clone(), value);
        self.counters.record_put();
        if matches!(displaced, Some((old, _)) if old != key) {
            self.counters.record_eviction();
        }
    }

    fn remove(&self, key: &CacheKey) {
        self.entries.lock().pop(key);
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

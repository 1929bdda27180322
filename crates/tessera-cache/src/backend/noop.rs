//! Backend that caches nothing

use super::{CacheBackend, NamedCache};
use crate::metrics::{CacheCounters, CacheStats};
use crate::value::{CacheKey, CacheValue};
use std::sync::Arc;

/// Backend whose caches never store anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackend;

impl NoopBackend {
    /// Create the backend
    pub fn new() -> Self {
        Self
    }
}

impl CacheBackend for NoopBackend {
    fn open(&self, name: &str, _capacity: usize) -> Arc<dyn NamedCache> {
        Arc::new(NoopCache::new(name))
    }

    fn shutdown(&self) {}

    fn kind(&self) -> &'static str {
        "noop"
    }
}

/// A cache where every lookup misses
pub(crate) struct NoopCache {
    name: String,
    counters: CacheCounters,
}

impl NoopCache {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            counters: CacheCounters::new(),
        }
    }
}

impl NamedCache for NoopCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, _key: &CacheKey) -> Option<CacheValue> {
        self.counters.record_miss();
        None
    }

    fn put(&self, _key: CacheKey, _value: CacheValue) {}

    fn remove(&self, _key: &CacheKey) {}

    fn clear(&self) {}

    fn len(&self) -> usize {
        0
    }

    fn capacity(&self) -> usize {
        0
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_misses() {
        let cache = NoopBackend::new().open("node", 100);
        cache.put(CacheKey::Id(1), CacheValue::Id(1));

        assert!(cache.get(&CacheKey::Id(1)).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }
}

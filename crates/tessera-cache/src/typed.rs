//! Typed views over named caches

use crate::backend::NamedCache;
use crate::value::{CacheKeyed, Cacheable};
use std::marker::PhantomData;
use std::sync::Arc;

/// A named cache viewed as `K` → `V`
///
/// An entry of a foreign variant (another writer used the same cache name
/// with a different value type) is dropped and reported as a miss.
pub struct TypedCache<K: ?Sized, V> {
    inner: Arc<dyn NamedCache>,
    _marker: PhantomData<fn(&K) -> V>,
}

impl<K: ?Sized, V> Clone for TypedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K: ?Sized + CacheKeyed, V: Cacheable> TypedCache<K, V> {
    /// Wrap an erased cache
    pub fn new(inner: Arc<dyn NamedCache>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Look up a value
    pub fn get(&self, key: &K) -> Option<V> {
        let key = key.cache_key();
        let value = self.inner.get(&key)?;
        match V::from_value(value) {
            Some(value) => Some(value),
            None => {
                tracing::warn!(
                    "Cache '{}' held an entry of an unexpected type, dropping it",
                    self.inner.name()
                );
                self.inner.remove(&key);
                None
            }
        }
    }

    /// Store a value
    pub fn put(&self, key: &K, value: V) {
        self.inner.put(key.cache_key(), value.into_value());
    }

    /// Drop one entry
    pub fn remove(&self, key: &K) {
        self.inner.remove(&key.cache_key());
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the cache holds nothing
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Name of the underlying cache
    pub fn name(&self) -> &str {
        self.inner.name()
    }
}

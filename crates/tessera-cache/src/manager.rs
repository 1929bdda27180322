//! Cache manager
//!
//! Owns the backend and memoizes one named cache per purpose. The manager is
//! constructed explicitly and shut down explicitly; after shutdown every
//! accessor hands out no-op caches, so late callers degrade to misses.

use crate::backend::{build_backend, CacheBackend, NamedCache, NoopBackend};
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::metrics::CacheMetrics;
use crate::typed::TypedCache;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_model::{Namespace, Node, TermId, Triple, TripleId};

/// Names of the caches the kernel uses
pub mod names {
    /// Node id → node
    pub const NODE: &str = "node";
    /// Triple id → triple
    pub const TRIPLE: &str = "triple";
    /// URI → node
    pub const URI: &str = "uri";
    /// Blank-node label → node
    pub const BNODE: &str = "bnode";
    /// Literal key → node
    pub const LITERAL: &str = "literal";
    /// Namespace URI → namespace
    pub const NAMESPACE_URI: &str = "namespace-uri";
    /// Prefix → namespace
    pub const NAMESPACE_PREFIX: &str = "namespace-prefix";
    /// Triple fingerprint → triple id
    pub const REGISTRY: &str = "registry";
}

/// Owner of every cache in the kernel
pub struct CacheManager {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    state: Mutex<ManagerState>,
}

struct ManagerState {
    caches: BTreeMap<String, Arc<dyn NamedCache>>,
    shut_down: bool,
}

impl CacheManager {
    /// Build the backend described by `config`
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let backend = build_backend(&config)?;
        Ok(Self::with_backend(config, backend))
    }

    /// Use an already constructed backend
    pub fn with_backend(config: CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        tracing::info!("Cache manager started with {} backend", backend.kind());
        Self {
            config,
            backend,
            state: Mutex::new(ManagerState {
                caches: BTreeMap::new(),
                shut_down: false,
            }),
        }
    }

    /// A manager that caches nothing
    pub fn disabled() -> Self {
        Self::with_backend(CacheConfig::disabled(), Arc::new(NoopBackend::new()))
    }

    /// Active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Backend name
    pub fn backend_kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// The cache called `name`, created on first use
    pub fn cache(&self, name: &str) -> Arc<dyn NamedCache> {
        let mut state = self.state.lock();
        if state.shut_down {
            return NoopBackend::new().open(name, 0);
        }
        state
            .caches
            .entry(name.to_string())
            .or_insert_with(|| {
                let capacity = self.config.capacity_for(name);
                tracing::debug!("Opening cache '{}' with capacity {}", name, capacity);
                self.backend.open(name, capacity)
            })
            .clone()
    }

    /// Node id → node
    pub fn node_cache(&self) -> TypedCache<TermId, Node> {
        TypedCache::new(self.cache(names::NODE))
    }

    /// Triple id → triple
    pub fn triple_cache(&self) -> TypedCache<TripleId, Triple> {
        TypedCache::new(self.cache(names::TRIPLE))
    }

    /// URI → node
    pub fn uri_cache(&self) -> TypedCache<str, Node> {
        TypedCache::new(self.cache(names::URI))
    }

    /// Blank-node label → node
    pub fn bnode_cache(&self) -> TypedCache<str, Node> {
        TypedCache::new(self.cache(names::BNODE))
    }

    /// Literal key → node
    pub fn literal_cache(&self) -> TypedCache<str, Node> {
        TypedCache::new(self.cache(names::LITERAL))
    }

    /// Namespace URI → namespace
    pub fn namespace_uri_cache(&self) -> TypedCache<str, Namespace> {
        TypedCache::new(self.cache(names::NAMESPACE_URI))
    }

    /// Prefix → namespace
    pub fn namespace_prefix_cache(&self) -> TypedCache<str, Namespace> {
        TypedCache::new(self.cache(names::NAMESPACE_PREFIX))
    }

    /// Generic id → id registry
    pub fn registry_cache(&self) -> TypedCache<u64, u64> {
        TypedCache::new(self.cache(names::REGISTRY))
    }

    /// Empty every cache handed out so far
    pub fn clear(&self) {
        let state = self.state.lock();
        for cache in state.caches.values() {
            cache.clear();
        }
        tracing::debug!("Cleared {} caches", state.caches.len());
    }

    /// Release the backend
    ///
    /// Idempotent: a second call only logs.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.shut_down {
            tracing::debug!("Cache manager already shut down");
            return;
        }
        state.shut_down = true;
        if !self.backend.is_shared() {
            for cache in state.caches.values() {
                cache.clear();
            }
        }
        state.caches.clear();
        self.backend.shutdown();
        tracing::info!("Cache manager shut down");
    }

    /// Whether [`CacheManager::shutdown`] has run
    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    /// Statistics of every cache handed out so far
    pub fn metrics(&self) -> CacheMetrics {
        let state = self.state.lock();
        let mut metrics = CacheMetrics::new();
        for (name, cache) in &state.caches {
            metrics.record(name, cache.stats());
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_model::Term;

    fn manager() -> CacheManager {
        CacheManager::new(CacheConfig::local(16).with_capacity(names::TRIPLE, 2)).unwrap()
    }

    #[test]
    fn test_accessors_are_memoized() {
        let manager = manager();
        let node = Node::new(TermId::new(1), Term::uri("http://example.org/a"));

        manager.uri_cache().put("http://example.org/a", node.clone());
        assert_eq!(manager.uri_cache().get("http://example.org/a"), Some(node));
        assert!(Arc::ptr_eq(&manager.cache(names::URI), &manager.cache(names::URI)));
    }

    #[test]
    fn test_capacities_follow_config() {
        let manager = manager();
        assert_eq!(manager.cache(names::TRIPLE).capacity(), 2);
        assert_eq!(manager.cache(names::NODE).capacity(), 16);
    }

    #[test]
    fn test_clear_empties_all_caches() {
        let manager = manager();
        manager.registry_cache().put(&1, 10);
        manager.cache("custom").put(crate::CacheKey::Id(5), crate::CacheValue::Id(5));

        manager.clear();
        assert!(manager.registry_cache().is_empty());
        assert!(manager.cache("custom").is_empty());
    }

    #[test]
    fn test_shutdown_is_idempotent_and_degrades_to_noop() {
        let manager = manager();
        manager.registry_cache().put(&1, 10);

        manager.shutdown();
        manager.shutdown();
        assert!(manager.is_shut_down());

        let registry = manager.registry_cache();
        registry.put(&1, 10);
        assert!(registry.get(&1).is_none());
        assert!(manager.metrics().caches.is_empty());
    }

    #[test]
    fn test_metrics_track_lookups() {
        let manager = manager();
        let cache = manager.registry_cache();
        cache.put(&1, 2);
        cache.get(&1);
        cache.get(&3);

        let metrics = manager.metrics();
        let stats = metrics.get(names::REGISTRY).unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.puts, 1);
    }

    #[test]
    fn test_disabled_manager() {
        let manager = CacheManager::disabled();
        assert_eq!(manager.backend_kind(), "noop");
        manager.registry_cache().put(&1, 1);
        assert!(manager.registry_cache().get(&1).is_none());
    }
}

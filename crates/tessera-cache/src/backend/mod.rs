//! Cache backends
//!
//! A backend hands out named, independently sized caches. Three
//! implementations exist: [`LocalBackend`] (in-process LRU),
//! [`ClusteredBackend`] (replicated between cluster members) and
//! [`NoopBackend`] (caching disabled).

mod clustered;
mod local;
mod noop;

pub use clustered::{ClusterRegistry, ClusteredBackend};
pub use local::LocalBackend;
pub use noop::NoopBackend;

use crate::config::{CacheBackendKind, CacheConfig};
use crate::error::CacheError;
use crate::metrics::CacheStats;
use crate::value::{CacheKey, CacheValue};
use std::sync::Arc;

/// One named cache
///
/// Lookups that fail for any reason are misses; no operation returns an error.
pub trait NamedCache: Send + Sync {
    /// Cache name
    fn name(&self) -> &str;

    /// Look up a value
    fn get(&self, key: &CacheKey) -> Option<CacheValue>;

    /// Store a value, evicting the least recently used entry when full
    fn put(&self, key: CacheKey, value: CacheValue);

    /// Drop one entry
    fn remove(&self, key: &CacheKey);

    /// Drop every entry
    fn clear(&self);

    /// Number of entries currently held
    fn len(&self) -> usize;

    /// Whether the cache holds nothing
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries
    fn capacity(&self) -> usize;

    /// Counter values observed through this handle
    fn stats(&self) -> CacheStats;
}

/// Provider of named caches
pub trait CacheBackend: Send + Sync {
    /// Open (or create) the cache called `name` holding up to `capacity` entries
    fn open(&self, name: &str, capacity: usize) -> Arc<dyn NamedCache>;

    /// Release backend resources
    fn shutdown(&self);

    /// Short backend name for logs
    fn kind(&self) -> &'static str;

    /// Whether other managers see the same entries
    ///
    /// A member shutting down must not clear shared caches.
    fn is_shared(&self) -> bool {
        false
    }
}

/// Build the backend selected by `config`
pub fn build_backend(config: &CacheConfig) -> Result<Arc<dyn CacheBackend>, CacheError> {
    config.validate()?;
    let backend: Arc<dyn CacheBackend> = match config.backend {
        CacheBackendKind::Local => Arc::new(LocalBackend::new()),
        CacheBackendKind::Noop => Arc::new(NoopBackend::new()),
        CacheBackendKind::Clustered => {
            let cluster = config.cluster_name.as_deref().ok_or_else(|| {
                CacheError::Invalid("clustered backend requires a cluster_name".to_string())
            })?;
            Arc::new(ClusteredBackend::join(cluster))
        }
    };
    Ok(backend)
}

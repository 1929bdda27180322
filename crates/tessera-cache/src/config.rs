//! Configuration for the cache manager
//!
//! Selects the backend and sizes every named cache. Loaded from TOML:
//!
//! ```toml
//! backend = "local"
//! default_capacity = 10000
//!
//! [capacities]
//! node = 50000
//! triple = 20000
//! ```

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Which backend provides the named caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// In-process LRU caches
    Local,
    /// Caches replicated across the members of a named cluster
    Clustered,
    /// Caching disabled: every lookup misses
    Noop,
}

/// Configuration of the cache manager
///
/// # Examples
///
/// ```
/// use tessera_cache::{CacheBackendKind, CacheConfig};
///
/// let config = CacheConfig::from_toml_str(r#"
///     backend = "local"
///     default_capacity = 500
///
///     [capacities]
///     node = 2000
/// "#).unwrap();
///
/// assert_eq!(config.backend, CacheBackendKind::Local);
/// assert_eq!(config.capacity_for("node"), 2000);
/// assert_eq!(config.capacity_for("triple"), 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend providing the caches
    /// Default: local
    #[serde(default = "default_backend")]
    pub backend: CacheBackendKind,

    /// Capacity (entries) of caches without an override
    /// Default: 10000
    #[serde(default = "default_capacity")]
    pub default_capacity: usize,

    /// Per-cache capacity overrides, keyed by cache name
    #[serde(default)]
    pub capacities: BTreeMap<String, usize>,

    /// Cluster to join when the backend is clustered
    #[serde(default)]
    pub cluster_name: Option<String>,
}

fn default_backend() -> CacheBackendKind {
    CacheBackendKind::Local
}

fn default_capacity() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            default_capacity: default_capacity(),
            capacities: BTreeMap::new(),
            cluster_name: None,
        }
    }
}

impl CacheConfig {
    /// Local caches with the given default capacity
    pub fn local(default_capacity: usize) -> Self {
        Self {
            default_capacity,
            ..Self::default()
        }
    }

    /// Clustered caches joining `cluster_name`
    pub fn clustered(cluster_name: &str) -> Self {
        Self {
            backend: CacheBackendKind::Clustered,
            cluster_name: Some(cluster_name.to_string()),
            ..Self::default()
        }
    }

    /// Caching disabled
    pub fn disabled() -> Self {
        Self {
            backend: CacheBackendKind::Noop,
            ..Self::default()
        }
    }

    /// Override the capacity of one named cache
    pub fn with_capacity(mut self, name: &str, capacity: usize) -> Self {
        self.capacities.insert(name.to_string(), capacity);
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, CacheError> {
        let config: CacheConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check the configuration for inconsistencies
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.default_capacity == 0 {
            return Err(CacheError::Invalid(
                "default_capacity must be greater than zero".to_string(),
            ));
        }
        if let Some((name, _)) = self.capacities.iter().find(|(_, cap)| **cap == 0) {
            return Err(CacheError::Invalid(format!(
                "capacity of cache '{}' must be greater than zero",
                name
            )));
        }
        if self.backend == CacheBackendKind::Clustered
            && self.cluster_name.as_deref().map_or(true, str::is_empty)
        {
            return Err(CacheError::Invalid(
                "clustered backend requires a cluster_name".to_string(),
            ));
        }
        Ok(())
    }

    /// Capacity of the cache called `name`
    pub fn capacity_for(&self, name: &str) -> usize {
        self.capacities
            .get(name)
            .copied()
            .unwrap_or(self.default_capacity)
    }
}

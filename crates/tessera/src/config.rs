//! Kernel configuration
//!
//! One TOML document configures every layer:
//!
//! ```toml
//! [storage]
//! backend = "sqlite"
//! path = "data/tessera.db"
//!
//! [cache]
//! backend = "local"
//! default_capacity = 50000
//!
//! [reasoner]
//! retraction = "incremental"
//! ```
//!
//! Every section is optional; the defaults give an in-memory store with local
//! caches and an incremental reasoner.

use crate::error::KernelError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tessera_cache::CacheConfig;
use tessera_reasoner::ReasonerConfig;

/// Durable backing store selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-process store; contents are lost when the kernel is dropped
    #[default]
    Memory,
    /// SQLite database file, created on first use
    Sqlite {
        /// Database file path
        path: PathBuf,
    },
}

/// Configuration of a whole [`Kernel`](crate::Kernel)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Backing store
    #[serde(default)]
    pub storage: StorageConfig,

    /// Cache manager
    #[serde(default)]
    pub cache: CacheConfig,

    /// Reasoning engine
    #[serde(default)]
    pub reasoner: ReasonerConfig,
}

impl KernelConfig {
    /// In-memory kernel with default caches and reasoner
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// SQLite-backed kernel with default caches and reasoner
    pub fn sqlite<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            storage: StorageConfig::Sqlite { path: path.into() },
            ..Self::default()
        }
    }

    /// Replace the cache section
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the reasoner section
    pub fn with_reasoner(mut self, reasoner: ReasonerConfig) -> Self {
        self.reasoner = reasoner;
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, KernelError> {
        let config: KernelConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tessera::KernelConfig;
    ///
    /// let config = KernelConfig::from_file("tessera.toml").unwrap();
    /// println!("{:?}", config.storage);
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KernelError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check every section
    pub fn validate(&self) -> Result<(), KernelError> {
        if let StorageConfig::Sqlite { path } = &self.storage {
            if path.as_os_str().is_empty() {
                return Err(KernelError::Config(
                    "storage.path cannot be empty".to_string(),
                ));
            }
        }
        self.cache.validate()?;
        self.reasoner.validate()?;
        Ok(())
    }
}

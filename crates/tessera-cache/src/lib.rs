//! Tessera Cache
//!
//! Named, independently sized caches for the graph-storage kernel.
//!
//! # Overview
//!
//! The [`CacheManager`] owns one [`CacheBackend`] and hands out named caches:
//!
//! | Accessor | Key → Value |
//! |----------|-------------|
//! | `node_cache` | term id → node |
//! | `triple_cache` | triple id → triple |
//! | `uri_cache` | URI → node |
//! | `bnode_cache` | blank-node label → node |
//! | `literal_cache` | literal key → node |
//! | `namespace_uri_cache` | namespace URI → namespace |
//! | `namespace_prefix_cache` | prefix → namespace |
//! | `registry_cache` | fingerprint → id |
//! | `cache(name)` | any name, erased key → value |
//!
//! A miss is never an error: callers fall through to the backing store.
//!
//! # Backends
//!
//! - **local**: in-process LRU
//! - **clustered**: replicated between the members of a named cluster
//! - **noop**: caching disabled
//!
//! # Usage
//!
//! ```
//! use tessera_cache::{CacheConfig, CacheManager};
//! use tessera_model::{Node, Term, TermId};
//!
//! let manager = CacheManager::new(CacheConfig::local(1000)).unwrap();
//! let node = Node::new(TermId::new(1), Term::uri("http://example.org/alice"));
//!
//! manager.uri_cache().put("http://example.org/alice", node.clone());
//! assert_eq!(manager.uri_cache().get("http://example.org/alice"), Some(node));
//!
//! manager.shutdown();
//! ```

#![warn(missing_docs)]

mod backend;
mod config;
mod error;
mod manager;
mod metrics;
mod typed;
mod value;

pub use backend::{
    build_backend, CacheBackend, ClusterRegistry, ClusteredBackend, LocalBackend, NamedCache,
    NoopBackend,
};
pub use config::{CacheBackendKind, CacheConfig};
pub use error::CacheError;
pub use manager::{names, CacheManager};
pub use metrics::{CacheCounters, CacheMetrics, CacheStats};
pub use typed::TypedCache;
pub use value::{CacheKey, CacheKeyed, CacheValue, Cacheable};

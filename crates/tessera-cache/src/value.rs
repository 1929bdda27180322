//! Keys and values stored in named caches
//!
//! Backends are type-erased: they store [`CacheKey`] → [`CacheValue`]. The
//! [`CacheKeyed`] and [`Cacheable`] traits convert the kernel's own types in
//! and out, so typed caches never see a foreign variant.

use std::sync::Arc;
use tessera_model::{Namespace, Node, TermId, Triple, TripleId};

/// Key of a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Numeric identity (term id, triple id, fingerprint)
    Id(u64),
    /// String key (URI, blank-node label, literal key, prefix)
    Str(Arc<str>),
}

impl From<u64> for CacheKey {
    fn from(id: u64) -> Self {
        CacheKey::Id(id)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        CacheKey::Str(Arc::from(s))
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        CacheKey::Str(Arc::from(s))
    }
}

/// Value of a cache entry
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// An interned term
    Node(Node),
    /// A persisted triple
    Triple(Triple),
    /// A namespace record
    Namespace(Namespace),
    /// A bare identity
    Id(u64),
}

/// Types usable as typed cache keys
pub trait CacheKeyed {
    /// Convert to the erased key
    fn cache_key(&self) -> CacheKey;
}

impl CacheKeyed for u64 {
    fn cache_key(&self) -> CacheKey {
        CacheKey::Id(*self)
    }
}

impl CacheKeyed for TermId {
    fn cache_key(&self) -> CacheKey {
        CacheKey::Id(self.value())
    }
}

impl CacheKeyed for TripleId {
    fn cache_key(&self) -> CacheKey {
        CacheKey::Id(self.value())
    }
}

impl CacheKeyed for str {
    fn cache_key(&self) -> CacheKey {
        CacheKey::from(self)
    }
}

/// Types usable as typed cache values
pub trait Cacheable: Sized {
    /// Wrap into the erased value
    fn into_value(self) -> CacheValue;

    /// Unwrap from the erased value, `None` on a foreign variant
    fn from_value(value: CacheValue) -> Option<Self>;
}

impl Cacheable for Node {
    fn into_value(self) -> CacheValue {
        CacheValue::Node(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        match value {
            CacheValue::Node(node) => Some(node),
            _ => None,
        }
    }
}

impl Cacheable for Triple {
    fn into_value(self) -> CacheValue {
        CacheValue::Triple(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        match value {
            CacheValue::Triple(triple) => Some(triple),
            _ => None,
        }
    }
}

impl Cacheable for Namespace {
    fn into_value(self) -> CacheValue {
        CacheValue::Namespace(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        match value {
            CacheValue::Namespace(ns) => Some(ns),
            _ => None,
        }
    }
}

impl Cacheable for u64 {
    fn into_value(self) -> CacheValue {
        CacheValue::Id(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        match value {
            CacheValue::Id(id) => Some(id),
            _ => None,
        }
    }
}

//! Term store - interning and namespaces read through the caches
//!
//! Lookups try the cache for the term's kind first and fall through to the
//! backing store on a miss, filling the cache on the way back.

use crate::backend::{BackingStore, StoreConnection};
use crate::error::StoreError;
use parking_lot::Mutex;
use std::sync::Arc;
use tessera_cache::{CacheManager, TypedCache};
use tessera_model::{Namespace, Node, Term, TermId};

/// Interns terms and manages namespace records
///
/// Uses a dedicated connection outside any transaction, so interned ids are
/// durable immediately and stay valid even if the transaction that needed
/// them rolls back.
pub struct TermStore {
    conn: Mutex<Box<dyn StoreConnection>>,
    caches: Arc<CacheManager>,
}

impl TermStore {
    /// Open a term store on `backend`
    pub fn new(backend: &dyn BackingStore, caches: Arc<CacheManager>) -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(backend.connect()?),
            caches,
        })
    }

    fn term_cache(&self, term: &Term) -> (TypedCache<str, Node>, String) {
        match term {
            Term::Uri(uri) => (self.caches.uri_cache(), uri.to_string()),
            Term::BlankNode(label) => (self.caches.bnode_cache(), label.to_string()),
            Term::Literal(lit) => (self.caches.literal_cache(), lit.cache_key()),
        }
    }

    fn remember(&self, node: Node) {
        let (cache, key) = self.term_cache(&node.term);
        cache.put(&key, node.clone());
        let id = node.id;
        self.caches.node_cache().put(&id, node);
    }

    /// Id of `term`, interning it on first use
    pub fn intern(&self, term: &Term) -> Result<TermId, StoreError> {
        let (cache, key) = self.term_cache(term);
        if let Some(node) = cache.get(&key) {
            return Ok(node.id);
        }
        let id = self.conn.lock().intern_term(term)?;
        self.remember(Node::new(id, term.clone()));
        Ok(id)
    }

    /// Id of `term` without creating it
    pub fn lookup(&self, term: &Term) -> Result<Option<TermId>, StoreError> {
        let (cache, key) = self.term_cache(term);
        if let Some(node) = cache.get(&key) {
            return Ok(Some(node.id));
        }
        let id = self.conn.lock().lookup_term(term)?;
        if let Some(id) = id {
            self.remember(Node::new(id, term.clone()));
        }
        Ok(id)
    }

    /// Term with the given id
    pub fn resolve(&self, id: TermId) -> Result<Term, StoreError> {
        if let Some(node) = self.caches.node_cache().get(&id) {
            return Ok(node.term);
        }
        let term = self
            .conn
            .lock()
            .load_term(id)?
            .ok_or(StoreError::UnknownTerm(id))?;
        self.remember(Node::new(id, term.clone()));
        Ok(term)
    }

    /// Bind a prefix, replacing any previous binding of the same prefix
    pub fn set_namespace(&self, namespace: Namespace) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        if let Some(previous) = conn.load_namespace(namespace.prefix())? {
            self.caches.namespace_uri_cache().remove(previous.uri());
        }
        conn.put_namespace(&namespace)?;
        drop(conn);

        self.caches
            .namespace_prefix_cache()
            .put(namespace.prefix(), namespace.clone());
        self.caches.namespace_uri_cache().remove(namespace.uri());
        tracing::debug!("Bound namespace {} -> {}", namespace.prefix(), namespace.uri());
        Ok(())
    }

    /// Namespace bound to `prefix`
    pub fn namespace_by_prefix(&self, prefix: &str) -> Result<Option<Namespace>, StoreError> {
        let cache = self.caches.namespace_prefix_cache();
        if let Some(ns) = cache.get(prefix) {
            return Ok(Some(ns));
        }
        let ns = self.conn.lock().load_namespace(prefix)?;
        if let Some(ns) = &ns {
            cache.put(prefix, ns.clone());
        }
        Ok(ns)
    }

    /// Namespace with the given URI
    pub fn namespace_by_uri(&self, uri: &str) -> Result<Option<Namespace>, StoreError> {
        let cache = self.caches.namespace_uri_cache();
        if let Some(ns) = cache.get(uri) {
            return Ok(Some(ns));
        }
        let ns = self.conn.lock().load_namespace_by_uri(uri)?;
        if let Some(ns) = &ns {
            cache.put(uri, ns.clone());
        }
        Ok(ns)
    }

    /// Unbind `prefix`, returning whether it was bound
    pub fn remove_namespace(&self, prefix: &str) -> Result<bool, StoreError> {
        let removed = self.conn.lock().remove_namespace(prefix)?;
        self.caches.namespace_prefix_cache().remove(prefix);
        if let Some(ns) = &removed {
            self.caches.namespace_uri_cache().remove(ns.uri());
        }
        Ok(removed.is_some())
    }

    /// Every namespace, ordered by prefix
    pub fn namespaces(&self) -> Result<Vec<Namespace>, StoreError> {
        self.conn.lock().load_namespaces()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use tessera_cache::CacheConfig;

    fn store() -> (MemoryBackend, Arc<CacheManager>, TermStore) {
        let backend = MemoryBackend::new();
        let caches = Arc::new(CacheManager::new(CacheConfig::local(64)).unwrap());
        let store = TermStore::new(&backend, caches.clone()).unwrap();
        (backend, caches, store)
    }

    #[test]
    fn test_intern_and_resolve() {
        let (backend, _caches, store) = store();
        let term = Term::lang_literal("chat", "fr");

        let id = store.intern(&term).unwrap();
        assert_eq!(store.intern(&term).unwrap(), id);
        assert_eq!(store.resolve(id).unwrap(), term);
        assert_eq!(backend.term_count(), 1);
    }

    #[test]
    fn test_intern_reads_through_cache() {
        let (_backend, caches, store) = store();
        let term = Term::uri("http://example.org/a");

        store.intern(&term).unwrap();
        store.intern(&term).unwrap();

        let stats = caches.metrics();
        assert_eq!(stats.get("uri").unwrap().hits, 1);
        assert_eq!(stats.get("uri").unwrap().misses, 1);
    }

    #[test]
    fn test_works_without_caches() {
        let backend = MemoryBackend::new();
        let store = TermStore::new(&backend, Arc::new(CacheManager::disabled())).unwrap();

        let id = store.intern(&Term::blank("b1")).unwrap();
        assert_eq!(store.resolve(id).unwrap(), Term::blank("b1"));
        assert_eq!(store.lookup(&Term::blank("b1")).unwrap(), Some(id));
    }

    #[test]
    fn test_empty_tags_intern_like_plain_literals_on_both_backends() {
        use crate::backend::SqliteBackend;

        let dir = tempfile::TempDir::new().unwrap();
        let sqlite = SqliteBackend::open(dir.path().join("terms.db")).unwrap();
        let memory = MemoryBackend::new();
        let backends: [&dyn BackingStore; 2] = [&memory, &sqlite];

        for backend in backends {
            let store = TermStore::new(backend, Arc::new(CacheManager::disabled())).unwrap();
            let plain = store.intern(&Term::literal("x")).unwrap();
            assert_eq!(store.intern(&Term::typed_literal("x", "")).unwrap(), plain);
            assert_eq!(store.intern(&Term::lang_literal("x", "")).unwrap(), plain);

            let typed = store.intern(&Term::typed_literal("x", xsd_string())).unwrap();
            let tagged = store.intern(&Term::lang_literal("x", "en")).unwrap();
            assert_ne!(typed, plain);
            assert_ne!(tagged, plain);
            assert_ne!(typed, tagged);
            assert_eq!(store.resolve(plain).unwrap(), Term::literal("x"));
            assert_eq!(store.resolve(typed).unwrap(), Term::typed_literal("x", xsd_string()));
            assert_eq!(store.resolve(tagged).unwrap(), Term::lang_literal("x", "en"));
        }
    }

    fn xsd_string() -> &'static str {
        "http://www.w3.org/2001/XMLSchema#string"
    }

    #[test]
    fn test_lookup_does_not_create() {
        let (backend, _caches, store) = store();
        assert_eq!(store.lookup(&Term::literal("x")).unwrap(), None);
        assert_eq!(backend.term_count(), 0);
    }

    #[test]
    fn test_unknown_term() {
        let (_backend, _caches, store) = store();
        assert!(matches!(
            store.resolve(TermId::new(99)),
            Err(StoreError::UnknownTerm(_))
        ));
    }

    #[test]
    fn test_namespace_rebinding() {
        let (_backend, _caches, store) = store();
        store
            .set_namespace(Namespace::new("ex", "http://example.org/").unwrap())
            .unwrap();
        assert!(store.namespace_by_uri("http://example.org/").unwrap().is_some());

        store
            .set_namespace(Namespace::new("ex", "http://example.com/").unwrap())
            .unwrap();
        assert_eq!(
            store.namespace_by_prefix("ex").unwrap().unwrap().uri(),
            "http://example.com/"
        );
        assert!(store.namespace_by_uri("http://example.org/").unwrap().is_none());

        assert!(store.remove_namespace("ex").unwrap());
        assert!(!store.remove_namespace("ex").unwrap());
        assert!(store.namespace_by_prefix("ex").unwrap().is_none());
        assert!(store.namespaces().unwrap().is_empty());
    }
}

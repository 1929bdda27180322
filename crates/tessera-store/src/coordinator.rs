//! Transaction coordinator
//!
//! Owns the committed [`TripleTable`], the term store and the listener list,
//! and runs the commit protocol:
//!
//! 1. freeze the buffered changes into an immutable [`TransactionData`]
//! 2. intern every term, then write the delta inside a backing-store transaction
//! 3. invalidate the affected triple and registry cache entries
//! 4. `before_commit` on every listener in registration order; the first
//!    error vetoes the commit and rolls back the store; the transaction then
//!    moves to RollingBack and sends `rollback` to all listeners
//! 5. finalize the store commit, then apply the delta to the table and drop
//!    the touched cache entries again under one write lock
//! 6. `after_commit` on every listener; errors are logged and never undo
//!    the commit

use crate::backend::{BackingStore, StoreConnection, StoredKey, StoredTriple};
use crate::error::{StoreError, TransactionError};
use crate::table::TripleTable;
use crate::term_store::TermStore;
use crate::transaction::{Transaction, TransactionKind};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_cache::CacheManager;
use tessera_model::{
    Term, TransactionData, TransactionListener, Triple, TripleId, TripleKey, TriplePattern,
};

/// Handle returned by [`TransactionCoordinator::register_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Commit protocol counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Transactions committed
    pub commits: u64,
    /// Transactions rolled back, for any reason
    pub rollbacks: u64,
    /// Commits vetoed by a listener
    pub vetoes: u64,
    /// Commits aborted by a backing-store failure
    pub store_failures: u64,
    /// `after_commit` callbacks that returned an error
    pub after_commit_failures: u64,
}

#[derive(Default)]
struct CommitCounters {
    commits: AtomicU64,
    rollbacks: AtomicU64,
    vetoes: AtomicU64,
    store_failures: AtomicU64,
    after_commit_failures: AtomicU64,
}

impl CommitCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CommitStats {
        CommitStats {
            commits: self.commits.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            vetoes: self.vetoes.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            after_commit_failures: self.after_commit_failures.load(Ordering::Relaxed),
        }
    }
}

type ListenerList = Vec<(ListenerId, Arc<dyn TransactionListener>)>;

/// Registry key of a triple in the registry cache
fn fingerprint(key: &TripleKey) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

pub(crate) struct CoordinatorInner {
    backend: Arc<dyn BackingStore>,
    terms: TermStore,
    caches: Arc<CacheManager>,
    reader: Mutex<Box<dyn StoreConnection>>,
    pub(crate) table: RwLock<TripleTable>,
    listeners: RwLock<ListenerList>,
    next_listener: AtomicU64,
    counters: CommitCounters,
}

impl CoordinatorInner {
    pub(crate) fn commit(&self, data: &TransactionData) -> Result<(), TransactionError> {
        let listeners = self.listeners.read().clone();

        let (mut conn, touched) = match self.persist(data) {
            Ok(persisted) => persisted,
            Err(e) => {
                tracing::error!("Failed to persist transaction {}: {}", data.id(), e);
                CommitCounters::bump(&self.counters.store_failures);
                self.abort(None, data);
                return Err(e.into());
            }
        };

        self.invalidate(data, &touched);

        for (_, listener) in &listeners {
            if let Err(source) = listener.before_commit(data) {
                let name = listener.name().to_string();
                tracing::warn!("Listener '{}' vetoed transaction {}: {}", name, data.id(), source);
                CommitCounters::bump(&self.counters.vetoes);
                self.abort(Some(conn), data);
                return Err(TransactionError::Vetoed { listener: name, source });
            }
        }

        if let Err(e) = conn.commit() {
            tracing::error!("Failed to finalize transaction {}: {}", data.id(), e);
            CommitCounters::bump(&self.counters.store_failures);
            self.abort(Some(conn), data);
            return Err(e.into());
        }
        {
            // readers fill the caches under the table read lock, so anything
            // they loaded before the store commit is dropped here
            let mut table = self.table.write();
            table.apply(data);
            self.invalidate(data, &touched);
        }
        CommitCounters::bump(&self.counters.commits);
        tracing::debug!(
            "Committed transaction {} (+{} -{})",
            data.id(),
            data.added().len(),
            data.removed().len()
        );

        for (_, listener) in &listeners {
            if let Err(e) = listener.after_commit(data) {
                CommitCounters::bump(&self.counters.after_commit_failures);
                tracing::error!(
                    "Listener '{}' failed after commit of transaction {}: {}",
                    listener.name(),
                    data.id(),
                    e
                );
            }
        }
        Ok(())
    }

    /// Write the delta inside an open store transaction
    ///
    /// Returns the connection, still in its transaction, and the ids of every
    /// stored triple the delta touched.
    fn persist(
        &self,
        data: &TransactionData,
    ) -> Result<(Box<dyn StoreConnection>, Vec<TripleId>), StoreError> {
        // terms are interned before the store transaction starts
        let added = data
            .added()
            .iter()
            .map(|t| {
                Ok(StoredTriple {
                    key: self.intern_key(t.key())?,
                    inferred: t.is_inferred(),
                    created_at: t.created_at(),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        let removed = data
            .removed()
            .iter()
            .map(|t| Ok(self.lookup_key(t.key())?.map(|key| (key, t.is_inferred()))))
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut conn = self.backend.connect()?;
        conn.begin()?;
        let mut write = || -> Result<Vec<TripleId>, StoreError> {
            let mut touched = Vec::with_capacity(added.len() + removed.len());
            for (key, inferred) in removed.iter().flatten() {
                touched.extend(conn.remove_triple(key, *inferred)?);
            }
            for triple in &added {
                touched.push(conn.add_triple(triple)?);
            }
            Ok(touched)
        };
        match write() {
            Ok(touched) => Ok((conn, touched)),
            Err(e) => {
                if let Err(rollback) = conn.rollback() {
                    tracing::warn!("Store rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    fn invalidate(&self, data: &TransactionData, touched: &[TripleId]) {
        let registry = self.caches.registry_cache();
        for triple in data.added().iter().chain(data.removed()) {
            registry.remove(&fingerprint(triple.key()));
        }
        let triples = self.caches.triple_cache();
        for id in touched {
            triples.remove(id);
        }
    }

    /// Undo the store side of a failed commit
    ///
    /// Listeners are told by the transaction through [`Self::notify_rollback`].
    fn abort(&self, conn: Option<Box<dyn StoreConnection>>, data: &TransactionData) {
        if let Some(mut conn) = conn {
            if let Err(e) = conn.rollback() {
                tracing::warn!("Store rollback of transaction {} failed: {}", data.id(), e);
            }
        }
    }

    pub(crate) fn notify_rollback(&self, data: &TransactionData) {
        let listeners = self.listeners.read().clone();
        Self::send_rollback(&listeners, data);
        CommitCounters::bump(&self.counters.rollbacks);
    }

    fn send_rollback(listeners: &ListenerList, data: &TransactionData) {
        for (_, listener) in listeners {
            listener.rollback(data);
        }
    }

    fn intern_key(&self, key: &TripleKey) -> Result<StoredKey, StoreError> {
        Ok(StoredKey {
            subject: self.terms.intern(&key.subject)?,
            predicate: self.terms.intern(&key.predicate)?,
            object: self.terms.intern(&key.object)?,
            context: key.context.as_ref().map(|c| self.terms.intern(c)).transpose()?,
        })
    }

    /// Stored form of a key whose terms are all known, `None` otherwise
    fn lookup_key(&self, key: &TripleKey) -> Result<Option<StoredKey>, StoreError> {
        let (Some(subject), Some(predicate), Some(object)) = (
            self.terms.lookup(&key.subject)?,
            self.terms.lookup(&key.predicate)?,
            self.terms.lookup(&key.object)?,
        ) else {
            return Ok(None);
        };
        let context = match &key.context {
            Some(c) => match self.terms.lookup(c)? {
                Some(id) => Some(id),
                None => return Ok(None),
            },
            None => None,
        };
        Ok(Some(StoredKey {
            subject,
            predicate,
            object,
            context,
        }))
    }

    fn hydrate(&self, stored: &StoredTriple) -> Result<Triple, StoreError> {
        let key = &stored.key;
        let context = key.context.map(|c| self.terms.resolve(c)).transpose()?;
        let triple = Triple::new(
            self.terms.resolve(key.subject)?,
            self.terms.resolve(key.predicate)?,
            self.terms.resolve(key.object)?,
            context,
        )
        .map_err(StoreError::InvalidData)?;
        Ok(triple
            .with_inferred(stored.inferred)
            .with_created_at(stored.created_at))
    }
}

/// Entry point for transactions and committed reads
///
/// Cheap to clone; clones share the same table, caches and listeners.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tessera_cache::{CacheConfig, CacheManager};
/// use tessera_model::{Term, Triple};
/// use tessera_store::{MemoryBackend, TransactionCoordinator};
///
/// let caches = Arc::new(CacheManager::new(CacheConfig::default()).unwrap());
/// let coordinator = TransactionCoordinator::open(Arc::new(MemoryBackend::new()), caches).unwrap();
///
/// let mut tx = coordinator.begin();
/// tx.add_statement(Triple::new(
///     Term::uri("http://example.org/alice"),
///     Term::uri("http://xmlns.com/foaf/0.1/name"),
///     Term::literal("Alice"),
///     None,
/// ).unwrap()).unwrap();
/// tx.commit().unwrap();
///
/// assert_eq!(coordinator.len(), 1);
/// ```
#[derive(Clone)]
pub struct TransactionCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl TransactionCoordinator {
    /// Open a coordinator and load the committed triples from `backend`
    pub fn open(backend: Arc<dyn BackingStore>, caches: Arc<CacheManager>) -> Result<Self, StoreError> {
        let terms = TermStore::new(backend.as_ref(), caches.clone())?;
        let mut reader = backend.connect()?;
        let stored = reader.load_triples()?;

        let inner = CoordinatorInner {
            backend,
            terms,
            caches,
            reader: Mutex::new(reader),
            table: RwLock::new(TripleTable::new()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            counters: CommitCounters::default(),
        };
        {
            let mut table = inner.table.write();
            for (_, triple) in &stored {
                table.add(inner.hydrate(triple)?);
            }
        }
        tracing::info!(
            "Transaction coordinator opened on {} store with {} triples",
            inner.backend.name(),
            stored.len()
        );
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// A new transaction in the Idle state
    pub fn create_transaction(&self) -> Transaction {
        Transaction::new(self.inner.clone(), TransactionKind::Application)
    }

    /// A new transaction, already Active
    pub fn begin(&self) -> Transaction {
        Transaction::started(self.inner.clone(), TransactionKind::Application)
    }

    /// A new Active transaction allowed to assert and retract inferred triples
    ///
    /// Reserved for the reasoning engine.
    pub fn begin_inference(&self) -> Transaction {
        Transaction::started(self.inner.clone(), TransactionKind::Inference)
    }

    /// Add a listener to the end of the notification order
    pub fn register_listener(&self, listener: Arc<dyn TransactionListener>) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        tracing::debug!("Registered {} ({})", id, listener.name());
        self.inner.listeners.write().push((id, listener));
        id
    }

    /// Remove a listener, returning whether it was registered
    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Committed triples matching the bound positions
    pub fn list_triples(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
        context: Option<&Term>,
        include_inferred: bool,
    ) -> Vec<Triple> {
        self.inner
            .table
            .read()
            .list_triples(subject, predicate, object, context, include_inferred)
    }

    /// Committed triples matching `pattern`
    pub fn find(&self, pattern: &TriplePattern) -> Vec<Triple> {
        self.inner.table.read().find(pattern)
    }

    /// Whether a triple with the same key is committed
    pub fn contains(&self, triple: &Triple) -> bool {
        self.inner.table.read().contains(triple)
    }

    /// Whether the statement is committed in any context
    pub fn contains_statement(&self, subject: &Term, predicate: &Term, object: &Term) -> bool {
        self.inner
            .table
            .read()
            .contains_statement(subject, predicate, object)
    }

    /// Independent copy of the committed table
    pub fn snapshot(&self) -> TripleTable {
        self.inner.table.read().clone()
    }

    /// Number of committed triples
    pub fn len(&self) -> usize {
        self.inner.table.read().len()
    }

    /// Whether nothing is committed
    pub fn is_empty(&self) -> bool {
        self.inner.table.read().is_empty()
    }

    /// Store id of a committed triple
    ///
    /// Answered from the registry cache when possible.
    pub fn triple_id(&self, triple: &Triple) -> Result<Option<TripleId>, StoreError> {
        let fp = fingerprint(triple.key());
        let registry = self.inner.caches.registry_cache();
        if let Some(raw) = registry.get(&fp) {
            let id = TripleId::new(raw);
            if self.triple(id)?.is_some_and(|t| t.key() == triple.key()) {
                return Ok(Some(id));
            }
            registry.remove(&fp);
        }

        let _table = self.inner.table.read();
        let Some(key) = self.inner.lookup_key(triple.key())? else {
            return Ok(None);
        };
        let id = self.inner.reader.lock().find_triple(&key)?;
        if let Some(id) = id {
            registry.put(&fp, id.value());
        }
        Ok(id)
    }

    /// Committed triple with the given store id
    pub fn triple(&self, id: TripleId) -> Result<Option<Triple>, StoreError> {
        let cache = self.inner.caches.triple_cache();
        if let Some(triple) = cache.get(&id) {
            return Ok(Some(triple));
        }
        // held until the cache is filled; a commit invalidates under the write lock
        let _table = self.inner.table.read();
        let stored = self.inner.reader.lock().load_triple(id)?;
        let Some(stored) = stored else {
            return Ok(None);
        };
        let triple = self.inner.hydrate(&stored)?;
        cache.put(&id, triple.clone());
        Ok(Some(triple))
    }

    /// Term interning and namespaces
    pub fn terms(&self) -> &TermStore {
        &self.inner.terms
    }

    /// The cache manager
    pub fn caches(&self) -> &Arc<CacheManager> {
        &self.inner.caches
    }

    /// Commit protocol counters
    pub fn stats(&self) -> CommitStats {
        self.inner.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::TransactionError;
    use crate::transaction::TransactionState;
    use tessera_cache::CacheConfig;
    use tessera_model::ListenerError;

    fn uri(s: &str) -> Term {
        Term::uri(&format!("http://example.org/{}", s))
    }

    fn triple(s: &str, o: &str) -> Triple {
        Triple::new(uri(s), uri("p"), uri(o), None).unwrap()
    }

    fn coordinator() -> TransactionCoordinator {
        let caches = Arc::new(CacheManager::new(CacheConfig::local(128)).unwrap());
        TransactionCoordinator::open(Arc::new(MemoryBackend::new()), caches).unwrap()
    }

    #[test]
    fn test_state_machine() {
        let coordinator = coordinator();
        let mut tx = coordinator.create_transaction();
        assert_eq!(tx.state(), TransactionState::Idle);

        let err = tx.add_statement(triple("a", "b")).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::InvalidState { expected: TransactionState::Active, actual: TransactionState::Idle }
        ));

        tx.begin().unwrap();
        assert!(tx.begin().is_err());
        tx.add_statement(triple("a", "b")).unwrap();
        tx.commit().unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);

        assert!(tx.commit().is_err());
        assert!(tx.rollback().is_err());
        assert!(tx.add_statement(triple("a", "c")).is_err());
    }

    #[test]
    fn test_changes_invisible_until_commit() {
        let coordinator = coordinator();
        let mut tx = coordinator.begin();
        tx.add_statement(triple("a", "b")).unwrap();
        assert!(coordinator.is_empty());

        tx.commit().unwrap();
        assert!(coordinator.contains(&triple("a", "b")));
    }

    #[test]
    fn test_last_operation_wins() {
        let coordinator = coordinator();
        let mut tx = coordinator.begin();
        tx.add_statement(triple("a", "b")).unwrap();
        tx.remove_statement(triple("a", "b")).unwrap();
        tx.add_statement(triple("a", "c")).unwrap();
        let data = tx.commit().unwrap();

        assert_eq!(data.added().len(), 1);
        assert!(data.removed().is_empty());
        assert!(!coordinator.contains(&triple("a", "b")));
    }

    #[test]
    fn test_delta_is_net_of_committed_state() {
        let coordinator = coordinator();
        let mut tx = coordinator.begin();
        tx.add_statement(triple("a", "b")).unwrap();
        tx.commit().unwrap();

        let mut tx = coordinator.begin();
        tx.add_statement(triple("a", "b")).unwrap();
        tx.remove_statement(triple("x", "y")).unwrap();
        let data = tx.commit().unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_inferred_triples_need_inference_transaction() {
        let coordinator = coordinator();
        let inferred = Triple::new_inferred(uri("a"), uri("p"), uri("b"), Some(uri("inf"))).unwrap();

        let mut tx = coordinator.begin();
        assert!(matches!(
            tx.add_statement(inferred.clone()),
            Err(TransactionError::InferredAssertion(_))
        ));
        tx.rollback().unwrap();

        let mut tx = coordinator.begin_inference();
        assert!(tx.is_inference());
        tx.add_statement(inferred.clone()).unwrap();
        tx.commit().unwrap();
        assert_eq!(coordinator.list_triples(None, None, None, None, false).len(), 0);
        assert_eq!(coordinator.list_triples(None, None, None, None, true).len(), 1);
    }

    #[test]
    fn test_clear_context() {
        let coordinator = coordinator();
        let g = uri("g");
        let mut tx = coordinator.begin();
        tx.add_statement(Triple::new(uri("a"), uri("p"), uri("b"), Some(g.clone())).unwrap()).unwrap();
        tx.add_statement(Triple::new(uri("a"), uri("p"), uri("c"), Some(g.clone())).unwrap()).unwrap();
        tx.add_statement(triple("a", "d")).unwrap();
        tx.commit().unwrap();

        let mut tx = coordinator.begin();
        tx.add_statement(Triple::new(uri("x"), uri("p"), uri("y"), Some(g.clone())).unwrap()).unwrap();
        assert_eq!(tx.clear_context(&g).unwrap(), 3);
        let data = tx.commit().unwrap();

        assert_eq!(data.removed().len(), 2);
        assert!(data.added().is_empty());
        assert_eq!(coordinator.len(), 1);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let coordinator = coordinator();
        {
            let mut tx = coordinator.begin();
            tx.add_statement(triple("a", "b")).unwrap();
        }
        assert!(coordinator.is_empty());
        assert_eq!(coordinator.stats().rollbacks, 1);
    }

    #[test]
    fn test_triple_id_and_lookup() {
        let coordinator = coordinator();
        let t = triple("a", "b");
        assert_eq!(coordinator.triple_id(&t).unwrap(), None);

        let mut tx = coordinator.begin();
        tx.add_statement(t.clone()).unwrap();
        tx.commit().unwrap();

        let id = coordinator.triple_id(&t).unwrap().unwrap();
        assert_eq!(coordinator.triple_id(&t).unwrap(), Some(id));
        assert_eq!(coordinator.triple(id).unwrap(), Some(t.clone()));

        let mut tx = coordinator.begin();
        tx.remove_statement(t.clone()).unwrap();
        tx.commit().unwrap();
        assert_eq!(coordinator.triple_id(&t).unwrap(), None);
        assert_eq!(coordinator.triple(id).unwrap(), None);
    }

    struct Veto;

    impl TransactionListener for Veto {
        fn before_commit(&self, _data: &TransactionData) -> Result<(), ListenerError> {
            Err("not today".into())
        }

        fn after_commit(&self, _data: &TransactionData) -> Result<(), ListenerError> {
            Ok(())
        }

        fn rollback(&self, _data: &TransactionData) {}

        fn name(&self) -> &str {
            "veto"
        }
    }

    #[test]
    fn test_unregister_listener() {
        let coordinator = coordinator();
        let id = coordinator.register_listener(Arc::new(Veto));

        let mut tx = coordinator.begin();
        tx.add_statement(triple("a", "b")).unwrap();
        let err = tx.commit().unwrap_err();
        assert!(matches!(err, TransactionError::Vetoed { ref listener, .. } if listener == "veto"));
        assert_eq!(tx.state(), TransactionState::RolledBack);

        assert!(coordinator.unregister_listener(id));
        assert!(!coordinator.unregister_listener(id));

        let mut tx = coordinator.begin();
        tx.add_statement(triple("a", "b")).unwrap();
        tx.commit().unwrap();
        assert_eq!(coordinator.stats().vetoes, 1);
        assert_eq!(coordinator.stats().commits, 1);
    }
}

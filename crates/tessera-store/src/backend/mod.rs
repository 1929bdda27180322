//! Durable backing stores
//!
//! The kernel talks to durable storage only through [`BackingStore`] and the
//! [`StoreConnection`]s it opens. Triples cross this boundary as interned ids
//! ([`StoredTriple`]); terms are interned once and resolved back on demand.
//!
//! Operations issued outside `begin`/`commit` take effect immediately.
//! Inside a transaction, triple writes become visible only at `commit`.

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use crate::error::StoreError;
use tessera_model::{Namespace, Term, TermId, TripleId};

/// A triple expressed in interned term ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoredKey {
    /// Subject id
    pub subject: TermId,
    /// Predicate id
    pub predicate: TermId,
    /// Object id
    pub object: TermId,
    /// Context id, `None` for the default context
    pub context: Option<TermId>,
}

/// A persisted triple with its metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredTriple {
    /// Identifying term ids
    pub key: StoredKey,
    /// Whether the reasoner derived it
    pub inferred: bool,
    /// Creation time in milliseconds since the Unix epoch
    pub created_at: u64,
}

/// Factory of connections to one durable store
pub trait BackingStore: Send + Sync {
    /// Open a new connection
    fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// One connection to a backing store
pub trait StoreConnection: Send {
    /// Start a transaction
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Make the transaction's writes durable
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard the transaction's writes
    fn rollback(&mut self) -> Result<(), StoreError>;

    /// Id of `term`, creating it if needed
    fn intern_term(&mut self, term: &Term) -> Result<TermId, StoreError>;

    /// Id of `term` if it was interned before
    fn lookup_term(&mut self, term: &Term) -> Result<Option<TermId>, StoreError>;

    /// Term with the given id
    fn load_term(&mut self, id: TermId) -> Result<Option<Term>, StoreError>;

    /// Insert a triple, or update the inferred flag of an existing one
    fn add_triple(&mut self, triple: &StoredTriple) -> Result<TripleId, StoreError>;

    /// Delete the triple at `key` if its inferred flag equals `inferred`
    ///
    /// Returns the id of the deleted triple. A triple whose flag differs is
    /// left in place.
    fn remove_triple(&mut self, key: &StoredKey, inferred: bool) -> Result<Option<TripleId>, StoreError>;

    /// Id of a committed triple
    fn find_triple(&mut self, key: &StoredKey) -> Result<Option<TripleId>, StoreError>;

    /// Committed triple with the given id
    fn load_triple(&mut self, id: TripleId) -> Result<Option<StoredTriple>, StoreError>;

    /// Every committed triple
    fn load_triples(&mut self) -> Result<Vec<(TripleId, StoredTriple)>, StoreError>;

    /// Insert or replace the namespace bound to its prefix
    fn put_namespace(&mut self, namespace: &Namespace) -> Result<(), StoreError>;

    /// Namespace bound to `prefix`
    fn load_namespace(&mut self, prefix: &str) -> Result<Option<Namespace>, StoreError>;

    /// Namespace with the given URI
    fn load_namespace_by_uri(&mut self, uri: &str) -> Result<Option<Namespace>, StoreError>;

    /// Delete the namespace bound to `prefix`, returning it
    fn remove_namespace(&mut self, prefix: &str) -> Result<Option<Namespace>, StoreError>;

    /// Every namespace, ordered by prefix
    fn load_namespaces(&mut self) -> Result<Vec<Namespace>, StoreError>;
}

//! Tessera Store
//!
//! Transactional triple storage: the in-memory triple table, term interning
//! and the commit protocol, over a pluggable durable backing store.
//!
//! # Architecture
//!
//! - [`TripleTable`]: indexed set of committed triples answering pattern queries
//! - [`TermStore`]: term ↔ id interning and namespace records, read through the caches
//! - [`TransactionCoordinator`]: hands out [`Transaction`]s and runs the commit
//!   protocol with its [`TransactionListener`](tessera_model::TransactionListener)s
//! - [`BackingStore`]: durable storage; [`MemoryBackend`] and [`SqliteBackend`]
//!   are provided
//!
//! # Consistency
//!
//! Readers see only committed data. A commit either becomes fully visible in
//! the table and durable in the backing store, or leaves both unchanged.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use tessera_cache::{CacheConfig, CacheManager};
//! use tessera_model::{Term, Triple};
//! use tessera_store::{MemoryBackend, TransactionCoordinator};
//!
//! let caches = Arc::new(CacheManager::new(CacheConfig::local(1000)).unwrap());
//! let coordinator = TransactionCoordinator::open(Arc::new(MemoryBackend::new()), caches).unwrap();
//!
//! let alice = Term::uri("http://example.org/alice");
//! let knows = Term::uri("http://xmlns.com/foaf/0.1/knows");
//! let bob = Term::uri("http://example.org/bob");
//!
//! let mut tx = coordinator.begin();
//! tx.add_statement(Triple::new(alice.clone(), knows.clone(), bob, None).unwrap()).unwrap();
//! tx.commit().unwrap();
//!
//! let known = coordinator.list_triples(Some(&alice), Some(&knows), None, None, true);
//! assert_eq!(known.len(), 1);
//! ```

#![warn(missing_docs)]

mod backend;
mod coordinator;
mod error;
mod table;
mod term_store;
mod transaction;

pub use backend::{
    BackingStore, MemoryBackend, SqliteBackend, StoreConnection, StoredKey, StoredTriple,
};
pub use coordinator::{CommitStats, ListenerId, TransactionCoordinator};
pub use error::{StoreError, TransactionError};
pub use table::TripleTable;
pub use term_store::TermStore;
pub use transaction::{Transaction, TransactionState, TransactionStatus};

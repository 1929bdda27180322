//! Tessera Reasoner
//!
//! Forward-chaining rule engine that keeps the inferred triples of a
//! [`TransactionCoordinator`](tessera_store::TransactionCoordinator) up to date.
//!
//! # Architecture
//!
//! - [`parse_program`] / [`parse_rule`]: rule text to [`Program`](tessera_model::Program)s
//! - [`ReasoningEngine`]: semi-naive evaluation to fixpoint, retraction, and
//!   commit of the net change as one inference transaction
//! - [`ReasonerWorker`]: tokio task running the engine off the commit path;
//!   its [`ReasonerHandle`] is the transaction listener
//!
//! # Rule text
//!
//! ```text
//! @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
//! # class hierarchy
//! transitivity: (?x rdfs:subClassOf ?y), (?y rdfs:subClassOf ?z) -> (?x rdfs:subClassOf ?z) .
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use tessera_cache::{CacheConfig, CacheManager};
//! use tessera_model::{vocabulary::rdfs, Term, Triple};
//! use tessera_reasoner::{parse_program, Delta, ReasonerConfig, ReasoningEngine};
//! use tessera_store::{MemoryBackend, TransactionCoordinator};
//!
//! let caches = Arc::new(CacheManager::new(CacheConfig::local(1000)).unwrap());
//! let coordinator = TransactionCoordinator::open(Arc::new(MemoryBackend::new()), caches).unwrap();
//! let engine = ReasoningEngine::new(coordinator.clone(), ReasonerConfig::default()).unwrap();
//!
//! let program = parse_program(
//!     "classes",
//!     "transitivity: (?x rdfs:subClassOf ?y), (?y rdfs:subClassOf ?z) -> (?x rdfs:subClassOf ?z) .",
//! )
//! .unwrap();
//! engine.add_program(program).unwrap();
//!
//! let sub = Term::uri(rdfs::SUB_CLASS_OF);
//! let cat = Term::uri("http://example.org/Cat");
//! let mammal = Term::uri("http://example.org/Mammal");
//! let animal = Term::uri("http://example.org/Animal");
//!
//! let mut tx = coordinator.begin();
//! tx.add_statement(Triple::new(cat.clone(), sub.clone(), mammal.clone(), None).unwrap()).unwrap();
//! tx.add_statement(Triple::new(mammal, sub.clone(), animal.clone(), None).unwrap()).unwrap();
//! let data = tx.commit().unwrap();
//!
//! engine.reason(&Delta::from_transaction(&data)).unwrap();
//! assert!(coordinator.contains_statement(&cat, &sub, &animal));
//! ```

#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod evaluation;
mod metrics;
mod parser;
mod worker;

pub use config::{ReasonerConfig, RetractionStrategy};
pub use engine::{Delta, ReasonRequest, ReasoningEngine};
pub use error::{ParseError, ReasonerError};
pub use metrics::{ReasonerMetrics, ReasoningReport};
pub use parser::{parse_program, parse_rule};
pub use worker::{ReasonerHandle, ReasonerWorker};

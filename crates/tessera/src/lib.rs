//! Tessera
//!
//! Transactional graph-storage kernel: an indexed triple table over a durable
//! backing store, a configurable cache layer, a commit protocol with
//! listeners, and an incremental rule reasoner that materializes inferred
//! triples after every commit.
//!
//! This crate wires the layers together from one [`KernelConfig`]. The
//! layers are re-exported for direct use:
//!
//! - [`model`]: terms, triples, rules and the listener trait
//! - [`cache`]: the cache manager and its backends
//! - [`store`]: backing stores, the triple table and the coordinator
//! - [`reasoner`]: the rule parser, engine and worker
//!
//! # Usage
//!
//! ```
//! use tessera::{Kernel, KernelConfig};
//! use tessera::model::{vocabulary::rdfs, Term, Triple};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kernel = Kernel::open(KernelConfig::in_memory())?;
//!     kernel.load_program(
//!         "classes",
//!         "(?x rdfs:subClassOf ?y), (?y rdfs:subClassOf ?z) -> (?x rdfs:subClassOf ?z) .",
//!     )?;
//!
//!     let sub = Term::uri(rdfs::SUB_CLASS_OF);
//!     let cat = Term::uri("http://example.org/Cat");
//!     let mammal = Term::uri("http://example.org/Mammal");
//!     let animal = Term::uri("http://example.org/Animal");
//!
//!     let mut tx = kernel.begin();
//!     tx.add_statement(Triple::new(cat.clone(), sub.clone(), mammal.clone(), None)?)?;
//!     tx.add_statement(Triple::new(mammal, sub.clone(), animal.clone(), None)?)?;
//!     tx.commit()?;
//!
//!     // reasoning runs in the background
//!     kernel.wait_until_idle().await;
//!     assert!(kernel.coordinator().contains_statement(&cat, &sub, &animal));
//!
//!     kernel.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod kernel;

pub use config::{KernelConfig, StorageConfig};
pub use error::KernelError;
pub use kernel::Kernel;

pub use tessera_cache as cache;
pub use tessera_model as model;
pub use tessera_reasoner as reasoner;
pub use tessera_store as store;

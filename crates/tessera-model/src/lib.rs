//! Tessera Model Layer
//!
//! This crate contains the data model of the Tessera graph-storage kernel.
//! It depends on nothing but `uuid` and defines the value objects and the
//! extension trait that every other layer builds upon.
//!
//! ## Key Concepts
//!
//! - **Term**: an RDF value (URI, blank node or literal), content-addressed
//! - **Triple**: a (subject, predicate, object, context) statement, explicit or inferred
//! - **TransactionData**: the immutable added/removed delta of one committed transaction
//! - **Rule / Program**: Horn clauses over triple patterns, evaluated by the reasoner
//! - **Namespace**: a prefix binding used to abbreviate URIs
//!
//! ## Architecture
//!
//! - No storage, caching or logging concerns live here
//! - Infrastructure implementations live in `tessera-cache`, `tessera-store`
//!   and `tessera-reasoner`
//! - [`traits::TransactionListener`] is the only extension point of the kernel

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod namespace;
pub mod rule;
pub mod term;
pub mod traits;
pub mod transaction;
pub mod triple;
pub mod vocabulary;

// Re-exports for convenience
pub use namespace::Namespace;
pub use rule::{Field, Pattern, Program, Rule, RuleError, Variable};
pub use term::{Literal, Node, Term, TermId, TermKind};
pub use traits::{ListenerError, TransactionListener};
pub use transaction::{TransactionData, TransactionId};
pub use triple::{Triple, TripleId, TripleKey, TriplePattern};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in milliseconds since the Unix epoch
///
/// Used for the creation metadata of triples, namespaces and transactions.
pub fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

//! Error types for storage and transactions

use crate::transaction::TransactionState;
use tessera_model::{ListenerError, TermId};
use thiserror::Error;

/// Errors raised by the backing store
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Other backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Stored data could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A term id with no stored term
    #[error("Unknown term: {0}")]
    UnknownTerm(TermId),
}

/// Errors raised by the transaction protocol
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Operation not allowed in the current state
    #[error("Invalid transaction state: expected {expected}, found {actual}")]
    InvalidState {
        /// State the operation requires
        expected: TransactionState,
        /// State the transaction is in
        actual: TransactionState,
    },

    /// Application transactions cannot assert or retract inferred triples
    #[error("Inferred triples are managed by the reasoning engine: {0}")]
    InferredAssertion(String),

    /// A listener rejected the commit in `before_commit`
    #[error("Commit vetoed by listener '{listener}': {source}")]
    Vetoed {
        /// Name of the vetoing listener
        listener: String,
        /// The listener's error
        #[source]
        source: ListenerError,
    },

    /// The backing store failed
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

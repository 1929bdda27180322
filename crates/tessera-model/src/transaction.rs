//! Transaction module - identities and committed deltas

use crate::triple::Triple;
use std::fmt;

/// Unique identifier for a transaction based on UUIDv7
///
/// UUIDv7 gives chronological sortability, so transaction ids order the same
/// way the transactions were started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(u128);

impl TransactionId {
    /// Generate a new UUIDv7-based TransactionId
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera_model::TransactionId;
    ///
    /// let id = TransactionId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a TransactionId from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Get the timestamp component (milliseconds since Unix epoch)
    pub fn timestamp(&self) -> u64 {
        (self.0 >> 80) as u64
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// The immutable delta of one transaction
///
/// Produced once at commit (or rollback) time and handed to every listener by
/// reference. Nothing keeps it after notification; there is no persisted history.
///
/// The delta is *net*: a statement both added and removed within the same
/// transaction appears only in the set of the last operation.
#[derive(Debug, Clone)]
pub struct TransactionData {
    id: TransactionId,
    committed_at: u64,
    added: Vec<Triple>,
    removed: Vec<Triple>,
}

impl TransactionData {
    /// Freeze a delta
    pub fn new(id: TransactionId, added: Vec<Triple>, removed: Vec<Triple>) -> Self {
        Self {
            id,
            committed_at: crate::timestamp_millis(),
            added,
            removed,
        }
    }

    /// Transaction that produced this delta
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// When the delta was frozen (milliseconds since Unix epoch)
    pub fn committed_at(&self) -> u64 {
        self.committed_at
    }

    /// Triples added by the transaction
    pub fn added(&self) -> &[Triple] {
        &self.added
    }

    /// Triples removed by the transaction
    pub fn removed(&self) -> &[Triple] {
        &self.removed
    }

    /// Whether the transaction changed nothing
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Added triples that were asserted rather than inferred
    pub fn explicit_added(&self) -> impl Iterator<Item = &Triple> {
        self.added.iter().filter(|t| !t.is_inferred())
    }

    /// Removed triples that were asserted rather than inferred
    pub fn explicit_removed(&self) -> impl Iterator<Item = &Triple> {
        self.removed.iter().filter(|t| !t.is_inferred())
    }

    /// Whether the delta touches any explicit triple
    ///
    /// Deltas made only of inferred triples come from the reasoner itself.
    pub fn has_explicit_changes(&self) -> bool {
        self.explicit_added().next().is_some() || self.explicit_removed().next().is_some()
    }
}

//! Trait definitions for external interactions
//!
//! The listener trait is the kernel's only extension point: versioning,
//! search indexing, cache invalidation and the reasoner all observe commits
//! through it.

use crate::transaction::TransactionData;

/// Error raised by a listener callback
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Observer of the transaction commit protocol
///
/// All three callbacks are required; listeners that care about a subset
/// implement the rest as no-ops.
///
/// Callbacks run on the committing thread, in registration order.
pub trait TransactionListener: Send + Sync {
    /// Called before the durable commit is finalized
    ///
    /// Returning an error vetoes the commit: the transaction is rolled back and
    /// every listener receives [`TransactionListener::rollback`].
    fn before_commit(&self, data: &TransactionData) -> Result<(), ListenerError>;

    /// Called after the commit is durable
    ///
    /// Errors are logged by the coordinator and never undo the commit.
    fn after_commit(&self, data: &TransactionData) -> Result<(), ListenerError>;

    /// Called when the transaction is rolled back, with whatever delta was buffered
    fn rollback(&self, data: &TransactionData);

    /// Name used in logs and veto errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

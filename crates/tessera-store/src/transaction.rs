//! Transactions - buffered changes and their state machine
//!
//! ```text
//! Idle ──begin──> Active ──commit──> Committing ──> Committed
//!                    │                    │
//!                    └──rollback──> RollingBack <──┘ (veto / store failure)
//!                                         │
//!                                         └──> RolledBack
//! ```

use crate::coordinator::CoordinatorInner;
use crate::error::TransactionError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tessera_model::{Term, TransactionData, TransactionId, Triple, TripleKey};

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Created, not yet begun
    Idle,
    /// Accepting changes
    Active,
    /// Running the commit protocol
    Committing,
    /// Durable and visible
    Committed,
    /// Discarding changes
    RollingBack,
    /// Discarded
    RolledBack,
}

impl TransactionState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::RolledBack)
    }

    /// Get the state name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Idle => "idle",
            TransactionState::Active => "active",
            TransactionState::Committing => "committing",
            TransactionState::Committed => "committed",
            TransactionState::RollingBack => "rolling back",
            TransactionState::RolledBack => "rolled back",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared view of a transaction's state
///
/// Stays readable while the owning transaction is inside `commit` or
/// `rollback`, for example from a listener callback.
#[derive(Debug, Clone)]
pub struct TransactionStatus(Arc<Mutex<TransactionState>>);

impl TransactionStatus {
    fn new(state: TransactionState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Current state
    pub fn get(&self) -> TransactionState {
        *self.0.lock()
    }

    fn set(&self, state: TransactionState) {
        *self.0.lock() = state;
    }
}

/// Who opened the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransactionKind {
    /// Application code: explicit triples only
    Application,
    /// The reasoning engine: may assert and retract inferred triples
    Inference,
}

/// A buffered change, last operation per key wins
#[derive(Debug, Clone)]
pub(crate) enum PendingOp {
    Add(Triple),
    Remove(Triple),
}

/// A unit of change against the triple store
///
/// Changes are buffered until [`Transaction::commit`]; nothing is visible to
/// other readers before then. A transaction dropped while active is rolled
/// back. Transactions are `Send`, so independent transactions can run on
/// separate threads.
pub struct Transaction {
    id: TransactionId,
    kind: TransactionKind,
    state: TransactionStatus,
    ops: BTreeMap<TripleKey, PendingOp>,
    coordinator: Arc<CoordinatorInner>,
}

impl Transaction {
    pub(crate) fn new(coordinator: Arc<CoordinatorInner>, kind: TransactionKind) -> Self {
        Self {
            id: TransactionId::new(),
            kind,
            state: TransactionStatus::new(TransactionState::Idle),
            ops: BTreeMap::new(),
            coordinator,
        }
    }

    pub(crate) fn started(coordinator: Arc<CoordinatorInner>, kind: TransactionKind) -> Self {
        let tx = Self::new(coordinator, kind);
        tx.state.set(TransactionState::Active);
        tx
    }

    /// Transaction identifier
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Current state
    pub fn state(&self) -> TransactionState {
        self.state.get()
    }

    /// Handle that keeps reporting the state of this transaction
    pub fn status(&self) -> TransactionStatus {
        self.state.clone()
    }

    /// Whether this transaction belongs to the reasoning engine
    pub fn is_inference(&self) -> bool {
        self.kind == TransactionKind::Inference
    }

    /// Number of buffered changes
    pub fn pending(&self) -> usize {
        self.ops.len()
    }

    fn expect_state(&self, expected: TransactionState) -> Result<(), TransactionError> {
        let actual = self.state.get();
        if actual != expected {
            return Err(TransactionError::InvalidState { expected, actual });
        }
        Ok(())
    }

    fn check_origin(&self, triple: &Triple) -> Result<(), TransactionError> {
        if triple.is_inferred() && self.kind == TransactionKind::Application {
            return Err(TransactionError::InferredAssertion(triple.to_string()));
        }
        Ok(())
    }

    /// Move from Idle to Active
    pub fn begin(&mut self) -> Result<(), TransactionError> {
        self.expect_state(TransactionState::Idle)?;
        self.state.set(TransactionState::Active);
        tracing::trace!("Transaction {} begun", self.id);
        Ok(())
    }

    /// Buffer the addition of a triple
    pub fn add_statement(&mut self, triple: Triple) -> Result<(), TransactionError> {
        self.expect_state(TransactionState::Active)?;
        self.check_origin(&triple)?;
        self.ops.insert(triple.key().clone(), PendingOp::Add(triple));
        Ok(())
    }

    /// Buffer the removal of a triple
    pub fn remove_statement(&mut self, triple: Triple) -> Result<(), TransactionError> {
        self.expect_state(TransactionState::Active)?;
        self.check_origin(&triple)?;
        self.ops.insert(triple.key().clone(), PendingOp::Remove(triple));
        Ok(())
    }

    /// Remove every triple of `context`, explicit and inferred
    ///
    /// Covers the triples committed when this is called plus any additions
    /// buffered in this transaction. Returns the number of triples affected.
    pub fn clear_context(&mut self, context: &Term) -> Result<usize, TransactionError> {
        self.expect_state(TransactionState::Active)?;

        let mut affected = 0;
        self.ops.retain(|key, op| {
            let buffered_add = matches!(op, PendingOp::Add(_)) && key.context.as_ref() == Some(context);
            if buffered_add {
                affected += 1;
            }
            !buffered_add
        });

        let committed = self
            .coordinator
            .table
            .read()
            .list_triples(None, None, None, Some(context), true);
        for triple in committed {
            affected += 1;
            self.ops.insert(triple.key().clone(), PendingOp::Remove(triple));
        }
        Ok(affected)
    }

    /// Turn the buffer into a net delta against the committed table
    ///
    /// Additions already present and removals of absent triples are dropped.
    /// An explicit addition over a stored inferred triple is kept.
    fn freeze(&mut self) -> TransactionData {
        let ops = std::mem::take(&mut self.ops);
        let table = self.coordinator.table.read();
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for (key, op) in ops {
            let stored = table.get(&key);
            match op {
                PendingOp::Add(triple) => {
                    // an inferred copy never replaces an explicit triple
                    let keep = match stored {
                        None => true,
                        Some(s) => s.is_inferred() && !triple.is_inferred(),
                    };
                    if keep {
                        added.push(triple);
                    }
                }
                PendingOp::Remove(triple) => {
                    if let Some(s) = stored.filter(|s| s.is_inferred() == triple.is_inferred()) {
                        removed.push(s.clone());
                    }
                }
            }
        }
        TransactionData::new(self.id, added, removed)
    }

    /// Run the commit protocol
    ///
    /// On success returns the committed delta. On a veto or a storage failure
    /// the transaction ends rolled back and the originating error is returned.
    pub fn commit(&mut self) -> Result<TransactionData, TransactionError> {
        self.expect_state(TransactionState::Active)?;
        self.state.set(TransactionState::Committing);

        let data = self.freeze();
        match self.coordinator.commit(&data) {
            Ok(()) => {
                self.state.set(TransactionState::Committed);
                Ok(data)
            }
            Err(e) => {
                self.state.set(TransactionState::RollingBack);
                self.coordinator.notify_rollback(&data);
                self.state.set(TransactionState::RolledBack);
                Err(e)
            }
        }
    }

    /// Discard buffered changes and notify listeners
    pub fn rollback(&mut self) -> Result<TransactionData, TransactionError> {
        self.expect_state(TransactionState::Active)?;
        self.state.set(TransactionState::RollingBack);

        let data = self.freeze();
        self.coordinator.notify_rollback(&data);
        self.state.set(TransactionState::RolledBack);
        tracing::debug!("Transaction {} rolled back", self.id);
        Ok(data)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state.get() == TransactionState::Active {
            tracing::debug!("Transaction {} dropped while active", self.id);
            let _ = self.rollback();
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state.get())
            .field("pending", &self.ops.len())
            .finish()
    }
}

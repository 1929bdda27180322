//! Background worker that reasons after commits
//!
//! Commits post requests over an unbounded channel and return immediately.
//! The worker drains everything queued before each run and merges it, so a
//! burst of commits made while a run is in progress costs one more run.

use crate::engine::{Delta, ReasonRequest, ReasoningEngine};
use crate::error::ReasonerError;
use parking_lot::Mutex;
use std::sync::Arc;
use tessera_model::{ListenerError, TransactionData, TransactionListener, Triple};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

enum Message {
    Reason(ReasonRequest),
    Shutdown,
}

/// Spawns the reasoning task
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tessera_cache::{CacheConfig, CacheManager};
/// use tessera_reasoner::{ReasonerConfig, ReasonerWorker, ReasoningEngine};
/// use tessera_store::{MemoryBackend, TransactionCoordinator};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let caches = Arc::new(CacheManager::new(CacheConfig::default())?);
///     let coordinator = TransactionCoordinator::open(Arc::new(MemoryBackend::new()), caches)?;
///     let engine = Arc::new(ReasoningEngine::new(coordinator.clone(), ReasonerConfig::default())?);
///
///     let handle = ReasonerWorker::spawn(engine)?;
///     coordinator.register_listener(Arc::new(handle.clone()));
///
///     // ... commit transactions ...
///
///     handle.wait_until_idle().await;
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ReasonerWorker;

impl ReasonerWorker {
    /// Start the worker on the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns [`ReasonerError::Worker`] when called outside a runtime.
    pub fn spawn(engine: Arc<ReasoningEngine>) -> Result<ReasonerHandle, ReasonerError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ReasonerError::Worker(format!("no tokio runtime: {}", e)))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0usize);
        let outstanding = Arc::new(outstanding);

        let task = runtime.spawn(run(engine.clone(), receiver, outstanding.clone()));
        tracing::info!("Reasoner worker started");

        Ok(ReasonerHandle {
            engine,
            sender,
            outstanding,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }
}

async fn run(
    engine: Arc<ReasoningEngine>,
    mut receiver: mpsc::UnboundedReceiver<Message>,
    outstanding: Arc<watch::Sender<usize>>,
) {
    while let Some(Message::Reason(first)) = receiver.recv().await {
        let mut request = first;
        let mut taken = 1;
        let mut stop = false;
        while let Ok(message) = receiver.try_recv() {
            match message {
                Message::Reason(next) => {
                    request = request.merge(next);
                    taken += 1;
                }
                Message::Shutdown => {
                    stop = true;
                    break;
                }
            }
        }
        if taken > 1 {
            tracing::debug!("Coalesced {} reasoning requests into one run", taken);
            engine.record_coalesced(taken - 1);
        }

        let runner = engine.clone();
        match tokio::task::spawn_blocking(move || runner.run(request)).await {
            Ok(Ok(report)) => {
                tracing::debug!("Reasoning run completed: +{} -{}", report.added, report.removed);
            }
            Ok(Err(e)) => tracing::error!("Reasoning run failed: {}", e),
            Err(e) => tracing::error!("Reasoning task aborted: {}", e),
        }
        outstanding.send_modify(|n| *n = n.saturating_sub(taken));

        if stop {
            break;
        }
    }

    receiver.close();
    let mut dropped = 0;
    while let Ok(message) = receiver.try_recv() {
        if let Message::Reason(_) = message {
            dropped += 1;
        }
    }
    if dropped > 0 {
        tracing::warn!("Reasoner stopped with {} pending requests dropped", dropped);
        outstanding.send_modify(|n| *n = n.saturating_sub(dropped));
    }

    tracing::info!("Reasoner worker stopped. Final metrics:\n{}", engine.metrics().summary());
}

/// Cloneable handle to a running [`ReasonerWorker`]
///
/// Registered with the coordinator, the handle posts a request after every
/// commit with explicit changes. Inference commits of its own engine are
/// ignored.
#[derive(Clone)]
pub struct ReasonerHandle {
    engine: Arc<ReasoningEngine>,
    sender: mpsc::UnboundedSender<Message>,
    outstanding: Arc<watch::Sender<usize>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ReasonerHandle {
    /// The engine the worker drives
    pub fn engine(&self) -> &Arc<ReasoningEngine> {
        &self.engine
    }

    /// Queue a request; `false` once the worker has stopped
    pub fn post(&self, request: ReasonRequest) -> bool {
        self.outstanding.send_modify(|n| *n += 1);
        if self.sender.send(Message::Reason(request)).is_err() {
            self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
            return false;
        }
        true
    }

    /// Queue a full recomputation
    pub fn request_full(&self) -> bool {
        self.post(ReasonRequest::Full)
    }

    /// Whether a posted request has not finished yet
    pub fn is_running(&self) -> bool {
        *self.outstanding.borrow() > 0
    }

    /// Wait until every posted request has been processed
    pub async fn wait_until_idle(&self) {
        let mut idle = self.outstanding.subscribe();
        // the sender lives in self, so the channel cannot close while waiting
        let _ = idle.wait_for(|n| *n == 0).await;
    }

    /// Stop the worker after the run in progress
    ///
    /// Requests still queued behind the shutdown are dropped.
    pub async fn shutdown(&self) {
        let task = self.task.lock().take();
        let Some(task) = task else {
            return;
        };
        let _ = self.sender.send(Message::Shutdown);
        if let Err(e) = task.await {
            tracing::error!("Reasoner worker ended abnormally: {}", e);
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.task.lock().is_none()
    }
}

impl TransactionListener for ReasonerHandle {
    fn before_commit(&self, _data: &TransactionData) -> Result<(), ListenerError> {
        Ok(())
    }

    fn after_commit(&self, data: &TransactionData) -> Result<(), ListenerError> {
        if self.engine.is_own_transaction(data.id()) {
            return Ok(());
        }
        let lost_inferences = data.removed().iter().any(Triple::is_inferred);
        if !data.has_explicit_changes() && !lost_inferences {
            return Ok(());
        }
        if !self.post(ReasonRequest::Delta(Delta::from_transaction(data))) {
            return Err(Box::new(ReasonerError::Worker(
                "reasoner worker has shut down".to_string(),
            )));
        }
        Ok(())
    }

    fn rollback(&self, _data: &TransactionData) {}

    fn name(&self) -> &str {
        "reasoner"
    }
}

//! Kernel assembly and lifecycle

use crate::config::{KernelConfig, StorageConfig};
use crate::error::KernelError;
use std::path::Path;
use std::sync::Arc;
use tessera_cache::CacheManager;
use tessera_model::{Program, Term, Triple};
use tessera_reasoner::{parse_program, ReasonerHandle, ReasonerWorker, ReasoningEngine, ReasoningReport};
use tessera_store::{
    BackingStore, ListenerId, MemoryBackend, SqliteBackend, Transaction, TransactionCoordinator,
};

/// A running graph-storage kernel
///
/// Owns the cache manager, the coordinator and, unless disabled, the
/// reasoner worker registered as a transaction listener. Must be opened
/// inside a tokio runtime when the reasoner is enabled.
pub struct Kernel {
    config: KernelConfig,
    caches: Arc<CacheManager>,
    coordinator: TransactionCoordinator,
    reasoner: Option<(ReasonerHandle, ListenerId)>,
}

impl Kernel {
    /// Assemble a kernel from its configuration
    pub fn open(config: KernelConfig) -> Result<Self, KernelError> {
        config.validate()?;

        let backend: Arc<dyn BackingStore> = match &config.storage {
            StorageConfig::Memory => Arc::new(MemoryBackend::new()),
            StorageConfig::Sqlite { path } => Arc::new(SqliteBackend::open(path)?),
        };
        let caches = Arc::new(CacheManager::new(config.cache.clone())?);
        let coordinator = TransactionCoordinator::open(backend, caches.clone())?;

        let reasoner = if config.reasoner.enabled {
            let engine = ReasoningEngine::new(coordinator.clone(), config.reasoner.clone())?;
            let handle = ReasonerWorker::spawn(Arc::new(engine))?;
            let id = coordinator.register_listener(Arc::new(handle.clone()));
            Some((handle, id))
        } else {
            None
        };

        tracing::info!(
            "Kernel opened ({} triples, cache backend: {}, reasoner: {})",
            coordinator.len(),
            caches.backend_kind(),
            if reasoner.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            config,
            caches,
            coordinator,
            reasoner,
        })
    }

    /// Load the configuration from a TOML file and open the kernel
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KernelError> {
        Self::open(KernelConfig::from_file(path)?)
    }

    /// Configuration the kernel was opened with
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The transaction coordinator
    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    /// The cache manager
    pub fn caches(&self) -> &Arc<CacheManager> {
        &self.caches
    }

    /// The reasoner handle, if enabled
    pub fn reasoner(&self) -> Option<&ReasonerHandle> {
        self.reasoner.as_ref().map(|(handle, _)| handle)
    }

    fn engine(&self) -> Result<&Arc<ReasoningEngine>, KernelError> {
        self.reasoner()
            .map(ReasonerHandle::engine)
            .ok_or(KernelError::ReasonerDisabled)
    }

    /// Start an active transaction
    pub fn begin(&self) -> Transaction {
        self.coordinator.begin()
    }

    /// Committed triples matching the bound positions
    pub fn list_triples(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
        context: Option<&Term>,
        include_inferred: bool,
    ) -> Vec<Triple> {
        self.coordinator
            .list_triples(subject, predicate, object, context, include_inferred)
    }

    /// Parse rule text and register it as a program
    pub fn load_program(&self, name: &str, text: &str) -> Result<ReasoningReport, KernelError> {
        let program = parse_program(name, text)?;
        self.add_program(program)
    }

    /// Register a rule file; the program is named after the file stem
    pub fn load_program_file<P: AsRef<Path>>(&self, path: P) -> Result<ReasoningReport, KernelError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| KernelError::Config(format!("invalid rule file name: {}", path.display())))?;
        let text = std::fs::read_to_string(path)?;
        self.load_program(name, &text)
    }

    /// Register a program and materialize its inferences
    pub fn add_program(&self, program: Program) -> Result<ReasoningReport, KernelError> {
        Ok(self.engine()?.add_program(program)?)
    }

    /// Replace a registered program
    pub fn update_program(&self, program: Program) -> Result<ReasoningReport, KernelError> {
        Ok(self.engine()?.update_program(program)?)
    }

    /// Unregister a program
    pub fn remove_program(&self, name: &str) -> Result<ReasoningReport, KernelError> {
        Ok(self.engine()?.remove_program(name)?)
    }

    /// Registered programs
    pub fn programs(&self) -> Vec<Program> {
        self.reasoner()
            .map(|handle| handle.engine().programs())
            .unwrap_or_default()
    }

    /// Wait until inferences of all earlier commits are visible
    pub async fn wait_until_idle(&self) {
        if let Some(handle) = self.reasoner() {
            handle.wait_until_idle().await;
        }
    }

    /// Stop the reasoner and release the caches
    pub async fn shutdown(self) {
        if let Some((handle, id)) = &self.reasoner {
            self.coordinator.unregister_listener(*id);
            handle.shutdown().await;
        }
        self.caches.shutdown();

        let stats = self.coordinator.stats();
        tracing::info!(
            "Kernel shut down ({} commits, {} rollbacks, {} vetoes)",
            stats.commits,
            stats.rollbacks,
            stats.vetoes
        );
    }
}

//! Reasoning engine - forward-chained materialization of inferred triples
//!
//! Each run reads a snapshot of the committed table, works out the change to
//! the inferred set, and commits it as one inference transaction through the
//! coordinator.
//!
//! # Incremental runs
//!
//! 1. seeds: the delta's explicit additions that are still committed
//! 2. inferred copies of seed statements are retracted (explicit wins)
//! 3. removed explicit statements that are gone from every context are
//!    retracted with delete-and-rederive, or trigger a full recomputation
//!    under [`RetractionStrategy::Recompute`]
//! 4. semi-naive saturation from the seeds and the rederived triples
//!
//! # Full runs
//!
//! The closure of all explicit triples is computed from scratch and diffed
//! against the stored inferences.

use crate::config::{ReasonerConfig, RetractionStrategy};
use crate::error::ReasonerError;
use crate::evaluation::Evaluation;
use crate::metrics::{ReasonerMetrics, ReasoningReport};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use tessera_model::{Program, Rule, Term, TransactionData, TransactionId, Triple, TripleKey};
use tessera_store::{TransactionCoordinator, TripleTable};

/// Explicit changes a reasoning run has to account for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    added: Vec<Triple>,
    removed: Vec<Triple>,
}

impl Delta {
    /// Create a delta
    pub fn new(added: Vec<Triple>, removed: Vec<Triple>) -> Self {
        Self { added, removed }
    }

    /// The changes of a committed transaction
    pub fn from_transaction(data: &TransactionData) -> Self {
        Self::new(data.added().to_vec(), data.removed().to_vec())
    }

    /// Added triples
    pub fn added(&self) -> &[Triple] {
        &self.added
    }

    /// Removed triples
    pub fn removed(&self) -> &[Triple] {
        &self.removed
    }

    /// Whether there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Append a later delta
    pub fn merge(&mut self, later: Delta) {
        self.added.extend(later.added);
        self.removed.extend(later.removed);
    }
}

/// Work posted to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonRequest {
    /// Account for committed changes
    Delta(Delta),
    /// Recompute the whole closure
    Full,
}

impl ReasonRequest {
    /// Combine two requests into one run; a full run absorbs everything
    pub fn merge(self, later: ReasonRequest) -> ReasonRequest {
        match (self, later) {
            (ReasonRequest::Delta(mut first), ReasonRequest::Delta(second)) => {
                first.merge(second);
                ReasonRequest::Delta(first)
            }
            _ => ReasonRequest::Full,
        }
    }
}

/// Net change to the inferred set
#[derive(Debug, Default)]
struct Changes {
    added: BTreeMap<TripleKey, Triple>,
    removed: BTreeMap<TripleKey, Triple>,
}

impl Changes {
    fn add(&mut self, triple: Triple) {
        if self.removed.remove(triple.key()).is_none() {
            self.added.insert(triple.key().clone(), triple);
        }
    }

    fn remove(&mut self, triple: Triple) {
        if self.added.remove(triple.key()).is_none() {
            self.removed.insert(triple.key().clone(), triple);
        }
    }

    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Materializes the inferences of the registered rule programs
///
/// Runs are serialized. Methods block the calling thread; use
/// [`ReasonerWorker`](crate::ReasonerWorker) to reason in the background.
pub struct ReasoningEngine {
    coordinator: TransactionCoordinator,
    config: ReasonerConfig,
    context: Term,
    programs: RwLock<BTreeMap<String, Program>>,
    metrics: Mutex<ReasonerMetrics>,
    own: Mutex<HashSet<TransactionId>>,
    run_lock: Mutex<()>,
}

impl ReasoningEngine {
    /// Create an engine with no programs
    pub fn new(coordinator: TransactionCoordinator, config: ReasonerConfig) -> Result<Self, ReasonerError> {
        config.validate()?;
        let context = config.inferred_context_term();
        Ok(Self {
            coordinator,
            config,
            context,
            programs: RwLock::new(BTreeMap::new()),
            metrics: Mutex::new(ReasonerMetrics::new()),
            own: Mutex::new(HashSet::new()),
            run_lock: Mutex::new(()),
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    /// Context receiving inferred triples
    pub fn inferred_context(&self) -> &Term {
        &self.context
    }

    /// The coordinator the engine commits through
    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    /// Register a program and materialize its inferences
    pub fn add_program(&self, program: Program) -> Result<ReasoningReport, ReasonerError> {
        {
            let mut programs = self.programs.write();
            if programs.contains_key(program.name()) {
                return Err(ReasonerError::DuplicateProgram(program.name().to_string()));
            }
            tracing::info!("Added program '{}' ({} rules)", program.name(), program.rules().len());
            programs.insert(program.name().to_string(), program);
        }
        self.reason_full()
    }

    /// Replace a registered program and rematerialize
    pub fn update_program(&self, program: Program) -> Result<ReasoningReport, ReasonerError> {
        {
            let mut programs = self.programs.write();
            let Some(slot) = programs.get_mut(program.name()) else {
                return Err(ReasonerError::UnknownProgram(program.name().to_string()));
            };
            tracing::info!("Updated program '{}' ({} rules)", program.name(), program.rules().len());
            *slot = program;
        }
        self.reason_full()
    }

    /// Unregister a program and retract what only it derived
    pub fn remove_program(&self, name: &str) -> Result<ReasoningReport, ReasonerError> {
        if self.programs.write().remove(name).is_none() {
            return Err(ReasonerError::UnknownProgram(name.to_string()));
        }
        tracing::info!("Removed program '{}'", name);
        self.reason_full()
    }

    /// Registered programs, by name
    pub fn programs(&self) -> Vec<Program> {
        self.programs.read().values().cloned().collect()
    }

    /// A registered program
    pub fn program(&self, name: &str) -> Option<Program> {
        self.programs.read().get(name).cloned()
    }

    /// All rules, in program-name order
    pub fn rules(&self) -> Vec<Rule> {
        self.programs
            .read()
            .values()
            .flat_map(|p| p.rules().iter().cloned())
            .collect()
    }

    /// Whether `id` is an inference transaction committed by this engine
    pub fn is_own_transaction(&self, id: TransactionId) -> bool {
        self.own.lock().contains(&id)
    }

    /// Cumulative metrics
    pub fn metrics(&self) -> ReasonerMetrics {
        self.metrics.lock().clone()
    }

    pub(crate) fn record_coalesced(&self, count: usize) {
        self.metrics.lock().record_coalesced(count);
    }

    /// Account for committed explicit changes
    pub fn reason(&self, delta: &Delta) -> Result<ReasoningReport, ReasonerError> {
        self.run(ReasonRequest::Delta(delta.clone()))
    }

    /// Recompute every inference from the explicit triples
    pub fn reason_full(&self) -> Result<ReasoningReport, ReasonerError> {
        self.run(ReasonRequest::Full)
    }

    /// Execute one run to fixpoint and commit its result
    pub fn run(&self, request: ReasonRequest) -> Result<ReasoningReport, ReasonerError> {
        let _running = self.run_lock.lock();
        let started = Instant::now();
        let rules = self.rules();
        let snapshot = self.coordinator.snapshot();
        let mut eval = Evaluation::new(&rules, &self.context);

        let (changes, full) = match request {
            ReasonRequest::Full => (full_changes(&mut eval, snapshot), true),
            ReasonRequest::Delta(delta) => {
                if self.config.retraction == RetractionStrategy::Recompute && needs_retraction(&snapshot, &delta) {
                    (full_changes(&mut eval, snapshot), true)
                } else {
                    (incremental_changes(&mut eval, snapshot, &delta), false)
                }
            }
        };

        let (added, removed) = match self.commit(changes) {
            Ok(counts) => counts,
            Err(e) => {
                self.metrics.lock().record_failure();
                return Err(e);
            }
        };

        let report = ReasoningReport {
            full,
            rounds: eval.rounds,
            added,
            removed,
            firings: eval.firings,
            duration: started.elapsed(),
        };
        self.metrics.lock().record_run(&report);
        tracing::debug!(
            "Reasoning run finished ({}): +{} -{} in {} rounds ({:?})",
            if full { "full" } else { "incremental" },
            report.added,
            report.removed,
            report.rounds,
            report.duration
        );
        Ok(report)
    }

    fn commit(&self, changes: Changes) -> Result<(usize, usize), ReasonerError> {
        if changes.is_empty() {
            return Ok((0, 0));
        }
        let mut tx = self.coordinator.begin_inference();
        let id = tx.id();
        for triple in changes.removed.into_values() {
            tx.remove_statement(triple)?;
        }
        for triple in changes.added.into_values() {
            tx.add_statement(triple)?;
        }

        self.own.lock().insert(id);
        let result = tx.commit();
        self.own.lock().remove(&id);
        let data = result?;
        Ok((data.added().len(), data.removed().len()))
    }
}

/// Whether the delta removed something the inferred set may depend on
fn needs_retraction(snapshot: &TripleTable, delta: &Delta) -> bool {
    delta.removed().iter().any(|t| {
        if t.is_inferred() {
            !snapshot.contains(t)
        } else {
            !snapshot.contains_explicit_statement(t.subject(), t.predicate(), t.object())
        }
    })
}

fn full_changes(eval: &mut Evaluation<'_>, snapshot: TripleTable) -> Changes {
    let explicit: TripleTable = snapshot.iter().filter(|t| !t.is_inferred()).cloned().collect();
    let seeds: Vec<Triple> = explicit.iter().cloned().collect();
    let mut working = explicit;
    let derived = eval.saturate(&mut working, seeds);

    let mut changes = Changes::default();
    let derived_keys: HashSet<&TripleKey> = derived.iter().map(Triple::key).collect();
    for stale in snapshot.iter().filter(|t| t.is_inferred() && !derived_keys.contains(t.key())) {
        changes.remove(stale.clone());
    }
    for triple in &derived {
        if !snapshot.get(triple.key()).is_some_and(Triple::is_inferred) {
            changes.add(triple.clone());
        }
    }
    changes
}

fn incremental_changes(eval: &mut Evaluation<'_>, snapshot: TripleTable, delta: &Delta) -> Changes {
    let mut working = snapshot;
    let mut changes = Changes::default();

    let seeds: Vec<Triple> = delta
        .added()
        .iter()
        .filter_map(|t| working.get(t.key()).filter(|s| !s.is_inferred()).cloned())
        .collect();

    for seed in &seeds {
        let superseded = working.list_triples(Some(seed.subject()), Some(seed.predicate()), Some(seed.object()), None, true);
        for triple in superseded.into_iter().filter(Triple::is_inferred) {
            working.remove(&triple);
            changes.remove(triple);
        }
    }

    let gone: TripleTable = delta
        .removed()
        .iter()
        .filter(|t| !t.is_inferred())
        .filter(|t| !working.contains_explicit_statement(t.subject(), t.predicate(), t.object()))
        .cloned()
        .collect();
    let mut candidates: Vec<Triple> = delta
        .removed()
        .iter()
        .filter(|t| t.is_inferred() && !working.contains(t))
        .cloned()
        .collect();

    if !gone.is_empty() {
        let doomed = eval.overdelete(&working, &gone);
        tracing::debug!("Over-deleted {} inferences for {} removed facts", doomed.len(), gone.len());
        for triple in doomed.values() {
            working.remove(triple);
            changes.remove(triple.clone());
        }
        candidates.extend(doomed.into_values());
        candidates.extend(
            gone.iter()
                .filter_map(|t| eval.infer(t.subject().clone(), t.predicate().clone(), t.object().clone())),
        );
    }

    let mut frontier = seeds;
    for candidate in candidates {
        let present = working.contains_statement(candidate.subject(), candidate.predicate(), candidate.object());
        if !present && eval.derivable(&candidate, &working) {
            let triple = match eval.infer(
                candidate.subject().clone(),
                candidate.predicate().clone(),
                candidate.object().clone(),
            ) {
                Some(triple) => triple,
                None => continue,
            };
            working.add(triple.clone());
            changes.add(triple.clone());
            frontier.push(triple);
        }
    }

    for triple in eval.saturate(&mut working, frontier) {
        changes.add(triple);
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;
    use std::sync::Arc;
    use tessera_cache::{CacheConfig, CacheManager};
    use tessera_store::MemoryBackend;

    const EX: &str = "http://example.org/";

    fn uri(s: &str) -> Term {
        Term::uri(&format!("{}{}", EX, s))
    }

    fn fact(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(uri(s), uri(p), uri(o), None).unwrap()
    }

    fn engine(config: ReasonerConfig) -> ReasoningEngine {
        let caches = Arc::new(CacheManager::new(CacheConfig::local(256)).unwrap());
        let coordinator = TransactionCoordinator::open(Arc::new(MemoryBackend::new()), caches).unwrap();
        ReasoningEngine::new(coordinator, config).unwrap()
    }

    fn ancestry() -> Program {
        parse_program(
            "ancestry",
            "@prefix ex: <http://example.org/> .\n\
             parent: (?x ex:parent ?y) -> (?x ex:ancestor ?y) .\n\
             chain: (?x ex:ancestor ?y), (?y ex:ancestor ?z) -> (?x ex:ancestor ?z) .",
        )
        .unwrap()
    }

    fn assert_facts(engine: &ReasoningEngine, triples: &[Triple]) -> TransactionData {
        let mut tx = engine.coordinator().begin();
        for t in triples {
            tx.add_statement(t.clone()).unwrap();
        }
        tx.commit().unwrap()
    }

    fn retract_facts(engine: &ReasoningEngine, triples: &[Triple]) -> TransactionData {
        let mut tx = engine.coordinator().begin();
        for t in triples {
            tx.remove_statement(t.clone()).unwrap();
        }
        tx.commit().unwrap()
    }

    fn inferred(engine: &ReasoningEngine) -> Vec<(Term, Term, Term)> {
        let mut all: Vec<_> = engine
            .coordinator()
            .list_triples(None, None, None, Some(engine.inferred_context()), true)
            .into_iter()
            .filter(|t| t.is_inferred())
            .map(|t| t.statement())
            .collect();
        all.sort();
        all
    }

    #[test]
    fn test_delta_merge() {
        let mut first = Delta::new(vec![fact("a", "p", "b")], vec![]);
        first.merge(Delta::new(vec![], vec![fact("a", "p", "b")]));
        assert_eq!(first.added().len(), 1);
        assert_eq!(first.removed().len(), 1);

        let merged = ReasonRequest::Delta(first.clone()).merge(ReasonRequest::Delta(Delta::default()));
        assert_eq!(merged, ReasonRequest::Delta(first.clone()));
        assert_eq!(ReasonRequest::Delta(first).merge(ReasonRequest::Full), ReasonRequest::Full);
    }

    #[test]
    fn test_changes_cancel_out() {
        let t = Triple::new_inferred(uri("a"), uri("p"), uri("b"), None).unwrap();
        let mut changes = Changes::default();
        changes.remove(t.clone());
        changes.add(t.clone());
        assert!(changes.is_empty());

        changes.add(t.clone());
        changes.remove(t);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_program_registry() {
        let engine = engine(ReasonerConfig::default());
        engine.add_program(ancestry()).unwrap();
        assert!(matches!(
            engine.add_program(ancestry()),
            Err(ReasonerError::DuplicateProgram(_))
        ));
        assert_eq!(engine.programs().len(), 1);
        assert_eq!(engine.rules().len(), 2);

        assert!(matches!(
            engine.update_program(Program::new("missing")),
            Err(ReasonerError::UnknownProgram(_))
        ));
        assert!(matches!(
            engine.remove_program("missing"),
            Err(ReasonerError::UnknownProgram(_))
        ));
    }

    #[test]
    fn test_incremental_addition() {
        let engine = engine(ReasonerConfig::default());
        engine.add_program(ancestry()).unwrap();

        let data = assert_facts(&engine, &[fact("a", "parent", "b"), fact("b", "parent", "c")]);
        let report = engine.reason(&Delta::from_transaction(&data)).unwrap();

        assert!(!report.full);
        assert_eq!(report.added, 3);
        assert_eq!(report.firings["parent"], 2);
        assert_eq!(report.firings["chain"], 1);
        assert!(engine.coordinator().contains_statement(&uri("a"), &uri("ancestor"), &uri("c")));

        let again = engine.reason(&Delta::from_transaction(&data)).unwrap();
        assert!(!again.changed());
    }

    #[test]
    fn test_program_changes_rematerialize() {
        let engine = engine(ReasonerConfig::default());
        assert_facts(&engine, &[fact("a", "parent", "b"), fact("b", "parent", "c")]);

        let report = engine.add_program(ancestry()).unwrap();
        assert!(report.full);
        assert_eq!(inferred(&engine).len(), 3);

        let parent_only = parse_program(
            "ancestry",
            "@prefix ex: <http://example.org/> .\nparent: (?x ex:parent ?y) -> (?x ex:ancestor ?y) .",
        )
        .unwrap();
        let report = engine.update_program(parent_only).unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(inferred(&engine).len(), 2);

        let report = engine.remove_program("ancestry").unwrap();
        assert_eq!(report.removed, 2);
        assert!(inferred(&engine).is_empty());
    }

    #[test]
    fn test_explicit_fact_supersedes_inference() {
        let engine = engine(ReasonerConfig::default());
        engine.add_program(ancestry()).unwrap();
        let data = assert_facts(&engine, &[fact("a", "parent", "b")]);
        engine.reason(&Delta::from_transaction(&data)).unwrap();
        assert_eq!(inferred(&engine).len(), 1);

        let data = assert_facts(&engine, &[fact("a", "ancestor", "b")]);
        let report = engine.reason(&Delta::from_transaction(&data)).unwrap();
        assert_eq!(report.removed, 1);
        assert!(inferred(&engine).is_empty());
        assert!(engine.coordinator().contains_statement(&uri("a"), &uri("ancestor"), &uri("b")));

        let data = retract_facts(&engine, &[fact("a", "ancestor", "b")]);
        let report = engine.reason(&Delta::from_transaction(&data)).unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(inferred(&engine), vec![(uri("a"), uri("ancestor"), uri("b"))]);
    }

    #[test]
    fn test_recompute_strategy_runs_full_on_removal() {
        let engine = engine(ReasonerConfig::recompute());
        engine.add_program(ancestry()).unwrap();
        let data = assert_facts(&engine, &[fact("a", "parent", "b"), fact("b", "parent", "c")]);
        assert!(!engine.reason(&Delta::from_transaction(&data)).unwrap().full);

        let data = retract_facts(&engine, &[fact("b", "parent", "c")]);
        let report = engine.reason(&Delta::from_transaction(&data)).unwrap();
        assert!(report.full);
        assert_eq!(report.removed, 2);
        assert_eq!(inferred(&engine), vec![(uri("a"), uri("ancestor"), uri("b"))]);
    }

    #[test]
    fn test_cleared_inferences_are_restored() {
        let engine = engine(ReasonerConfig::default());
        engine.add_program(ancestry()).unwrap();
        let data = assert_facts(&engine, &[fact("a", "parent", "b")]);
        engine.reason(&Delta::from_transaction(&data)).unwrap();

        let mut tx = engine.coordinator().begin();
        tx.clear_context(engine.inferred_context()).unwrap();
        let data = tx.commit().unwrap();
        assert!(inferred(&engine).is_empty());

        let report = engine.reason(&Delta::from_transaction(&data)).unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(inferred(&engine).len(), 1);
    }

    #[test]
    fn test_metrics_accumulate() {
        let engine = engine(ReasonerConfig::default());
        engine.add_program(ancestry()).unwrap();
        let data = assert_facts(&engine, &[fact("a", "parent", "b")]);
        engine.reason(&Delta::from_transaction(&data)).unwrap();

        let metrics = engine.metrics();
        assert_eq!(metrics.runs, 2);
        assert_eq!(metrics.full_runs, 1);
        assert_eq!(metrics.inferred_added, 1);
        assert!(metrics.summary().contains("parent: 1"));
    }
}

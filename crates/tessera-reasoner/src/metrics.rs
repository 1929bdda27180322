//! Metrics collection for reasoning runs

use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of one reasoning run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasoningReport {
    /// Whether the run recomputed the whole closure
    pub full: bool,
    /// Semi-naive rounds evaluated
    pub rounds: usize,
    /// Inferred triples committed
    pub added: usize,
    /// Inferred triples retracted
    pub removed: usize,
    /// Head instantiations that produced a new triple, per rule label
    pub firings: BTreeMap<String, usize>,
    /// Wall-clock time of the run
    pub duration: Duration,
}

impl ReasoningReport {
    /// Whether the run changed the store
    pub fn changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

/// Cumulative metrics of a reasoning engine
#[derive(Debug, Clone, Default)]
pub struct ReasonerMetrics {
    /// Runs completed
    pub runs: usize,

    /// Runs that recomputed the whole closure
    pub full_runs: usize,

    /// Runs that failed
    pub failures: usize,

    /// Requests absorbed into another run by coalescing
    pub coalesced: usize,

    /// Semi-naive rounds across all runs
    pub rounds: usize,

    /// Inferred triples committed
    pub inferred_added: usize,

    /// Inferred triples retracted
    pub inferred_removed: usize,

    /// New triples produced, per rule label
    pub firings: BTreeMap<String, usize>,

    /// Total time spent reasoning
    pub total_runtime: Duration,
}

impl ReasonerMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished run into the totals
    pub fn record_run(&mut self, report: &ReasoningReport) {
        self.runs += 1;
        if report.full {
            self.full_runs += 1;
        }
        self.rounds += report.rounds;
        self.inferred_added += report.added;
        self.inferred_removed += report.removed;
        self.total_runtime += report.duration;
        for (rule, count) in &report.firings {
            *self.firings.entry(rule.clone()).or_insert(0) += count;
        }
    }

    /// Record a failed run
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Record requests merged into a single run
    pub fn record_coalesced(&mut self, count: usize) {
        self.coalesced += count;
    }

    /// Total firings across all rules
    pub fn total_firings(&self) -> usize {
        self.firings.values().sum()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Reasoner Metrics Summary".to_string(),
            "========================".to_string(),
            format!("Runs: {} ({} full, {} failed)", self.runs, self.full_runs, self.failures),
            format!("Coalesced requests: {}", self.coalesced),
            format!("Rounds: {}", self.rounds),
            format!("Inferred added: {}", self.inferred_added),
            format!("Inferred removed: {}", self.inferred_removed),
            format!("Total runtime: {:?}", self.total_runtime),
        ];

        if !self.firings.is_empty() {
            lines.push(String::new());
            lines.push("Firings by rule:".to_string());
            for (rule, count) in &self.firings {
                lines.push(format!("  {}: {}", rule, count));
            }
            lines.push(format!("  Total: {}", self.total_firings()));
        }

        lines.join("\n")
    }
}

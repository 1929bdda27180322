//! Metrics collection for cache operations

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters of one named cache
///
/// Updated from any thread without locking.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    evictions: AtomicU64,
}

impl CacheCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a lookup that found a value
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup that found nothing
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup outcome
    pub fn record_lookup(&self, hit: bool) {
        if hit {
            self.record_hit();
        } else {
            self.record_miss();
        }
    }

    /// Record a stored value
    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entry pushed out by capacity pressure
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Counter values of one named cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a value
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Values stored
    pub puts: u64,
    /// Entries evicted by capacity pressure
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 when there were none
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Statistics of every cache handed out by a manager
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    /// Stats per cache name
    pub caches: BTreeMap<String, CacheStats>,
}

impl CacheMetrics {
    /// Create empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the stats of one cache
    pub fn record(&mut self, name: &str, stats: CacheStats) {
        self.caches.insert(name.to_string(), stats);
    }

    /// Stats of the cache called `name`
    pub fn get(&self, name: &str) -> Option<&CacheStats> {
        self.caches.get(name)
    }

    /// Sum over all caches
    pub fn total(&self) -> CacheStats {
        self.caches.values().fold(CacheStats::default(), |acc, s| CacheStats {
            hits: acc.hits + s.hits,
            misses: acc.misses + s.misses,
            puts: acc.puts + s.puts,
            evictions: acc.evictions + s.evictions,
        })
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let total = self.total();
        let mut lines = vec![
            "Cache Metrics Summary".to_string(),
            "=====================".to_string(),
            format!("Caches: {}", self.caches.len()),
            format!(
                "Total: {} hits, {} misses, {} puts, {} evictions ({:.1}% hit ratio)",
                total.hits,
                total.misses,
                total.puts,
                total.evictions,
                total.hit_ratio() * 100.0
            ),
        ];

        if !self.caches.is_empty() {
            lines.push(String::new());
            lines.push("Per cache:".to_string());
            for (name, s) in &self.caches {
                lines.push(format!(
                    "  {}: {} hits, {} misses, {} puts, {} evictions",
                    name, s.hits, s.misses, s.puts, s.evictions
                ));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let counters = CacheCounters::new();
        counters.record_lookup(true);
        counters.record_lookup(false);
        counters.record_miss();
        counters.record_put();
        counters.record_eviction();

        let stats = counters.snapshot();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.puts, 1);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_hit_ratio() {
        assert_eq!(CacheStats::default().hit_ratio(), 0.0);
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert_eq!(stats.hit_ratio(), 0.75);
    }

    #[test]
    fn test_summary() {
        let mut metrics = CacheMetrics::new();
        metrics.record("node", CacheStats { hits: 4, misses: 1, puts: 2, evictions: 0 });
        metrics.record("triple", CacheStats { hits: 1, misses: 4, puts: 5, evictions: 3 });

        let summary = metrics.summary();
        assert!(summary.contains("Caches: 2"));
        assert!(summary.contains("Total: 5 hits, 5 misses, 7 puts, 3 evictions"));
        assert!(summary.contains("node: 4 hits"));
        assert!(summary.contains("triple: 1 hits"));
    }
}

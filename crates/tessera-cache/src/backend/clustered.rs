//! Replicated backend shared by the members of a named cluster
//!
//! Members that join the same cluster name see the same caches. Every write
//! is stamped with a cluster-wide sequence number while the target map is
//! locked, so all members observe writes in one global order. Membership and
//! the replicated maps live in a [`ClusterRegistry`]; the process-wide
//! registry stands in for a network transport.

use super::{CacheBackend, NamedCache};
use crate::metrics::{CacheCounters, CacheStats};
use crate::value::{CacheKey, CacheValue};
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Directory of live clusters
#[derive(Default)]
pub struct ClusterRegistry {
    clusters: DashMap<String, Arc<Cluster>>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<ClusterRegistry>> = OnceLock::new();

impl ClusterRegistry {
    /// Create an isolated registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`ClusteredBackend::join`]
    pub fn global() -> Arc<ClusterRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(ClusterRegistry::new()))
            .clone()
    }

    /// Number of members currently joined to `cluster`
    pub fn members(&self, cluster: &str) -> usize {
        self.clusters
            .get(cluster)
            .map_or(0, |c| c.members.load(Ordering::SeqCst))
    }

    /// Whether `cluster` has at least one member
    pub fn contains(&self, cluster: &str) -> bool {
        self.clusters.contains_key(cluster)
    }

    fn join(&self, name: &str) -> Arc<Cluster> {
        let entry = self
            .clusters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Cluster::new(name)));
        entry.members.fetch_add(1, Ordering::SeqCst);
        entry.clone()
    }

    fn leave(&self, cluster: &Arc<Cluster>) {
        // decrement under the shard lock so a concurrent join cannot revive a removed cluster
        self.clusters.remove_if(&cluster.name, |_, c| {
            Arc::ptr_eq(c, cluster) && c.members.fetch_sub(1, Ordering::SeqCst) == 1
        });
    }
}

struct Cluster {
    name: String,
    members: AtomicUsize,
    sequence: Arc<AtomicU64>,
    maps: DashMap<String, Arc<ReplicatedMap>>,
}

impl Cluster {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: AtomicUsize::new(0),
            sequence: Arc::new(AtomicU64::new(0)),
            maps: DashMap::new(),
        }
    }
}

struct ReplicatedMap {
    sequence: Arc<AtomicU64>,
    state: Mutex<ReplicatedState>,
}

struct ReplicatedState {
    entries: LruCache<CacheKey, CacheValue>,
    last_sequence: u64,
}

impl ReplicatedMap {
    fn new(capacity: usize, sequence: Arc<AtomicU64>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sequence,
            state: Mutex::new(ReplicatedState {
                entries: LruCache::new(capacity),
                last_sequence: 0,
            }),
        }
    }

    /// Apply one write under the map lock, stamped with the next cluster sequence
    fn write<R>(&self, op: impl FnOnce(&mut LruCache<CacheKey, CacheValue>) -> R) -> R {
        let mut state = self.state.lock();
        state.last_sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        op(&mut state.entries)
    }
}

/// Backend handle of one cluster member
pub struct ClusteredBackend {
    registry: Arc<ClusterRegistry>,
    cluster: Arc<Cluster>,
    left: AtomicBool,
}

impl ClusteredBackend {
    /// Join `cluster` in the process-wide registry
    pub fn join(cluster: &str) -> Self {
        Self::join_registry(ClusterRegistry::global(), cluster)
    }

    /// Join `cluster` in a specific registry
    pub fn join_registry(registry: Arc<ClusterRegistry>, cluster: &str) -> Self {
        let cluster = registry.join(cluster);
        tracing::info!(
            "Joined cache cluster '{}' ({} members)",
            cluster.name,
            cluster.members.load(Ordering::SeqCst)
        );
        Self {
            registry,
            cluster,
            left: AtomicBool::new(false),
        }
    }

    /// Name of the joined cluster
    pub fn cluster_name(&self) -> &str {
        &self.cluster.name
    }

    /// Sequence number of the latest write applied anywhere in the cluster
    pub fn sequence(&self) -> u64 {
        self.cluster.sequence.load(Ordering::SeqCst)
    }
}

impl CacheBackend for ClusteredBackend {
    fn open(&self, name: &str, capacity: usize) -> Arc<dyn NamedCache> {
        let map = self
            .cluster
            .maps
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ReplicatedMap::new(capacity, self.cluster.sequence.clone())))
            .clone();
        Arc::new(ClusteredCache {
            name: name.to_string(),
            map,
            counters: CacheCounters::new(),
        })
    }

    fn shutdown(&self) {
        if self.left.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registry.leave(&self.cluster);
        tracing::info!("Left cache cluster '{}'", self.cluster.name);
    }

    fn kind(&self) -> &'static str {
        "clustered"
    }

    fn is_shared(&self) -> bool {
        true
    }
}

impl Drop for ClusteredBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One member's view of a replicated map
struct ClusteredCache {
    name: String,
    map: Arc<ReplicatedMap>,
    counters: CacheCounters,
}

impl NamedCache for ClusteredCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let value = self.map.state.lock().entries.get(key).cloned();
        self.counters.record_lookup(value.is_some());
        value
    }

    fn put(&self, key: CacheKey, value: CacheValue) {
        let probe = key.clone();
        let displaced = self.map.write(|entries| entries.push(key, value));
        self.counters.record_put();
        if matches!(displaced, Some((old, _)) if old != probe) {
            self.counters.record_eviction();
        }
    }

    fn remove(&self, key: &CacheKey) {
        self.map.write(|entries| entries.pop(key));
    }

    fn clear(&self) {
        self.map.write(|entries| entries.clear());
    }

    fn len(&self) -> usize {
        self.map.state.lock().entries.len()
    }

    fn capacity(&self) -> usize {
        self.map.state.lock().entries.cap().get()
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_share_writes() {
        let registry = Arc::new(ClusterRegistry::new());
        let a = ClusteredBackend::join_registry(registry.clone(), "kernel");
        let b = ClusteredBackend::join_registry(registry.clone(), "kernel");
        assert_eq!(registry.members("kernel"), 2);

        let cache_a = a.open("node", 16);
        let cache_b = b.open("node", 16);

        cache_a.put(CacheKey::Id(1), CacheValue::Id(100));
        assert_eq!(cache_b.get(&CacheKey::Id(1)), Some(CacheValue::Id(100)));

        cache_b.remove(&CacheKey::Id(1));
        assert!(cache_a.get(&CacheKey::Id(1)).is_none());
    }

    #[test]
    fn test_writes_are_globally_sequenced() {
        let registry = Arc::new(ClusterRegistry::new());
        let a = ClusteredBackend::join_registry(registry.clone(), "kernel");
        let b = ClusteredBackend::join_registry(registry.clone(), "kernel");

        a.open("node", 16).put(CacheKey::Id(1), CacheValue::Id(1));
        b.open("triple", 16).put(CacheKey::Id(2), CacheValue::Id(2));
        a.open("node", 16).clear();

        assert_eq!(a.sequence(), 3);
        assert_eq!(b.sequence(), 3);
    }

    #[test]
    fn test_separate_clusters_are_isolated() {
        let registry = Arc::new(ClusterRegistry::new());
        let a = ClusteredBackend::join_registry(registry.clone(), "east");
        let b = ClusteredBackend::join_registry(registry.clone(), "west");

        a.open("node", 16).put(CacheKey::Id(1), CacheValue::Id(1));
        assert!(b.open("node", 16).get(&CacheKey::Id(1)).is_none());
    }

    #[test]
    fn test_last_member_leaving_dissolves_cluster() {
        let registry = Arc::new(ClusterRegistry::new());
        let a = ClusteredBackend::join_registry(registry.clone(), "kernel");
        let b = ClusteredBackend::join_registry(registry.clone(), "kernel");

        a.shutdown();
        a.shutdown();
        assert_eq!(registry.members("kernel"), 1);

        drop(b);
        assert!(!registry.contains("kernel"));
        assert_eq!(registry.members("kernel"), 0);
    }
}

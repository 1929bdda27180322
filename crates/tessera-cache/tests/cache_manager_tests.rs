//! Integration tests for the cache manager across backends

use std::sync::Arc;
use std::thread;
use tessera_cache::{
    CacheBackendKind, CacheConfig, CacheManager, ClusterRegistry, ClusteredBackend,
};
use tessera_model::{Namespace, Node, Term, TermId};

fn clustered_manager(registry: &Arc<ClusterRegistry>, cluster: &str) -> CacheManager {
    let backend = ClusteredBackend::join_registry(registry.clone(), cluster);
    CacheManager::with_backend(CacheConfig::clustered(cluster), Arc::new(backend))
}

#[test]
fn test_clustered_managers_share_entries() {
    let registry = Arc::new(ClusterRegistry::new());
    let first = clustered_manager(&registry, "graph");
    let second = clustered_manager(&registry, "graph");

    let ns = Namespace::new("ex", "http://example.org/").unwrap();
    first.namespace_prefix_cache().put("ex", ns.clone());

    assert_eq!(second.namespace_prefix_cache().get("ex"), Some(ns));

    // invalidation on one member is seen by the other
    second.namespace_prefix_cache().remove("ex");
    assert!(first.namespace_prefix_cache().get("ex").is_none());
}

#[test]
fn test_clustered_shutdown_leaves_cluster() {
    let registry = Arc::new(ClusterRegistry::new());
    let first = clustered_manager(&registry, "graph");
    let second = clustered_manager(&registry, "graph");
    assert_eq!(registry.members("graph"), 2);

    first.shutdown();
    assert_eq!(registry.members("graph"), 1);

    second.shutdown();
    assert!(!registry.contains("graph"));
}

#[test]
fn test_member_shutdown_keeps_shared_entries() {
    let registry = Arc::new(ClusterRegistry::new());
    let first = clustered_manager(&registry, "graph");
    let second = clustered_manager(&registry, "graph");

    let ns = Namespace::new("ex", "http://example.org/").unwrap();
    first.namespace_prefix_cache().put("ex", ns.clone());
    second.namespace_prefix_cache();

    first.shutdown();
    assert_eq!(second.namespace_prefix_cache().get("ex"), Some(ns));
    assert!(first.namespace_prefix_cache().get("ex").is_none());
}

#[test]
fn test_concurrent_access() {
    let manager = Arc::new(CacheManager::new(CacheConfig::local(10_000)).unwrap());

    let handles: Vec<_> = (0..4u64)
        .map(|worker| {
            let manager = manager.clone();
            thread::spawn(move || {
                for i in 0..250u64 {
                    let id = worker * 1000 + i;
                    let node = Node::new(TermId::new(id), Term::uri(&format!("http://example.org/{}", id)));
                    manager.node_cache().put(&TermId::new(id), node);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(manager.node_cache().len(), 1000);
    assert_eq!(manager.metrics().get("node").unwrap().puts, 1000);
}

#[test]
fn test_manager_from_toml() {
    let config = CacheConfig::from_toml_str(
        r#"
        backend = "local"
        default_capacity = 3

        [capacities]
        literal = 1
        "#,
    )
    .unwrap();
    assert_eq!(config.backend, CacheBackendKind::Local);

    let manager = CacheManager::new(config).unwrap();
    let literal = manager.literal_cache();
    literal.put("\"a\"", Node::new(TermId::new(1), Term::literal("a")));
    literal.put("\"b\"", Node::new(TermId::new(2), Term::literal("b")));

    assert_eq!(literal.len(), 1);
    assert!(literal.get("\"a\"").is_none());
    assert_eq!(manager.metrics().get("literal").unwrap().evictions, 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = CacheConfig::clustered("graph");
    config.cluster_name = Some(String::new());
    assert!(CacheManager::new(config).is_err());
}

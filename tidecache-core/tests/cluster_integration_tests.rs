// Cluster Integration Tests
// End-to-end flows through the public API: registry, persistence round trips, headers

use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tidecache::{
    BulkStorage, CacheError, Cluster, ClusterConfig, ClusterRegistry, HeaderEntry, MapStore,
    MemoryMedium, ModifiedHeaders, Result, SequenceStore, StorageConfig,
};

fn workspace_cluster(id: &str, medium: &MemoryMedium) -> Result<Cluster> {
    let config = ClusterConfig::new(format!("{}:cache", id))
        .allow(["projects", "members"])
        .with_timestamps(format!("{}:stamps", id))
        .with_headers(format!("{}:headers", id));

    Cluster::builder(config, Arc::new(medium.clone()))
        .storage(
            "projects",
            SequenceStore::<Value>::new(
                StorageConfig::default()
                    .with_ttl(Duration::from_secs(300))
                    .with_limit(50),
            ),
        )
        .storage("members", MapStore::<u64, Value>::default())
        .build()
}

#[tokio::test]
async fn test_registry_restore_all_after_persist() {
    let medium = MemoryMedium::new();

    let registry = ClusterRegistry::new();
    registry
        .create_many(["ws-1", "ws-2"], |id| workspace_cluster(id, &medium))
        .unwrap();
    assert_eq!(registry.ids(), vec!["ws-1", "ws-2"]);

    let ws1 = registry.cluster("ws-1").unwrap();
    let (projects, _) = ws1.get::<SequenceStore>("projects").unwrap();
    projects.add_item(-1, json!({"id": 1, "title": "Roadmap"}));
    let (members, _) = ws1.get::<MapStore<u64, Value>>("members").unwrap();
    members.add_item(42, json!({"name": "Grace"}));
    ws1.update_time("projects").unwrap();
    ws1.persist().await.unwrap();

    // fresh process: same medium, new registry
    let reloaded = ClusterRegistry::new();
    reloaded
        .create_many(["ws-1", "ws-2"], |id| workspace_cluster(id, &medium))
        .unwrap();
    reloaded.restore_all().await.unwrap();

    let ws1 = reloaded.cluster("ws-1").unwrap();
    let (projects, stale) = ws1.get::<SequenceStore>("projects").unwrap();
    assert!(!stale);
    assert_eq!(projects.get_all(), vec![json!({"id": 1, "title": "Roadmap"})]);

    let (members, _) = ws1.get::<MapStore<u64, Value>>("members").unwrap();
    assert_eq!(members.get_item(&42), Some(json!({"name": "Grace"})));

    let (other, _) = reloaded
        .cluster("ws-2")
        .unwrap()
        .get::<SequenceStore>("projects")
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn test_registry_destroy_clears_everything() {
    let medium = MemoryMedium::new();
    let registry = ClusterRegistry::new();
    registry
        .create("ws-1", || workspace_cluster("ws-1", &medium))
        .unwrap();

    let cluster = registry.cluster("ws-1").unwrap();
    cluster
        .get::<SequenceStore>("projects")
        .unwrap()
        .0
        .add_item(-1, json!(1));
    cluster.persist().await.unwrap();
    assert!(!medium.is_empty());

    registry.destroy().await.unwrap();

    assert!(medium.is_empty());
    assert!(cluster.get::<SequenceStore>("projects").unwrap().0.is_empty());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_registry_create_propagates_build_errors() {
    let registry = ClusterRegistry::new();
    let result = registry.create("bad", || {
        Cluster::builder(
            ClusterConfig::new("slot").with_headers("slot"),
            Arc::new(MemoryMedium::new()),
        )
        .build()
    });

    assert!(matches!(result, Err(CacheError::Config(_))));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_restore_all_stops_on_corrupt_cluster() {
    let medium = MemoryMedium::new();
    let registry = ClusterRegistry::new();
    registry
        .create("ws-1", || workspace_cluster("ws-1", &medium))
        .unwrap();

    medium.insert_raw("ws-1:cache", "{\"projects\": 12");
    let err = registry.restore_all().await.unwrap_err();
    assert!(err.is_parse_failure());
}

#[tokio::test]
async fn test_overflowing_snapshot_is_rejected_by_store() {
    let medium = MemoryMedium::new();
    let cluster = workspace_cluster("ws", &medium).unwrap();

    let oversized: Vec<Value> = (0..51).map(|i| json!(i)).collect();
    medium.insert_raw(
        "ws:cache",
        serde_json::to_string(&json!({"projects": oversized})).unwrap(),
    );
    cluster.restore().await.unwrap();

    assert!(cluster.get::<SequenceStore>("projects").unwrap().0.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_headers_survive_restore() {
    let medium = MemoryMedium::new();
    let cluster = workspace_cluster("ws", &medium).unwrap();

    cluster
        .update_headers(
            "projects",
            [("If-Modified-Since", "Wed, 21 Oct 2015 07:28:00 GMT"), ("ETag", "\"v1\"")],
            Some("2"),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let restored = workspace_cluster("ws", &medium).unwrap();
    restored.restore().await.unwrap();

    let pair = restored
        .get_modified_header("projects", Some("2"), &BTreeMap::new())
        .unwrap();
    assert_eq!(
        pair,
        HeaderEntry::Single(ModifiedHeaders::new(
            "Wed, 21 Oct 2015 07:28:00 GMT",
            "\"v1\""
        ))
    );
}

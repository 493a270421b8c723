use super::cache_cluster::Cluster;
use crate::core::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Clusters addressed by an external id (e.g. a workspace id)
#[derive(Clone, Default)]
pub struct ClusterRegistry {
    clusters: Arc<RwLock<HashMap<String, Cluster>>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the cluster built by `create` under `id`, replacing any previous one
    pub fn create<F>(&self, id: impl Into<String>, create: F) -> Result<&Self>
    where
        F: FnOnce() -> Result<Cluster>,
    {
        let id = id.into();
        let cluster = create()?;
        debug!("Registered cache cluster id={}", id);
        self.clusters.write().insert(id, cluster);
        Ok(self)
    }

    /// Register one cluster per id, built by `create`
    pub fn create_many<I, S, F>(&self, ids: I, mut create: F) -> Result<&Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(&str) -> Result<Cluster>,
    {
        for id in ids {
            let id = id.into();
            let cluster = create(&id)?;
            self.clusters.write().insert(id, cluster);
        }
        Ok(self)
    }

    pub fn cluster(&self, id: &str) -> Option<Cluster> {
        self.clusters.read().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clusters.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.clusters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.read().is_empty()
    }

    /// Drop pending deferred writes and clear every cluster
    pub async fn destroy(&self) -> Result<()> {
        for cluster in self.snapshot() {
            cluster.cancel_pending();
            cluster.clear().await?;
        }
        info!("Destroyed {} cache clusters", self.len());
        Ok(())
    }

    /// Restore every cluster; stops at the first failure
    pub async fn restore_all(&self) -> Result<()> {
        for cluster in self.snapshot() {
            cluster.restore().await?;
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<Cluster> {
        self.clusters.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;
    use crate::core::error::CacheError;
    use crate::core::sequence::SequenceStore;
    use crate::persistence::MemoryMedium;
    use serde_json::json;

    fn build(medium: &MemoryMedium, slot: &str) -> Result<Cluster> {
        Cluster::builder(ClusterConfig::new(slot).allow(["list"]), Arc::new(medium.clone()))
            .storage("list", SequenceStore::<serde_json::Value>::default())
            .build()
    }

    #[tokio::test]
    async fn test_create_replaces_existing_id() {
        let medium = MemoryMedium::new();
        let registry = ClusterRegistry::new();

        registry.create("ws", || build(&medium, "first")).unwrap();
        registry.create("ws", || build(&medium, "second")).unwrap();

        assert_eq!(registry.len(), 1);
        let cluster = registry.cluster("ws").unwrap();
        assert_eq!(cluster.config().persistence_name, "second");
    }

    #[tokio::test]
    async fn test_create_many_stops_on_failure() {
        let medium = MemoryMedium::new();
        let registry = ClusterRegistry::new();

        let result = registry.create_many(["a", "b", "c"], |id| {
            if id == "b" {
                Err(CacheError::Config("rejected".to_string()))
            } else {
                build(&medium, id)
            }
        });

        assert!(result.is_err());
        assert_eq!(registry.ids(), vec!["a"]);
        assert!(registry.cluster("c").is_none());
    }

    #[tokio::test]
    async fn test_destroy_keeps_registrations() {
        let medium = MemoryMedium::new();
        let registry = ClusterRegistry::new();
        registry.create("ws", || build(&medium, "slot")).unwrap();

        let cluster = registry.cluster("ws").unwrap();
        let (list, _) = cluster.get::<SequenceStore>("list").unwrap();
        list.add_item(-1, json!("x"));
        cluster.async_persist();

        registry.destroy().await.unwrap();

        assert_eq!(cluster.pending_tasks(), 0);
        assert!(list.is_empty());
        assert!(!medium.contains("slot"));
        assert_eq!(registry.ids(), vec!["ws"]);
    }
}

//! Pass-through store over an external async string key-value medium

use super::contract::{CacheStorage, Clear, ClusterStorage};
use super::error::Result;
use super::types::StorageConfig;
use crate::persistence::KeyValueMedium;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// String store whose contents live in a [`KeyValueMedium`]
///
/// It has no bulk export, so clusters never include it in snapshots; the
/// medium is expected to persist on its own.
#[derive(Clone)]
pub struct AsyncKeyValueStore {
    medium: Arc<dyn KeyValueMedium>,
    config: StorageConfig,
}

impl AsyncKeyValueStore {
    pub fn new(medium: Arc<dyn KeyValueMedium>) -> Self {
        Self::with_config(medium, StorageConfig::default())
    }

    pub fn with_config(medium: Arc<dyn KeyValueMedium>, config: StorageConfig) -> Self {
        Self { medium, config }
    }

    /// Remove every key from the medium
    pub async fn remove_all(&self) -> Result<()> {
        trace!("KV clear");
        self.medium.clear().await
    }
}

#[async_trait]
impl CacheStorage for AsyncKeyValueStore {
    type Key = String;
    type Value = String;
    type Lookup = Option<String>;

    fn config(&self) -> StorageConfig {
        self.config.clone()
    }

    async fn add_item(&self, key: String, data: String) -> Result<()> {
        trace!("KV set key={}", key);
        self.medium.set_item(&key, data).await
    }

    /// Same as `add_item`: the medium upserts
    async fn update_item(&self, key: String, data: String) -> Result<()> {
        self.add_item(key, data).await
    }

    async fn get_item(&self, key: &String) -> Result<Option<String>> {
        self.medium.get_item(key).await
    }

    async fn remove_item(&self, key: &String) -> Result<()> {
        self.medium.remove_item(key).await
    }
}

#[async_trait]
impl Clear for AsyncKeyValueStore {
    async fn clear(&self) -> Result<()> {
        self.remove_all().await
    }
}

impl ClusterStorage for AsyncKeyValueStore {
    fn ttl(&self) -> Option<Duration> {
        self.config.ttl
    }

    fn clearer(&self) -> Option<&dyn Clear> {
        Some(self)
    }

    fn kind(&self) -> &'static str {
        "key-value"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for AsyncKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncKeyValueStore")
            .field("limit", &self.config.limit)
            .field("ttl", &self.config.ttl)
            .finish()
    }
}

impl Default for AsyncKeyValueStore {
    fn default() -> Self {
        Self::new(Arc::new(crate::persistence::MemoryMedium::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pass_through() {
        let store = AsyncKeyValueStore::default();

        store.add_item("token".to_string(), "abc".to_string()).await.unwrap();
        assert_eq!(
            store.get_item(&"token".to_string()).await.unwrap().as_deref(),
            Some("abc")
        );

        store.update_item("token".to_string(), "def".to_string()).await.unwrap();
        assert_eq!(
            store.get_item(&"token".to_string()).await.unwrap().as_deref(),
            Some("def")
        );

        store.remove_item(&"token".to_string()).await.unwrap();
        assert_eq!(store.get_item(&"token".to_string()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shares_medium() {
        let medium = Arc::new(crate::persistence::MemoryMedium::new());
        let store = AsyncKeyValueStore::new(medium.clone());

        store.add_item("a".to_string(), "1".to_string()).await.unwrap();
        assert_eq!(medium.raw("a").as_deref(), Some("1"));

        store.remove_all().await.unwrap();
        assert!(medium.is_empty());
    }

    #[test]
    fn test_has_no_bulk_capability() {
        let store = AsyncKeyValueStore::default();
        assert!(store.bulk().is_none());
        assert!(store.clearer().is_some());
        assert_eq!(store.kind(), "key-value");
    }
}

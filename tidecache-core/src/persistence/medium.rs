use crate::core::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// String-valued slot storage a cluster persists into
#[async_trait]
pub trait PersistStorage: Send + Sync {
    /// Read a slot; `None` when it was never written
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Async string key-value medium behind an `AsyncKeyValueStore`
#[async_trait]
pub trait KeyValueMedium: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    async fn set_item(&self, key: &str, value: String) -> Result<()>;

    async fn remove_item(&self, key: &str) -> Result<()>;

    /// Drop every key held by the medium
    async fn clear(&self) -> Result<()>;
}

/// In-process medium; clones share the same slots
#[derive(Clone, Default)]
pub struct MemoryMedium {
    slots: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots currently held
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.read().contains_key(key)
    }

    /// Raw slot contents
    pub fn raw(&self, key: &str) -> Option<String> {
        self.slots.read().get(key).cloned()
    }

    /// Write a slot directly, bypassing any cluster
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.slots.write().insert(key.into(), value.into());
    }
}

#[async_trait]
impl PersistStorage for MemoryMedium {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        trace!("MEDIUM set key={} size={}", key, value.len());
        self.slots.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        trace!("MEDIUM delete key={}", key);
        self.slots.write().remove(key);
        Ok(())
    }
}

#[async_trait]
impl KeyValueMedium for MemoryMedium {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.get_string(key).await
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.set(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.delete(key).await
    }

    async fn clear(&self) -> Result<()> {
        self.slots.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let medium = MemoryMedium::new();
        assert_eq!(medium.get_string("slot").await.unwrap(), None);

        medium.set("slot", "value".to_string()).await.unwrap();
        assert_eq!(medium.get_string("slot").await.unwrap().as_deref(), Some("value"));

        medium.delete("slot").await.unwrap();
        medium.delete("slot").await.unwrap();
        assert!(medium.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_slots() {
        let medium = MemoryMedium::new();
        let handle = medium.clone();

        handle.set_item("k", "v".to_string()).await.unwrap();
        assert!(medium.contains("k"));

        KeyValueMedium::clear(&medium).await.unwrap();
        assert!(handle.is_empty());
    }
}

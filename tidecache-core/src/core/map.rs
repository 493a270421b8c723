//! Key-addressed map store
//!
//! Backed by an `IndexMap` so iteration follows write order: `find` scans
//! in that order and re-inserting a key moves it to the back.
//!
//! Persisted form is a flat JSON object; keys cross that boundary as
//! strings through `Display` / `FromStr`.

use super::contract::{
    BulkExport, BulkStorage, CacheStorage, Clear, ClusterStorage, MergeStorage, Searchable,
    SpecificItems,
};
use super::error::{CacheError, Result};
use super::merge::{Mergeable, merge};
use super::types::{Found, MergeStrategy, StorageConfig};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Map-backed store addressed by key
#[derive(Clone)]
pub struct MapStore<K = String, T = Value> {
    data: Arc<RwLock<IndexMap<K, T>>>,
    config: Arc<RwLock<StorageConfig>>,
}

impl<K, T> MapStore<K, T> {
    /// Create a new map store
    pub fn new(config: StorageConfig) -> Self {
        Self {
            data: Arc::new(RwLock::new(IndexMap::new())),
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn limit(&self) -> usize {
        self.config.read().limit.max(1)
    }

    fn merge_strategy(&self) -> MergeStrategy {
        self.config.read().merge_strategy
    }
}

impl<K: Hash + Eq, T> MapStore<K, T> {
    /// Insert into `data`, clearing it first when a new key would overflow
    fn insert_bounded(data: &mut IndexMap<K, T>, limit: usize, key: K, item: T) {
        if !data.contains_key(&key) && data.len() >= limit {
            debug!("MAP overflow at limit={}, resetting store", limit);
            data.clear();
        }
        data.insert(key, item);
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.data.read().contains_key(key)
    }
}

impl<K: Hash + Eq + Clone, T: Clone + Mergeable> MapStore<K, T> {
    /// Insert `item` as the most recently written entry
    pub fn add_item(&self, key: K, item: T) {
        let limit = self.limit();
        let mut data = self.data.write();
        data.shift_remove(&key);
        Self::insert_bounded(&mut data, limit, key, item);
        trace!("MAP add size={}", data.len());
    }

    /// Replace the entry in place, or add it when absent
    pub fn update_item(&self, key: K, item: T) {
        {
            let mut data = self.data.write();
            if let Some(slot) = data.get_mut(&key) {
                *slot = item;
                return;
            }
        }
        self.add_item(key, item);
    }

    /// Entry for `key`, or `None`
    pub fn get_item(&self, key: &K) -> Option<T> {
        self.data.read().get(key).cloned()
    }

    pub fn remove_item(&self, key: &K) {
        self.data.write().shift_remove(key);
    }
}

impl<K: Hash + Eq + Clone, T: Clone> BulkStorage for MapStore<K, T> {
    type Snapshot = IndexMap<K, T>;

    fn get_all(&self) -> IndexMap<K, T> {
        self.data.read().clone()
    }

    /// Write every entry of `entries`, keeping existing keys in place
    fn set_all(&self, entries: IndexMap<K, T>) {
        let limit = self.limit();
        if entries.len() > limit {
            warn!(
                "MAP set_all rejected: {} entries exceeds limit {}",
                entries.len(),
                limit
            );
            return;
        }

        let mut data = self.data.write();
        let added = entries.keys().filter(|key| !data.contains_key(*key)).count();
        if data.len() + added > limit {
            debug!("MAP set_all overflows limit={}, resetting store", limit);
            data.clear();
        }
        data.extend(entries);
    }

    fn remove_all(&self) {
        self.data.write().clear();
    }
}

impl<K: Hash + Eq + Clone, T: Clone + Mergeable> MergeStorage for MapStore<K, T> {
    type Key = K;
    type Value = T;
    type Bulk = IndexMap<K, T>;

    /// Merge `entries` into the store as one record
    ///
    /// Under `MergeShallow` incoming entries replace existing ones key by key,
    /// `MergeDeep` merges each colliding entry, `Overwrite` replaces the whole
    /// map.
    fn assign(&self, entries: IndexMap<K, T>) {
        let limit = self.limit();
        let strategy = self.merge_strategy();
        let mut data = self.data.write();

        if strategy == MergeStrategy::Overwrite {
            if entries.len() > limit {
                warn!("MAP assign rejected: {} entries exceeds limit {}", entries.len(), limit);
                return;
            }
            *data = entries;
            return;
        }

        for (key, item) in entries {
            let item = match strategy {
                MergeStrategy::MergeDeep => match data.get(&key).cloned() {
                    Some(existing) => merge(Some(existing), Some(item.clone()), strategy).unwrap_or(item),
                    None => item,
                },
                _ => item,
            };
            Self::insert_bounded(&mut data, limit, key, item);
        }
    }

    /// Merge into the entry at `key`; primitives replace it, absent keys are added
    fn update_item_chunk(&self, key: K, chunk: T) {
        let strategy = self.merge_strategy();
        let limit = self.limit();
        let mut data = self.data.write();

        let item = match data.get(&key) {
            Some(existing) if !chunk.is_primitive() => {
                merge(Some(existing.clone()), Some(chunk.clone()), strategy).unwrap_or(chunk)
            }
            _ => chunk,
        };
        Self::insert_bounded(&mut data, limit, key, item);
    }
}

impl<K: Hash + Eq, T: Clone> SpecificItems for MapStore<K, T> {
    type Key = K;
    type Value = T;

    /// Entries for the requested keys that exist, in request order
    fn get_specific_items(&self, keys: &[K]) -> Vec<T> {
        let data = self.data.read();
        keys.iter().filter_map(|key| data.get(key).cloned()).collect()
    }
}

impl<K: Clone, T: Clone> Searchable for MapStore<K, T> {
    type Key = K;
    type Value = T;

    fn find<F>(&self, mut predicate: F) -> Option<Found<K, T>>
    where
        F: FnMut(&T) -> bool,
    {
        self.data
            .read()
            .iter()
            .find(|&(_, item)| predicate(item))
            .map(|(key, item)| Found {
                index: key.clone(),
                item: item.clone(),
            })
    }
}

impl<K, T> Default for MapStore<K, T> {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

#[async_trait]
impl<K, T> CacheStorage for MapStore<K, T>
where
    K: Hash + Eq + Clone + Send + Sync,
    T: Clone + Mergeable + Send + Sync,
{
    type Key = K;
    type Value = T;
    type Lookup = Option<T>;

    fn config(&self) -> StorageConfig {
        self.config.read().clone()
    }

    async fn add_item(&self, key: K, data: T) -> Result<()> {
        MapStore::add_item(self, key, data);
        Ok(())
    }

    async fn update_item(&self, key: K, data: T) -> Result<()> {
        MapStore::update_item(self, key, data);
        Ok(())
    }

    async fn get_item(&self, key: &K) -> Result<Option<T>> {
        Ok(MapStore::get_item(self, key))
    }

    async fn remove_item(&self, key: &K) -> Result<()> {
        MapStore::remove_item(self, key);
        Ok(())
    }
}

impl<K, T> BulkExport for MapStore<K, T>
where
    K: Hash + Eq + Clone + Display + FromStr + Send + Sync,
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn export(&self) -> Result<Value> {
        let data = self.data.read();
        let mut object = serde_json::Map::with_capacity(data.len());
        for (key, item) in data.iter() {
            object.insert(key.to_string(), serde_json::to_value(item)?);
        }
        Ok(Value::Object(object))
    }

    fn import(&self, data: Value) -> Result<()> {
        let raw: IndexMap<String, T> = serde_json::from_value(data)?;
        let entries = raw
            .into_iter()
            .map(|(key, item)| {
                K::from_str(&key)
                    .map(|key| (key, item))
                    .map_err(|_| CacheError::InvalidKey(key))
            })
            .collect::<Result<IndexMap<K, T>>>()?;
        self.set_all(entries);
        Ok(())
    }
}

#[async_trait]
impl<K, T> Clear for MapStore<K, T>
where
    K: Hash + Eq + Clone + Send + Sync,
    T: Clone + Send + Sync,
{
    async fn clear(&self) -> Result<()> {
        self.remove_all();
        Ok(())
    }
}

impl<K, T> ClusterStorage for MapStore<K, T>
where
    K: Hash + Eq + Clone + Display + FromStr + Send + Sync + 'static,
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn ttl(&self) -> Option<Duration> {
        self.config.read().ttl
    }

    fn bulk(&self) -> Option<&dyn BulkExport> {
        Some(self)
    }

    fn clearer(&self) -> Option<&dyn Clear> {
        Some(self)
    }

    fn set_merge_strategy(&self, strategy: MergeStrategy) {
        self.config.write().merge_strategy = strategy;
    }

    fn kind(&self) -> &'static str {
        "map"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

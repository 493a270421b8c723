//! Index-addressed sequence store
//!
//! Entries live in a `Vec` guarded by a `parking_lot::RwLock`; the handle is
//! cheap to clone and every clone shares the same contents.
//!
//! # Capacity
//! ```text
//! SequenceStore
//!   ├─ len <= limit at all times
//!   └─ an append that would exceed limit clears the whole sequence first
//! ```

use super::contract::{
    BulkExport, BulkStorage, CacheStorage, Clear, ClusterStorage, MergeStorage, Searchable,
    SpecificItems,
};
use super::error::Result;
use super::merge::{Mergeable, merge};
use super::types::{Found, MergeStrategy, StorageConfig};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Append/overwrite store addressed by position
#[derive(Clone)]
pub struct SequenceStore<T = Value> {
    data: Arc<RwLock<Vec<T>>>,
    config: Arc<RwLock<StorageConfig>>,
}

impl<T> SequenceStore<T> {
    /// Create a new sequence store
    pub fn new(config: StorageConfig) -> Self {
        Self {
            data: Arc::new(RwLock::new(Vec::new())),
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

    /// Resolve `index` to an existing slot
    fn slot(index: i64, len: usize) -> Option<usize> {
        usize::try_from(index).ok().filter(|&i| i < len)
    }
}

impl<T: Clone + Mergeable> SequenceStore<T> {
    /// Insert at `index`
    ///
    /// An index of `-1` (or any negative index) or one at/after the end
    /// appends; otherwise the entry at `index` is overwritten.
    pub fn add_item(&self, index: i64, item: T) {
        let limit = self.limit();
        let mut data = self.data.write();

        match Self::slot(index, data.len()) {
            Some(slot) => {
                trace!("SEQ overwrite index={}", slot);
                data[slot] = item;
            }
            None => {
                if data.len() >= limit {
                    debug!("SEQ overflow at limit={}, resetting store", limit);
                    data.clear();
                }
                data.push(item);
                trace!("SEQ append len={}", data.len());
            }
        }
    }

    /// Replace the entry at `index`; out-of-range indexes are ignored
    pub fn update_item(&self, index: i64, item: T) {
        let mut data = self.data.write();
        if let Some(slot) = Self::slot(index, data.len()) {
            data[slot] = item;
        } else {
            trace!("SEQ update ignored, index={} out of range", index);
        }
    }

    /// Entry at `index`, or the empty-sequence sentinel when out of range
    pub fn get_item(&self, index: i64) -> T {
        let data = self.data.read();
        Self::slot(index, data.len())
            .map(|slot| data[slot].clone())
            .unwrap_or_else(T::empty_sequence)
    }

    /// Remove exactly the entry at `index`, shifting later entries down
    pub fn remove_item(&self, index: i64) {
        let mut data = self.data.write();
        if let Some(slot) = Self::slot(index, data.len()) {
            data.remove(slot);
        }
    }
}

impl<T: Clone> BulkStorage for SequenceStore<T> {
    type Snapshot = Vec<T>;

    fn get_all(&self) -> Vec<T> {
        self.data.read().clone()
    }

    /// Replace the contents; payloads larger than the limit are rejected
    fn set_all(&self, items: Vec<T>) {
        let limit = self.limit();
        if items.len() > limit {
            warn!(
                "SEQ set_all rejected: {} items exceeds limit {}",
                items.len(),
                limit
            );
            return;
        }
        *self.data.write() = items;
    }

    fn remove_all(&self) {
        self.data.write().clear();
    }
}

impl<T: Clone + Mergeable> MergeStorage for SequenceStore<T> {
    type Key = i64;
    type Value = T;
    type Bulk = Vec<T>;

    /// Append `items`, or replace the contents under `Overwrite`
    ///
    /// The result still honors the limit: a payload larger than the limit is
    /// rejected, and one that would overflow resets the store first.
    fn assign(&self, items: Vec<T>) {
        if items.is_empty() {
            return;
        }

        let limit = self.limit();
        if items.len() > limit {
            warn!("SEQ assign rejected: {} items exceeds limit {}", items.len(), limit);
            return;
        }

        let strategy = self.merge_strategy();
        let mut data = self.data.write();
        if strategy == MergeStrategy::Overwrite || data.len() + items.len() > limit {
            data.clear();
        }
        data.extend(items);
    }

    /// Merge into the entry at `index`; primitives replace it outright
    fn update_item_chunk(&self, index: i64, chunk: T) {
        let strategy = self.merge_strategy();
        let mut data = self.data.write();
        let Some(slot) = Self::slot(index, data.len()) else {
            return;
        };

        if chunk.is_primitive() {
            data[slot] = chunk;
            return;
        }

        let existing = data[slot].clone();
        if let Some(merged) = merge(Some(existing), Some(chunk), strategy) {
            data[slot] = merged;
        }
    }
}

impl<T: Clone> SpecificItems for SequenceStore<T> {
    type Key = i64;
    type Value = T;

    /// Entries at the requested indexes that exist, in request order
    fn get_specific_items(&self, indexes: &[i64]) -> Vec<T> {
        let data = self.data.read();
        indexes
            .iter()
            .filter_map(|&index| Self::slot(index, data.len()))
            .map(|slot| data[slot].clone())
            .collect()
    }
}

impl<T: Clone> Searchable for SequenceStore<T> {
    type Key = usize;
    type Value = T;

    fn find<F>(&self, mut predicate: F) -> Option<Found<usize, T>>
    where
        F: FnMut(&T) -> bool,
    {
        let data = self.data.read();
        data.iter()
            .position(|item| predicate(item))
            .map(|index| Found {
                index,
                item: data[index].clone(),
            })
    }
}

impl<T> Default for SequenceStore<T> {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

#[async_trait]
impl<T> CacheStorage for SequenceStore<T>
where
    T: Clone + Mergeable + Send + Sync,
{
    type Key = i64;
    type Value = T;
    type Lookup = T;

    fn config(&self) -> StorageConfig {
        self.config.read().clone()
    }

    async fn add_item(&self, key: i64, data: T) -> Result<()> {
        SequenceStore::add_item(self, key, data);
        Ok(())
    }

    async fn update_item(&self, key: i64, data: T) -> Result<()> {
        SequenceStore::update_item(self, key, data);
        Ok(())
    }

    async fn get_item(&self, key: &i64) -> Result<T> {
        Ok(SequenceStore::get_item(self, *key))
    }

    async fn remove_item(&self, key: &i64) -> Result<()> {
        SequenceStore::remove_item(self, *key);
        Ok(())
    }
}

impl<T> BulkExport for SequenceStore<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn export(&self) -> Result<Value> {
        Ok(serde_json::to_value(&*self.data.read())?)
    }

    fn import(&self, data: Value) -> Result<()> {
        let items: Vec<T> = serde_json::from_value(data)?;
        self.set_all(items);
        Ok(())
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> Clear for SequenceStore<T> {
    async fn clear(&self) -> Result<()> {
        self.remove_all();
        Ok(())
    }
}

impl<T> ClusterStorage for SequenceStore<T>
where
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
        "sequence"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! Storage contract shared by every cache backend
//!
//! [`CacheStorage`] is the required operation set. Bulk access, merging,
//! subset fetches and scans are separate capability traits: a backend opts
//! into each one, and generic callers state the capabilities they need as
//! trait bounds. Inside a [`Cluster`](crate::cluster::Cluster) members are
//! held as [`ClusterStorage`] trait objects and probed for capabilities
//! through the `bulk()` / `clearer()` accessors.

use super::error::Result;
use super::types::{Found, MergeStrategy, StorageConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::time::Duration;

/// Required operations of a cache backend
///
/// In-memory stores complete every call synchronously; backends over an
/// external medium suspend at the medium boundary.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    type Key: Send + Sync;
    type Value: Send;
    /// What `get_item` returns; carries the backend's absent sentinel
    type Lookup: Send;

    /// Current store configuration
    fn config(&self) -> StorageConfig;

    /// Insert, resetting the store first when it is full
    async fn add_item(&self, key: Self::Key, data: Self::Value) -> Result<()>;

    /// Replace an existing entry
    async fn update_item(&self, key: Self::Key, data: Self::Value) -> Result<()>;

    /// Fetch an entry, or the absent sentinel
    async fn get_item(&self, key: &Self::Key) -> Result<Self::Lookup>;

    /// Remove an entry if present
    async fn remove_item(&self, key: &Self::Key) -> Result<()>;
}

/// Full bulk export and import
pub trait BulkStorage {
    type Snapshot;

    fn get_all(&self) -> Self::Snapshot;

    fn set_all(&self, data: Self::Snapshot);

    fn remove_all(&self);
}

/// Merge-based writes following the store's [`MergeStrategy`]
pub trait MergeStorage {
    type Key;
    type Value;
    type Bulk;

    /// Merge a bulk payload into the existing contents
    fn assign(&self, data: Self::Bulk);

    /// Partially update one entry
    fn update_item_chunk(&self, key: Self::Key, data: Self::Value);
}

/// Fetch a subset of entries
pub trait SpecificItems {
    type Key;
    type Value;

    fn get_specific_items(&self, keys: &[Self::Key]) -> Vec<Self::Value>;
}

/// Linear scan for the first matching entry
pub trait Searchable {
    type Key;
    type Value;

    fn find<F>(&self, predicate: F) -> Option<Found<Self::Key, Self::Value>>
    where
        F: FnMut(&Self::Value) -> bool;
}

/// JSON bulk export used by cluster persistence
pub trait BulkExport: Send + Sync {
    /// Export contents in their persisted form
    fn export(&self) -> Result<Value>;

    /// Replace or extend contents from their persisted form
    fn import(&self, data: Value) -> Result<()>;
}

/// Full clear, possibly crossing an external medium
#[async_trait]
pub trait Clear: Send + Sync {
    async fn clear(&self) -> Result<()>;
}

/// A store owned by a cluster
pub trait ClusterStorage: Send + Sync + 'static {
    /// Lifetime granted by `Cluster::update_time`; `None` never expires
    fn ttl(&self) -> Option<Duration>;

    /// Bulk export capability, if supported
    fn bulk(&self) -> Option<&dyn BulkExport> {
        None
    }

    /// Full clear capability, if supported
    fn clearer(&self) -> Option<&dyn Clear> {
        None
    }

    /// Override the store's merge strategy
    fn set_merge_strategy(&self, _strategy: MergeStrategy) {}

    /// Backend name for diagnostics
    fn kind(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

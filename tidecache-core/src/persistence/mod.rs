//! Persistence module for cluster snapshots
//!
//! Provides the external medium contracts consumed by the cache:
//! - [`PersistStorage`] holds the serialized contents/stamps/headers slots
//! - [`KeyValueMedium`] backs [`AsyncKeyValueStore`](crate::core::AsyncKeyValueStore)
//! - [`MemoryMedium`] is an in-process implementation of both

pub mod medium;
pub mod snapshot;

pub use medium::{KeyValueMedium, MemoryMedium, PersistStorage};
pub use snapshot::{ClusterSnapshot, SlotNames};

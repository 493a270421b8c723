//! # tidecache
//!
//! Client-side cache layer grouping several keyed stores into one
//! addressable cluster.
//!
//! - **Stores**: [`SequenceStore`] (index-addressed), [`MapStore`]
//!   (key-addressed) and [`AsyncKeyValueStore`] (pass-through to an async
//!   string medium), all bounded by a capacity that resets the store on
//!   overflow
//! - **Clusters**: per-store expiry stamps, cached conditional request
//!   headers, and a three-slot snapshot persisted to a [`PersistStorage`]
//! - **Registry**: clusters looked up by an external id
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tidecache::{Cluster, ClusterConfig, MemoryMedium, SequenceStore, StorageConfig};
//!
//! # async fn run() -> tidecache::Result<()> {
//! let config = ClusterConfig::new("feed")
//!     .allow(["posts"])
//!     .with_timestamps("feed:stamps");
//! let cluster = Cluster::builder(config, Arc::new(MemoryMedium::new()))
//!     .storage("posts", SequenceStore::<serde_json::Value>::new(StorageConfig::default()))
//!     .build()?;
//!
//! cluster.restore().await?;
//! if let Some((posts, stale)) = cluster.get::<SequenceStore>("posts") {
//!     if stale {
//!         posts.add_item(-1, serde_json::json!({"id": 1}));
//!         cluster.update_time("posts")?;
//!         cluster.async_persist();
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod config;
pub mod core;
pub mod persistence;

pub use crate::cluster::{
    Clock, Cluster, ClusterBuilder, ClusterRegistry, ErrorHook, HeaderEntry, ManualClock,
    ModifiedHeaders, SchedulePolicy, Scheduler, SystemClock, TokioScheduler,
};
pub use config::{CacheFileConfig, ClusterConfig, LoggingConfig};
pub use crate::core::{
    AsyncKeyValueStore, BulkExport, BulkStorage, CacheError, CacheStorage, Clear, ClusterStorage,
    Found, MapStore, MergeStorage, MergeStrategy, Mergeable, Result, Searchable, SequenceStore,
    SpecificItems, StorageConfig,
};
pub use persistence::{ClusterSnapshot, KeyValueMedium, MemoryMedium, PersistStorage, SlotNames};

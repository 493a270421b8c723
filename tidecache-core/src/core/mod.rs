pub mod contract;
pub mod error;
pub mod kv;
pub mod map;
pub mod merge;
pub mod sequence;
pub mod types;

pub use contract::{
    BulkExport, BulkStorage, CacheStorage, Clear, ClusterStorage, MergeStorage, Searchable,
    SpecificItems,
};
pub use error::{CacheError, Result};
pub use kv::AsyncKeyValueStore;
pub use map::MapStore;
pub use merge::{Mergeable, Shape, merge};
pub use sequence::SequenceStore;
pub use types::{DEFAULT_LIMIT, Found, MergeStrategy, StorageConfig, expiry_after, far_future};

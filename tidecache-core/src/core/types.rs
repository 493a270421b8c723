use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Default capacity of a store when none is configured
pub const DEFAULT_LIMIT: usize = 1000;

/// How partial updates and bulk assigns combine existing and incoming values
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Recursive merge of nested records
    MergeDeep,
    /// Flat merge: top-level fields of the incoming value win
    #[default]
    MergeShallow,
    /// Incoming value replaces the existing one
    Overwrite,
}

/// Configuration for a single store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Time-to-live applied by `Cluster::update_time`; `None` never expires
    #[serde(default, with = "ttl_millis")]
    pub ttl: Option<Duration>,
    /// Maximum number of entries before the store is reset; at least 1
    #[serde(default = "default_limit", deserialize_with = "limit_at_least_one")]
    pub limit: usize,
    /// Merge behavior for `assign` and `update_item_chunk`
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn limit_at_least_one<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    Ok(usize::deserialize(d)?.max(1))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ttl: None,
            limit: DEFAULT_LIMIT,
            merge_strategy: MergeStrategy::default(),
        }
    }
}

impl StorageConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = strategy;
        self
    }
}

/// Result of a successful `find` scan
#[derive(Debug, Clone, PartialEq)]
pub struct Found<K, T> {
    pub index: K,
    pub item: T,
}

/// Latest representable expiry, used for stores that never expire
pub fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Expiry stamp for a store refreshed at `now`
pub fn expiry_after(now: DateTime<Utc>, ttl: Option<Duration>) -> DateTime<Utc> {
    let Some(ttl) = ttl else {
        return far_future();
    };

    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .map(|stamp| stamp.min(far_future()))
        .unwrap_or_else(far_future)
}

mod ttl_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match ttl {
            Some(ttl) => s.serialize_some(&u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_after_ttl() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let stamp = expiry_after(now, Some(Duration::from_secs(60)));
        assert_eq!(stamp, Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap());
    }

    #[test]
    fn test_expiry_without_ttl_never_expires() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, None), far_future());
    }

    #[test]
    fn test_expiry_saturates() {
        let now = Utc::now();
        let stamp = expiry_after(now, Some(Duration::from_secs(u64::MAX / 4)));
        assert_eq!(stamp, far_future());
    }

    #[test]
    fn test_storage_config_from_json() {
        let config: StorageConfig =
            serde_json::from_str(r#"{"ttl": 1500, "merge_strategy": "overwrite"}"#).unwrap();
        assert_eq!(config.ttl, Some(Duration::from_millis(1500)));
        assert_eq!(config.limit, DEFAULT_LIMIT);
        assert_eq!(config.merge_strategy, MergeStrategy::Overwrite);
    }

    #[test]
    fn test_zero_limit_is_raised_to_one() {
        let config: StorageConfig = serde_json::from_str(r#"{"limit": 0}"#).unwrap();
        assert_eq!(config.limit, 1);
        assert_eq!(StorageConfig::default().with_limit(0).limit, 1);
    }

    #[test]
    fn test_huge_ttl_serializes_saturated() {
        let config = StorageConfig::default().with_ttl(Duration::MAX);
        let encoded = serde_json::to_value(&config).unwrap();
        assert_eq!(encoded["ttl"], serde_json::json!(u64::MAX));
    }
}

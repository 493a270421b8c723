use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cluster::SchedulePolicy;
use crate::core::{CacheError, MergeStrategy, Result};
use crate::persistence::SlotNames;

/// Configuration file holding logging settings and named cluster configs
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheFileConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub clusters: HashMap<String, ClusterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Per-cluster configuration, fixed at construction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
    /// Storage names included in persistence
    #[serde(default)]
    pub allow: Vec<String>,
    /// When set, overrides the merge strategy of every member store
    #[serde(default)]
    pub merge_strategy: Option<MergeStrategy>,
    /// Slot holding the contents snapshot
    pub persistence_name: String,
    /// Slot holding expiry stamps; persistence of stamps is off when unset
    #[serde(default)]
    pub timestamps_name: Option<String>,
    /// Slot holding conditional headers; persistence of headers is off when unset
    #[serde(default)]
    pub headers_name: Option<String>,
    /// Delay before an `async_persist` write
    #[serde(default = "default_persist_delay_ms")]
    pub persist_delay_ms: u64,
    /// Delay before an `update_headers` assignment and write
    #[serde(default = "default_headers_delay_ms")]
    pub headers_delay_ms: u64,
    #[serde(default)]
    pub schedule_policy: SchedulePolicy,
}

fn default_persist_delay_ms() -> u64 {
    100
}

fn default_headers_delay_ms() -> u64 {
    1000
}

impl ClusterConfig {
    pub fn new(persistence_name: impl Into<String>) -> Self {
        Self {
            allow: Vec::new(),
            merge_strategy: None,
            persistence_name: persistence_name.into(),
            timestamps_name: None,
            headers_name: None,
            persist_delay_ms: default_persist_delay_ms(),
            headers_delay_ms: default_headers_delay_ms(),
            schedule_policy: SchedulePolicy::default(),
        }
    }

    pub fn allow<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_timestamps(mut self, name: impl Into<String>) -> Self {
        self.timestamps_name = Some(name.into());
        self
    }

    pub fn with_headers(mut self, name: impl Into<String>) -> Self {
        self.headers_name = Some(name.into());
        self
    }

    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.merge_strategy = Some(strategy);
        self
    }

    pub fn with_schedule_policy(mut self, policy: SchedulePolicy) -> Self {
        self.schedule_policy = policy;
        self
    }

    pub fn persist_delay(&self) -> Duration {
        Duration::from_millis(self.persist_delay_ms)
    }

    pub fn headers_delay(&self) -> Duration {
        Duration::from_millis(self.headers_delay_ms)
    }

    /// Slot names derived from this config
    pub fn slots(&self) -> SlotNames {
        SlotNames {
            contents: self.persistence_name.clone(),
            timestamps: self.timestamps_name.clone(),
            headers: self.headers_name.clone(),
        }
    }

    /// Reject configs whose slots are missing or overlap
    pub fn validate(&self) -> Result<()> {
        if self.persistence_name.trim().is_empty() {
            return Err(CacheError::Config("persistence_name must not be empty".to_string()));
        }

        let mut seen = vec![self.persistence_name.as_str()];
        for name in [&self.timestamps_name, &self.headers_name].into_iter().flatten() {
            if name.trim().is_empty() {
                return Err(CacheError::Config("slot names must not be empty".to_string()));
            }
            if seen.contains(&name.as_str()) {
                return Err(CacheError::Config(format!("slot name '{}' is used twice", name)));
            }
            seen.push(name);
        }

        Ok(())
    }
}

impl CacheFileConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text, validating every cluster
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let config: CacheFileConfig = serde_yaml::from_str(content)?;
        for (id, cluster) in &config.clusters {
            cluster
                .validate()
                .map_err(|e| anyhow::anyhow!("cluster '{}': {}", id, e))?;
        }
        Ok(config)
    }

    pub fn cluster(&self, id: &str) -> Option<&ClusterConfig> {
        self.clusters.get(id)
    }
}

impl LoggingConfig {
    /// Install a global `tracing` subscriber
    ///
    /// `RUST_LOG` takes precedence over the configured level. Returns an
    /// error when a subscriber is already installed.
    pub fn init(&self) -> anyhow::Result<()> {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.level));

        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        let installed = if self.format == "json" {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;
        Ok(())
    }
}

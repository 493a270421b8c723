use super::clock::{Clock, SystemClock};
use super::headers::{HeaderEntry, ModifiedHeaders};
use super::scheduler::{ErrorHook, Scheduler, TokioScheduler, log_errors};
use crate::config::ClusterConfig;
use crate::core::contract::ClusterStorage;
use crate::core::error::{CacheError, Result};
use crate::core::types::expiry_after;
use crate::persistence::snapshot::{HeaderMap, StampMap};
use crate::persistence::{ClusterSnapshot, PersistStorage, SlotNames};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Map;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// A named group of stores sharing one persistence and staleness unit
///
/// The handle is cheap to clone; deferred tasks hold their own clone.
#[derive(Clone)]
pub struct Cluster {
    inner: Arc<ClusterInner>,
}

struct ClusterInner {
    storages: IndexMap<String, Arc<dyn ClusterStorage>>,
    config: ClusterConfig,
    slots: SlotNames,
    medium: Arc<dyn PersistStorage>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    error_hook: ErrorHook,
    stamps: RwLock<StampMap>,
    headers: RwLock<HeaderMap>,
}

/// Builder for [`Cluster`]
pub struct ClusterBuilder {
    config: ClusterConfig,
    medium: Arc<dyn PersistStorage>,
    storages: IndexMap<String, Arc<dyn ClusterStorage>>,
    clock: Option<Arc<dyn Clock>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    error_hook: Option<ErrorHook>,
}

impl ClusterBuilder {
    /// Add a store under `name`; a later store with the same name replaces it
    pub fn storage<S: ClusterStorage>(mut self, name: impl Into<String>, storage: S) -> Self {
        self.storages.insert(name.into(), Arc::new(storage));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Hook receiving failures of deferred persistence
    pub fn on_error(mut self, hook: ErrorHook) -> Self {
        self.error_hook = Some(hook);
        self
    }

    pub fn build(self) -> Result<Cluster> {
        self.config.validate()?;

        for name in &self.config.allow {
            if !self.storages.contains_key(name) {
                warn!("Persistence allow-list names unknown storage '{}'", name);
            }
        }

        if let Some(strategy) = self.config.merge_strategy {
            for storage in self.storages.values() {
                storage.set_merge_strategy(strategy);
            }
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioScheduler::new(self.config.schedule_policy)));

        let now = clock.now();
        let stamps = self.storages.keys().map(|name| (name.clone(), now)).collect();
        let headers = self
            .storages
            .keys()
            .map(|name| (name.clone(), HeaderEntry::default()))
            .collect();

        info!(
            "Initializing cache cluster slot={} storages={} persisted={}",
            self.config.persistence_name,
            self.storages.len(),
            self.config.allow.len()
        );

        Ok(Cluster {
            inner: Arc::new(ClusterInner {
                slots: self.config.slots(),
                storages: self.storages,
                config: self.config,
                medium: self.medium,
                clock,
                scheduler,
                error_hook: self.error_hook.unwrap_or_else(log_errors),
                stamps: RwLock::new(stamps),
                headers: RwLock::new(headers),
            }),
        })
    }
}

impl Cluster {
    /// Start building a cluster persisting into `medium`
    pub fn builder(config: ClusterConfig, medium: Arc<dyn PersistStorage>) -> ClusterBuilder {
        ClusterBuilder {
            config,
            medium,
            storages: IndexMap::new(),
            clock: None,
            scheduler: None,
            error_hook: None,
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.inner.config
    }

    /// Storage names in construction order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.storages.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.storages.contains_key(name)
    }

    /// Typed handle to the store `name` plus its staleness flag
    ///
    /// Returns `None` when the cluster has no such store or it is not an `S`.
    pub fn get<S>(&self, name: &str) -> Option<(S, bool)>
    where
        S: ClusterStorage + Clone,
    {
        let storage = self.inner.storages.get(name)?;
        let typed = storage.as_any().downcast_ref::<S>()?.clone();
        Some((typed, self.is_stale(name)))
    }

    /// Untyped handle to the store `name` plus its staleness flag
    pub fn get_dyn(&self, name: &str) -> Option<(Arc<dyn ClusterStorage>, bool)> {
        let storage = self.inner.storages.get(name)?.clone();
        Some((storage, self.is_stale(name)))
    }

    /// True when the stamp for `name` lies strictly before now
    ///
    /// A store without a stamp is stale.
    pub fn is_stale(&self, name: &str) -> bool {
        let now = self.inner.clock.now();
        self.inner
            .stamps
            .read()
            .get(name)
            .is_none_or(|stamp| *stamp < now)
    }

    /// Push the expiry of `name` to now + its TTL
    pub fn update_time(&self, name: &str) -> Result<&Self> {
        let storage = self.storage(name)?;
        let stamp = expiry_after(self.inner.clock.now(), storage.ttl());
        debug!("Stamp updated storage={} expires={}", name, stamp);
        self.inner.stamps.write().insert(name.to_string(), stamp);
        Ok(self)
    }

    /// Record conditional headers for `name` (or one page of it) after the
    /// configured delay, then persist
    ///
    /// The pair is extracted immediately; a missing date defaults to the
    /// current time. When the deferred write cannot be scheduled the pair is
    /// recorded right away, nothing is persisted and the error hook is told.
    pub fn update_headers<I, K, V>(&self, name: &str, raw: I, page: Option<&str>) -> Result<&Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.storage(name)?;
        let headers = ModifiedHeaders::from_response(raw, self.inner.clock.now());

        let key = match page {
            Some(page) => format!("headers:{}:{}", name, page),
            None => format!("headers:{}", name),
        };
        let cluster = self.clone();
        let owned_name = name.to_string();
        let owned_page = page.map(str::to_string);
        let deferred = headers.clone();

        let scheduled = self.inner.scheduler.schedule(
            &key,
            self.inner.config.headers_delay(),
            Box::pin(async move {
                cluster.record_headers(&owned_name, owned_page.as_deref(), deferred);
                if let Err(err) = cluster.persist().await {
                    (cluster.inner.error_hook)(&err);
                }
            }),
        );

        if let Err(err) = scheduled {
            warn!("Headers for storage={} recorded without persisting: {}", name, err);
            self.record_headers(name, page, headers);
            (self.inner.error_hook)(&err);
        }

        Ok(self)
    }

    fn record_headers(&self, name: &str, page: Option<&str>, headers: ModifiedHeaders) {
        trace!("Headers recorded storage={} page={:?}", name, page);
        self.inner
            .headers
            .write()
            .entry(name.to_string())
            .or_default()
            .record(page, headers);
    }

    /// Cached conditional headers for `name`
    ///
    /// Without a page this is the storage's whole header state. With a page
    /// it is that page's pair (the placeholder pair when never recorded)
    /// with `extra` layered on top. `None` when the cluster has no such
    /// store.
    pub fn get_modified_header(
        &self,
        name: &str,
        page: Option<&str>,
        extra: &BTreeMap<String, String>,
    ) -> Option<HeaderEntry> {
        if !self.contains(name) {
            return None;
        }

        let headers = self.inner.headers.read();
        let entry = headers.get(name).cloned().unwrap_or_default();
        let Some(page) = page else {
            return Some(entry);
        };

        let pair = entry
            .page(page)
            .cloned()
            .unwrap_or_else(ModifiedHeaders::placeholder)
            .with_overrides(extra);
        Some(HeaderEntry::Single(pair))
    }

    /// Write the allowed stores, stamps and headers to the medium
    pub async fn persist(&self) -> Result<()> {
        let mut contents = Map::new();
        for name in &self.inner.config.allow {
            let Some(bulk) = self.inner.storages.get(name).and_then(|s| s.bulk()) else {
                trace!("Skipping storage={} in snapshot", name);
                continue;
            };
            contents.insert(name.clone(), bulk.export()?);
        }

        let snapshot = ClusterSnapshot {
            contents,
            stamps: Some(self.stamps()),
            headers: Some(self.inner.headers.read().clone()),
        };
        snapshot
            .write(self.inner.medium.as_ref(), &self.inner.slots)
            .await
    }

    /// Persist after the configured delay without waiting for it
    ///
    /// A write that cannot be scheduled is reported to the error hook.
    pub fn async_persist(&self) {
        let cluster = self.clone();
        let scheduled = self.inner.scheduler.schedule(
            "persist",
            self.inner.config.persist_delay(),
            Box::pin(async move {
                if let Err(err) = cluster.persist().await {
                    (cluster.inner.error_hook)(&err);
                }
            }),
        );

        if let Err(err) = scheduled {
            (self.inner.error_hook)(&err);
        }
    }

    /// Load persisted state from the medium
    ///
    /// Does nothing when no contents snapshot exists. Stores missing from the
    /// snapshot keep their contents. Corrupt persisted state is returned as
    /// an error.
    pub async fn restore(&self) -> Result<()> {
        let Some(snapshot) =
            ClusterSnapshot::read(self.inner.medium.as_ref(), &self.inner.slots).await?
        else {
            return Ok(());
        };

        if let Some(stamps) = snapshot.stamps {
            let mut current = self.inner.stamps.write();
            for (name, stamp) in stamps {
                if self.contains(&name) {
                    current.insert(name, stamp);
                }
            }
        }

        if let Some(headers) = snapshot.headers {
            let mut current = self.inner.headers.write();
            for (name, entry) in headers {
                if self.contains(&name) {
                    current.insert(name, entry);
                }
            }
        }

        for (name, data) in snapshot.contents {
            match self.inner.storages.get(&name).and_then(|s| s.bulk()) {
                Some(bulk) => bulk.import(data)?,
                None => trace!("Snapshot entry storage={} has no bulk target", name),
            }
        }

        info!("Restored cache cluster slot={}", self.inner.slots.contents);
        Ok(())
    }

    /// Empty every store and delete the persisted slots
    ///
    /// Stamps and headers return to their construction defaults.
    pub async fn clear(&self) -> Result<()> {
        for (name, storage) in &self.inner.storages {
            match storage.clearer() {
                Some(clearer) => clearer.clear().await?,
                None => trace!("Storage={} cannot be cleared", name),
            }
        }

        ClusterSnapshot::erase(self.inner.medium.as_ref(), &self.inner.slots).await?;

        let now = self.inner.clock.now();
        for stamp in self.inner.stamps.write().values_mut() {
            *stamp = now;
        }
        for entry in self.inner.headers.write().values_mut() {
            *entry = HeaderEntry::default();
        }

        info!("Cleared cache cluster slot={}", self.inner.slots.contents);
        Ok(())
    }

    /// Snapshot of the current expiry stamps
    pub fn stamps(&self) -> StampMap {
        self.inner.stamps.read().clone()
    }

    /// Number of deferred writes not yet completed
    pub fn pending_tasks(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Drop deferred writes that have not run yet
    pub fn cancel_pending(&self) {
        self.inner.scheduler.cancel_all();
    }

    fn storage(&self, name: &str) -> Result<&Arc<dyn ClusterStorage>> {
        self.inner
            .storages
            .get(name)
            .ok_or_else(|| CacheError::UnknownStorage(name.to_string()))
    }
}

//! Three-slot persisted layout of a cluster
//!
//! ```text
//! contents   { storage-name: exported form (array | object) }
//! timestamps { storage-name: RFC 3339 expiry stamp }        (optional)
//! headers    { storage-name: pair | { page: pair } }         (optional)
//! ```
//!
//! Each slot is an independent JSON document; a cluster without a
//! timestamps or headers slot name skips that half entirely.

use super::medium::PersistStorage;
use crate::cluster::headers::HeaderEntry;
use crate::core::error::Result;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Slot names a cluster persists into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotNames {
    pub contents: String,
    pub timestamps: Option<String>,
    pub headers: Option<String>,
}

pub type StampMap = BTreeMap<String, DateTime<Utc>>;
pub type HeaderMap = BTreeMap<String, HeaderEntry>;

/// Full persisted state of a cluster
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterSnapshot {
    pub contents: Map<String, Value>,
    pub stamps: Option<StampMap>,
    pub headers: Option<HeaderMap>,
}

impl ClusterSnapshot {
    /// Write every configured slot
    ///
    /// Headers and stamps go first so a reader that finds the contents slot
    /// also finds matching metadata.
    pub async fn write(&self, medium: &dyn PersistStorage, slots: &SlotNames) -> Result<()> {
        if let (Some(name), Some(headers)) = (&slots.headers, &self.headers) {
            medium.set(name, serde_json::to_string(headers)?).await?;
        }

        if let (Some(name), Some(stamps)) = (&slots.timestamps, &self.stamps) {
            medium.set(name, serde_json::to_string(stamps)?).await?;
        }

        let contents = serde_json::to_string(&self.contents)?;
        debug!(
            "Writing snapshot slot={} storages={} bytes={}",
            slots.contents,
            self.contents.len(),
            contents.len()
        );
        medium.set(&slots.contents, contents).await
    }

    /// Read the persisted state; `None` when the contents slot is absent
    ///
    /// A slot holding malformed JSON fails the whole read.
    pub async fn read(medium: &dyn PersistStorage, slots: &SlotNames) -> Result<Option<Self>> {
        let Some(raw) = medium.get_string(&slots.contents).await? else {
            debug!("No snapshot in slot={}", slots.contents);
            return Ok(None);
        };
        let contents: Map<String, Value> = serde_json::from_str(&raw)?;

        let stamps = match &slots.timestamps {
            Some(name) => match medium.get_string(name).await? {
                Some(raw) => Some(serde_json::from_str(&raw)?),
                None => None,
            },
            None => None,
        };

        let headers = match &slots.headers {
            Some(name) => match medium.get_string(name).await? {
                Some(raw) => Some(serde_json::from_str(&raw)?),
                None => None,
            },
            None => None,
        };

        Ok(Some(Self {
            contents,
            stamps,
            headers,
        }))
    }

    /// Delete every configured slot
    pub async fn erase(medium: &dyn PersistStorage, slots: &SlotNames) -> Result<()> {
        medium.delete(&slots.contents).await?;
        if let Some(name) = &slots.timestamps {
            medium.delete(name).await?;
        }
        if let Some(name) = &slots.headers {
            medium.delete(name).await?;
        }
        Ok(())
    }
}

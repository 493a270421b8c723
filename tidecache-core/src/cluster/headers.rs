//! Conditional request headers cached per storage (and optionally per page)

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value used when a header was never observed
pub const PLACEHOLDER: &str = "---";

pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";
pub const IF_NONE_MATCH: &str = "If-None-Match";

/// Revalidation pair sent with the next request for a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedHeaders {
    #[serde(rename = "If-Modified-Since")]
    pub if_modified_since: String,
    #[serde(rename = "If-None-Match")]
    pub if_none_match: String,
    /// Caller-supplied headers layered on top of the pair
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ModifiedHeaders {
    pub fn new(if_modified_since: impl Into<String>, if_none_match: impl Into<String>) -> Self {
        Self {
            if_modified_since: if_modified_since.into(),
            if_none_match: if_none_match.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Pair returned for a page that was never fetched
    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER, PLACEHOLDER)
    }

    /// Extract the pair from raw response headers
    ///
    /// The date comes from `If-Modified-Since` (or `Last-Modified`) and the
    /// tag from `ETag`; names match case-insensitively. A missing date
    /// defaults to `now`, a missing tag to the placeholder.
    pub fn from_response<I, K, V>(raw: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut modified = None;
        let mut last_modified = None;
        let mut etag = None;

        for (name, value) in raw {
            let name = name.as_ref();
            let value = value.as_ref().to_string();
            if name.eq_ignore_ascii_case(IF_MODIFIED_SINCE) {
                modified = Some(value);
            } else if name.eq_ignore_ascii_case("last-modified") {
                last_modified = Some(value);
            } else if name.eq_ignore_ascii_case("etag") {
                etag = Some(value);
            }
        }

        Self::new(
            modified
                .or(last_modified)
                .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            etag.unwrap_or_else(|| PLACEHOLDER.to_string()),
        )
    }

    /// Shallow-merge caller overrides, which win over the stored pair
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Self {
        for (name, value) in overrides {
            if name.eq_ignore_ascii_case(IF_MODIFIED_SINCE) {
                self.if_modified_since = value.clone();
            } else if name.eq_ignore_ascii_case(IF_NONE_MATCH) {
                self.if_none_match = value.clone();
            } else {
                self.extra.insert(name.clone(), value.clone());
            }
        }
        self
    }

    /// Header name/value pairs ready to attach to a request
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        [
            (IF_MODIFIED_SINCE, self.if_modified_since.as_str()),
            (IF_NONE_MATCH, self.if_none_match.as_str()),
        ]
        .into_iter()
        .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// Header state of one storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderEntry {
    /// One pair for the whole storage
    Single(ModifiedHeaders),
    /// Independent pairs per page key
    Paged(BTreeMap<String, ModifiedHeaders>),
}

impl Default for HeaderEntry {
    fn default() -> Self {
        Self::Paged(BTreeMap::new())
    }
}

impl HeaderEntry {
    /// Record `headers` for the storage, or for one page of it
    ///
    /// Setting a page keeps the other pages; a single pair previously stored
    /// for the whole storage is replaced by the paged form.
    pub fn record(&mut self, page: Option<&str>, headers: ModifiedHeaders) {
        match (page, &mut *self) {
            (None, entry) => *entry = Self::Single(headers),
            (Some(page), Self::Paged(pages)) => {
                pages.insert(page.to_string(), headers);
            }
            (Some(page), entry) => {
                *entry = Self::Paged(BTreeMap::from([(page.to_string(), headers)]));
            }
        }
    }

    /// Stored pair for `page`, if any
    pub fn page(&self, page: &str) -> Option<&ModifiedHeaders> {
        match self {
            Self::Paged(pages) => pages.get(page),
            Self::Single(_) => None,
        }
    }

    pub fn single(&self) -> Option<&ModifiedHeaders> {
        match self {
            Self::Single(headers) => Some(headers),
            Self::Paged(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_from_response() {
        let headers = ModifiedHeaders::from_response(
            [("If-Modified-Since", "T1"), ("etag", "E1"), ("content-type", "json")],
            now(),
        );
        assert_eq!(headers, ModifiedHeaders::new("T1", "E1"));
    }

    #[test]
    fn test_from_response_defaults() {
        let headers = ModifiedHeaders::from_response(Vec::<(String, String)>::new(), now());
        assert_eq!(headers.if_modified_since, "2024-03-01T08:30:00.000Z");
        assert_eq!(headers.if_none_match, PLACEHOLDER);
    }

    #[test]
    fn test_from_response_falls_back_to_last_modified() {
        let headers = ModifiedHeaders::from_response([("Last-Modified", "T2"), ("ETag", "E2")], now());
        assert_eq!(headers, ModifiedHeaders::new("T2", "E2"));
    }

    #[test]
    fn test_overrides_win() {
        let overrides = BTreeMap::from([
            ("if-none-match".to_string(), "forced".to_string()),
            ("Authorization".to_string(), "Bearer x".to_string()),
        ]);
        let headers = ModifiedHeaders::new("T1", "E1").with_overrides(&overrides);

        assert_eq!(headers.if_none_match, "forced");
        assert_eq!(headers.if_modified_since, "T1");
        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("If-Modified-Since", "T1"),
                ("If-None-Match", "forced"),
                ("Authorization", "Bearer x"),
            ]
        );
    }

    #[test]
    fn test_record_pages_preserves_others() {
        let mut entry = HeaderEntry::default();
        entry.record(Some("1"), ModifiedHeaders::new("A", "a"));
        entry.record(Some("2"), ModifiedHeaders::new("B", "b"));
        entry.record(Some("1"), ModifiedHeaders::new("C", "c"));

        assert_eq!(entry.page("1"), Some(&ModifiedHeaders::new("C", "c")));
        assert_eq!(entry.page("2"), Some(&ModifiedHeaders::new("B", "b")));

        entry.record(None, ModifiedHeaders::new("D", "d"));
        assert_eq!(entry.single(), Some(&ModifiedHeaders::new("D", "d")));
        assert_eq!(entry.page("1"), None);
    }

    #[test]
    fn test_entry_json_forms() {
        let single: HeaderEntry =
            serde_json::from_str(r#"{"If-Modified-Since":"T","If-None-Match":"E"}"#).unwrap();
        assert_eq!(single, HeaderEntry::Single(ModifiedHeaders::new("T", "E")));

        let paged: HeaderEntry = serde_json::from_str(
            r#"{"3":{"If-Modified-Since":"T","If-None-Match":"E"}}"#,
        )
        .unwrap();
        assert_eq!(paged.page("3"), Some(&ModifiedHeaders::new("T", "E")));

        let empty: HeaderEntry = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, HeaderEntry::default());
    }
}

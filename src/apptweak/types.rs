use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;

/// Store listing identifier. AppTweak sends these as JSON numbers on the
/// charts endpoint and as object keys (strings) on the metadata endpoint, so
/// both decode to the same textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppId(String);

impl AppId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for AppId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for AppId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for AppId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => AppId::from(n),
            Raw::Text(s) => AppId(s),
        })
    }
}

/// Parameters for one page of the top-charts endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartQuery {
    pub category: String,
    pub country: String,
    pub device: String,
    pub limit: u32,
    pub offset: u32,
}

/// Metadata fields the pipeline cares about. Either may be missing upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

// ── Wire types ────────────────────────────────────────────────────────

/// `charts/top-results/current.json`: `result` is keyed by an opaque chart key.
#[derive(Debug, Deserialize)]
pub struct ChartsResponse {
    #[serde(default)]
    pub result: IndexMap<String, ChartSlot>,
}

#[derive(Debug, Deserialize)]
pub struct ChartSlot {
    #[serde(default)]
    pub free: Option<ChartList>,
}

#[derive(Debug, Deserialize)]
pub struct ChartList {
    #[serde(default)]
    pub value: Vec<AppId>,
}

impl ChartsResponse {
    /// Ids of the free chart under the first key, in ranked order.
    /// A missing chart reads as an empty page.
    pub fn into_free_ids(self) -> Vec<AppId> {
        self.result
            .into_values()
            .next()
            .and_then(|slot| slot.free)
            .map(|list| list.value)
            .unwrap_or_default()
    }
}

/// `apps/metadata.json`: `result` is keyed by app id.
#[derive(Debug, Deserialize)]
pub struct MetadataResponse {
    #[serde(default)]
    pub result: HashMap<String, Option<MetadataEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataEntry {
    #[serde(default)]
    pub metadata: Option<AppMetadata>,
}

impl MetadataResponse {
    pub fn into_records(self) -> HashMap<String, AppMetadata> {
        self.result
            .into_iter()
            .filter_map(|(id, entry)| entry.and_then(|e| e.metadata).map(|m| (id, m)))
            .collect()
    }
}

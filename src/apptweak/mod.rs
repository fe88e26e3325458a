pub mod rest;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use types::{AppId, AppMetadata, ChartQuery};

/// The two AppTweak endpoints the pipeline consumes.
#[async_trait]
pub trait StoreApi: Send + Sync {
    /// One page of the free top chart, in ranked order.
    async fn top_free_ids(&self, query: &ChartQuery) -> Result<Vec<AppId>>;

    /// Metadata for a batch of ids, keyed by id string. Ids the upstream has
    /// nothing for are simply absent from the map.
    async fn metadata(
        &self,
        ids: &[AppId],
        country: &str,
        device: &str,
    ) -> Result<HashMap<String, AppMetadata>>;
}

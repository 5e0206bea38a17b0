use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{VersionRecord, VersionRegistry};
use crate::error::Result;

/// Keeps successful registry tables for the lifetime of the wrapper.
/// Failed lookups are not remembered, so a later target retries them.
pub struct CachedRegistry<R> {
    inner: R,
    tables: RwLock<HashMap<String, Vec<VersionRecord>>>,
}

impl<R: VersionRegistry> CachedRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            tables: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<R: VersionRegistry> VersionRegistry for CachedRegistry<R> {
    async fn fetch(&self, product: &str) -> Result<Vec<VersionRecord>> {
        if let Some(table) = self.tables.read().await.get(product) {
            debug!(product, "registry cache hit");
            return Ok(table.clone());
        }

        let records = self.inner.fetch(product).await?;
        self.tables
            .write()
            .await
            .insert(product.to_string(), records.clone());
        Ok(records)
    }
}

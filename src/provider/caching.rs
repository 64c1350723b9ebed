//! Response caching decorator for providers.

use super::{Provider, ProviderResult};
use crate::cache::DiskBackedCache;
use crate::certificate::Certificate;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Serves successful resolutions of the wrapped provider from a cache.
///
/// Only `ok` results are cached; not-found answers and failures always go
/// back to the source so a freshly inscribed record is picked up.
pub struct CachingProvider {
    inner: Arc<dyn Provider>,
    cache: Arc<DiskBackedCache<ProviderResult>>,
}

impl CachingProvider {
    /// Wrap `inner` with `cache`.
    #[must_use]
    pub fn new(inner: Arc<dyn Provider>, cache: Arc<DiskBackedCache<ProviderResult>>) -> Self {
        Self { inner, cache }
    }

    /// Length-prefixed `name`, inscription id and tx id, so no two distinct
    /// certificates share a key whatever characters their ids contain.
    fn cache_key(&self, certificate: &Certificate) -> String {
        let name = self.inner.name();
        let inscription_id = certificate.expected_inscription_id.as_str();
        let txid = certificate.expected_txid.as_deref().unwrap_or_default();
        format!(
            "{}:{name}{}:{inscription_id}{}:{txid}",
            name.len(),
            inscription_id.len(),
            txid.len()
        )
    }
}

#[async_trait]
impl Provider for CachingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn resolve(&self, certificate: &Certificate) -> Result<ProviderResult> {
        let key = self.cache_key(certificate);
        if let Some(result) = self.cache.get(&key).await {
            debug!("{} resolution for {} served from cache", self.name(), certificate.id);
            return Ok(result);
        }

        let result = self.inner.resolve(certificate).await?;
        if result.ok {
            if let Err(e) = self.cache.set(&key, result.clone()).await {
                warn!("Failed to cache {} resolution: {e}", self.name());
            }
        }
        Ok(result)
    }
}

//! Marketplace provider.

use super::http::{join_segments, parse_base_url};
use super::{
    fetch, first_string_field, string_field, Fetched, HttpTransport, JsonRequest, Provider,
    ProviderResult,
};
use crate::certificate::Certificate;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;

/// Resolves inscriptions through a marketplace's `/api/inscriptions/{id}`.
///
/// Listings are returned either wrapped in `inscription` or at the top level.
/// The marketplace signals absence in-band with `"status": 404`.
pub struct MarketplaceProvider {
    base: Url,
    api_key: Option<String>,
    transport: Arc<dyn HttpTransport>,
}

impl MarketplaceProvider {
    /// Create a marketplace provider.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid http(s) URL.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        Ok(Self {
            base: parse_base_url(base_url)?,
            api_key,
            transport,
        })
    }

    fn interpret(data: Value) -> ProviderResult {
        if data.get("status").and_then(Value::as_u64) == Some(404) {
            return ProviderResult::not_found(Some(data));
        }

        let inscription = data
            .get("inscription")
            .filter(|v| v.is_object())
            .unwrap_or(&data);
        let inscription_id = string_field(inscription, "id");
        let txid = string_field(inscription, "txid");
        let content_hash = first_string_field(inscription, &["content_hash", "contentHash"]);

        ProviderResult::resolved(data)
            .with_inscription_id(inscription_id)
            .with_txid(txid)
            .with_content_hash(content_hash)
    }
}

#[async_trait]
impl Provider for MarketplaceProvider {
    fn name(&self) -> &str {
        "Marketplace"
    }

    async fn resolve(&self, certificate: &Certificate) -> Result<ProviderResult> {
        let url = join_segments(
            &self.base,
            &["api", "inscriptions", &certificate.expected_inscription_id],
        )?;
        let request = JsonRequest::new(url).bearer(self.api_key.as_deref());

        match fetch(self.transport.as_ref(), self.name(), &request).await? {
            Fetched::Body(data) => Ok(Self::interpret(data)),
            Fetched::Unresolved(result) => Ok(result),
        }
    }
}

//! Block explorer provider.

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

/// Resolves inscriptions through an explorer's `/v1/inscriptions?id=` search.
///
/// A response without a `result` object means the explorer has no record.
pub struct ExplorerProvider {
    base: Url,
    api_key: Option<String>,
    transport: Arc<dyn HttpTransport>,
}

impl ExplorerProvider {
    /// Create an explorer provider.
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
        let Some(result) = data.get("result").filter(|r| r.is_object()) else {
            return ProviderResult::not_found(Some(data));
        };

        let inscription_id = string_field(result, "id");
        let txid = string_field(result, "txid");
        let content_hash = first_string_field(result, &["sha256", "contentHash"]);
        ProviderResult::resolved(data)
            .with_inscription_id(inscription_id)
            .with_txid(txid)
            .with_content_hash(content_hash)
    }
}

#[async_trait]
impl Provider for ExplorerProvider {
    fn name(&self) -> &str {
        "Explorer"
    }

    async fn resolve(&self, certificate: &Certificate) -> Result<ProviderResult> {
        let mut url = join_segments(&self.base, &["v1", "inscriptions"])?;
        url.query_pairs_mut()
            .append_pair("id", &certificate.expected_inscription_id);

        let mut request = JsonRequest::new(url);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key.as_str());
        }

        match fetch(self.transport.as_ref(), self.name(), &request).await? {
            Fetched::Body(data) => Ok(Self::interpret(data)),
            Fetched::Unresolved(result) => Ok(result),
        }
    }
}

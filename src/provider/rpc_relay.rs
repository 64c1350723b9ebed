//! Node RPC relay provider.

use super::http::{join_segments, parse_base_url};
use super::{
    fetch, string_field, Fetched, HttpTransport, JsonRequest, Provider, ProviderResult,
    REASON_MISSING_TXID,
};
use crate::certificate::Certificate;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Looks up the certificate's transaction through a relay's `/tx/{txid}`.
///
/// The relay only knows about transactions, so it can corroborate `txid` but
/// never the inscription id or content hash. Certificates without an
/// expected tx id are answered locally with `missing_expected_txid`.
pub struct RpcRelayProvider {
    base: Url,
    api_key: Option<String>,
    transport: Arc<dyn HttpTransport>,
}

impl RpcRelayProvider {
    /// Create an RPC relay provider.
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
        let txid = string_field(&data, "txid");
        ProviderResult::resolved(data).with_txid(txid)
    }
}

#[async_trait]
impl Provider for RpcRelayProvider {
    fn name(&self) -> &str {
        "RpcRelay"
    }

    async fn resolve(&self, certificate: &Certificate) -> Result<ProviderResult> {
        let Some(txid) = certificate.expected_txid.as_deref().filter(|t| !t.is_empty()) else {
            debug!("Certificate {} has no expected txid, skipping relay", certificate.id);
            return Ok(ProviderResult::unresolved(REASON_MISSING_TXID, None));
        };

        let url = join_segments(&self.base, &["tx", txid])?;
        let request = JsonRequest::new(url).bearer(self.api_key.as_deref());

        match fetch(self.transport.as_ref(), self.name(), &request).await? {
            Fetched::Body(data) => Ok(Self::interpret(data)),
            Fetched::Unresolved(result) => Ok(result),
        }
    }
}

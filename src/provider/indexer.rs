//! Inscription indexer provider.

use super::http::{join_segments, parse_base_url};
use super::{fetch, string_field, Fetched, HttpTransport, JsonRequest, Provider, ProviderResult};
use crate::certificate::Certificate;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;

/// Resolves inscriptions through an indexer's `/inscription/{id}` endpoint.
///
/// The indexer reports failures in-band as `{ "error": "<reason>" }`; that
/// string becomes the result's reason.
pub struct IndexerProvider {
    base: Url,
    api_key: Option<String>,
    transport: Arc<dyn HttpTransport>,
}

impl IndexerProvider {
    /// Create an indexer provider.
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
        if let Some(error) = data.get("error") {
            let reason = error
                .as_str()
                .filter(|s| !s.is_empty())
                .unwrap_or(super::REASON_NOT_FOUND)
                .to_string();
            return ProviderResult::unresolved(reason, Some(data));
        }

        let inscription_id = string_field(&data, "inscriptionId");
        let txid = string_field(&data, "txid");
        let content_hash = string_field(&data, "contentHash");
        ProviderResult::resolved(data)
            .with_inscription_id(inscription_id)
            .with_txid(txid)
            .with_content_hash(content_hash)
    }
}

#[async_trait]
impl Provider for IndexerProvider {
    fn name(&self) -> &str {
        "DogeIndexer"
    }

    async fn resolve(&self, certificate: &Certificate) -> Result<ProviderResult> {
        let url = join_segments(
            &self.base,
            &["inscription", &certificate.expected_inscription_id],
        )?;
        let request = JsonRequest::new(url).bearer(self.api_key.as_deref());

        match fetch(self.transport.as_ref(), self.name(), &request).await? {
            Fetched::Body(data) => Ok(Self::interpret(data)),
            Fetched::Unresolved(result) => Ok(result),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::super::http::testing::MockTransport;
    use super::super::JsonResponse;
    use super::*;
    use serde_json::json;

    fn provider(transport: Arc<MockTransport>, key: Option<&str>) -> IndexerProvider {
        IndexerProvider::new(
            "https://indexer.example",
            key.map(str::to_string),
            transport,
        )
        .expect("provider")
    }

    #[tokio::test]
    async fn test_resolves_all_fields() {
        let transport = Arc::new(MockTransport::with_responses(vec![JsonResponse::ok(json!({
            "inscriptionId": "inscription:abc",
            "txid": "tx123",
            "contentHash": "DEADBEEF"
        }))]));
        let cert = Certificate::new("CERT-1", "inscription:abc");

        let result = provider(Arc::clone(&transport), Some("secret"))
            .resolve(&cert)
            .await
            .expect("resolve");

        assert!(result.ok);
        assert_eq!(result.inscription_id.as_deref(), Some("inscription:abc"));
        assert_eq!(result.txid.as_deref(), Some("tx123"));
        assert_eq!(result.content_hash.as_deref(), Some("DEADBEEF"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url.as_str(),
            "https://indexer.example/inscription/inscription:abc"
        );
        assert_eq!(
            requests[0].headers,
            vec![("Authorization".to_string(), "Bearer secret".to_string())]
        );
    }

    #[tokio::test]
    async fn test_in_band_error_becomes_reason() {
        let transport = Arc::new(MockTransport::with_responses(vec![JsonResponse::ok(
            json!({ "error": "inscription_pruned" }),
        )]));
        let result = provider(transport, None)
            .resolve(&Certificate::new("CERT-1", "inscription:abc"))
            .await
            .expect("resolve");

        assert!(!result.ok);
        assert_eq!(result.reason.as_deref(), Some("inscription_pruned"));
        assert_eq!(result.raw, Some(json!({ "error": "inscription_pruned" })));
    }

    #[tokio::test]
    async fn test_null_error_is_not_found() {
        let transport = Arc::new(MockTransport::with_responses(vec![JsonResponse::ok(
            json!({ "error": null }),
        )]));
        let result = provider(transport, None)
            .resolve(&Certificate::new("CERT-1", "inscription:abc"))
            .await
            .expect("resolve");
        assert_eq!(result.reason.as_deref(), Some("not_found"));
    }

    #[tokio::test]
    async fn test_missing_fields_are_omitted() {
        let transport = Arc::new(MockTransport::with_responses(vec![JsonResponse::ok(
            json!({ "inscriptionId": "inscription:abc" }),
        )]));
        let result = provider(transport, None)
            .resolve(&Certificate::new("CERT-1", "inscription:abc").with_txid("tx123"))
            .await
            .expect("resolve");
        assert!(result.ok);
        assert!(result.txid.is_none());
        assert!(result.content_hash.is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let transport = Arc::new(MockTransport::failing("connection refused"));
        let result = provider(transport, None)
            .resolve(&Certificate::new("CERT-1", "inscription:abc"))
            .await;
        assert!(result.is_err());
    }
}

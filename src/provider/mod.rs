//! Inscription data providers.
//!
//! A provider asks one external data source what it knows about the
//! inscription a certificate points at. All variants share the [`Provider`]
//! contract:
//!
//! - ordinary "not found" conditions are returned as an unresolved
//!   [`ProviderResult`], never as an error;
//! - `Err` is reserved for transport failures (timeouts, DNS, 5xx, malformed
//!   JSON), which the verifier retries with backoff;
//! - providers never retry internally.
//!
//! | Provider              | Source                               |
//! |-----------------------|--------------------------------------|
//! | [`IndexerProvider`]     | inscription indexer (`/inscription/{id}`) |
//! | [`ExplorerProvider`]    | block explorer (`/v1/inscriptions?id=`)   |
//! | [`MarketplaceProvider`] | marketplace API (`/api/inscriptions/{id}`) |
//! | [`RpcRelayProvider`]    | node RPC relay (`/tx/{txid}`)             |

mod caching;
mod explorer;
mod http;
mod indexer;
mod marketplace;
mod rpc_relay;

pub use caching::CachingProvider;
pub use explorer::ExplorerProvider;
pub use http::{HttpTransport, JsonRequest, JsonResponse, ReqwestTransport};
pub use indexer::IndexerProvider;
pub use marketplace::MarketplaceProvider;
pub use rpc_relay::RpcRelayProvider;

use crate::certificate::Certificate;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Reason recorded when a source has no record of the inscription.
pub const REASON_NOT_FOUND: &str = "not_found";

/// Reason recorded when a provider call failed after all retries.
pub const REASON_ERROR: &str = "error";

/// Reason recorded when a provider needs the certificate's tx id and it is absent.
pub const REASON_MISSING_TXID: &str = "missing_expected_txid";

/// A single external source that can corroborate or refute a certificate.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name, recorded in the audit trail.
    fn name(&self) -> &str;

    /// Resolve the certificate's identifiers against this source.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport-level failures.
    async fn resolve(&self, certificate: &Certificate) -> Result<ProviderResult>;
}

/// One provider's answer for one certificate.
///
/// `ok` means the provider resolved *something*; whether it matches the
/// certificate is decided by the verifier. `raw` is kept for the audit trail
/// and never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    /// Whether the source resolved the inscription.
    pub ok: bool,
    /// Machine-readable failure cause when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Inscription id reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inscription_id: Option<String>,
    /// Transaction id reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    /// Content hash reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Source payload, preserved for auditing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl ProviderResult {
    /// A successful resolution with no fields reported yet.
    #[must_use]
    pub fn resolved(raw: Value) -> Self {
        Self {
            ok: true,
            reason: None,
            inscription_id: None,
            txid: None,
            content_hash: None,
            raw: Some(raw),
        }
    }

    /// A failed resolution.
    #[must_use]
    pub fn unresolved(reason: impl Into<String>, raw: Option<Value>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            inscription_id: None,
            txid: None,
            content_hash: None,
            raw,
        }
    }

    /// The source has no record of the inscription.
    #[must_use]
    pub fn not_found(raw: Option<Value>) -> Self {
        Self::unresolved(REASON_NOT_FOUND, raw)
    }

    /// Outcome synthesized when every attempt to reach the provider failed.
    #[must_use]
    pub fn transport_failure(error: &Error) -> Self {
        Self::unresolved(REASON_ERROR, Some(json!({ "error": error.to_string() })))
    }

    /// Set the reported inscription id.
    #[must_use]
    pub fn with_inscription_id(mut self, inscription_id: Option<String>) -> Self {
        self.inscription_id = inscription_id;
        self
    }

    /// Set the reported transaction id.
    #[must_use]
    pub fn with_txid(mut self, txid: Option<String>) -> Self {
        self.txid = txid;
        self
    }

    /// Set the reported content hash.
    #[must_use]
    pub fn with_content_hash(mut self, content_hash: Option<String>) -> Self {
        self.content_hash = content_hash;
        self
    }
}

/// Outcome of an HTTP fetch after status handling.
pub(crate) enum Fetched {
    /// 2xx with a non-null JSON body.
    Body(Value),
    /// The source answered, but not with a record.
    Unresolved(ProviderResult),
}

/// Fetch `request` and classify the response status.
///
/// - 2xx with a body: [`Fetched::Body`]; 2xx with an empty or null body: `not_found`
/// - any other non-success status: `not_found`, with the status kept in `raw`
/// - 429 and 5xx: transport error, so the caller retries
pub(crate) async fn fetch(
    transport: &dyn HttpTransport,
    provider: &str,
    request: &JsonRequest,
) -> Result<Fetched> {
    let response = transport.get_json(request).await?;
    let status = response.status;
    debug!("{provider} answered HTTP {status} for {}", request.url);

    match status {
        200..=299 => match response.body {
            None | Some(Value::Null) => Ok(Fetched::Unresolved(ProviderResult::not_found(None))),
            Some(body) => Ok(Fetched::Body(body)),
        },
        429 | 500..=599 => Err(Error::Provider(format!(
            "{provider} returned HTTP {status}"
        ))),
        _ => Ok(Fetched::Unresolved(ProviderResult::not_found(Some(
            response.into_raw(),
        )))),
    }
}

/// Read a non-empty string field from a JSON object.
pub(crate) fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read the first present string field among `keys`.
pub(crate) fn first_string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| string_field(value, key))
}

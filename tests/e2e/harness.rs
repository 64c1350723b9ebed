//! In-process fake provider APIs.
//!
//! Each [`FakeProvider`] is a real HTTP server on a loopback port that
//! answers all four provider wire formats from a shared set of
//! [`InscriptionRecord`]s. Tests point one configured provider at one fake
//! so request counters stay separate.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use cert_audit::config::{AuditConfig, ProviderEndpoint};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::debug;

/// What the fake ledger knows about one inscription.
#[derive(Debug, Clone)]
pub struct InscriptionRecord {
    /// Inscription id.
    pub inscription_id: String,
    /// Transaction that carried it.
    pub txid: String,
    /// Hash of the inscribed content.
    pub content_hash: String,
}

impl InscriptionRecord {
    /// Create a record.
    #[must_use]
    pub fn new(inscription_id: &str, txid: &str, content_hash: &str) -> Self {
        Self {
            inscription_id: inscription_id.to_string(),
            txid: txid.to_string(),
            content_hash: content_hash.to_string(),
        }
    }
}

struct FakeState {
    records: Vec<InscriptionRecord>,
    api_key: Option<String>,
    failures_left: AtomicUsize,
    hits: AtomicUsize,
}

impl FakeState {
    fn by_inscription(&self, id: &str) -> Option<&InscriptionRecord> {
        self.records.iter().find(|r| r.inscription_id == id)
    }

    fn by_txid(&self, txid: &str) -> Option<&InscriptionRecord> {
        self.records.iter().find(|r| r.txid == txid)
    }

    /// Count the request and decide whether to refuse it.
    fn gate(&self, headers: &HeaderMap) -> Option<Response> {
        self.hits.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Some(StatusCode::SERVICE_UNAVAILABLE.into_response());
        }

        if let Some(key) = &self.api_key {
            let bearer = format!("Bearer {key}");
            let authorized = headers
                .get("authorization")
                .is_some_and(|v| v.as_bytes() == bearer.as_bytes())
                || headers
                    .get("x-api-key")
                    .is_some_and(|v| v.as_bytes() == key.as_bytes());
            if !authorized {
                return Some(
                    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" })))
                        .into_response(),
                );
            }
        }
        None
    }
}

type Shared = Arc<FakeState>;

async fn indexer(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Some(refused) = state.gate(&headers) {
        return refused;
    }
    match state.by_inscription(&id) {
        Some(r) => Json(json!({
            "inscriptionId": r.inscription_id,
            "txid": r.txid,
            "contentHash": r.content_hash,
        }))
        .into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "not_found" }))).into_response(),
    }
}

async fn explorer(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(refused) = state.gate(&headers) {
        return refused;
    }
    let record = query.get("id").and_then(|id| state.by_inscription(id));
    match record {
        Some(r) => Json(json!({
            "result": { "id": r.inscription_id, "txid": r.txid, "sha256": r.content_hash },
        }))
        .into_response(),
        None => Json(json!({ "result": null })).into_response(),
    }
}

async fn marketplace(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Some(refused) = state.gate(&headers) {
        return refused;
    }
    match state.by_inscription(&id) {
        Some(r) => Json(json!({
            "inscription": { "id": r.inscription_id, "txid": r.txid, "content_hash": r.content_hash },
        }))
        .into_response(),
        None => Json(json!({ "status": 404, "message": "inscription not listed" })).into_response(),
    }
}

async fn rpc_relay(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(txid): Path<String>,
) -> Response {
    if let Some(refused) = state.gate(&headers) {
        return refused;
    }
    match state.by_txid(&txid) {
        Some(r) => Json(json!({ "txid": r.txid, "confirmations": 6 })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Builder for a [`FakeProvider`].
#[derive(Default)]
pub struct FakeProviderBuilder {
    records: Vec<InscriptionRecord>,
    api_key: Option<String>,
    failures: usize,
}

impl FakeProviderBuilder {
    /// Serve this record.
    #[must_use]
    pub fn record(mut self, record: InscriptionRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Refuse requests without this key.
    #[must_use]
    pub fn api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Answer the first `n` requests with 503.
    #[must_use]
    pub fn fail_first(mut self, n: usize) -> Self {
        self.failures = n;
        self
    }

    /// Bind a loopback port and start serving.
    pub async fn start(self) -> FakeProvider {
        let state = Arc::new(FakeState {
            records: self.records,
            api_key: self.api_key,
            failures_left: AtomicUsize::new(self.failures),
            hits: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/inscription/:id", get(indexer))
            .route("/v1/inscriptions", get(explorer))
            .route("/api/inscriptions/:id", get(marketplace))
            .route("/tx/:txid", get(rpc_relay))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake provider");
        let addr = listener.local_addr().expect("fake provider addr");
        let (shutdown, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .expect("fake provider server");
        });
        debug!("Fake provider listening on {addr}");

        FakeProvider {
            base_url: format!("http://{addr}"),
            state,
            _shutdown: shutdown,
        }
    }
}

/// A running fake provider API. Stops when dropped.
pub struct FakeProvider {
    base_url: String,
    state: Shared,
    _shutdown: oneshot::Sender<()>,
}

impl FakeProvider {
    /// Start configuring a fake.
    #[must_use]
    pub fn builder() -> FakeProviderBuilder {
        FakeProviderBuilder::default()
    }

    /// Base URL to configure a provider with.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint for this fake with an optional key.
    #[must_use]
    pub fn endpoint(&self, api_key: Option<&str>) -> ProviderEndpoint {
        ProviderEndpoint::new(self.base_url.clone(), api_key.map(str::to_string))
    }

    /// Requests received so far.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

/// Configuration with fast retries and every provider disabled.
#[must_use]
pub fn test_config() -> AuditConfig {
    let mut config = AuditConfig::default();
    config.retry.base_ms = 1;
    config.request_timeout_secs = 5;
    config
}

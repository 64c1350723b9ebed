//! HTTP verification API.
//!
//! ```text
//! POST /verify   Certificate JSON  ──► 200 { id, verdict }
//!                                      400 { error: "invalid_certificate" }
//!                                      500 { error: "verification_failed" }
//! GET  /health                     ──► 200 { status: "ok", providers: n }
//! ```
//!
//! Each verification runs on its own task so a panic inside a provider
//! surfaces as a 500 instead of tearing down the connection.

use crate::certificate::Certificate;
use crate::error::{Error, Result};
use crate::verifier::Verifier;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Build the API router around a shared verifier.
pub fn router(verifier: Arc<Verifier>) -> Router {
    Router::new()
        .route("/verify", post(verify))
        .route("/health", get(health))
        .with_state(verifier)
}

async fn verify(
    State(verifier): State<Arc<Verifier>>,
    body: std::result::Result<Json<Certificate>, JsonRejection>,
) -> Response {
    let certificate = match body {
        Ok(Json(certificate)) => certificate,
        Err(rejection) => {
            warn!("Rejected /verify body: {rejection}");
            return error_response(StatusCode::BAD_REQUEST, "invalid_certificate");
        }
    };
    if let Err(e) = certificate.validate() {
        warn!("Rejected certificate: {e}");
        return error_response(StatusCode::BAD_REQUEST, "invalid_certificate");
    }

    let id = certificate.id.clone();
    let task = tokio::spawn(async move { verifier.verify_certificate(&certificate).await });
    match task.await {
        Ok(verdict) => {
            (StatusCode::OK, Json(json!({ "id": id, "verdict": verdict }))).into_response()
        }
        Err(e) => {
            error!("Verification of {id} failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "verification_failed")
        }
    }
}

async fn health(State(verifier): State<Arc<Verifier>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "providers": verifier.provider_names().len(),
    }))
}

fn error_response(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "error": error }))).into_response()
}

/// Serve the API on an already bound listener until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while running.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    verifier: Arc<Verifier>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("Verification API listening on {addr}");
    axum::serve(listener, router(verifier))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Server(e.to_string()))
}

/// Bind `addr` and serve the API until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, verifier: Arc<Verifier>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Server(format!("failed to bind {addr}: {e}")))?;
    serve_with_shutdown(listener, verifier, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    })
    .await
}

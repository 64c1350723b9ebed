//! Verification against fake provider APIs over real HTTP.

use super::{test_config, FakeProvider, InscriptionRecord};
use cert_audit::{
    AuditSink, BatchAuditor, Certificate, CertificateSource, SqliteStore, VerificationStatus,
    Verifier,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

fn cert1() -> Certificate {
    Certificate::new("CERT-1", "inscription:abc")
        .with_content_hash("DEADBEEF")
        .with_txid("tx123")
}

fn abc() -> InscriptionRecord {
    InscriptionRecord::new("inscription:abc", "tx123", "deadbeef")
}

async fn build_verifier(config: &cert_audit::AuditConfig) -> (Arc<Verifier>, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().expect("open store"));
    let sink = Arc::clone(&store) as Arc<dyn AuditSink>;
    let verifier = Verifier::from_config(config, sink)
        .await
        .expect("build verifier");
    (Arc::new(verifier), store)
}

#[tokio::test]
async fn test_indexer_verifies_certificate() {
    let indexer = FakeProvider::builder()
        .record(abc())
        .api_key("indexer-key")
        .start()
        .await;
    let explorer = FakeProvider::builder().record(abc()).start().await;

    let mut config = test_config();
    config.providers.indexer = indexer.endpoint(Some("indexer-key"));
    config.providers.explorer = explorer.endpoint(None);
    let (verifier, store) = build_verifier(&config).await;

    let result = verifier.verify_certificate(&cert1()).await;
    assert_eq!(result.status, VerificationStatus::Verified);
    assert_eq!(result.providers_queried, 1);
    assert_eq!(result.verified_matches, 1);
    assert_eq!(indexer.hits(), 1);
    assert_eq!(explorer.hits(), 0);

    let audits = store.audits_for("CERT-1").await.expect("audits");
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].provider, "DogeIndexer");
    assert_eq!(audits[0].details["verdict"]["status"], "verified");
    assert_eq!(audits[0].details["raw"]["txid"], "tx123");
}

#[tokio::test]
async fn test_quorum_two_with_conflicting_explorer() {
    let indexer = FakeProvider::builder().record(abc()).start().await;
    let explorer = FakeProvider::builder()
        .record(InscriptionRecord::new("inscription:abc", "tx999", "deadbeef"))
        .start()
        .await;

    let mut config = test_config();
    config.policy.quorum = 2;
    config.providers.indexer = indexer.endpoint(None);
    config.providers.explorer = explorer.endpoint(None);
    let (verifier, store) = build_verifier(&config).await;

    let result = verifier.verify_certificate(&cert1()).await;
    assert_eq!(result.status, VerificationStatus::Mismatch);
    assert_eq!(result.providers_queried, 2);
    assert_eq!(result.verified_matches, 1);

    let audits = store.audits_for("CERT-1").await.expect("audits");
    let verdicts: Vec<_> = audits
        .iter()
        .map(|a| (a.provider.as_str(), a.details["verdict"].clone()))
        .collect();
    assert_eq!(
        verdicts,
        vec![
            ("DogeIndexer", json!({ "status": "verified" })),
            ("Explorer", json!({ "status": "mismatch", "reason": "txid_diff" })),
        ]
    );
}

#[tokio::test]
async fn test_all_four_providers_reach_quorum() {
    let fakes = [
        FakeProvider::builder().record(abc()).start().await,
        FakeProvider::builder().record(abc()).start().await,
        FakeProvider::builder().record(abc()).start().await,
        FakeProvider::builder().record(abc()).start().await,
    ];

    let mut config = test_config();
    config.policy.quorum = 4;
    config.providers.indexer = fakes[0].endpoint(None);
    config.providers.explorer = fakes[1].endpoint(None);
    config.providers.marketplace = fakes[2].endpoint(None);
    config.providers.rpc_relay = fakes[3].endpoint(None);
    let (verifier, store) = build_verifier(&config).await;

    let result = verifier.verify_certificate(&cert1()).await;
    assert_eq!(result.status, VerificationStatus::Verified);
    assert_eq!(result.verified_matches, 4);
    assert!(fakes.iter().all(|f| f.hits() == 1));
    assert_eq!(store.audits_for("CERT-1").await.expect("audits").len(), 4);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let indexer = FakeProvider::builder()
        .record(abc())
        .fail_first(2)
        .start()
        .await;

    let mut config = test_config();
    config.providers.indexer = indexer.endpoint(None);
    let (verifier, _store) = build_verifier(&config).await;

    let result = verifier.verify_certificate(&cert1()).await;
    assert_eq!(result.status, VerificationStatus::Verified);
    assert_eq!(indexer.hits(), 3);
}

#[tokio::test]
async fn test_unreachable_provider_is_audited_as_error() {
    let down = FakeProvider::builder().fail_first(usize::MAX).start().await;
    let marketplace = FakeProvider::builder().start().await;

    let mut config = test_config();
    config.policy.quorum = 2;
    config.providers.indexer = down.endpoint(None);
    config.providers.marketplace = marketplace.endpoint(None);
    let (verifier, store) = build_verifier(&config).await;

    let result = verifier.verify_certificate(&cert1()).await;
    assert_eq!(result.status, VerificationStatus::NotFound);
    assert_eq!(result.providers_queried, 2);
    assert_eq!(down.hits(), 3);

    let audits = store.audits_for("CERT-1").await.expect("audits");
    assert_eq!(audits[0].status, VerificationStatus::Error);
    assert_eq!(audits[0].details["reason"], "error");
    assert!(audits[0].details["raw"]["error"].is_string());
    assert_eq!(audits[1].details["reason"], "not_found");
}

#[tokio::test]
async fn test_wrong_api_key_is_not_a_verification() {
    let explorer = FakeProvider::builder()
        .record(abc())
        .api_key("right")
        .start()
        .await;

    let mut config = test_config();
    config.providers.explorer = explorer.endpoint(Some("wrong"));
    let (verifier, store) = build_verifier(&config).await;

    let result = verifier.verify_certificate(&cert1()).await;
    assert_eq!(result.status, VerificationStatus::NotFound);

    let audits = store.audits_for("CERT-1").await.expect("audits");
    assert_eq!(audits[0].details["reason"], "not_found");
    assert_eq!(audits[0].details["raw"]["status"], 401);
}

#[tokio::test]
async fn test_cache_answers_repeat_lookups() {
    let dir = tempfile::tempdir().expect("tempdir");
    let indexer = FakeProvider::builder().record(abc()).start().await;

    let mut config = test_config();
    config.providers.indexer = indexer.endpoint(None);
    config.cache.enabled = true;
    config.cache.directory = dir.path().join("cache");

    {
        let (verifier, _store) = build_verifier(&config).await;
        verifier.verify_certificate(&cert1()).await;
        verifier.verify_certificate(&cert1()).await;
    }
    assert_eq!(indexer.hits(), 1);

    // A fresh process reuses the on-disk entry
    let (verifier, _store) = build_verifier(&config).await;
    let result = verifier.verify_certificate(&cert1()).await;
    assert_eq!(result.status, VerificationStatus::Verified);
    assert_eq!(indexer.hits(), 1);
}

#[tokio::test]
async fn test_batch_over_sqlite_certificates() {
    let indexer = FakeProvider::builder().record(abc()).start().await;
    let rpc = FakeProvider::builder().record(abc()).start().await;

    let mut config = test_config();
    config.providers.indexer = indexer.endpoint(None);
    config.providers.rpc_relay = rpc.endpoint(None);
    let (verifier, store) = build_verifier(&config).await;

    store
        .upsert_certificates(vec![
            cert1(),
            Certificate::new("CERT-2", "inscription:missing"),
            Certificate::new("CERT-3", "inscription:abc").with_content_hash("cafebabe"),
        ])
        .await
        .expect("import");

    let source = Arc::clone(&store) as Arc<dyn CertificateSource>;
    let summary = BatchAuditor::new(verifier, source)
        .with_concurrency(2)
        .run()
        .await
        .expect("batch");

    assert_eq!(summary.verified, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.count(VerificationStatus::NotFound), 1);
    assert_eq!(summary.count(VerificationStatus::Mismatch), 1);

    // CERT-2 and CERT-3 carry no txid, so the relay never sees them
    assert_eq!(rpc.hits(), 0);
    let relay_rows = store.audits_for("CERT-2").await.expect("audits");
    assert_eq!(relay_rows[1].provider, "RpcRelay");
    assert_eq!(relay_rows[1].details["reason"], "missing_expected_txid");
}

#[tokio::test]
async fn test_verify_endpoint_end_to_end() {
    let marketplace = FakeProvider::builder().record(abc()).start().await;

    let mut config = test_config();
    config.providers.marketplace = marketplace.endpoint(None);
    let (verifier, store) = build_verifier(&config).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(cert_audit::server::serve_with_shutdown(
        listener,
        verifier,
        async {
            let _ = rx.await;
        },
    ));

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/verify"))
        .json(&cert1())
        .send()
        .await
        .expect("send");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("json");
    assert_eq!(
        body,
        json!({
            "id": "CERT-1",
            "verdict": { "status": "verified", "providersQueried": 1, "verifiedMatches": 1 }
        })
    );

    let health: Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .expect("send")
        .json()
        .await
        .expect("json");
    assert_eq!(health["providers"], 1);
    assert!(marketplace.base_url().starts_with("http://127.0.0.1:"));
    assert_eq!(store.audits_for("CERT-1").await.expect("audits").len(), 1);

    shutdown.send(()).expect("shutdown");
    server.await.expect("join").expect("serve");
}

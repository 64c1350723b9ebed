//! Multi-provider certificate verifier.
//!
//! The verifier asks each configured provider, in order, what it knows about
//! the inscription a certificate claims, compares every answer against the
//! certificate, and folds the per-provider verdicts into one
//! [`VerificationResult`] under the [`MatchPolicy`] quorum.
//!
//! # Algorithm
//!
//! ```text
//! for provider in providers (in order):
//!     result = backoff(provider.resolve(cert))   // exhausted → ok:false, reason:"error"
//!     if quorum <= 1 and compare(result) == verified:
//!         audit(result); return verified          // fast path, later providers untouched
//!     outcomes.push(result)
//!
//! matches = outcomes where compare == verified
//! status  = verified   if matches >= quorum
//!         | mismatch   if any outcome ok
//!         | not_found  if any provider queried
//!         | error      otherwise (no providers)
//! audit(every outcome)
//! ```
//!
//! Providers are queried sequentially so the fast path can stop before the
//! next provider is contacted. Audit-sink failures are logged and never
//! change the returned verdict.

use crate::backoff::{backoff, BackoffOptions};
use crate::certificate::Certificate;
use crate::config::AuditConfig;
use crate::error::{Error, Result};
use crate::provider::{Provider, ProviderResult};
use crate::store::{AuditRecord, AuditSink};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How provider answers are matched against certificates.
///
/// Fixed for the lifetime of a [`Verifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// A reported tx id that differs from the certificate's is disqualifying.
    pub require_tx_match: bool,
    /// A reported content hash that differs (case-insensitively) is disqualifying.
    pub require_hash_match: bool,
    /// Number of providers that must independently verify the certificate.
    pub quorum: u32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            require_tx_match: true,
            require_hash_match: true,
            quorum: 1,
        }
    }
}

impl MatchPolicy {
    /// Quorum actually enforced; zero is treated as one.
    #[must_use]
    pub fn effective_quorum(&self) -> usize {
        usize::try_from(self.quorum.max(1)).unwrap_or(usize::MAX)
    }
}

/// Overall or per-provider verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Enough providers corroborated the certificate.
    Verified,
    /// Something was found, but it did not agree with the certificate.
    Mismatch,
    /// No provider resolved the inscription.
    NotFound,
    /// Nothing could be checked.
    Error,
}

impl VerificationStatus {
    /// Wire and storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Mismatch => "mismatch",
            Self::NotFound => "not_found",
            Self::Error => "error",
        }
    }

    /// Returns true for [`VerificationStatus::Verified`].
    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "verified" => Ok(Self::Verified),
            "mismatch" => Ok(Self::Mismatch),
            "not_found" => Ok(Self::NotFound),
            "error" => Ok(Self::Error),
            other => Err(Error::Config(format!("unknown verification status: {other}"))),
        }
    }
}

/// Which field a provider disagreed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchReason {
    /// Reported inscription id differs.
    InscriptionId,
    /// Reported tx id differs.
    Txid,
    /// Reported content hash differs.
    ContentHash,
}

impl MismatchReason {
    /// Audit representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InscriptionId => "inscriptionId_diff",
            Self::Txid => "txid_diff",
            Self::ContentHash => "content_hash_diff",
        }
    }
}

/// Verdict of comparing one provider result with one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// The provider's answer agrees with the certificate.
    Verified,
    /// The provider reported a value that disagrees.
    Mismatch(MismatchReason),
    /// The provider resolved nothing; carries its reason.
    Error(String),
}

impl Comparison {
    /// Status recorded in the audit trail for this outcome.
    #[must_use]
    pub fn status(&self) -> VerificationStatus {
        match self {
            Self::Verified => VerificationStatus::Verified,
            Self::Mismatch(_) => VerificationStatus::Mismatch,
            Self::Error(_) => VerificationStatus::Error,
        }
    }

    /// Returns true if the outcome counts toward the quorum.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }

    /// Machine-readable reason, absent for [`Comparison::Verified`].
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Verified => None,
            Self::Mismatch(reason) => Some(reason.as_str()),
            Self::Error(reason) => Some(reason),
        }
    }

    /// JSON form stored under `verdict` in audit details.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self.reason() {
            Some(reason) => json!({ "status": self.status(), "reason": reason }),
            None => json!({ "status": self.status() }),
        }
    }
}

/// Final verdict for one certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Overall status.
    pub status: VerificationStatus,
    /// Providers actually invoked.
    pub providers_queried: usize,
    /// Providers whose answer verified the certificate.
    pub verified_matches: usize,
}

/// Reconciles provider answers for certificates.
///
/// Holds no mutable state: one instance can be shared behind an [`Arc`] and
/// used for many certificates concurrently.
pub struct Verifier {
    providers: Vec<Arc<dyn Provider>>,
    policy: MatchPolicy,
    audit: Arc<dyn AuditSink>,
    backoff: BackoffOptions,
}

impl Verifier {
    /// Create a verifier over `providers`, queried in the given order.
    ///
    /// An empty provider list is accepted here and yields
    /// [`VerificationStatus::Error`] for every certificate;
    /// [`Verifier::from_config`] refuses it instead.
    #[must_use]
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        policy: MatchPolicy,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            providers,
            policy,
            audit,
            backoff: BackoffOptions::default(),
        }
    }

    /// Override the retry schedule used around each provider call.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffOptions) -> Self {
        self.backoff = backoff;
        self
    }

    /// Build a verifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no provider is configured or a provider
    /// cannot be constructed.
    pub async fn from_config(config: &AuditConfig, audit: Arc<dyn AuditSink>) -> Result<Self> {
        let providers = config.build_providers().await?;
        if providers.is_empty() {
            return Err(Error::Config(
                "No providers configured. Set DOGE_INDEXER_BASE or another provider base URL."
                    .to_string(),
            ));
        }

        let verifier = Self::new(providers, config.policy, audit).with_backoff(config.retry);
        info!(
            "Verifier initialized (providers=[{}], quorum={}, require_tx_match={}, require_hash_match={})",
            verifier.provider_names().join(", "),
            verifier.policy.effective_quorum(),
            verifier.policy.require_tx_match,
            verifier.policy.require_hash_match
        );
        Ok(verifier)
    }

    /// Names of the configured providers, in query order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// The match policy in force.
    #[must_use]
    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Verify one certificate against the configured providers.
    ///
    /// Never fails: provider errors become `error` outcomes and audit-sink
    /// errors are logged. A certificate that fails [`Certificate::validate`]
    /// is answered `error` without querying any provider or writing audits.
    pub async fn verify_certificate(&self, certificate: &Certificate) -> VerificationResult {
        if let Err(e) = certificate.validate() {
            warn!("Refusing to verify certificate {:?}: {e}", certificate.id);
            return VerificationResult {
                status: VerificationStatus::Error,
                providers_queried: 0,
                verified_matches: 0,
            };
        }

        let quorum = self.policy.effective_quorum();
        let mut outcomes: Vec<(&str, ProviderResult)> = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name();
            let result = match backoff(|| provider.resolve(certificate), self.backoff).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        provider = name,
                        certificate = %certificate.id,
                        "Provider failed after retries: {e}"
                    );
                    ProviderResult::transport_failure(&e)
                }
            };
            debug!(
                "{name} answered for {}: ok={} reason={:?}",
                certificate.id, result.ok, result.reason
            );

            if quorum <= 1 && result.ok {
                let comparison = self.compare(certificate, &result);
                if comparison.is_verified() {
                    let providers_queried = outcomes.len() + 1;
                    self.record(certificate, name, &result, &comparison).await;
                    info!(
                        "Certificate {} verified by {name} ({providers_queried} provider(s) queried)",
                        certificate.id
                    );
                    return VerificationResult {
                        status: VerificationStatus::Verified,
                        providers_queried,
                        verified_matches: 1,
                    };
                }
            }

            outcomes.push((name, result));
        }

        let compared: Vec<(&str, ProviderResult, Comparison)> = outcomes
            .into_iter()
            .map(|(name, result)| {
                let comparison = self.compare(certificate, &result);
                (name, result, comparison)
            })
            .collect();

        let verified_matches = compared.iter().filter(|(_, _, c)| c.is_verified()).count();
        let status = if verified_matches >= quorum {
            VerificationStatus::Verified
        } else if compared.iter().any(|(_, r, _)| r.ok) {
            VerificationStatus::Mismatch
        } else if compared.is_empty() {
            VerificationStatus::Error
        } else {
            VerificationStatus::NotFound
        };

        for (name, result, comparison) in &compared {
            self.record(certificate, name, result, comparison).await;
        }

        info!(
            "Certificate {} {status} ({verified_matches}/{quorum} matches, {} provider(s) queried)",
            certificate.id,
            compared.len()
        );

        VerificationResult {
            status,
            providers_queried: compared.len(),
            verified_matches,
        }
    }

    /// Compare one provider result with the certificate under this policy.
    ///
    /// Only an observed disagreement is a mismatch; a field missing on
    /// either side is never one.
    #[must_use]
    pub fn compare(&self, certificate: &Certificate, result: &ProviderResult) -> Comparison {
        if !result.ok {
            return Comparison::Error(
                result
                    .reason
                    .clone()
                    .unwrap_or_else(|| "unresolved".to_string()),
            );
        }

        if let Some(inscription_id) = non_empty(&result.inscription_id) {
            if inscription_id != certificate.expected_inscription_id {
                return Comparison::Mismatch(MismatchReason::InscriptionId);
            }
        }

        if self.policy.require_tx_match {
            if let (Some(expected), Some(actual)) =
                (non_empty(&certificate.expected_txid), non_empty(&result.txid))
            {
                if expected != actual {
                    return Comparison::Mismatch(MismatchReason::Txid);
                }
            }
        }

        if self.policy.require_hash_match {
            if let (Some(expected), Some(actual)) = (
                non_empty(&certificate.expected_content_hash),
                non_empty(&result.content_hash),
            ) {
                if expected.to_lowercase() != actual.to_lowercase() {
                    return Comparison::Mismatch(MismatchReason::ContentHash);
                }
            }
        }

        Comparison::Verified
    }

    async fn record(
        &self,
        certificate: &Certificate,
        provider: &str,
        result: &ProviderResult,
        comparison: &Comparison,
    ) {
        let mut details = serde_json::to_value(result).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut details {
            map.insert("verdict".to_string(), comparison.to_json());
        }

        let record = AuditRecord::new(&certificate.id, comparison.status(), provider, details);
        if let Err(e) = self.audit.insert(record).await {
            warn!(
                provider,
                certificate = %certificate.id,
                "Audit write failed: {e}"
            );
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

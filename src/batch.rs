//! Batch audit over a certificate source.
//!
//! Pulls up to `limit` certificates from a [`CertificateSource`] and runs
//! each through the [`Verifier`]. With `concurrency > 1` several
//! certificates are in flight at once; outcomes are still reported in
//! source order.

use crate::certificate::Certificate;
use crate::error::Result;
use crate::store::CertificateSource;
use crate::verifier::{VerificationResult, VerificationStatus, Verifier};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Default number of certificates per run.
pub const DEFAULT_LIMIT: usize = 5000;

/// Verdict for one certificate of a batch.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    /// Certificate id.
    pub certificate_id: String,
    /// Verification outcome.
    pub result: VerificationResult,
}

/// Totals for a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Certificates that verified.
    pub verified: usize,
    /// Certificates with any other status.
    pub failed: usize,
    /// Count per status.
    pub by_status: BTreeMap<String, usize>,
    /// Per-certificate outcomes in source order.
    pub entries: Vec<BatchEntry>,
}

impl BatchSummary {
    fn push(&mut self, certificate_id: String, result: VerificationResult) {
        if result.status.is_verified() {
            self.verified += 1;
        } else {
            self.failed += 1;
        }
        *self
            .by_status
            .entry(result.status.as_str().to_string())
            .or_default() += 1;
        self.entries.push(BatchEntry {
            certificate_id,
            result,
        });
    }

    /// Number of certificates checked.
    #[must_use]
    pub fn total(&self) -> usize {
        self.verified + self.failed
    }

    /// Check if every certificate verified.
    #[must_use]
    pub fn all_verified(&self) -> bool {
        self.failed == 0
    }

    /// Count of certificates that ended with `status`.
    #[must_use]
    pub fn count(&self, status: VerificationStatus) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}

/// Runs the verifier over every certificate a source yields.
pub struct BatchAuditor {
    verifier: Arc<Verifier>,
    source: Arc<dyn CertificateSource>,
    limit: usize,
    concurrency: usize,
}

impl BatchAuditor {
    /// Create an auditor with the default limit and sequential processing.
    #[must_use]
    pub fn new(verifier: Arc<Verifier>, source: Arc<dyn CertificateSource>) -> Self {
        Self {
            verifier,
            source,
            limit: DEFAULT_LIMIT,
            concurrency: 1,
        }
    }

    /// Maximum number of certificates to pull from the source.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Number of certificates verified at once (at least 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Verify every certificate from the source.
    ///
    /// # Errors
    ///
    /// Returns an error only if the source cannot be read; individual
    /// verification failures are part of the summary.
    pub async fn run(&self) -> Result<BatchSummary> {
        let certificates = self.source.certificates(self.limit).await?;
        info!(
            "Auditing {} certificate(s) (limit={}, concurrency={})",
            certificates.len(),
            self.limit,
            self.concurrency
        );

        let verifier = &self.verifier;
        let results: Vec<(Certificate, VerificationResult)> = stream::iter(certificates)
            .map(|certificate| async move {
                let result = verifier.verify_certificate(&certificate).await;
                (certificate, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut summary = BatchSummary::default();
        for (certificate, result) in results {
            if !result.status.is_verified() {
                warn!(
                    "Certificate {} failed verification: {}",
                    certificate.id, result.status
                );
            }
            summary.push(certificate.id, result);
        }

        info!(
            "Audit complete: {} verified, {} failed",
            summary.verified, summary.failed
        );
        Ok(summary)
    }
}

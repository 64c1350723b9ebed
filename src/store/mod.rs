//! Certificate sources and audit sinks.
//!
//! The verifier only needs two things from storage: a bounded list of
//! certificates to check ([`CertificateSource`]) and a write-only trail of
//! per-provider outcomes ([`AuditSink`]). Audit rows are written once and
//! never updated or deleted.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::certificate::Certificate;
use crate::error::{Error, Result};
use crate::verifier::VerificationStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// One audited provider outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Certificate the outcome belongs to.
    pub certificate_id: String,
    /// Comparison verdict for this provider.
    pub status: VerificationStatus,
    /// Provider name.
    pub provider: String,
    /// Provider result plus its `verdict`.
    pub details: Value,
    /// When the row was produced.
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(
        certificate_id: impl Into<String>,
        status: VerificationStatus,
        provider: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            certificate_id: certificate_id.into(),
            status,
            provider: provider.into(),
            details,
            recorded_at: Utc::now(),
        }
    }
}

/// Durable, append-only destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be persisted.
    async fn insert(&self, record: AuditRecord) -> Result<()>;
}

/// Supplier of certificates to verify.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Return at most `limit` certificates in a stable order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    async fn certificates(&self, limit: usize) -> Result<Vec<Certificate>>;
}

/// In-memory audit sink, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    /// Number of records written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn insert(&self, record: AuditRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}

/// Reads certificates from a JSON array file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    /// Create a source for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read and validate every certificate in the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or a
    /// certificate is invalid.
    pub async fn load(&self) -> Result<Vec<Certificate>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let certificates: Vec<Certificate> = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Config(format!(
                "failed to parse certificates from {}: {e}",
                self.path.display()
            ))
        })?;
        for certificate in &certificates {
            certificate.validate()?;
        }
        Ok(certificates)
    }
}

#[async_trait]
impl CertificateSource for JsonFileSource {
    async fn certificates(&self, limit: usize) -> Result<Vec<Certificate>> {
        let mut certificates = self.load().await?;
        certificates.truncate(limit);
        Ok(certificates)
    }
}

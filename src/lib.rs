//! # cert-audit
//!
//! Cross-provider verification of certificate inscriptions.
//!
//! A certificate claims that some content was inscribed on a ledger under a
//! given inscription id (and optionally a transaction id and content hash).
//! cert-audit asks several independent, untrusted providers what they see for
//! that inscription, reconciles their answers against a [`MatchPolicy`], and
//! writes one audit row per provider outcome.
//!
//! ```text
//! Certificate ──► Verifier ──► [backoff] ──► Provider #1 ──┐
//!                    │                         ...          ├─► compare ─► quorum ─► VerificationResult
//!                    │          [backoff] ──► Provider #n ──┘
//!                    └──────────────────────────────────────► AuditSink
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use cert_audit::{AuditConfig, Verifier};
//!
//! let config = AuditConfig::from_file("config.toml".as_ref())?;
//! let verifier = Verifier::from_config(&config, audit_sink).await?;
//! let result = verifier.verify_certificate(&certificate).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod batch;
pub mod cache;
pub mod certificate;
pub mod config;
pub mod error;
pub mod provider;
pub mod server;
pub mod store;
pub mod verifier;

pub use backoff::{backoff, BackoffOptions};
pub use batch::{BatchAuditor, BatchSummary};
pub use certificate::Certificate;
pub use config::AuditConfig;
pub use error::{Error, Result};
pub use provider::{Provider, ProviderResult};
pub use store::{
    AuditRecord, AuditSink, CertificateSource, JsonFileSource, MemoryAuditSink, SqliteStore,
};
pub use verifier::{Comparison, MatchPolicy, VerificationResult, VerificationStatus, Verifier};

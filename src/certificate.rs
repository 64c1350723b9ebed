//! Certificate claims to be verified.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A claim that some content was inscribed on the ledger.
///
/// Only `expected_inscription_id` is mandatory. The tx id and content hash
/// take part in comparison only when both the certificate and a provider
/// report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Opaque certificate identifier.
    pub id: String,
    /// Inscription id the certificate claims to correspond to.
    pub expected_inscription_id: String,
    /// Digest the inscribed content is claimed to hash to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_content_hash: Option<String>,
    /// Transaction the inscription is claimed to be recorded in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_txid: Option<String>,
}

impl Certificate {
    /// Create a certificate with only the mandatory fields set.
    #[must_use]
    pub fn new(id: impl Into<String>, expected_inscription_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expected_inscription_id: expected_inscription_id.into(),
            expected_content_hash: None,
            expected_txid: None,
        }
    }

    /// Set the expected content hash.
    #[must_use]
    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.expected_content_hash = Some(hash.into());
        self
    }

    /// Set the expected transaction id.
    #[must_use]
    pub fn with_txid(mut self, txid: impl Into<String>) -> Self {
        self.expected_txid = Some(txid.into());
        self
    }

    /// Check the certificate carries the identifiers verification needs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCertificate`] if `id` or
    /// `expected_inscription_id` is empty.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidCertificate("empty certificate id".to_string()));
        }
        if self.expected_inscription_id.trim().is_empty() {
            return Err(Error::InvalidCertificate(format!(
                "certificate {} has no expected_inscription_id",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_without_optional_fields() {
        let cert: Certificate =
            serde_json::from_str(r#"{"id":"CERT-1","expected_inscription_id":"inscription:abc"}"#)
                .expect("should parse");
        assert_eq!(cert, Certificate::new("CERT-1", "inscription:abc"));
        assert!(cert.validate().is_ok());
    }

    #[test]
    fn test_deserialize_null_optional_fields() {
        let cert: Certificate = serde_json::from_str(
            r#"{"id":"CERT-2","expected_inscription_id":"i","expected_content_hash":null,"expected_txid":"tx9"}"#,
        )
        .expect("should parse");
        assert!(cert.expected_content_hash.is_none());
        assert_eq!(cert.expected_txid.as_deref(), Some("tx9"));
    }

    #[test]
    fn test_validate_rejects_empty_inscription_id() {
        let cert = Certificate::new("CERT-3", "  ");
        let err = cert.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidCertificate(_)));
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        assert!(Certificate::new("", "inscription:abc").validate().is_err());
    }
}

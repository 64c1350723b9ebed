//! SQLite-backed certificate source and audit sink.

use super::{AuditRecord, AuditSink, CertificateSource};
use crate::certificate::Certificate;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS certificates (
    id                      TEXT PRIMARY KEY CHECK (trim(id) <> ''),
    expected_inscription_id TEXT NOT NULL CHECK (trim(expected_inscription_id) <> ''),
    expected_content_hash   TEXT,
    expected_txid           TEXT
);

CREATE TABLE IF NOT EXISTS certificate_audits (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    certificate_id TEXT NOT NULL,
    status         TEXT NOT NULL,
    provider_chain TEXT NOT NULL,
    details        TEXT NOT NULL,
    recorded_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_certificate_audits_certificate
    ON certificate_audits (certificate_id);
";

/// Certificate table and audit trail in one SQLite database.
///
/// The connection is shared behind a mutex; every query runs on the blocking
/// thread pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!("Opened audit database at {}", path.display());
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await?
    }

    /// Insert or replace certificates.
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate is invalid or the write fails.
    pub async fn upsert_certificates(&self, certificates: Vec<Certificate>) -> Result<usize> {
        for certificate in &certificates {
            certificate.validate()?;
        }
        self.run(move |conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO certificates (id, expected_inscription_id, expected_content_hash, expected_txid)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                         expected_inscription_id = excluded.expected_inscription_id,
                         expected_content_hash = excluded.expected_content_hash,
                         expected_txid = excluded.expected_txid",
                )?;
                for certificate in &certificates {
                    stmt.execute(params![
                        certificate.id,
                        certificate.expected_inscription_id,
                        certificate.expected_content_hash,
                        certificate.expected_txid
                    ])?;
                }
            }
            tx.commit()?;
            Ok(certificates.len())
        })
        .await
    }

    /// Look up one certificate by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn certificate(&self, id: &str) -> Result<Option<Certificate>> {
        let id = id.to_string();
        self.run(move |conn| {
            let certificate = conn
                .query_row(
                    "SELECT id, expected_inscription_id, expected_content_hash, expected_txid
                     FROM certificates WHERE id = ?1",
                    params![id],
                    certificate_from_row,
                )
                .optional()?;
            Ok(certificate)
        })
        .await
    }

    /// All audit rows for a certificate, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored row is malformed.
    pub async fn audits_for(&self, certificate_id: &str) -> Result<Vec<AuditRecord>> {
        let certificate_id = certificate_id.to_string();
        let rows = self
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT certificate_id, status, provider_chain, details, recorded_at
                     FROM certificate_audits
                     WHERE certificate_id = ?1
                     ORDER BY id ASC",
                )?;
                let rows = stmt
                    .query_map(params![certificate_id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(certificate_id, status, provider, details, recorded_at)| {
                Ok(AuditRecord {
                    certificate_id,
                    status: status.parse()?,
                    provider,
                    details: serde_json::from_str(&details)?,
                    recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                        .map_err(|e| Error::Config(format!("bad audit timestamp {recorded_at}: {e}")))?
                        .with_timezone(&Utc),
                })
            })
            .collect()
    }
}

fn certificate_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        id: row.get(0)?,
        expected_inscription_id: row.get(1)?,
        expected_content_hash: row.get(2)?,
        expected_txid: row.get(3)?,
    })
}

#[async_trait]
impl CertificateSource for SqliteStore {
    async fn certificates(&self, limit: usize) -> Result<Vec<Certificate>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let certificates = self
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, expected_inscription_id, expected_content_hash, expected_txid
                     FROM certificates
                     ORDER BY id ASC
                     LIMIT ?1",
                )?;
                let certificates = stmt
                    .query_map(params![limit], certificate_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(certificates)
            })
            .await?;
        // Tables created before the CHECK constraints may still hold blank ids
        let certificates: Vec<Certificate> = certificates
            .into_iter()
            .filter(|certificate| match certificate.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Skipping certificate row {:?}: {e}", certificate.id);
                    false
                }
            })
            .collect();
        debug!("Loaded {} certificates from database", certificates.len());
        Ok(certificates)
    }
}

#[async_trait]
impl AuditSink for SqliteStore {
    async fn insert(&self, record: AuditRecord) -> Result<()> {
        let details = serde_json::to_string(&record.details)?;
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO certificate_audits (certificate_id, status, provider_chain, details, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.certificate_id,
                    record.status.as_str(),
                    record.provider,
                    details,
                    record.recorded_at.to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
    }
}

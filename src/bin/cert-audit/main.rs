//! cert-audit CLI entry point.

mod cli;

use cert_audit::{
    AuditConfig, AuditSink, BatchAuditor, CertificateSource, JsonFileSource, SqliteStore,
    Verifier,
};
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit code when at least one certificate failed verification.
const EXIT_VERIFICATION_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Build configuration
    let config = cli.to_config()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    info!("cert-audit v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Audit { certificates, .. } => audit(&config, certificates).await,
        Command::Serve { .. } => serve(&config).await,
        Command::Import { file } => import(&config, file).await,
    }
}

async fn audit(
    config: &AuditConfig,
    certificates: Option<PathBuf>,
) -> color_eyre::Result<ExitCode> {
    let store = Arc::new(SqliteStore::open(&config.store.database)?);
    let sink = Arc::clone(&store) as Arc<dyn AuditSink>;
    let verifier = Arc::new(Verifier::from_config(config, sink).await?);

    let source: Arc<dyn CertificateSource> = match certificates {
        Some(path) => Arc::new(JsonFileSource::new(path)),
        None => store,
    };

    let summary = BatchAuditor::new(verifier, source)
        .with_limit(config.limit)
        .with_concurrency(config.concurrency)
        .run()
        .await?;

    for (status, count) in &summary.by_status {
        info!("{status}: {count}");
    }

    if summary.all_verified() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_VERIFICATION_FAILED))
    }
}

async fn serve(config: &AuditConfig) -> color_eyre::Result<ExitCode> {
    let store = Arc::new(SqliteStore::open(&config.store.database)?);
    let verifier = Arc::new(Verifier::from_config(config, store).await?);

    cert_audit::server::serve(config.server.listen, verifier).await?;

    info!("Goodbye!");
    Ok(ExitCode::SUCCESS)
}

async fn import(config: &AuditConfig, file: PathBuf) -> color_eyre::Result<ExitCode> {
    let certificates = JsonFileSource::new(&file).load().await?;
    let store = SqliteStore::open(&config.store.database)?;
    let imported = store.upsert_certificates(certificates).await?;

    info!(
        "Imported {imported} certificate(s) from {} into {}",
        file.display(),
        config.store.database.display()
    );
    Ok(ExitCode::SUCCESS)
}

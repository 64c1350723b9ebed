//! Command-line interface definition.

use cert_audit::config::{AuditConfig, ProviderEndpoint};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Cross-provider verification of certificate inscriptions.
#[derive(Parser, Debug)]
#[command(name = "cert-audit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Inscription indexer base URL.
    #[arg(long, global = true, env = "DOGE_INDEXER_BASE")]
    pub indexer_base: Option<String>,

    /// Inscription indexer API key.
    #[arg(long, global = true, env = "DOGE_INDEXER_KEY", hide_env_values = true)]
    pub indexer_key: Option<String>,

    /// Block explorer base URL.
    #[arg(long, global = true, env = "EXPLORER_BASE")]
    pub explorer_base: Option<String>,

    /// Block explorer API key.
    #[arg(long, global = true, env = "EXPLORER_KEY", hide_env_values = true)]
    pub explorer_key: Option<String>,

    /// Marketplace API base URL.
    #[arg(long, global = true, env = "MARKET_BASE")]
    pub market_base: Option<String>,

    /// Marketplace API key.
    #[arg(long, global = true, env = "MARKET_KEY", hide_env_values = true)]
    pub market_key: Option<String>,

    /// Node RPC relay base URL.
    #[arg(long, global = true, env = "DOGE_RPC_BASE")]
    pub rpc_base: Option<String>,

    /// Node RPC relay API key.
    #[arg(long, global = true, env = "DOGE_RPC_KEY", hide_env_values = true)]
    pub rpc_key: Option<String>,

    /// Providers that must independently verify a certificate.
    #[arg(long, global = true, env = "VERIFIER_QUORUM")]
    pub quorum: Option<u32>,

    /// Compare reported transaction ids.
    #[arg(long, global = true)]
    pub require_tx_match: Option<bool>,

    /// Compare reported content hashes.
    #[arg(long, global = true)]
    pub require_hash_match: Option<bool>,

    /// Audit database path (a `sqlite://` prefix is accepted).
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database: Option<String>,

    /// Cache successful provider resolutions on disk.
    #[arg(long, global = true)]
    pub cache: bool,

    /// Log level.
    #[arg(long, global = true, env = "RUST_LOG")]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// cert-audit subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify certificates from the database (or a JSON file) once.
    Audit {
        /// Read certificates from this JSON array file instead of the database.
        #[arg(long)]
        certificates: Option<PathBuf>,

        /// Maximum number of certificates to check.
        #[arg(long, env = "VERIFIER_LIMIT")]
        limit: Option<usize>,

        /// Certificates verified at once.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Serve the verification API.
    Serve {
        /// Listen address.
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Listen port (keeps the configured host).
        #[arg(long, short, env = "PORT")]
        port: Option<u16>,
    },

    /// Load certificates from a JSON array file into the database.
    Import {
        /// JSON file to import.
        file: PathBuf,
    },
}

impl Cli {
    /// Build the configuration from the file (if any) and CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn to_config(&self) -> color_eyre::Result<AuditConfig> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            AuditConfig::from_file(path)?
        } else {
            AuditConfig::default()
        };

        override_endpoint(
            &mut config.providers.indexer,
            self.indexer_base.as_ref(),
            self.indexer_key.as_ref(),
        );
        override_endpoint(
            &mut config.providers.explorer,
            self.explorer_base.as_ref(),
            self.explorer_key.as_ref(),
        );
        override_endpoint(
            &mut config.providers.marketplace,
            self.market_base.as_ref(),
            self.market_key.as_ref(),
        );
        override_endpoint(
            &mut config.providers.rpc_relay,
            self.rpc_base.as_ref(),
            self.rpc_key.as_ref(),
        );

        if let Some(quorum) = self.quorum {
            config.policy.quorum = quorum;
        }
        if let Some(require) = self.require_tx_match {
            config.policy.require_tx_match = require;
        }
        if let Some(require) = self.require_hash_match {
            config.policy.require_hash_match = require;
        }
        if let Some(ref database) = self.database {
            let path = database.strip_prefix("sqlite://").unwrap_or(database);
            config.store.database = PathBuf::from(path);
        }
        if self.cache {
            config.cache.enabled = true;
        }
        if let Some(ref level) = self.log_level {
            config.log_level.clone_from(level);
        }

        match self.command {
            Command::Audit {
                limit, concurrency, ..
            } => {
                if let Some(limit) = limit {
                    config.limit = limit;
                }
                if let Some(concurrency) = concurrency {
                    config.concurrency = concurrency;
                }
            }
            Command::Serve { listen, port } => {
                if let Some(listen) = listen {
                    config.server.listen = listen;
                }
                if let Some(port) = port {
                    config.server.listen.set_port(port);
                }
            }
            Command::Import { .. } => {}
        }

        Ok(config)
    }
}

fn override_endpoint(
    endpoint: &mut ProviderEndpoint,
    base_url: Option<&String>,
    api_key: Option<&String>,
) {
    if let Some(base_url) = base_url {
        endpoint.base_url = Some(base_url.clone());
    }
    if let Some(api_key) = api_key {
        endpoint.api_key = Some(api_key.clone());
    }
}

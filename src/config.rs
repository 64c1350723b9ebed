//! Configuration for cert-audit.

use crate::backoff::BackoffOptions;
use crate::cache::{CacheOptions, DiskBackedCache};
use crate::error::{Error, Result};
use crate::provider::{
    CachingProvider, ExplorerProvider, HttpTransport, IndexerProvider, MarketplaceProvider,
    Provider, ProviderResult, ReqwestTransport, RpcRelayProvider,
};
use crate::verifier::MatchPolicy;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Base URL and optional API key of one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    /// Base URL; the provider is disabled when unset or empty.
    #[serde(default)]
    pub base_url: Option<String>,
    /// API key sent with every request.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ProviderEndpoint {
    /// Endpoint for `base_url` with an optional key.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            api_key,
        }
    }

    fn enabled(&self) -> Option<&str> {
        self.base_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    fn key(&self) -> Option<String> {
        self.api_key.clone().filter(|key| !key.is_empty())
    }
}

/// Provider endpoints; providers are queried in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Inscription indexer.
    #[serde(default)]
    pub indexer: ProviderEndpoint,
    /// Block explorer.
    #[serde(default)]
    pub explorer: ProviderEndpoint,
    /// Marketplace API.
    #[serde(default)]
    pub marketplace: ProviderEndpoint,
    /// Node RPC relay.
    #[serde(default)]
    pub rpc_relay: ProviderEndpoint,
}

impl ProvidersConfig {
    /// Number of providers with a base URL.
    #[must_use]
    pub fn configured(&self) -> usize {
        [&self.indexer, &self.explorer, &self.marketplace, &self.rpc_relay]
            .iter()
            .filter(|endpoint| endpoint.enabled().is_some())
            .count()
    }
}

/// Audit database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database holding certificates and audit rows.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Provider response cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache successful provider resolutions.
    #[serde(default)]
    pub enabled: bool,

    /// Directory for cache files.
    #[serde(default = "default_cache_dir")]
    pub directory: PathBuf,

    /// Entries kept in memory.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Entry lifetime in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

/// Verification API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

/// cert-audit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Match policy.
    #[serde(default)]
    pub policy: MatchPolicy,

    /// Retry schedule around each provider call.
    #[serde(default)]
    pub retry: BackoffOptions,

    /// Provider endpoints.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Audit database.
    #[serde(default)]
    pub store: StoreConfig,

    /// Provider response cache.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Verification API.
    #[serde(default)]
    pub server: ServerConfig,

    /// Maximum certificates checked by one batch run.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Certificates verified at once by a batch run.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout for provider calls, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::default(),
            retry: BackoffOptions::default(),
            providers: ProvidersConfig::default(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            limit: default_limit(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
            log_level: default_log_level(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_cache_dir(),
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "cert-audit")
}

fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("cert-audit.db"))
        .unwrap_or_else(|| PathBuf::from(".cert-audit/cert-audit.db"))
}

fn default_cache_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.cache_dir().join("responses"))
        .unwrap_or_else(|| PathBuf::from(".cert-audit/cache"))
}

const fn default_cache_capacity() -> usize {
    10_000
}

const fn default_cache_ttl() -> u64 {
    3600 // 1 hour
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

const fn default_limit() -> usize {
    5000
}

const fn default_concurrency() -> usize {
    1
}

const fn default_request_timeout() -> u64 {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AuditConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Per-request provider timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Construct the configured providers in query order.
    ///
    /// Returns an empty list when nothing is configured; callers decide
    /// whether that is fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if a base URL is invalid, the HTTP client cannot be
    /// built, or the cache directory cannot be created.
    pub async fn build_providers(&self) -> Result<Vec<Arc<dyn Provider>>> {
        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new(self.request_timeout())?);
        let endpoints = &self.providers;
        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

        if let Some(base) = endpoints.indexer.enabled() {
            providers.push(Arc::new(IndexerProvider::new(
                base,
                endpoints.indexer.key(),
                Arc::clone(&transport),
            )?));
        }
        if let Some(base) = endpoints.explorer.enabled() {
            providers.push(Arc::new(ExplorerProvider::new(
                base,
                endpoints.explorer.key(),
                Arc::clone(&transport),
            )?));
        }
        if let Some(base) = endpoints.marketplace.enabled() {
            providers.push(Arc::new(MarketplaceProvider::new(
                base,
                endpoints.marketplace.key(),
                Arc::clone(&transport),
            )?));
        }
        if let Some(base) = endpoints.rpc_relay.enabled() {
            providers.push(Arc::new(RpcRelayProvider::new(
                base,
                endpoints.rpc_relay.key(),
                Arc::clone(&transport),
            )?));
        }

        if self.cache.enabled && !providers.is_empty() {
            let cache: Arc<DiskBackedCache<ProviderResult>> = Arc::new(
                DiskBackedCache::open(CacheOptions {
                    directory: self.cache.directory.clone(),
                    capacity: self.cache.capacity,
                    ttl: Duration::from_secs(self.cache.ttl_secs),
                })
                .await?,
            );
            info!(
                "Provider response cache enabled at {}",
                self.cache.directory.display()
            );
            providers = providers
                .into_iter()
                .map(|inner| {
                    Arc::new(CachingProvider::new(inner, Arc::clone(&cache))) as Arc<dyn Provider>
                })
                .collect();
        }

        debug!("Built {} provider(s)", providers.len());
        Ok(providers)
    }
}

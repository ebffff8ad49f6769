use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub contracts: ContractsConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub refresher: RefresherConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("DEVOTE_API_CONFIG").unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("DEVOTE_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.server.port > 0, "Server port must be greater than zero");
        ensure!(!self.chain.rpc_url.is_empty(), "Chain RPC URL must be specified");
        ensure!(self.chain.chain_id > 0, "Chain id must be positive");
        ensure!(
            !self.contracts.token_symbol.trim().is_empty(),
            "Token symbol must not be empty"
        );
        self.cache.ensure_bounds()?;
        self.refresher.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub request_timeout_ms: Option<u64>,
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(10_000);
        assert!(millis >= 100, "RPC timeout must be at least 100ms");
        assert!(
            millis <= 300_000,
            "RPC timeout cannot exceed five minutes"
        );
        Duration::from_millis(millis)
    }
}

/// Deployed contract addresses. Parsed into a `ContractRegistry` at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    pub governance: String,
    pub token: String,
    pub og_nft: String,
    pub farm_nft: String,
    pub early_bird_nft: String,
    pub galxe_vote_nft: String,
    pub nft_reward: String,
    pub name_registry: String,
    #[serde(default = "ContractsConfig::default_token_symbol")]
    pub token_symbol: String,
}

impl ContractsConfig {
    fn default_token_symbol() -> String {
        "HASH".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub max_capacity: u64,
    #[serde(default = "CacheConfig::default_detail_ttl")]
    pub proposal_detail_ttl_seconds: u64,
    #[serde(default = "CacheConfig::default_canonical_ttl")]
    pub canonical_ttl_seconds: u64,
    #[serde(default = "CacheConfig::default_holdings_ttl")]
    pub holdings_ttl_seconds: u64,
    #[serde(default = "CacheConfig::default_static_ttl")]
    pub static_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        ensure!(
            self.max_capacity >= 100,
            "Read cache capacity must be at least 100"
        );
        for (label, ttl) in [
            ("proposal_detail_ttl_seconds", self.proposal_detail_ttl_seconds),
            ("canonical_ttl_seconds", self.canonical_ttl_seconds),
            ("holdings_ttl_seconds", self.holdings_ttl_seconds),
            ("static_ttl_seconds", self.static_ttl_seconds),
        ] {
            ensure!(ttl > 0, "{label} must be positive");
            ensure!(ttl <= 86_400, "{label} cannot exceed one day");
        }
        ensure!(
            self.proposal_detail_ttl_seconds <= self.canonical_ttl_seconds,
            "Proposal detail reads must not outlive canonical reads"
        );
        Ok(())
    }

    const fn default_detail_ttl() -> u64 {
        30
    }

    const fn default_canonical_ttl() -> u64 {
        60
    }

    const fn default_holdings_ttl() -> u64 {
        300
    }

    const fn default_static_ttl() -> u64 {
        3_600
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefresherConfig {
    #[serde(default = "RefresherConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "RefresherConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            poll_interval_ms: Self::default_poll_interval_ms(),
        }
    }
}

impl RefresherConfig {
    pub fn poll_interval(&self) -> Duration {
        assert!(
            self.poll_interval_ms >= 1_000,
            "Poll interval must be >= 1 second"
        );
        Duration::from_millis(self.poll_interval_ms)
    }

    fn ensure_bounds(&self) -> Result<()> {
        ensure!(
            self.poll_interval_ms >= 1_000,
            "Refresher poll interval must be at least one second"
        );
        ensure!(
            self.poll_interval_ms <= 3_600_000,
            "Refresher poll interval cannot exceed one hour"
        );
        Ok(())
    }

    const fn default_enabled() -> bool {
        true
    }

    const fn default_poll_interval_ms() -> u64 {
        30_000
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}

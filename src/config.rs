//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The signing credential is referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`, wrapped in `secrecy::Secret`
//! so it never lands in logs.

use anyhow::{Context, Result};
use secrecy::Secret;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub market: MarketConfig,
    pub chain: ChainConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketConfig {
    /// Kalshi trade API base, e.g. "https://demo-api.kalshi.co/trade-api/v2".
    pub base_url: String,
    /// Series whose events carry the exchange-rate strikes.
    pub series_ticker: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub oracle_address: String,
    pub treasury_address: String,
    pub usdc_address: String,
    pub eurc_address: String,
    /// Name of the env var holding the signing key, not the key itself.
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
    /// How long to wait for a transaction receipt before giving up.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Offset added to the submission time to form the resolution timestamp.
    pub resolution_window_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_private_key_env() -> String {
    "PRIVATE_KEY".to_string()
}

fn default_confirmation_timeout_secs() -> u64 {
    120
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve the signing key from the env var named in the chain config.
    pub fn signing_key(&self) -> Result<Secret<String>> {
        let key = std::env::var(&self.chain.private_key_env).with_context(|| {
            format!(
                "Environment variable not set: {}",
                self.chain.private_key_env
            )
        })?;
        Ok(Secret::new(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        enabled = true
        port = 8000

        [market]
        base_url = "https://demo-api.kalshi.co/trade-api/v2"
        series_ticker = "KXEURUSD"

        [chain]
        rpc_url = "https://rpc.testnet.arc.network"
        chain_id = 314098
        oracle_address = "0xc1256868D57378ef0309928Dedce736815A8bC41"
        treasury_address = "0x0000000000000000000000000000000000000001"
        usdc_address = "0x0000000000000000000000000000000000000002"
        eurc_address = "0x0000000000000000000000000000000000000003"

        [scheduler]
        enabled = true
        interval_secs = 300
        resolution_window_secs = 86400
    "#;

    #[test]
    fn test_parse_sample_config() {
        let cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.market.series_ticker, "KXEURUSD");
        assert_eq!(cfg.chain.chain_id, 314098);
        assert_eq!(cfg.scheduler.interval_secs, 300);
        // Defaults fill in when omitted
        assert_eq!(cfg.market.request_timeout_secs, 30);
        assert_eq!(cfg.chain.private_key_env, "PRIVATE_KEY");
        assert_eq!(cfg.chain.confirmation_timeout_secs, 120);
    }

    #[test]
    fn test_load_config_file() {
        // Requires config.toml in the working directory, as in the repo root.
        if let Ok(cfg) = AppConfig::load("config.toml") {
            assert!(!cfg.market.base_url.is_empty());
            assert!(cfg.scheduler.interval_secs > 0);
            assert!(cfg.scheduler.resolution_window_secs > 0);
        }
        // Missing config.toml is acceptable in some test environments
    }

    #[test]
    fn test_signing_key_missing_env() {
        let mut cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        cfg.chain.private_key_env = "KALSHILINK_TEST_KEY_THAT_IS_NOT_SET".into();
        assert!(cfg.signing_key().is_err());
    }
}

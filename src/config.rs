//! Configuration management for the Reactive Flow Tracer
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub tracer: TracerConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TracerConfig {
    /// Single fixed JSON-RPC endpoint of the reactive network
    pub reactive_rpc_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_capture_window_secs")]
    pub capture_window_secs: i64,
    #[serde(default = "default_capture_batch_size")]
    pub capture_batch_size: u32,
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_capture_window_secs() -> i64 {
    1_000
}

/// Upper bound on the capture search half-width (one day)
const MAX_CAPTURE_WINDOW_SECS: i64 = 86_400;

fn default_capture_batch_size() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

/// Connection and explorer metadata for one chain
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub explorer_url: String,
    #[serde(default)]
    pub explorer_api_key: String,
    pub explorer_api_url: String,
    /// Absent means the chain cannot receive callbacks
    #[serde(default)]
    pub callback_proxy: Option<String>,
}

impl ChainConfig {
    pub fn supports_callbacks(&self) -> bool {
        self.callback_proxy
            .as_deref()
            .is_some_and(|proxy| !proxy.trim().is_empty())
    }
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("TRACER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse settings from TOML text, substituting `${VAR}` references
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            anyhow::bail!("At least one chain must be configured");
        }

        if self.tracer.reactive_rpc_url.trim().is_empty() {
            anyhow::bail!("tracer.reactive_rpc_url must be set");
        }
        if self.tracer.capture_window_secs <= 0
            || self.tracer.capture_window_secs > MAX_CAPTURE_WINDOW_SECS
        {
            anyhow::bail!(
                "tracer.capture_window_secs must be between 1 and {}",
                MAX_CAPTURE_WINDOW_SECS
            );
        }
        if self.tracer.capture_batch_size == 0 {
            anyhow::bail!("tracer.capture_batch_size must be positive");
        }

        let mut seen = HashSet::new();
        for (name, chain) in &self.chains {
            if !seen.insert(chain.chain_id) {
                anyhow::bail!("Chain id {} is configured more than once", chain.chain_id);
            }
            if chain.explorer_api_url.trim().is_empty() {
                anyhow::bail!("Chain {} has no explorer API URL configured", name);
            }
            if chain.explorer_api_key.is_empty() {
                tracing::warn!("Chain {} has no explorer API key - requests may be throttled", name);
            }
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    ENV_VAR
        .replace_all(input, |cap: &regex::Captures| {
            env::var(&cap[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn chain_by_id(settings: &Settings, chain_id: u64) -> Option<&ChainConfig> {
        settings.chains.values().find(|c| c.chain_id == chain_id)
    }

    const MINIMAL: &str = r#"
        [tracer]
        reactive_rpc_url = "https://kopli-rpc.rkt.ink"

        [api]
        host = "127.0.0.1"
        port = 8080

        [metrics]
        enabled = false
        port = 9090

        [chains.sepolia]
        chain_id = 11155111
        name = "Ethereum Sepolia"
        rpc_url = "https://rpc.sepolia.org"
        explorer_url = "https://sepolia.etherscan.io"
        explorer_api_key = "${FLOW_TRACER_TEST_KEY}"
        explorer_api_url = "https://api-sepolia.etherscan.io/api"
        callback_proxy = "0x33Bbb7D0a2F1029550B0e91f653c4055DC9F4Dd8"
    "#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_missing_env_var_becomes_empty() {
        let result = substitute_env_vars("key = \"${FLOW_TRACER_SURELY_UNSET}\"");
        assert_eq!(result, "key = \"\"");
    }

    #[test]
    fn test_parse_minimal_settings() {
        env::set_var("FLOW_TRACER_TEST_KEY", "abc123");
        let settings = Settings::from_toml_str(MINIMAL).unwrap();

        assert_eq!(settings.tracer.capture_window_secs, 1_000);
        assert_eq!(settings.tracer.capture_batch_size, 100);
        assert_eq!(settings.tracer.request_timeout_ms, 15_000);

        let sepolia = chain_by_id(&settings, 11155111).unwrap();
        assert_eq!(sepolia.explorer_api_key, "abc123");
        assert!(sepolia.supports_callbacks());
    }

    #[test]
    fn test_duplicate_chain_ids_rejected() {
        let body = MINIMAL.split("[chains.sepolia]").nth(1).unwrap();
        let doubled = format!("{}\n[chains.sepolia_copy]{}", MINIMAL, body);
        let err = Settings::from_toml_str(&doubled).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_capture_window_bounds() {
        let with_window = |secs: i64| {
            MINIMAL.replace(
                "reactive_rpc_url = \"https://kopli-rpc.rkt.ink\"",
                &format!(
                    "reactive_rpc_url = \"https://kopli-rpc.rkt.ink\"\ncapture_window_secs = {}",
                    secs
                ),
            )
        };

        assert!(Settings::from_toml_str(&with_window(0)).is_err());
        assert!(Settings::from_toml_str(&with_window(MAX_CAPTURE_WINDOW_SECS + 1)).is_err());
        assert!(Settings::from_toml_str(&with_window(i64::MAX)).is_err());

        let settings = Settings::from_toml_str(&with_window(MAX_CAPTURE_WINDOW_SECS)).unwrap();
        assert_eq!(settings.tracer.capture_window_secs, MAX_CAPTURE_WINDOW_SECS);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.chains.len(), 1);
        assert_eq!(settings.api.port, 8080);
    }

    #[test]
    fn test_default_config_parses() {
        let settings = Settings::from_toml_str(include_str!("../config/default.toml")).unwrap();
        assert!(chain_by_id(&settings, 5318008).is_some());
        assert!(chain_by_id(&settings, 1).is_some());
    }
}

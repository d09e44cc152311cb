//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.tokensnap.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".tokensnap.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// JSON-RPC endpoint settings.
    #[serde(default)]
    pub rpc: RpcSettings,

    /// Aggregation settings.
    #[serde(default)]
    pub query: QuerySettings,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Write the report here instead of printing it.
    #[serde(default)]
    pub output: Option<String>,
}

/// JSON-RPC endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSettings {
    /// Node URL.
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on transport failure.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> usize {
    2
}

fn default_retry_backoff() -> u64 {
    250
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Largest token or holder list accepted by one query.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Lookups in flight at once (1 = strictly sequential).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Read all lookups at the observed block number.
    #[serde(default = "default_true")]
    pub pin_to_block: bool,

    /// Tokens to query when none are given on the command line.
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            concurrency: default_concurrency(),
            pin_to_block: true,
            tokens: Vec::new(),
        }
    }
}

fn default_max_batch_size() -> usize {
    256
}

fn default_concurrency() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.tokensnap.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.rpc_url {
            self.rpc.url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.rpc.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.rpc.retries = retries;
        }

        if let Some(max) = args.max_batch_size {
            self.query.max_batch_size = max;
        }
        if let Some(concurrency) = args.concurrency {
            self.query.concurrency = concurrency;
        }
        if args.no_pin {
            self.query.pin_to_block = false;
        }

        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::QueryMode;
use alloy_primitives::Address;
use clap::Parser;
use std::path::PathBuf;

/// tokensnap - consistent ERC-20 balance snapshots over JSON-RPC
///
/// Reads symbol, decimals and balance for many tokens at once and stamps
/// the whole batch with a single block timestamp and number.
///
/// Examples:
///   tokensnap --holder 0xabc... --tokens 0xA0b8...,0xdAC1...
///   tokensnap --holder 0xabc... --tokens 0xA0b8... --mode balances --format json
///   tokensnap --mode across --tokens 0xA0b8... --holders 0xabc...,0xdef...
///   tokensnap --holder 0xabc... --tokens 0xA0b8... --contract 0x1234... --block 18000000
///   tokensnap --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Account whose holdings are queried
    ///
    /// Required for every mode except `across`.
    #[arg(long, value_name = "ADDR", value_parser = parse_address)]
    pub holder: Option<Address>,

    /// Token contracts to query (comma-separated)
    ///
    /// Falls back to `query.tokens` from the config file when omitted.
    /// `single` and `across` take exactly one token from either source.
    #[arg(short, long, value_name = "ADDRS", value_delimiter = ',', value_parser = parse_address)]
    pub tokens: Option<Vec<Address>>,

    /// Which query to run
    #[arg(short, long, default_value = "full", value_name = "MODE")]
    pub mode: QueryMode,

    /// Holders to query in `across` mode (comma-separated)
    #[arg(long, value_name = "ADDRS", value_delimiter = ',', value_parser = parse_address)]
    pub holders: Option<Vec<Address>>,

    /// Read at this block number instead of the latest block
    #[arg(long, value_name = "NUMBER")]
    pub block: Option<u64>,

    /// Deployed MultiTokenQuery contract to run the batch on-chain
    #[arg(long, value_name = "ADDR", value_parser = parse_address)]
    pub contract: Option<Address>,

    /// JSON-RPC endpoint URL
    ///
    /// Can also be set via TOKENSNAP_RPC_URL env var or .tokensnap.toml config.
    #[arg(long, value_name = "URL", env = "TOKENSNAP_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .tokensnap.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Largest token or holder list accepted in one query
    #[arg(long, value_name = "COUNT")]
    pub max_batch_size: Option<usize>,

    /// Number of lookups in flight at once
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries for failed transport requests
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<usize>,

    /// Read lookups at `latest` instead of the observed block
    #[arg(long)]
    pub no_pin: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .tokensnap.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Parse a `0x`-prefixed hex address.
pub fn parse_address(value: &str) -> Result<Address, String> {
    let trimmed = value.trim();
    if !trimmed.starts_with("0x") && !trimmed.starts_with("0X") {
        return Err(format!("address must start with '0x': {}", value));
    }
    trimmed
        .parse::<Address>()
        .map_err(|e| format!("invalid address {}: {}", value, e))
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.rpc_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("RPC URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.max_batch_size == Some(0) {
            return Err("Max batch size must be at least 1".to_string());
        }
        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }
        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        let token_count = self.tokens.as_ref().map(Vec::len);

        match self.mode {
            QueryMode::Across => {
                if self.holders.is_none() {
                    return Err("--mode across requires --holders".to_string());
                }
                if token_count.is_some_and(|n| n != 1) {
                    return Err("--mode across takes exactly one token".to_string());
                }
            }
            QueryMode::Single => {
                if token_count.is_some_and(|n| n != 1) {
                    return Err("--mode single takes exactly one token".to_string());
                }
            }
            QueryMode::Full | QueryMode::Balances => {}
        }

        if self.mode != QueryMode::Across {
            if self.holder.is_none() {
                return Err(format!("--mode {} requires --holder", self.mode_name()));
            }
            if self.holders.is_some() {
                return Err("--holders is only used with --mode across".to_string());
            }
        }

        if self.contract.is_some() && !matches!(self.mode, QueryMode::Full | QueryMode::Balances) {
            return Err("--contract only supports --mode full or --mode balances".to_string());
        }

        Ok(())
    }

    /// Tokens from the command line, or else `defaults` from the config file.
    pub fn token_list(&self, defaults: &[String]) -> Result<Vec<Address>, String> {
        match self.tokens {
            Some(ref tokens) => Ok(tokens.clone()),
            None => defaults.iter().map(|s| parse_address(s)).collect(),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    fn mode_name(&self) -> &'static str {
        match self.mode {
            QueryMode::Full => "full",
            QueryMode::Balances => "balances",
            QueryMode::Single => "single",
            QueryMode::Across => "across",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            holder: Some(Address::repeat_byte(0x48)),
            tokens: Some(vec![Address::repeat_byte(1), Address::repeat_byte(2)]),
            mode: QueryMode::Full,
            holders: None,
            block: None,
            contract: None,
            rpc_url: Some("http://localhost:8545".to_string()),
            format: OutputFormat::Markdown,
            output: None,
            config: None,
            max_batch_size: None,
            concurrency: None,
            timeout: None,
            retries: None,
            no_pin: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_address() {
        let parsed = parse_address("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").unwrap();
        assert_eq!(parsed.to_string(), "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

        assert!(parse_address("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").is_err());
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xzz").is_err());
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "tokensnap",
            "--holder",
            "0x4848484848484848484848484848484848484848",
            "--tokens",
            "0x0101010101010101010101010101010101010101,0x0202020202020202020202020202020202020202",
            "--mode",
            "balances",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.holder, Some(Address::repeat_byte(0x48)));
        assert_eq!(
            args.tokens,
            Some(vec![Address::repeat_byte(1), Address::repeat_byte(2)])
        );
        assert_eq!(args.mode, QueryMode::Balances);
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_rejects_bad_address() {
        let result = Args::try_parse_from(["tokensnap", "--holder", "nope"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_ok() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.rpc_url = Some("localhost:8545".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_values() {
        let mut args = make_args();
        args.concurrency = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.max_batch_size = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_holder() {
        let mut args = make_args();
        args.holder = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_single_mode() {
        let mut args = make_args();
        args.mode = QueryMode::Single;
        assert!(args.validate().is_err());

        args.tokens = Some(vec![Address::repeat_byte(1)]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_across_mode() {
        let mut args = make_args();
        args.mode = QueryMode::Across;
        args.holder = None;
        args.tokens = Some(vec![Address::repeat_byte(1)]);
        assert!(args.validate().is_err());

        args.holders = Some(vec![Address::repeat_byte(0x48), Address::repeat_byte(0x49)]);
        assert!(args.validate().is_ok());

        args.tokens = Some(vec![Address::repeat_byte(1), Address::repeat_byte(2)]);
        assert!(args.validate().is_err());

        // the token may come from `query.tokens` instead
        args.tokens = None;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_across_mode_uses_config_token() {
        let args = Args::try_parse_from([
            "tokensnap",
            "--mode",
            "across",
            "--holders",
            "0x4848484848484848484848484848484848484848,0x4949494949494949494949494949494949494949",
        ])
        .unwrap();
        assert!(args.validate().is_ok());

        let defaults = vec!["0x0101010101010101010101010101010101010101".to_string()];
        assert_eq!(
            args.token_list(&defaults).unwrap(),
            vec![Address::repeat_byte(1)]
        );
    }

    #[test]
    fn test_validation_holders_outside_across() {
        let mut args = make_args();
        args.holders = Some(vec![Address::repeat_byte(0x49)]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_contract_mode() {
        let mut args = make_args();
        args.contract = Some(Address::repeat_byte(9));
        assert!(args.validate().is_ok());

        args.mode = QueryMode::Single;
        args.tokens = Some(vec![Address::repeat_byte(1)]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_token_list_falls_back_to_config() {
        let mut args = make_args();
        args.tokens = None;

        let defaults = vec!["0x0303030303030303030303030303030303030303".to_string()];
        assert_eq!(
            args.token_list(&defaults).unwrap(),
            vec![Address::repeat_byte(3)]
        );

        let bad = vec!["not-an-address".to_string()];
        assert!(args.token_list(&bad).is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}

//! Data models for batch queries.
//!
//! This module contains the structures returned by the aggregator. All
//! of them are built fresh for each call and owned by the caller.
//!
//! The serialized shape is part of the public contract: field order and
//! camelCase names match what existing consumers of the on-chain
//! aggregator expect, and balances are rendered as decimal strings.

use alloy_primitives::{Address, U256};
use serde::{Serialize, Serializer};

/// A single point in chain history that a batch was read at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Observation {
    /// Block timestamp, seconds since the Unix epoch.
    pub timestamp: u64,
    /// Block number.
    pub sequence: u64,
}

/// Which block a lookup should be evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockRef {
    /// Whatever the node considers the head.
    #[default]
    Latest,
    /// A fixed block number.
    Number(u64),
}

impl BlockRef {
    /// JSON-RPC block tag.
    pub fn to_tag(self) -> String {
        match self {
            BlockRef::Latest => "latest".to_string(),
            BlockRef::Number(n) => format!("0x{:x}", n),
        }
    }
}

/// Metadata and balance returned by a lookup provider for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: String,
    pub precision: u8,
    pub balance: U256,
}

/// One token as seen by one holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityInfo {
    /// Token contract address.
    pub identifier: Address,
    /// Ticker symbol.
    pub symbol: String,
    /// Number of decimals.
    pub precision: u8,
    /// Raw balance in the token's smallest unit.
    #[serde(serialize_with = "serialize_decimal")]
    pub balance: U256,
}

impl EntityInfo {
    pub fn new(identifier: Address, metadata: TokenMetadata) -> Self {
        Self {
            identifier,
            symbol: metadata.symbol,
            precision: metadata.precision,
            balance: metadata.balance,
        }
    }

    /// Balance scaled by `precision`, e.g. `1000.5`.
    pub fn display_balance(&self) -> String {
        format_units(self.balance, self.precision)
    }
}

/// Metadata and balances for many tokens held by one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub subject_identifier: Address,
    pub entities: Vec<EntityInfo>,
    pub observed_at: u64,
    pub observed_at_sequence: u64,
}

/// Balances only, index-aligned with the requested tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceOnlyResult {
    #[serde(serialize_with = "serialize_decimal_vec")]
    pub balances: Vec<U256>,
    pub observed_at: u64,
    pub observed_at_sequence: u64,
}

/// A single token for a single subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleEntityResult {
    pub subject_identifier: Address,
    pub entity: EntityInfo,
    pub observed_at: u64,
    pub observed_at_sequence: u64,
}

/// One token's balance across many subjects, index-aligned with the subjects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcrossSubjectsResult {
    pub identifier: Address,
    #[serde(serialize_with = "serialize_decimal_vec")]
    pub balances: Vec<U256>,
    pub observed_at: u64,
    pub observed_at_sequence: u64,
}

/// Which aggregator operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Symbol, decimals and balance for every token (default)
    #[default]
    Full,
    /// Balances only
    Balances,
    /// Exactly one token
    Single,
    /// One token across many holders
    Across,
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryMode::Full => write!(f, "Full"),
            QueryMode::Balances => write!(f, "Balances only"),
            QueryMode::Single => write!(f, "Single token"),
            QueryMode::Across => write!(f, "Across holders"),
        }
    }
}

/// The result of whichever operation was run, together with the inputs
/// needed to render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Batch(BatchResult),
    Balances {
        subject: Address,
        identifiers: Vec<Address>,
        result: BalanceOnlyResult,
    },
    Single(SingleEntityResult),
    AcrossSubjects {
        subjects: Vec<Address>,
        result: AcrossSubjectsResult,
    },
}

impl QueryOutcome {
    /// Observation point shared by every value in the outcome.
    pub fn observation(&self) -> Observation {
        let (timestamp, sequence) = match self {
            QueryOutcome::Batch(r) => (r.observed_at, r.observed_at_sequence),
            QueryOutcome::Balances { result, .. } => (result.observed_at, result.observed_at_sequence),
            QueryOutcome::Single(r) => (r.observed_at, r.observed_at_sequence),
            QueryOutcome::AcrossSubjects { result, .. } => {
                (result.observed_at, result.observed_at_sequence)
            }
        };
        Observation { timestamp, sequence }
    }

    /// Number of values in the outcome.
    pub fn len(&self) -> usize {
        match self {
            QueryOutcome::Batch(r) => r.entities.len(),
            QueryOutcome::Balances { result, .. } => result.balances.len(),
            QueryOutcome::Single(_) => 1,
            QueryOutcome::AcrossSubjects { result, .. } => result.balances.len(),
        }
    }

    pub fn mode(&self) -> QueryMode {
        match self {
            QueryOutcome::Batch(_) => QueryMode::Full,
            QueryOutcome::Balances { .. } => QueryMode::Balances,
            QueryOutcome::Single(_) => QueryMode::Single,
            QueryOutcome::AcrossSubjects { .. } => QueryMode::Across,
        }
    }
}

/// Metadata about a finished query run.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    /// JSON-RPC endpoint the query went to.
    pub rpc_url: String,
    /// On-chain aggregator contract, when one was used.
    pub contract: Option<Address>,
    /// Local wall-clock time the report was produced.
    pub generated_at: chrono::DateTime<chrono::Utc>,
    /// Duration of the query in seconds.
    pub duration_seconds: f64,
}

/// Render a raw integer amount with `decimals` fractional digits.
///
/// Trailing zeros of the fraction are dropped; whole amounts get no
/// decimal point at all.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };

    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

fn serialize_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

fn serialize_decimal_vec<S: Serializer>(values: &[U256], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(|v| v.to_string()))
}

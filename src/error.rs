//! Error types for batch queries.
//!
//! `ProviderError` describes why a single collaborator call failed.
//! `QueryError` is what the aggregator surfaces to its caller: a batch
//! either completes entirely or fails with one of these.

use alloy_primitives::Address;
use thiserror::Error;

/// Failure of a single lookup or clock read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The response did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// `eth_call` returned no data (no contract at the address, or it reverted).
    #[error("call returned no data")]
    EmptyResult,
}

impl ProviderError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transport(_) | ProviderError::Timeout(_))
    }
}

/// Failure of a whole batch query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Rejected before any lookup was attempted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// One lookup could not be completed; the batch was discarded.
    #[error("lookup failed for {identifier}: {source}")]
    LookupFailure {
        identifier: Address,
        source: ProviderError,
    },

    /// The observation point could not be read.
    #[error("observation point unavailable: {0}")]
    ObservationUnavailable(#[source] ProviderError),
}

impl QueryError {
    /// The identifier whose lookup failed, if any.
    pub fn offending_identifier(&self) -> Option<Address> {
        match self {
            QueryError::LookupFailure { identifier, .. } => Some(*identifier),
            _ => None,
        }
    }
}

//! Collaborators the aggregator reads from.
//!
//! The aggregator only sees the two traits below. The JSON-RPC backed
//! implementations live in `erc20`; `remote` talks to an already deployed
//! on-chain aggregator contract instead.

pub mod abi;
pub mod erc20;
pub mod remote;
pub mod rpc;

#[cfg(test)]
pub mod testing;

use crate::error::ProviderError;
use crate::models::{BlockRef, Observation, TokenMetadata};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;

pub use erc20::{BlockClock, Erc20LookupProvider};
pub use remote::OnChainAggregator;
pub use rpc::{JsonRpcClient, RpcConfig};

/// Reads token metadata and balances.
///
/// Implementations must be side-effect free. Retrying, if any, happens
/// here and never in the aggregator.
#[async_trait]
pub trait LookupProvider: Send + Sync {
    /// Symbol, decimals and `holder`'s balance of `token`, read at `at`.
    async fn lookup(
        &self,
        token: Address,
        holder: Address,
        at: BlockRef,
    ) -> Result<TokenMetadata, ProviderError>;

    /// `holder`'s balance of `token`, read at `at`.
    async fn balance_of(
        &self,
        token: Address,
        holder: Address,
        at: BlockRef,
    ) -> Result<U256, ProviderError>;
}

/// Supplies the observation point a batch is stamped with.
#[async_trait]
pub trait ObservationClock: Send + Sync {
    async fn now(&self) -> Result<Observation, ProviderError>;
}

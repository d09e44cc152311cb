//! ERC-20 lookups and the block-based observation clock.

use crate::error::ProviderError;
use crate::models::{BlockRef, Observation, TokenMetadata};
use crate::provider::abi::{self, IERC20};
use crate::provider::rpc::JsonRpcClient;
use crate::provider::{LookupProvider, ObservationClock};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::sync::Arc;

/// Reads `symbol()`, `decimals()` and `balanceOf(holder)` through `eth_call`.
pub struct Erc20LookupProvider {
    client: Arc<JsonRpcClient>,
}

impl Erc20LookupProvider {
    pub fn new(client: Arc<JsonRpcClient>) -> Self {
        Self { client }
    }

    async fn symbol(&self, token: Address, at: BlockRef) -> Result<String, ProviderError> {
        let data = self
            .client
            .eth_call(token, &IERC20::symbolCall {}.abi_encode(), at)
            .await?;
        abi::decode_symbol(&data)
    }

    async fn decimals(&self, token: Address, at: BlockRef) -> Result<u8, ProviderError> {
        let data = self
            .client
            .eth_call(token, &IERC20::decimalsCall {}.abi_encode(), at)
            .await?;
        Ok(abi::decode_returns::<IERC20::decimalsCall>(&data)?._0)
    }
}

#[async_trait]
impl LookupProvider for Erc20LookupProvider {
    async fn lookup(
        &self,
        token: Address,
        holder: Address,
        at: BlockRef,
    ) -> Result<TokenMetadata, ProviderError> {
        let (symbol, precision, balance) = tokio::try_join!(
            self.symbol(token, at),
            self.decimals(token, at),
            self.balance_of(token, holder, at)
        )?;

        Ok(TokenMetadata {
            symbol,
            precision,
            balance,
        })
    }

    async fn balance_of(
        &self,
        token: Address,
        holder: Address,
        at: BlockRef,
    ) -> Result<U256, ProviderError> {
        let calldata = IERC20::balanceOfCall { owner: holder }.abi_encode();
        let data = self.client.eth_call(token, &calldata, at).await?;
        Ok(abi::decode_returns::<IERC20::balanceOfCall>(&data)?._0)
    }
}

/// Observation clock backed by block headers.
///
/// With `BlockRef::Latest` every read returns the current head; a fixed
/// block number turns the whole query into a historical one.
pub struct BlockClock {
    client: Arc<JsonRpcClient>,
    target: BlockRef,
}

impl BlockClock {
    pub fn new(client: Arc<JsonRpcClient>, target: BlockRef) -> Self {
        Self { client, target }
    }
}

#[async_trait]
impl ObservationClock for BlockClock {
    async fn now(&self) -> Result<Observation, ProviderError> {
        self.client.block(self.target).await
    }
}

//! Client for a deployed `MultiTokenQuery` contract.
//!
//! The contract performs the whole fan-out on-chain, so a batch costs a
//! single `eth_call` and the observation point comes back from the
//! contract itself. The returned tuples are decoded in declaration order:
//!
//! ```text
//! queryMultipleTokens(address,address[]) returns
//!     (address queryAddress,
//!      (address tokenAddress, string symbol, uint8 decimals, uint256 balance)[] tokens,
//!      uint256 timestamp,
//!      uint256 blockNumber)
//!
//! queryBalances(address,address[]) returns
//!     (uint256[] balances, uint256 timestamp, uint256 blockNumber)
//! ```

use crate::error::{ProviderError, QueryError};
use crate::models::{BalanceOnlyResult, BatchResult, BlockRef, EntityInfo};
use crate::provider::abi::{self, IMultiTokenQuery};
use crate::provider::rpc::JsonRpcClient;
use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use std::sync::Arc;
use tracing::info;

/// Batch queries served by an on-chain aggregator contract.
pub struct OnChainAggregator {
    client: Arc<JsonRpcClient>,
    contract: Address,
    max_batch_size: usize,
}

impl OnChainAggregator {
    pub fn new(client: Arc<JsonRpcClient>, contract: Address, max_batch_size: usize) -> Self {
        Self {
            client,
            contract,
            max_batch_size,
        }
    }

    /// Metadata and balances of `tokens` held by `user`, in one call.
    pub async fn query_multiple_tokens(
        &self,
        user: Address,
        tokens: &[Address],
        at: BlockRef,
    ) -> Result<BatchResult, QueryError> {
        self.check_batch_size(tokens.len())?;
        info!(
            "Querying {} tokens for {} via contract {}",
            tokens.len(),
            user,
            self.contract
        );

        let call = IMultiTokenQuery::queryMultipleTokensCall {
            user,
            tokenAddresses: tokens.to_vec(),
        };
        let data = self.call(&call, at).await?;
        let result = decode_query_result(&data).map_err(|e| self.failure(e))?;
        check_query_result(&result, self.contract, user, tokens)?;

        Ok(result)
    }

    /// Balances of `tokens` held by `user`, in one call.
    pub async fn query_balances(
        &self,
        user: Address,
        tokens: &[Address],
        at: BlockRef,
    ) -> Result<BalanceOnlyResult, QueryError> {
        self.check_batch_size(tokens.len())?;
        info!(
            "Querying {} balances for {} via contract {}",
            tokens.len(),
            user,
            self.contract
        );

        let call = IMultiTokenQuery::queryBalancesCall {
            user,
            tokenAddresses: tokens.to_vec(),
        };
        let data = self.call(&call, at).await?;
        let result = decode_balances_result(&data).map_err(|e| self.failure(e))?;

        if result.balances.len() != tokens.len() {
            return Err(self.failure(length_mismatch(tokens.len(), result.balances.len())));
        }

        Ok(result)
    }

    fn check_batch_size(&self, len: usize) -> Result<(), QueryError> {
        if len > self.max_batch_size {
            return Err(QueryError::InvalidInput(format!(
                "{} tokens requested, batch size limit is {}",
                len, self.max_batch_size
            )));
        }
        Ok(())
    }

    async fn call<C: SolCall>(&self, call: &C, at: BlockRef) -> Result<Vec<u8>, QueryError> {
        self.client
            .eth_call(self.contract, &call.abi_encode(), at)
            .await
            .map_err(|e| self.failure(e))
    }

    // The contract reverts the whole call on any bad token, so the
    // contract itself is the only identifier we can blame.
    fn failure(&self, source: ProviderError) -> QueryError {
        QueryError::LookupFailure {
            identifier: self.contract,
            source,
        }
    }
}

/// Check a decoded batch against what was asked for.
///
/// A wrong subject or length blames `contract`; a swapped token blames the
/// token that was requested at that position.
fn check_query_result(
    result: &BatchResult,
    contract: Address,
    user: Address,
    tokens: &[Address],
) -> Result<(), QueryError> {
    if result.subject_identifier != user {
        return Err(QueryError::LookupFailure {
            identifier: contract,
            source: ProviderError::Malformed(format!(
                "contract answered for {} in place of {}",
                result.subject_identifier, user
            )),
        });
    }
    if result.entities.len() != tokens.len() {
        return Err(QueryError::LookupFailure {
            identifier: contract,
            source: length_mismatch(tokens.len(), result.entities.len()),
        });
    }
    for (entity, requested) in result.entities.iter().zip(tokens) {
        if entity.identifier != *requested {
            return Err(QueryError::LookupFailure {
                identifier: *requested,
                source: ProviderError::Malformed(format!(
                    "contract returned {} in place of {}",
                    entity.identifier, requested
                )),
            });
        }
    }
    Ok(())
}

fn length_mismatch(expected: usize, actual: usize) -> ProviderError {
    ProviderError::Malformed(format!(
        "contract returned {} entries for {} requested",
        actual, expected
    ))
}

/// Decode the return data of `queryMultipleTokens`.
pub fn decode_query_result(data: &[u8]) -> Result<BatchResult, ProviderError> {
    let result = abi::decode_returns::<IMultiTokenQuery::queryMultipleTokensCall>(data)?.result;

    let entities = result
        .tokens
        .into_iter()
        .map(|token| EntityInfo {
            identifier: token.tokenAddress,
            symbol: token.symbol,
            precision: token.decimals,
            balance: token.balance,
        })
        .collect();

    Ok(BatchResult {
        subject_identifier: result.queryAddress,
        entities,
        observed_at: abi::to_u64(result.timestamp, "timestamp")?,
        observed_at_sequence: abi::to_u64(result.blockNumber, "blockNumber")?,
    })
}

/// Decode the return data of `queryBalances`.
pub fn decode_balances_result(data: &[u8]) -> Result<BalanceOnlyResult, ProviderError> {
    let decoded = abi::decode_returns::<IMultiTokenQuery::queryBalancesCall>(data)?;

    Ok(BalanceOnlyResult {
        balances: decoded.balances,
        observed_at: abi::to_u64(decoded.timestamp, "timestamp")?,
        observed_at_sequence: abi::to_u64(decoded.blockNumber, "blockNumber")?,
    })
}

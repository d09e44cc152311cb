//! Contract interfaces used over `eth_call`.
//!
//! Calldata and return data go through `alloy_sol_types`; the only
//! hand-written decoding left is the legacy `bytes32` symbol.

use crate::error::ProviderError;
use alloy_primitives::U256;
use alloy_sol_types::{sol, SolCall};

sol! {
    /// The subset of ERC-20 the lookup provider reads.
    interface IERC20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address owner) external view returns (uint256);
    }

    /// On-chain batch aggregator.
    interface IMultiTokenQuery {
        struct TokenInfo {
            address tokenAddress;
            string symbol;
            uint8 decimals;
            uint256 balance;
        }

        struct QueryResult {
            address queryAddress;
            TokenInfo[] tokens;
            uint256 timestamp;
            uint256 blockNumber;
        }

        function queryMultipleTokens(address user, address[] tokenAddresses)
            external view returns (QueryResult result);

        function queryBalances(address user, address[] tokenAddresses)
            external view returns (uint256[] balances, uint256 timestamp, uint256 blockNumber);
    }
}

/// Decode the return data of `call`, mapping codec errors to `Malformed`.
pub fn decode_returns<C: SolCall>(data: &[u8]) -> Result<C::Return, ProviderError> {
    C::abi_decode_returns(data, true)
        .map_err(|e| ProviderError::Malformed(format!("{} returned bad data: {}", C::SIGNATURE, e)))
}

/// Decode a `symbol()` return value.
///
/// Some early tokens declare `symbol()` as `bytes32`. When the payload is
/// not a valid `string` but is exactly one word, it is read that way with
/// trailing NUL bytes stripped.
pub fn decode_symbol(data: &[u8]) -> Result<String, ProviderError> {
    match IERC20::symbolCall::abi_decode_returns(data, true) {
        Ok(decoded) => Ok(decoded._0),
        Err(_) if data.len() == 32 => {
            let trimmed: Vec<u8> = data.iter().copied().take_while(|b| *b != 0).collect();
            String::from_utf8(trimmed)
                .map_err(|_| ProviderError::Malformed("bytes32 symbol is not valid UTF-8".to_string()))
        }
        Err(e) => Err(ProviderError::Malformed(format!("symbol() returned bad data: {}", e))),
    }
}

/// Narrow a `uint256` field to `u64`.
pub fn to_u64(value: U256, field: &str) -> Result<u64, ProviderError> {
    u64::try_from(value)
        .map_err(|_| ProviderError::Malformed(format!("{} does not fit in 64 bits: {}", field, value)))
}

//! Deterministic collaborators for tests.

use crate::error::ProviderError;
use crate::models::{BlockRef, Observation, TokenMetadata};
use crate::provider::{LookupProvider, ObservationClock};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Clock that always returns the same observation and counts reads.
pub struct FixedClock {
    observation: Option<Observation>,
    reads: AtomicUsize,
}

impl FixedClock {
    pub fn new(timestamp: u64, sequence: u64) -> Self {
        Self {
            observation: Some(Observation {
                timestamp,
                sequence,
            }),
            reads: AtomicUsize::new(0),
        }
    }

    /// A clock whose every read fails.
    pub fn broken() -> Self {
        Self {
            observation: None,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObservationClock for FixedClock {
    async fn now(&self) -> Result<Observation, ProviderError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.observation
            .ok_or_else(|| ProviderError::Transport("clock offline".to_string()))
    }
}

/// Lookup provider backed by an in-memory table.
///
/// Tokens have per-holder balances; any token not in the table, or listed
/// in `failing`, fails its lookup. Every call is recorded in order.
#[derive(Default)]
pub struct ScriptedProvider {
    metadata: HashMap<Address, (String, u8)>,
    balances: HashMap<(Address, Address), U256>,
    failing: HashSet<Address>,
    delays: HashMap<Address, Duration>,
    calls: Mutex<Vec<(Address, Address, BlockRef)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: Address, symbol: &str, precision: u8) -> Self {
        self.metadata.insert(token, (symbol.to_string(), precision));
        self
    }

    pub fn with_balance(mut self, token: Address, holder: Address, balance: U256) -> Self {
        self.balances.insert((token, holder), balance);
        self
    }

    pub fn failing(mut self, address: Address) -> Self {
        self.failing.insert(address);
        self
    }

    /// Make lookups for `address` (token or holder) take `delay`.
    pub fn with_delay(mut self, address: Address, delay: Duration) -> Self {
        self.delays.insert(address, delay);
        self
    }

    pub fn calls(&self) -> Vec<(Address, Address, BlockRef)> {
        self.calls.lock().unwrap().clone()
    }

    async fn enter(&self, token: Address, holder: Address, at: BlockRef) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push((token, holder, at));

        let delay = self
            .delays
            .get(&token)
            .or_else(|| self.delays.get(&holder))
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.contains(&token) || self.failing.contains(&holder) {
            return Err(ProviderError::EmptyResult);
        }
        Ok(())
    }

    fn balance(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }
}

#[async_trait]
impl LookupProvider for ScriptedProvider {
    async fn lookup(
        &self,
        token: Address,
        holder: Address,
        at: BlockRef,
    ) -> Result<TokenMetadata, ProviderError> {
        self.enter(token, holder, at).await?;

        let (symbol, precision) = self
            .metadata
            .get(&token)
            .cloned()
            .ok_or_else(|| ProviderError::Malformed(format!("no metadata for {}", token)))?;

        Ok(TokenMetadata {
            symbol,
            precision,
            balance: self.balance(token, holder),
        })
    }

    async fn balance_of(
        &self,
        token: Address,
        holder: Address,
        at: BlockRef,
    ) -> Result<U256, ProviderError> {
        self.enter(token, holder, at).await?;

        if !self.metadata.contains_key(&token) {
            return Err(ProviderError::EmptyResult);
        }
        Ok(self.balance(token, holder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_counts_reads() {
        let clock = FixedClock::new(1, 2);
        let observation = tokio_test::block_on(clock.now()).unwrap();

        assert_eq!(observation.timestamp, 1);
        assert_eq!(observation.sequence, 2);
        assert_eq!(clock.reads(), 1);
    }

    #[test]
    fn test_unknown_token_fails() {
        let provider = ScriptedProvider::new();
        let result = tokio_test::block_on(provider.balance_of(
            Address::repeat_byte(1),
            Address::ZERO,
            BlockRef::Latest,
        ));

        assert_eq!(result, Err(ProviderError::EmptyResult));
        assert_eq!(provider.calls().len(), 1);
    }
}

//! Snapshot-consistent batch lookups.
//!
//! Every operation follows the same shape: validate the input size, read
//! the observation clock once, fan out one lookup per entry, and collect
//! the results in input order. The first failed lookup discards the whole
//! batch; callers never see a partially filled result.

use crate::error::{ProviderError, QueryError};
use crate::models::{
    AcrossSubjectsResult, BalanceOnlyResult, BatchResult, BlockRef, EntityInfo, Observation,
    SingleEntityResult,
};
use crate::provider::{LookupProvider, ObservationClock};
use alloy_primitives::Address;
use futures::stream::{self, StreamExt};
use std::future::Future;
use tracing::{debug, info};

/// Tuning for the aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Largest identifier list a single call accepts.
    pub max_batch_size: usize,
    /// Lookups in flight at once. `1` issues them strictly one after another.
    pub concurrency: usize,
    /// Read every lookup at the observed block number instead of `latest`.
    pub pin_to_block: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 256,
            concurrency: 1,
            pin_to_block: true,
        }
    }
}

impl From<&crate::config::QuerySettings> for AggregatorConfig {
    fn from(settings: &crate::config::QuerySettings) -> Self {
        Self {
            max_batch_size: settings.max_batch_size,
            concurrency: settings.concurrency,
            pin_to_block: settings.pin_to_block,
        }
    }
}

/// Batches lookups against a provider and stamps them with one observation.
pub struct Aggregator<P, C> {
    provider: P,
    clock: C,
    config: AggregatorConfig,
}

impl<P: LookupProvider, C: ObservationClock> Aggregator<P, C> {
    pub fn new(provider: P, clock: C, config: AggregatorConfig) -> Self {
        Self {
            provider,
            clock,
            config,
        }
    }

    #[cfg(test)]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[cfg(test)]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Symbol, precision and balance of every token in `identifiers`, as
    /// held by `subject`.
    pub async fn query_multiple_entities(
        &self,
        subject: Address,
        identifiers: &[Address],
    ) -> Result<BatchResult, QueryError> {
        self.check_batch_size(identifiers.len(), "tokens")?;
        let observation = self.observe().await?;
        let at = self.block_for(observation);

        info!(
            "Querying {} tokens for {} at block {}",
            identifiers.len(),
            subject,
            observation.sequence
        );

        let entities = self
            .fan_out(identifiers, |token| async move {
                debug!("lookup {} for {}", token, subject);
                let metadata = self.provider.lookup(token, subject, at).await?;
                Ok::<_, ProviderError>(EntityInfo::new(token, metadata))
            })
            .await?;

        Ok(BatchResult {
            subject_identifier: subject,
            entities,
            observed_at: observation.timestamp,
            observed_at_sequence: observation.sequence,
        })
    }

    /// Balances only; symbol and precision are never fetched.
    pub async fn query_balances_only(
        &self,
        subject: Address,
        identifiers: &[Address],
    ) -> Result<BalanceOnlyResult, QueryError> {
        self.check_batch_size(identifiers.len(), "tokens")?;
        let observation = self.observe().await?;
        let at = self.block_for(observation);

        info!(
            "Querying {} balances for {} at block {}",
            identifiers.len(),
            subject,
            observation.sequence
        );

        let balances = self
            .fan_out(identifiers, |token| async move {
                debug!("balanceOf {} for {}", token, subject);
                self.provider.balance_of(token, subject, at).await
            })
            .await?;

        Ok(BalanceOnlyResult {
            balances,
            observed_at: observation.timestamp,
            observed_at_sequence: observation.sequence,
        })
    }

    /// One token for one subject: the length-1 batch.
    pub async fn query_single_entity(
        &self,
        subject: Address,
        identifier: Address,
    ) -> Result<SingleEntityResult, QueryError> {
        let batch = self.query_multiple_entities(subject, &[identifier]).await?;

        let entity = batch.entities.into_iter().next().ok_or_else(|| {
            QueryError::LookupFailure {
                identifier,
                source: ProviderError::Malformed("batch of one returned nothing".to_string()),
            }
        })?;

        Ok(SingleEntityResult {
            subject_identifier: batch.subject_identifier,
            entity,
            observed_at: batch.observed_at,
            observed_at_sequence: batch.observed_at_sequence,
        })
    }

    /// One token's balance for every subject in `subjects`.
    pub async fn query_across_subjects(
        &self,
        subjects: &[Address],
        identifier: Address,
    ) -> Result<AcrossSubjectsResult, QueryError> {
        self.check_batch_size(subjects.len(), "holders")?;
        let observation = self.observe().await?;
        let at = self.block_for(observation);

        info!(
            "Querying {} balance for {} holders at block {}",
            identifier,
            subjects.len(),
            observation.sequence
        );

        let balances = self
            .fan_out(subjects, |holder| async move {
                debug!("balanceOf {} for {}", identifier, holder);
                self.provider.balance_of(identifier, holder, at).await
            })
            .await?;

        Ok(AcrossSubjectsResult {
            identifier,
            balances,
            observed_at: observation.timestamp,
            observed_at_sequence: observation.sequence,
        })
    }

    fn check_batch_size(&self, len: usize, what: &str) -> Result<(), QueryError> {
        if len > self.config.max_batch_size {
            return Err(QueryError::InvalidInput(format!(
                "{} {} requested, batch size limit is {}",
                len, what, self.config.max_batch_size
            )));
        }
        Ok(())
    }

    async fn observe(&self) -> Result<Observation, QueryError> {
        self.clock
            .now()
            .await
            .map_err(QueryError::ObservationUnavailable)
    }

    fn block_for(&self, observation: Observation) -> BlockRef {
        if self.config.pin_to_block {
            BlockRef::Number(observation.sequence)
        } else {
            BlockRef::Latest
        }
    }

    /// Run `lookup` for every key, at most `concurrency` at a time, and
    /// return the outputs in key order.
    ///
    /// Lookups complete in any order and land in their input slot. The
    /// first failure to complete ends the batch; dropping the stream
    /// cancels whatever is still in flight.
    async fn fan_out<T, F, Fut>(&self, keys: &[Address], lookup: F) -> Result<Vec<T>, QueryError>
    where
        F: Fn(Address) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut slots: Vec<Option<T>> = Vec::with_capacity(keys.len());
        slots.resize_with(keys.len(), || None);

        let mut completed = stream::iter(keys.iter().copied().enumerate())
            .map(|(index, key)| {
                let pending = lookup(key);
                async move { (index, key, pending.await) }
            })
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some((index, key, result)) = completed.next().await {
            match result {
                Ok(value) => slots[index] = Some(value),
                Err(source) => {
                    return Err(QueryError::LookupFailure {
                        identifier: key,
                        source,
                    })
                }
            }
        }

        slots
            .into_iter()
            .zip(keys)
            .map(|(slot, key)| {
                slot.ok_or_else(|| QueryError::LookupFailure {
                    identifier: *key,
                    source: ProviderError::Malformed("lookup never completed".to_string()),
                })
            })
            .collect()
    }
}

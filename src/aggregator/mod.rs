//! Batch query aggregation.
//!
//! This module turns many independent token lookups into one result
//! stamped with a single observation point.

pub mod batch;

pub use batch::{Aggregator, AggregatorConfig};

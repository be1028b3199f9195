//! Market data sources.
//!
//! Defines the `MarketSource` trait and the Kalshi implementation. The
//! trait exists so the scheduler and the REST layer can be exercised
//! against deterministic sources in tests.

pub mod kalshi;

use async_trait::async_trait;

use crate::types::{FetchOutcome, OracleError};

/// Abstraction over upstream market-listing APIs.
///
/// Implementors return the most likely outcome of the nearest-dated open
/// event, `FetchOutcome::Empty` when nothing is listed, or
/// `OracleError::Upstream` when the API is unreachable or malformed.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Fetch and select the current most likely outcome.
    async fn latest_outcome(&self) -> Result<FetchOutcome, OracleError>;

    /// Source name for logging and identification.
    fn name(&self) -> &str;
}

//! Shared types for the KalshiLink oracle server.
//!
//! These types form the data model used across all modules: the Kalshi
//! market shapes, the selected-outcome pipeline payloads, and the chain
//! submission/read shapes mirrored by the REST API.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Oracle value encoding
// ---------------------------------------------------------------------------

/// Oracle values are percentages scaled by 1000 (95.5% → 95500).
pub const ORACLE_SCALE: u64 = 1000;

/// Smallest value the oracle contract accepts.
pub const MIN_ORACLE_VALUE: u64 = 1;

/// Largest value the oracle contract accepts (99.999%).
pub const MAX_ORACLE_VALUE: u64 = 99_999;

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// A single Kalshi sub-market (one strike within an event).
///
/// `yes_bid` / `no_ask` are quoted in cents and may be absent for thin
/// markets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub ticker: String,
    pub yes_bid: Option<i64>,
    pub no_ask: Option<i64>,
}

impl Market {
    /// Implied probability of this outcome, derived from the best quotes.
    ///
    /// `yes_bid / 100` when a positive yes bid exists, otherwise
    /// `1 - no_ask / 100` when a positive no ask exists, otherwise a
    /// neutral `0.5` for unquoted markets.
    pub fn implied_probability(&self) -> f64 {
        match self.yes_bid {
            Some(bid) if bid > 0 => return bid as f64 / 100.0,
            _ => {}
        }
        match self.no_ask {
            Some(ask) if ask > 0 => 1.0 - (ask as f64 / 100.0),
            _ => 0.5,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (yes_bid: {} | no_ask: {} | p: {:.2})",
            self.ticker,
            self.yes_bid.map_or("—".to_string(), |b| format!("{b}¢")),
            self.no_ask.map_or("—".to_string(), |a| format!("{a}¢")),
            self.implied_probability(),
        )
    }
}

/// A Kalshi event: a strike date and its nested sub-markets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_ticker: String,
    /// ISO-8601 strike date. Events without one sort after all dated events.
    pub strike_date: Option<String>,
    pub markets: Vec<Market>,
}

/// The most likely outcome of the nearest-dated open event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedOutcome {
    pub ticker: String,
    pub probability: f64,
    /// Strike price extracted from the ticker suffix, e.g. "1.17399".
    pub price: String,
    pub yes_bid: Option<i64>,
    pub no_ask: Option<i64>,
    pub strike_date: Option<String>,
}

impl fmt::Display for SelectedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} (p={:.2})",
            self.ticker, self.price, self.probability,
        )
    }
}

/// Outcome of a market fetch.
///
/// "Nothing open right now" is a normal condition and distinct from a
/// fetch failure, which surfaces as `Err(OracleError::Upstream)` instead.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Selected(SelectedOutcome),
    Empty,
}

impl FetchOutcome {
    /// The selected outcome, if any.
    pub fn selected(&self) -> Option<&SelectedOutcome> {
        match self {
            FetchOutcome::Selected(s) => Some(s),
            FetchOutcome::Empty => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Chain submission shapes
// ---------------------------------------------------------------------------

/// A data point destined for the oracle contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OracleSubmission {
    /// Percentage scaled by 1000, in `[1, 99999]`.
    pub value: u64,
    /// Unix seconds at submission time.
    pub timestamp: u64,
    /// Unix seconds at which the underlying market resolves.
    pub resolution_timestamp: u64,
}

impl OracleSubmission {
    /// Validate the oracle value range the contract enforces.
    pub fn validate(&self) -> Result<(), OracleError> {
        if (MIN_ORACLE_VALUE..=MAX_ORACLE_VALUE).contains(&self.value) {
            Ok(())
        } else {
            Err(OracleError::ValueOutOfRange(self.value))
        }
    }

    /// The value as a human-readable percentage.
    pub fn value_percentage(&self) -> f64 {
        self.value as f64 / ORACLE_SCALE as f64
    }
}

/// Receipt for a confirmed (or reverted) state-mutating call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    /// False when the transaction was mined but reverted.
    pub confirmed: bool,
}

impl fmt::Display for SubmissionReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] block={}",
            self.transaction_hash,
            if self.confirmed { "confirmed" } else { "reverted" },
            self.block_number
                .map_or("pending".to_string(), |b| b.to_string()),
        )
    }
}

// ---------------------------------------------------------------------------
// Chain read shapes
// ---------------------------------------------------------------------------

/// Oracle contract metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleInfo {
    pub name: String,
    pub owner: String,
    pub total_data_points: u64,
    pub contract_address: String,
}

/// A stored oracle data point, as read back from the contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoint {
    pub index: u64,
    pub value: u64,
    pub value_percentage: f64,
    pub submission_timestamp: u64,
    pub resolution_timestamp: u64,
    pub submitter: String,
    pub block_number: u64,
}

/// RPC connectivity snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainHealth {
    pub connected: bool,
    pub current_block: Option<u64>,
    pub contract_address: String,
}

/// One token's balance, or the error that prevented reading it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenBalance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenBalance {
    pub fn ok(balance: String) -> Self {
        Self {
            balance: Some(balance),
            error: None,
        }
    }

    pub fn err(message: String) -> Self {
        Self {
            balance: None,
            error: Some(message),
        }
    }
}

/// WUSDC / EURC balances for an address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalances {
    #[serde(rename = "USDC")]
    pub usdc: TokenBalance,
    #[serde(rename = "EURC")]
    pub eurc: TokenBalance,
}

/// Result of minting one test token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintResult {
    pub success: bool,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Faucet report for both test tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintReport {
    #[serde(rename = "USDC")]
    pub usdc: MintResult,
    #[serde(rename = "EURC")]
    pub eurc: MintResult,
}

impl MintReport {
    /// Whether at least one token minted successfully.
    pub fn any_success(&self) -> bool {
        self.usdc.success || self.eurc.success
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error taxonomy.
///
/// `Upstream` is the "market API unreachable or malformed" class and is
/// never fatal to the scheduler. `InvalidPrice` rejects unusable strike
/// prices at the mapping stage instead of propagating a division fault.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Upstream market API error: {0}")]
    Upstream(String),

    #[error("Invalid strike price '{0}': must be a positive number")]
    InvalidPrice(String),

    #[error("Oracle value {0} outside [{MIN_ORACLE_VALUE}, {MAX_ORACLE_VALUE}]")]
    ValueOutOfRange(u64),

    #[error("Chain error: {0}")]
    Chain(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Strike price → treasury allocation mapping.
//!
//! Converts the selected market's strike price (an EUR/USD exchange rate)
//! into a bounded target allocation percentage and the oracle-encoded
//! integer the contract stores. A rate above parity pushes the allocation
//! below 100%, a rate below parity pushes it above — clamped to [1, 99]
//! either way.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

use crate::types::{OracleError, MAX_ORACLE_VALUE, MIN_ORACLE_VALUE, ORACLE_SCALE};

/// Lowest target percentage the treasury accepts.
pub const MIN_TARGET_PCT: u64 = 1;

/// Highest target percentage the treasury accepts.
pub const MAX_TARGET_PCT: u64 = 99;

/// A fully mapped allocation: the treasury percentage and its
/// oracle-scaled encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub target_percentage: u64,
    pub oracle_value: u64,
}

/// Map a raw strike price string to an [`Allocation`].
///
/// Non-numeric, zero, or negative prices are rejected as
/// [`OracleError::InvalidPrice`] — a price can never legitimately be
/// non-positive, so the divide is guarded rather than left to fault.
pub fn map_price(raw: &str) -> Result<Allocation, OracleError> {
    let price = Decimal::from_str(raw.trim())
        .map_err(|_| OracleError::InvalidPrice(raw.to_string()))?;

    if price <= Decimal::ZERO {
        return Err(OracleError::InvalidPrice(raw.to_string()));
    }

    // 100 / price, rounded to the nearest whole percent, then clamped.
    let pct = (dec!(100) / price)
        .round()
        .to_u64()
        .unwrap_or(MAX_TARGET_PCT)
        .clamp(MIN_TARGET_PCT, MAX_TARGET_PCT);

    let oracle_value = (pct * ORACLE_SCALE).clamp(MIN_ORACLE_VALUE, MAX_ORACLE_VALUE);

    Ok(Allocation {
        target_percentage: pct,
        oracle_value,
    })
}

//! Fixed-point arithmetic shared by every ledger.
//!
//! All per-unit quantities are 1e18-scaled integers held in `U256`.
//! Divisions truncate; where truncation would systematically bias a
//! distribution, the remainder is carried into the next numerator.

use odra::casper_types::U256;
use crate::errors::CdpError;

/// Decimal precision of amounts and per-unit accumulators (1e18)
pub const DECIMAL_PRECISION: u64 = 1_000_000_000_000_000_000;

/// Product-factor rebase multiplier and precision floor (1e9)
pub const SCALE_FACTOR: u64 = 1_000_000_000;

/// Basis points scale (100% = 10000 bps)
pub const BPS_SCALE: u64 = 10_000;

/// `DECIMAL_PRECISION` as `U256`
pub fn precision() -> U256 {
    U256::from(DECIMAL_PRECISION)
}

/// `SCALE_FACTOR` as `U256`
pub fn scale_factor() -> U256 {
    U256::from(SCALE_FACTOR)
}

/// Result of splitting an amount over a number of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerUnitShare {
    /// 1e18-scaled amount per unit
    pub per_unit: U256,
    /// Remainder to carry into the next split
    pub remainder: U256,
}

/// Computes `a * b / denominator`, truncating.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, CdpError> {
    if denominator.is_zero() {
        return Err(CdpError::InvariantViolation);
    }
    a.checked_mul(b)
        .ok_or(CdpError::ArithmeticOverflow)?
        .checked_div(denominator)
        .ok_or(CdpError::InvariantViolation)
}

/// Checked addition.
pub fn add(a: U256, b: U256) -> Result<U256, CdpError> {
    a.checked_add(b).ok_or(CdpError::ArithmeticOverflow)
}

/// Checked subtraction; underflow means a ledger invariant was broken.
pub fn sub(a: U256, b: U256) -> Result<U256, CdpError> {
    a.checked_sub(b).ok_or(CdpError::InvariantViolation)
}

/// Splits `amount` over `total_units` at 1e18 precision.
///
/// `carry` is the remainder returned by the previous split of the same
/// quantity. Over any sequence of splits the amount credited differs from
/// the amount distributed by less than one unit of the last divisor.
pub fn per_unit_with_carry(
    amount: U256,
    total_units: U256,
    carry: U256,
) -> Result<PerUnitShare, CdpError> {
    if total_units.is_zero() {
        return Err(CdpError::InvariantViolation);
    }
    let numerator = add(
        amount
            .checked_mul(precision())
            .ok_or(CdpError::ArithmeticOverflow)?,
        carry,
    )?;
    let per_unit = numerator / total_units;
    let remainder = numerator - per_unit * total_units;
    Ok(PerUnitShare { per_unit, remainder })
}

//! Product-sum accounting for the stability pool.
//!
//! Every liquidation scales all deposits down by a common factor and credits
//! collateral per unit deposited. Instead of touching each deposit, the pool
//! keeps a running product `P` and per-`(epoch, scale)` sums `S` (collateral)
//! and `G` (reward). A deposit stores the values it was settled at and
//! resolves its balance and gains lazily from them.
//!
//! The functions here are pure: they take the pool state by reference and
//! leave storage of the sums to the caller.

use odra::casper_types::U256;
use crate::errors::CdpError;
use crate::fixed_point::{self, per_unit_with_carry, precision, scale_factor};
use crate::types::{DepositSnapshot, PoolState};

/// Amount to add to the sum stored at `(epoch, scale)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumIncrement {
    pub epoch: u64,
    pub scale: u64,
    pub amount: U256,
}

/// What a single offset did to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetOutcome {
    /// Collateral sum increment, keyed at the pre-offset slot
    pub collateral_increment: SumIncrement,
    /// Debt loss per unit deposited (1e18 = the whole pool)
    pub loss_per_unit: U256,
    /// `P` crossed the precision floor and was rebased
    pub scale_changed: bool,
    /// The pool was emptied and a new epoch started
    pub epoch_changed: bool,
}

/// Absorbs `debt` from the pool and credits `collateral` to its depositors.
///
/// Returns `Ok(None)` for a zero debt. The caller must add
/// `collateral_increment` to its collateral sums.
pub fn apply_offset(
    pool: &mut PoolState,
    debt: U256,
    collateral: U256,
) -> Result<Option<OffsetOutcome>, CdpError> {
    if debt.is_zero() {
        return Ok(None);
    }
    let total = pool.total_deposits;
    if total.is_zero() || debt > total {
        return Err(CdpError::InvariantViolation);
    }

    let gain = per_unit_with_carry(collateral, total, pool.last_collateral_error)?;
    pool.last_collateral_error = gain.remainder;

    let one = precision();
    let loss_per_unit = if debt == total {
        pool.last_debt_loss_error = U256::zero();
        one
    } else {
        let loss = per_unit_with_carry(debt, total, pool.last_debt_loss_error)?;
        pool.last_debt_loss_error = loss.remainder;
        // A partial offset must never zero the product
        loss.per_unit.min(one - U256::one())
    };

    let collateral_increment = SumIncrement {
        epoch: pool.current_epoch,
        scale: pool.current_scale,
        amount: gain
            .per_unit
            .checked_mul(pool.p)
            .ok_or(CdpError::ArithmeticOverflow)?,
    };

    let factor = one - loss_per_unit;
    let mut scale_changed = false;
    let mut epoch_changed = false;
    if factor.is_zero() {
        pool.current_epoch += 1;
        pool.current_scale = 0;
        pool.p = one;
        epoch_changed = true;
    } else {
        let shrunk = fixed_point::mul_div(pool.p, factor, one)?;
        if shrunk < scale_factor() {
            let rebased = pool
                .p
                .checked_mul(factor)
                .and_then(|v| v.checked_mul(scale_factor()))
                .ok_or(CdpError::ArithmeticOverflow)?
                / one;
            pool.p = rebased;
            pool.current_scale += 1;
            scale_changed = true;
        } else {
            pool.p = shrunk;
        }
    }
    if pool.p.is_zero() {
        return Err(CdpError::InvariantViolation);
    }

    pool.total_deposits = fixed_point::sub(total, debt)?;
    pool.total_collateral = fixed_point::add(pool.total_collateral, collateral)?;

    Ok(Some(OffsetOutcome {
        collateral_increment,
        loss_per_unit,
        scale_changed,
        epoch_changed,
    }))
}

/// Credits `issuance` reward tokens to the current depositors.
///
/// Nothing is credited while the pool is empty; the issuance is then lost.
pub fn apply_reward_issuance(
    pool: &mut PoolState,
    issuance: U256,
) -> Result<Option<SumIncrement>, CdpError> {
    if issuance.is_zero() || pool.total_deposits.is_zero() {
        return Ok(None);
    }
    let share = per_unit_with_carry(issuance, pool.total_deposits, pool.last_reward_error)?;
    pool.last_reward_error = share.remainder;
    Ok(Some(SumIncrement {
        epoch: pool.current_epoch,
        scale: pool.current_scale,
        amount: share
            .per_unit
            .checked_mul(pool.p)
            .ok_or(CdpError::ArithmeticOverflow)?,
    }))
}

/// Deposit balance after every offset since `snapshot`.
pub fn compounded_deposit(
    initial_deposit: U256,
    snapshot: &DepositSnapshot,
    pool: &PoolState,
) -> Result<U256, CdpError> {
    if initial_deposit.is_zero() || snapshot.epoch != pool.current_epoch {
        return Ok(U256::zero());
    }
    if pool.current_scale < snapshot.scale {
        return Err(CdpError::InvariantViolation);
    }
    match pool.current_scale - snapshot.scale {
        0 => fixed_point::mul_div(initial_deposit, pool.p, snapshot.p),
        1 => Ok(fixed_point::mul_div(initial_deposit, pool.p, snapshot.p)? / scale_factor()),
        _ => Ok(U256::zero()),
    }
}

/// Gain accrued in one sum since the deposit was settled.
///
/// `sum_at_scale` and `sum_at_next_scale` are the sums stored at the
/// snapshot's `(epoch, scale)` and `(epoch, scale + 1)`. Anything credited
/// two or more scales later is below precision and ignored.
pub fn depositor_gain(
    initial_deposit: U256,
    snapshot_p: U256,
    snapshot_sum: U256,
    sum_at_scale: U256,
    sum_at_next_scale: U256,
) -> Result<U256, CdpError> {
    if initial_deposit.is_zero() {
        return Ok(U256::zero());
    }
    let first = fixed_point::sub(sum_at_scale, snapshot_sum)?;
    let second = sum_at_next_scale / scale_factor();
    let accrued = fixed_point::add(first, second)?;
    Ok(fixed_point::mul_div(initial_deposit, accrued, snapshot_p)? / precision())
}

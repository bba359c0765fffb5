//! Reward Issuer Contract
//!
//! Emits the reward token to stability pool depositors at a fixed rate per
//! pool, up to a per-pool supply cap funded by the treasury.
//!
//! Key mechanics:
//! - The stability pool calls `issue` before every pool operation; the
//!   returned amount is credited to the pool's reward sum G
//! - Issuance is debounced: calls less than a minute apart issue nothing
//! - Issued rewards stay in this contract until the pool pays them out
//!   through `send_reward`
//! - A pool whose cap is used up by removals or transfers is closed and
//!   its issuance clock reset

use odra::prelude::*;
use odra::ContractRef;
use odra::casper_types::U256;
use crate::errors::CdpError;
use crate::events::{
    RewardAccrued, RewardFundAdded, RewardFundRemoved, RewardFundTransferred, RewardPoolClosed,
    WeeklyDistributionSet,
};
use crate::fixed_point;
use crate::interfaces::{Cep18ContractRef, PoolDirectoryContractRef};
use crate::types::RewardPool;

/// Minimum time between two issuances for the same pool
pub const ISSUANCE_DEBOUNCE_SECONDS: u64 = 60;

/// Seconds in one week
pub const SECONDS_PER_WEEK: u64 = 604_800;

/// Reward Issuer Contract
#[odra::module(events = [
    RewardAccrued,
    RewardFundAdded,
    RewardFundRemoved,
    RewardFundTransferred,
    RewardPoolClosed,
    WeeklyDistributionSet
])]
pub struct RewardIssuer {
    /// Deployer, allowed to change the treasury
    owner: Var<Address>,
    /// Account that funds pools and sets distributions
    treasury: Var<Address>,
    /// Reward token contract
    reward_token: Var<Address>,
    /// Stability pool contract (sole consumer of issuance)
    stability_pool: Var<Address>,
    /// Emission state per collateral asset
    pools: Mapping<Address, RewardPool>,
    /// Configured weekly distribution per collateral asset
    weekly_distribution: Mapping<Address, U256>,
}

#[odra::module]
impl RewardIssuer {
    /// Initialize the reward issuer
    pub fn init(&mut self, reward_token: Address, stability_pool: Address, treasury: Address) {
        self.owner.set(self.env().caller());
        self.reward_token.set(reward_token);
        self.stability_pool.set(stability_pool);
        self.treasury.set(treasury);
    }

    /// Replace the treasury account (owner only)
    pub fn set_treasury(&mut self, treasury: Address) {
        self.require_owner();
        self.treasury.set(treasury);
    }

    // ========== Treasury Functions ==========

    /// Pull `amount` reward tokens from the treasury and raise the pool's cap.
    pub fn add_fund_to_pool(&mut self, asset: Address, amount: U256) {
        self.require_treasury();
        self.require_registered(asset);

        let now = self.now_secs();
        let mut pool = self.pools.get(&asset).unwrap_or_default();
        let result = fund(&mut pool, amount, now);
        self.ok_or_revert(result);
        self.pools.set(&asset, pool.clone());

        let treasury = self.env().caller();
        let this = self.env().self_address();
        self.reward_token_ref().transfer_from(treasury, this, amount);

        self.env().emit_event(RewardFundAdded {
            asset,
            amount,
            supply_cap: pool.supply_cap,
        });
    }

    /// Lower the pool's cap by `amount` and return the tokens to the treasury.
    pub fn remove_fund_from_pool(&mut self, asset: Address, amount: U256) {
        self.require_treasury();
        self.require_registered(asset);

        let mut pool = self.pools.get(&asset).unwrap_or_default();
        let closed = defund(&mut pool, amount);
        let closed = self.ok_or_revert(closed);
        self.pools.set(&asset, pool.clone());

        let treasury = self.env().caller();
        self.reward_token_ref().transfer(treasury, amount);

        self.env().emit_event(RewardFundRemoved {
            asset,
            amount,
            supply_cap: pool.supply_cap,
        });
        if closed {
            self.env().emit_event(RewardPoolClosed { asset });
        }
    }

    /// Move `amount` of unissued headroom from one pool to another.
    pub fn transfer_fund_to_another_pool(
        &mut self,
        from_asset: Address,
        to_asset: Address,
        amount: U256,
    ) {
        self.require_treasury();
        if from_asset == to_asset {
            self.env().revert(CdpError::InvalidConfig);
        }
        self.require_registered(from_asset);
        self.require_registered(to_asset);

        let now = self.now_secs();
        let mut from_pool = self.pools.get(&from_asset).unwrap_or_default();
        let mut to_pool = self.pools.get(&to_asset).unwrap_or_default();

        let closed = defund(&mut from_pool, amount);
        let closed = self.ok_or_revert(closed);
        let funded = fund(&mut to_pool, amount, now);
        self.ok_or_revert(funded);

        self.pools.set(&from_asset, from_pool);
        self.pools.set(&to_asset, to_pool);

        self.env().emit_event(RewardFundTransferred {
            from_asset,
            to_asset,
            amount,
        });
        if closed {
            self.env().emit_event(RewardPoolClosed { asset: from_asset });
        }
    }

    /// Set the pool's emission as an amount per week.
    pub fn set_weekly_distribution(&mut self, asset: Address, weekly: U256) {
        self.require_treasury();
        self.require_registered(asset);

        let rate_per_second = weekly / U256::from(SECONDS_PER_WEEK);
        let mut pool = self.pools.get(&asset).unwrap_or_default();
        pool.rate_per_second = rate_per_second;
        self.pools.set(&asset, pool);
        self.weekly_distribution.set(&asset, weekly);

        self.env().emit_event(WeeklyDistributionSet {
            asset,
            weekly_distribution: weekly,
            rate_per_second,
        });
    }

    // ========== Stability Pool Functions ==========

    /// Roll the pool's issuance forward to now and return the newly issued amount.
    pub fn issue(&mut self, asset: Address) -> U256 {
        self.require_stability_pool();

        let now = self.now_secs();
        let mut pool = self.pools.get(&asset).unwrap_or_default();
        let issuance = roll_forward(&mut pool, now);
        let issuance = self.ok_or_revert(issuance);
        self.pools.set(&asset, pool.clone());

        if !issuance.is_zero() {
            self.env().emit_event(RewardAccrued {
                asset,
                issuance,
                total_issued: pool.total_issued,
            });
        }
        issuance
    }

    /// Pay realized reward gains to a depositor.
    pub fn send_reward(&mut self, recipient: Address, amount: U256) {
        self.require_stability_pool();
        if amount.is_zero() {
            return;
        }
        self.reward_token_ref().transfer(recipient, amount);
    }

    // ========== Query Functions ==========

    /// Get the emission state of a pool
    pub fn get_pool(&self, asset: Address) -> RewardPool {
        self.pools.get(&asset).unwrap_or_default()
    }

    /// Get the total amount the pool may ever issue
    pub fn get_supply_cap(&self, asset: Address) -> U256 {
        self.get_pool(asset).supply_cap
    }

    /// Get the amount issued so far
    pub fn get_total_issued(&self, asset: Address) -> U256 {
        self.get_pool(asset).total_issued
    }

    /// Get last issuance time in seconds (0 when closed)
    pub fn get_last_update_time(&self, asset: Address) -> u64 {
        self.get_pool(asset).last_update_time
    }

    /// Get emission per second
    pub fn get_rate_per_second(&self, asset: Address) -> U256 {
        self.get_pool(asset).rate_per_second
    }

    /// Get configured weekly distribution
    pub fn get_weekly_distribution(&self, asset: Address) -> U256 {
        self.weekly_distribution.get(&asset).unwrap_or_default()
    }

    /// Get treasury address
    pub fn get_treasury(&self) -> Option<Address> {
        self.treasury.get()
    }

    /// Get reward token address
    pub fn get_reward_token(&self) -> Option<Address> {
        self.reward_token.get()
    }

    // ========== Internal Functions ==========

    fn now_secs(&self) -> u64 {
        self.env().get_block_time() / 1000
    }

    fn reward_token_ref(&self) -> Cep18ContractRef {
        match self.reward_token.get() {
            Some(token) => Cep18ContractRef::new(self.env(), token),
            None => self.env().revert(CdpError::ContractNotWired),
        }
    }

    fn require_registered(&self, asset: Address) {
        let Some(pool) = self.stability_pool.get() else {
            self.env().revert(CdpError::ContractNotWired)
        };
        if !PoolDirectoryContractRef::new(self.env(), pool).is_pool_registered(asset) {
            self.env().revert(CdpError::PoolNotFound);
        }
    }

    fn require_owner(&self) {
        if self.owner.get() != Some(self.env().caller()) {
            self.env().revert(CdpError::PermissionDenied);
        }
    }

    fn require_treasury(&self) {
        if self.treasury.get() != Some(self.env().caller()) {
            self.env().revert(CdpError::PermissionDenied);
        }
    }

    fn require_stability_pool(&self) {
        if self.stability_pool.get() != Some(self.env().caller()) {
            self.env().revert(CdpError::PermissionDenied);
        }
    }

    fn ok_or_revert<T>(&self, result: Result<T, CdpError>) -> T {
        match result {
            Ok(value) => value,
            Err(error) => self.env().revert(error),
        }
    }
}

/// Issues what accrued since the last update, bounded by the remaining cap.
///
/// Returns zero without touching the pool when it is closed or when less
/// than `ISSUANCE_DEBOUNCE_SECONDS` passed since the last update.
pub fn roll_forward(pool: &mut RewardPool, now: u64) -> Result<U256, CdpError> {
    if pool.supply_cap.is_zero() {
        return Ok(U256::zero());
    }
    let elapsed = now.saturating_sub(pool.last_update_time);
    if elapsed < ISSUANCE_DEBOUNCE_SECONDS {
        return Ok(U256::zero());
    }

    let remaining = fixed_point::sub(pool.supply_cap, pool.total_issued)?;
    let accrued = pool
        .rate_per_second
        .checked_mul(U256::from(elapsed))
        .ok_or(CdpError::ArithmeticOverflow)?;
    let issuance = accrued.min(remaining);

    pool.total_issued = fixed_point::add(pool.total_issued, issuance)?;
    pool.last_update_time = now;
    if pool.total_issued > pool.supply_cap {
        return Err(CdpError::InvariantViolation);
    }
    Ok(issuance)
}

/// Raises the cap; a closed pool restarts its issuance clock at `now`.
pub fn fund(pool: &mut RewardPool, amount: U256, now: u64) -> Result<(), CdpError> {
    if amount.is_zero() {
        return Err(CdpError::InvalidAmount);
    }
    if pool.supply_cap.is_zero() {
        pool.last_update_time = now;
    }
    pool.supply_cap = fixed_point::add(pool.supply_cap, amount)?;
    Ok(())
}

/// Lowers the cap by at most the unissued headroom.
///
/// Returns `true` when the pool was closed because nothing is left to issue.
pub fn defund(pool: &mut RewardPool, amount: U256) -> Result<bool, CdpError> {
    let headroom = fixed_point::sub(pool.supply_cap, pool.total_issued)?;
    if amount.is_zero() || amount > headroom {
        return Err(CdpError::InvalidAmount);
    }
    pool.supply_cap = pool.supply_cap - amount;
    if pool.supply_cap == pool.total_issued {
        pool.supply_cap = U256::zero();
        pool.total_issued = U256::zero();
        pool.last_update_time = 0;
        return Ok(true);
    }
    Ok(false)
}

//! Common types used across the ledgers.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::fixed_point::DECIMAL_PRECISION;

/// Per-asset stability pool state.
///
/// `p` stays in `(0, 1e18]` for the current `(epoch, scale)` slot. The
/// current S and G sums live in the pool's epoch/scale mappings, not here.
#[odra::odra_type]
#[derive(Default)]
pub struct PoolState {
    /// Global product factor (starts at 1e18)
    pub p: U256,
    /// Number of precision rebases of `p` within the current epoch
    pub current_scale: u64,
    /// Number of pool-emptying resets
    pub current_epoch: u64,
    /// Total stablecoin deposits
    pub total_deposits: U256,
    /// Collateral held on behalf of depositors
    pub total_collateral: U256,
    /// Carried remainder of the collateral-gain division
    pub last_collateral_error: U256,
    /// Carried remainder of the debt-loss division
    pub last_debt_loss_error: U256,
    /// Carried remainder of the reward-issuance division
    pub last_reward_error: U256,
    /// Number of depositors with a live deposit
    pub depositor_count: u64,
}

impl PoolState {
    /// Fresh pool with `p = 1e18`.
    pub fn new() -> Self {
        Self {
            p: U256::from(DECIMAL_PRECISION),
            ..Default::default()
        }
    }
}

/// Pool state captured when a deposit was last settled.
#[odra::odra_type]
#[derive(Default)]
pub struct DepositSnapshot {
    /// Product factor at settlement
    pub p: U256,
    /// Collateral sum S at settlement
    pub s: U256,
    /// Reward sum G at settlement
    pub g: U256,
    /// Scale at settlement
    pub scale: u64,
    /// Epoch at settlement
    pub epoch: u64,
}

/// A depositor's position in one pool. `initial_deposit == 0` means absent.
#[odra::odra_type]
#[derive(Default)]
pub struct DepositRecord {
    /// Principal at last settlement
    pub initial_deposit: U256,
    /// Snapshot taken at last settlement
    pub snapshot: DepositSnapshot,
}

/// Storage key for the per-`(epoch, scale)` sums of an asset.
#[odra::odra_type]
#[derive(Copy)]
pub struct EpochScaleKey {
    /// Collateral asset
    pub asset: Address,
    /// Epoch
    pub epoch: u64,
    /// Scale
    pub scale: u64,
}

/// Storage key for a depositor's record in one pool.
#[odra::odra_type]
#[derive(Copy)]
pub struct DepositKey {
    /// Collateral asset
    pub asset: Address,
    /// Depositor address
    pub depositor: Address,
}

/// Reward emission state for one pool.
#[odra::odra_type]
#[derive(Default)]
pub struct RewardPool {
    /// Maximum amount this pool may ever issue
    pub supply_cap: U256,
    /// Emission rate (reward token per second)
    pub rate_per_second: U256,
    /// Last time issuance was rolled forward (seconds)
    pub last_update_time: u64,
    /// Amount issued so far
    pub total_issued: U256,
}

/// Storage key for a staker's per-asset fee snapshot.
#[odra::odra_type]
#[derive(Copy)]
pub struct StakerAssetKey {
    /// Staker address
    pub staker: Address,
    /// Collateral asset
    pub asset: Address,
}

/// Trove lifecycle status
#[odra::odra_type]
#[derive(Copy)]
pub enum TroveStatus {
    /// Never opened
    NonExistent,
    /// Open and carrying debt
    Active,
    /// Closed by its owner
    Closed,
    /// Closed by liquidation
    Liquidated,
}

impl Default for TroveStatus {
    fn default() -> Self {
        TroveStatus::NonExistent
    }
}

/// Trove data as seen by the liquidation path.
#[odra::odra_type]
#[derive(Default)]
pub struct TroveData {
    /// Collateral amount
    pub collateral: U256,
    /// Debt amount (stablecoin)
    pub debt: U256,
    /// Redistribution stake
    pub stake: U256,
    /// Lifecycle status
    pub status: TroveStatus,
}

/// Storage key for a trove.
#[odra::odra_type]
#[derive(Copy)]
pub struct TroveKey {
    /// Collateral asset
    pub asset: Address,
    /// Trove owner
    pub owner: Address,
}

/// Per-asset redistribution ledger of the trove registry.
#[odra::odra_type]
#[derive(Default)]
pub struct RedistributionState {
    /// Collateral held for active troves (including pending rewards)
    pub total_collateral: U256,
    /// Debt of active troves (including pending rewards)
    pub total_debt: U256,
    /// Sum of active trove stakes
    pub total_stakes: U256,
    /// Redistributed collateral per unit staked
    pub l_collateral: U256,
    /// Redistributed debt per unit staked
    pub l_debt: U256,
    /// Carried remainder of the collateral redistribution
    pub last_collateral_error: U256,
    /// Carried remainder of the debt redistribution
    pub last_debt_error: U256,
    /// `total_stakes` right after the last liquidation
    pub total_stakes_snapshot: U256,
    /// `total_collateral` right after the last liquidation
    pub total_collateral_snapshot: U256,
    /// Number of active troves
    pub active_troves: u64,
}

/// Redistribution accumulators captured when a trove was last touched.
#[odra::odra_type]
#[derive(Default)]
pub struct RedistributionSnapshot {
    /// `l_collateral` at last touch
    pub l_collateral: U256,
    /// `l_debt` at last touch
    pub l_debt: U256,
}

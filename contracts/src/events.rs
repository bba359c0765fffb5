//! Events emitted by the ledgers.
//!
//! Each mutating entry point emits one event describing what changed.

use odra::prelude::*;
use odra::casper_types::U256;

// ========== Stability pool ==========

#[odra::event]
pub struct PoolRegistered {
    pub asset: Address,
}

#[odra::event]
pub struct DepositProvided {
    pub asset: Address,
    pub depositor: Address,
    pub amount: U256,
    pub new_deposit: U256,
}

#[odra::event]
pub struct DepositWithdrawn {
    pub asset: Address,
    pub depositor: Address,
    pub amount: U256,
    pub new_deposit: U256,
}

/// Realized collateral and reward gains paid on settlement.
#[odra::event]
pub struct GainsPaid {
    pub asset: Address,
    pub depositor: Address,
    pub collateral_gain: U256,
    pub reward_gain: U256,
}

#[odra::event]
pub struct DebtOffset {
    pub asset: Address,
    pub debt: U256,
    pub collateral: U256,
    pub total_deposits: U256,
    pub p: U256,
}

#[odra::event]
pub struct ScaleChanged {
    pub asset: Address,
    pub epoch: u64,
    pub scale: u64,
}

#[odra::event]
pub struct EpochChanged {
    pub asset: Address,
    pub epoch: u64,
}

// ========== Reward issuance ==========

/// Reward tokens credited to a pool's depositors.
#[odra::event]
pub struct RewardAccrued {
    pub asset: Address,
    pub issuance: U256,
    pub total_issued: U256,
}

#[odra::event]
pub struct RewardFundAdded {
    pub asset: Address,
    pub amount: U256,
    pub supply_cap: U256,
}

#[odra::event]
pub struct RewardFundRemoved {
    pub asset: Address,
    pub amount: U256,
    pub supply_cap: U256,
}

#[odra::event]
pub struct RewardFundTransferred {
    pub from_asset: Address,
    pub to_asset: Address,
    pub amount: U256,
}

#[odra::event]
pub struct RewardPoolClosed {
    pub asset: Address,
}

#[odra::event]
pub struct WeeklyDistributionSet {
    pub asset: Address,
    pub weekly_distribution: U256,
    pub rate_per_second: U256,
}

// ========== Fee staking ==========

#[odra::event]
pub struct Staked {
    pub staker: Address,
    pub amount: U256,
    pub new_stake: U256,
}

#[odra::event]
pub struct Unstaked {
    pub staker: Address,
    pub amount: U256,
    pub new_stake: U256,
}

/// Fee booked into a flat accumulator. `asset` is `None` for the stablecoin.
#[odra::event]
pub struct FeeAccrued {
    pub asset: Option<Address>,
    pub fee: U256,
    pub accumulator: U256,
}

// ========== Troves and liquidation ==========

#[odra::event]
pub struct TroveOpened {
    pub asset: Address,
    pub owner: Address,
    pub collateral: U256,
    pub debt: U256,
    pub fee: U256,
}

#[odra::event]
pub struct TroveClosed {
    pub asset: Address,
    pub owner: Address,
}

#[odra::event]
pub struct TroveLiquidated {
    pub asset: Address,
    pub borrower: Address,
    pub debt_offset: U256,
    pub collateral_to_pool: U256,
    pub debt_redistributed: U256,
    pub collateral_redistributed: U256,
}

#[odra::event]
pub struct Redistributed {
    pub asset: Address,
    pub debt: U256,
    pub collateral: U256,
}

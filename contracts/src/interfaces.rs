//! Cross-contract interfaces between the ledgers.
//!
//! Argument names must match the entry points they call.

use odra::prelude::*;
use odra::casper_types::U256;
use crate::types::TroveData;

/// CEP-18 token (stablecoin, reward token, collateral tokens)
#[odra::external_contract]
pub trait Cep18 {
    fn balance_of(&self, account: Address) -> U256;
    fn transfer(&mut self, recipient: Address, amount: U256) -> bool;
    fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool;
    fn mint(&mut self, to: Address, amount: U256);
    fn burn(&mut self, amount: U256);
    fn burn_from(&mut self, from: Address, amount: U256);
}

/// Trove registry hooks driven by the liquidation engine
#[odra::external_contract]
pub trait TroveRegistry {
    /// Trove with pending redistribution rewards applied
    fn get_entire_debt_and_coll(&mut self, asset: Address, borrower: Address) -> TroveData;
    /// Closes the trove and sends `collateral_to_pool` to `stability_pool`
    fn close_liquidated_trove(
        &mut self,
        asset: Address,
        borrower: Address,
        collateral_to_pool: U256,
        stability_pool: Address,
    );
    /// Spreads debt and collateral over the remaining active troves
    fn redistribute(&mut self, asset: Address, debt: U256, collateral: U256);
}

/// Stability pool as seen by the liquidation engine
#[odra::external_contract]
pub trait OffsetPool {
    fn get_total_deposits(&self, asset: Address) -> U256;
    fn offset(&mut self, asset: Address, debt_to_offset: U256, collateral_to_add: U256);
}

/// Reward issuer as seen by the stability pool
#[odra::external_contract]
pub trait RewardSource {
    fn issue(&mut self, asset: Address) -> U256;
    fn send_reward(&mut self, recipient: Address, amount: U256);
}

/// Fee staking as seen by fee sources
#[odra::external_contract]
pub trait FeeSink {
    fn increase_f_asset(&mut self, asset: Address, fee: U256);
    fn increase_f_stable(&mut self, fee: U256);
}

/// Stability pool registry as seen by the reward issuer
#[odra::external_contract]
pub trait PoolDirectory {
    fn is_pool_registered(&self, asset: Address) -> bool;
}

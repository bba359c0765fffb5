//! Fee Staking Contract
//!
//! Shares protocol fees among reward-token stakers. Each fee stream has a
//! flat accumulator of fee per unit staked; a staker's pending gain is the
//! accumulator growth since their snapshot times their stake. Stakes are
//! never consumed, so unlike the stability pool nothing compounds.

use odra::prelude::*;
use odra::ContractRef;
use odra::casper_types::U256;
use crate::errors::CdpError;
use crate::events::{FeeAccrued, Staked, Unstaked};
use crate::fixed_point::{self, precision};
use crate::interfaces::Cep18ContractRef;
use crate::types::StakerAssetKey;

/// Fee Staking Contract
#[odra::module(events = [Staked, Unstaked, FeeAccrued])]
pub struct FeeStaking {
    /// Deployer, manages assets and fee sources
    owner: Var<Address>,
    /// Token being staked (the reward token)
    stake_token: Var<Address>,
    /// Stablecoin fees are paid in
    stablecoin: Var<Address>,
    /// Collateral assets with a fee stream
    assets: Var<Vec<Address>>,
    /// Registration flags for `assets`
    asset_registered: Mapping<Address, bool>,
    /// Contracts allowed to book fees
    fee_sources: Mapping<Address, bool>,
    /// Stake per staker
    stakes: Mapping<Address, U256>,
    /// Sum of all stakes
    total_staked: Var<U256>,
    /// Collateral fee per unit staked, per asset
    f_asset: Mapping<Address, U256>,
    /// Stablecoin fee per unit staked
    f_stable: Var<U256>,
    /// `f_asset` at each staker's last settlement
    f_asset_snapshots: Mapping<StakerAssetKey, U256>,
    /// `f_stable` at each staker's last settlement
    f_stable_snapshots: Mapping<Address, U256>,
}

#[odra::module]
impl FeeStaking {
    /// Initialize fee staking
    pub fn init(&mut self, stake_token: Address, stablecoin: Address) {
        self.owner.set(self.env().caller());
        self.stake_token.set(stake_token);
        self.stablecoin.set(stablecoin);
        self.assets.set(Vec::new());
        self.total_staked.set(U256::zero());
        self.f_stable.set(U256::zero());
    }

    // ========== Admin Functions ==========

    /// Register a collateral fee stream (owner only)
    pub fn add_asset(&mut self, asset: Address) {
        self.require_owner();
        if self.is_asset_registered(asset) {
            self.env().revert(CdpError::PoolAlreadyRegistered);
        }
        let mut assets = self.assets.get().unwrap_or_default();
        assets.push(asset);
        self.assets.set(assets);
        self.asset_registered.set(&asset, true);
    }

    /// Allow or disallow an account to book fees (owner only)
    pub fn set_fee_source(&mut self, account: Address, allowed: bool) {
        self.require_owner();
        self.fee_sources.set(&account, allowed);
    }

    // ========== Staker Functions ==========

    /// Stake reward tokens. Pending fee gains are paid out first.
    /// Note: Caller must have approved this contract to spend the stake token
    pub fn stake(&mut self, amount: U256) {
        if amount.is_zero() {
            self.env().revert(CdpError::InvalidAmount);
        }
        let staker = self.env().caller();
        let current = self.get_stake(staker);

        self.settle(staker, current);

        let new_stake = self.ok_or_revert(fixed_point::add(current, amount));
        let total_staked = self.ok_or_revert(fixed_point::add(self.get_total_staked(), amount));
        self.stakes.set(&staker, new_stake);
        self.total_staked.set(total_staked);

        let this = self.env().self_address();
        self.token_ref(self.stake_token.get()).transfer_from(staker, this, amount);

        self.env().emit_event(Staked {
            staker,
            amount,
            new_stake,
        });
    }

    /// Unstake up to `amount` (`U256::MAX` for everything). Pending fee gains
    /// are paid out first; a zero amount only claims them.
    pub fn unstake(&mut self, amount: U256) {
        let staker = self.env().caller();
        let current = self.get_stake(staker);
        if current.is_zero() {
            self.env().revert(CdpError::InvalidAmount);
        }

        self.settle(staker, current);

        let withdrawn = amount.min(current);
        let new_stake = self.ok_or_revert(fixed_point::sub(current, withdrawn));
        let total_staked = self.ok_or_revert(fixed_point::sub(self.get_total_staked(), withdrawn));
        self.stakes.set(&staker, new_stake);
        self.total_staked.set(total_staked);

        if !withdrawn.is_zero() {
            self.token_ref(self.stake_token.get()).transfer(staker, withdrawn);
        }

        self.env().emit_event(Unstaked {
            staker,
            amount: withdrawn,
            new_stake,
        });
    }

    // ========== Fee Source Functions ==========

    /// Book a collateral fee already transferred to this contract.
    pub fn increase_f_asset(&mut self, asset: Address, fee: U256) {
        self.require_fee_source();
        if !self.is_asset_registered(asset) {
            self.env().revert(CdpError::PoolNotFound);
        }

        let current = self.get_f_asset(asset);
        let result = accumulate(current, fee, self.get_total_staked());
        let updated = self.ok_or_revert(result);
        self.f_asset.set(&asset, updated);

        self.env().emit_event(FeeAccrued {
            asset: Some(asset),
            fee,
            accumulator: updated,
        });
    }

    /// Book a stablecoin fee already transferred to this contract.
    pub fn increase_f_stable(&mut self, fee: U256) {
        self.require_fee_source();

        let result = accumulate(self.get_f_stable(), fee, self.get_total_staked());
        let updated = self.ok_or_revert(result);
        self.f_stable.set(updated);

        self.env().emit_event(FeeAccrued {
            asset: None,
            fee,
            accumulator: updated,
        });
    }

    // ========== Query Functions ==========

    pub fn get_pending_asset_gain(&self, asset: Address, staker: Address) -> U256 {
        let key = StakerAssetKey { staker, asset };
        let snapshot = self.f_asset_snapshots.get(&key).unwrap_or_default();
        let result = pending_gain(self.get_stake(staker), self.get_f_asset(asset), snapshot);
        self.ok_or_revert(result)
    }

    pub fn get_pending_stable_gain(&self, staker: Address) -> U256 {
        let snapshot = self.f_stable_snapshots.get(&staker).unwrap_or_default();
        let result = pending_gain(self.get_stake(staker), self.get_f_stable(), snapshot);
        self.ok_or_revert(result)
    }

    pub fn get_stake(&self, staker: Address) -> U256 {
        self.stakes.get(&staker).unwrap_or_default()
    }

    pub fn get_total_staked(&self) -> U256 {
        self.total_staked.get().unwrap_or_default()
    }

    pub fn get_f_asset(&self, asset: Address) -> U256 {
        self.f_asset.get(&asset).unwrap_or_default()
    }

    pub fn get_f_stable(&self) -> U256 {
        self.f_stable.get().unwrap_or_default()
    }

    pub fn get_assets(&self) -> Vec<Address> {
        self.assets.get().unwrap_or_default()
    }

    pub fn is_asset_registered(&self, asset: Address) -> bool {
        self.asset_registered.get(&asset).unwrap_or(false)
    }

    pub fn is_fee_source(&self, account: Address) -> bool {
        self.fee_sources.get(&account).unwrap_or(false)
    }

    // ========== Internal Functions ==========

    /// Pays every pending gain of `staker` and re-snapshots the accumulators.
    fn settle(&mut self, staker: Address, stake: U256) {
        for asset in self.get_assets() {
            let key = StakerAssetKey { staker, asset };
            let f_now = self.get_f_asset(asset);
            let snapshot = self.f_asset_snapshots.get(&key).unwrap_or_default();
            let gain = pending_gain(stake, f_now, snapshot);
            let gain = self.ok_or_revert(gain);
            self.f_asset_snapshots.set(&key, f_now);
            if !gain.is_zero() {
                self.token_ref(Some(asset)).transfer(staker, gain);
            }
        }

        let f_now = self.get_f_stable();
        let snapshot = self.f_stable_snapshots.get(&staker).unwrap_or_default();
        let gain = pending_gain(stake, f_now, snapshot);
        let gain = self.ok_or_revert(gain);
        self.f_stable_snapshots.set(&staker, f_now);
        if !gain.is_zero() {
            self.token_ref(self.stablecoin.get()).transfer(staker, gain);
        }
    }

    fn token_ref(&self, token: Option<Address>) -> Cep18ContractRef {
        match token {
            Some(token) => Cep18ContractRef::new(self.env(), token),
            None => self.env().revert(CdpError::ContractNotWired),
        }
    }

    fn require_owner(&self) {
        if self.owner.get() != Some(self.env().caller()) {
            self.env().revert(CdpError::PermissionDenied);
        }
    }

    fn require_fee_source(&self) {
        if !self.is_fee_source(self.env().caller()) {
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

/// Adds `fee` per unit staked to an accumulator. Nothing moves while no one stakes.
pub fn accumulate(accumulator: U256, fee: U256, total_staked: U256) -> Result<U256, CdpError> {
    if total_staked.is_zero() || fee.is_zero() {
        return Ok(accumulator);
    }
    let per_unit = fixed_point::mul_div(fee, precision(), total_staked)?;
    fixed_point::add(accumulator, per_unit)
}

/// Gain of `stake` since the accumulator stood at `snapshot`.
pub fn pending_gain(stake: U256, accumulator: U256, snapshot: U256) -> Result<U256, CdpError> {
    let growth = fixed_point::sub(accumulator, snapshot)?;
    fixed_point::mul_div(stake, growth, precision())
}

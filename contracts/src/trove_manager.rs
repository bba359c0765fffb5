//! Trove Manager Contract
//!
//! Reference trove registry: one trove per (collateral asset, owner). It
//! mints the stablecoin against locked collateral, charges a borrowing fee
//! to fee stakers, and takes part in liquidations through the hooks used by
//! the liquidation engine.
//!
//! Debt and collateral the stability pool cannot absorb are redistributed to
//! the remaining troves of the asset in proportion to their stake. Like the
//! pool, this uses per-unit-staked accumulators (`L_coll`, `L_debt`) that a
//! trove applies lazily the next time it is touched.
//!
//! A stake is collateral scaled by the stake/collateral ratio recorded after
//! the last liquidation, so a new trove competes on equal terms with troves
//! whose collateral already includes pending redistributions.

use odra::prelude::*;
use odra::ContractRef;
use odra::casper_types::U256;
use crate::errors::CdpError;
use crate::events::{Redistributed, TroveClosed, TroveOpened};
use crate::fixed_point::{self, per_unit_with_carry, precision, BPS_SCALE};
use crate::interfaces::{Cep18ContractRef, FeeSinkContractRef};
use crate::types::{RedistributionSnapshot, RedistributionState, TroveData, TroveKey, TroveStatus};

/// Borrowing fee ceiling in basis points (10% = 1000 bps)
pub const MAX_BORROWING_FEE_BPS: u32 = 1_000;

/// Default borrowing fee in basis points (0.5% = 50 bps)
const DEFAULT_BORROWING_FEE_BPS: u32 = 50;

/// Trove Manager Contract
#[odra::module(events = [TroveOpened, TroveClosed, Redistributed])]
pub struct TroveManager {
    /// Deployer, manages assets and wiring
    owner: Var<Address>,
    /// Stablecoin contract address (this contract must be a minter)
    stablecoin: Var<Address>,
    /// Liquidation engine contract address
    liquidation_engine: Var<Option<Address>>,
    /// Fee staking contract address (receives borrowing fees)
    fee_staking: Var<Option<Address>>,
    /// Borrowing fee in bps
    borrowing_fee_bps: Var<u32>,
    /// Accepted collateral assets
    assets: Mapping<Address, bool>,
    /// Trove per (asset, owner)
    troves: Mapping<TroveKey, TroveData>,
    /// Redistribution accumulators at each trove's last touch
    snapshots: Mapping<TroveKey, RedistributionSnapshot>,
    /// Redistribution ledger per asset
    ledgers: Mapping<Address, RedistributionState>,
}

#[odra::module]
impl TroveManager {
    /// Initialize the trove manager
    pub fn init(&mut self, stablecoin: Address) {
        self.owner.set(self.env().caller());
        self.stablecoin.set(stablecoin);
        self.liquidation_engine.set(None);
        self.fee_staking.set(None);
        self.borrowing_fee_bps.set(DEFAULT_BORROWING_FEE_BPS);
    }

    // ========== Admin Functions ==========

    /// Accept a collateral asset (owner only)
    pub fn add_asset(&mut self, asset: Address) {
        self.require_owner();
        if self.is_asset_registered(asset) {
            self.env().revert(CdpError::PoolAlreadyRegistered);
        }
        self.assets.set(&asset, true);
    }

    pub fn set_liquidation_engine(&mut self, liquidation_engine: Address) {
        self.require_owner();
        self.liquidation_engine.set(Some(liquidation_engine));
    }

    pub fn set_fee_staking(&mut self, fee_staking: Address) {
        self.require_owner();
        self.fee_staking.set(Some(fee_staking));
    }

    /// Set borrowing fee (owner only, at most `MAX_BORROWING_FEE_BPS`)
    pub fn set_borrowing_fee_bps(&mut self, fee_bps: u32) {
        self.require_owner();
        if fee_bps > MAX_BORROWING_FEE_BPS {
            self.env().revert(CdpError::InvalidConfig);
        }
        self.borrowing_fee_bps.set(fee_bps);
    }

    // ========== Borrower Functions ==========

    /// Lock `collateral` and borrow `debt` stablecoin.
    ///
    /// The borrowing fee is added to the trove's debt and minted to fee
    /// stakers. Note: Caller must have approved this contract to spend the
    /// collateral token
    pub fn open_trove(&mut self, asset: Address, collateral: U256, debt: U256) {
        if !self.is_asset_registered(asset) {
            self.env().revert(CdpError::PoolNotFound);
        }
        if collateral.is_zero() || debt.is_zero() {
            self.env().revert(CdpError::InvalidAmount);
        }
        let borrower = self.env().caller();
        let key = TroveKey { asset, owner: borrower };
        if self.get_trove(asset, borrower).status == TroveStatus::Active {
            self.env().revert(CdpError::TroveAlreadyActive);
        }

        let fee_staking = self.fee_staking.get().flatten();
        let fee = match fee_staking {
            Some(_) => self.checked(borrowing_fee(debt, self.get_borrowing_fee_bps())),
            None => U256::zero(),
        };
        let trove_debt = self.checked(fixed_point::add(debt, fee));

        let mut ledger = self.ledgers.get(&asset).unwrap_or_default();
        let stake = self.checked(compute_stake(collateral, &ledger));
        ledger.total_collateral = self.checked(fixed_point::add(ledger.total_collateral, collateral));
        ledger.total_debt = self.checked(fixed_point::add(ledger.total_debt, trove_debt));
        ledger.total_stakes = self.checked(fixed_point::add(ledger.total_stakes, stake));
        ledger.active_troves += 1;

        self.troves.set(
            &key,
            TroveData {
                collateral,
                debt: trove_debt,
                stake,
                status: TroveStatus::Active,
            },
        );
        self.snapshots.set(
            &key,
            RedistributionSnapshot {
                l_collateral: ledger.l_collateral,
                l_debt: ledger.l_debt,
            },
        );
        self.ledgers.set(&asset, ledger);

        let this = self.env().self_address();
        Cep18ContractRef::new(self.env(), asset).transfer_from(borrower, this, collateral);
        let mut stablecoin = self.stablecoin_ref();
        stablecoin.mint(borrower, debt);
        if let (Some(staking), false) = (fee_staking, fee.is_zero()) {
            stablecoin.mint(staking, fee);
            FeeSinkContractRef::new(self.env(), staking).increase_f_stable(fee);
        }

        self.env().emit_event(TroveOpened {
            asset,
            owner: borrower,
            collateral,
            debt: trove_debt,
            fee,
        });
    }

    /// Repay the whole debt and take back the collateral, including
    /// redistributed rewards.
    pub fn close_trove(&mut self, asset: Address) {
        let borrower = self.env().caller();
        let trove = self.take_active_trove(asset, borrower, TroveStatus::Closed);

        self.stablecoin_ref().burn_from(borrower, trove.debt);
        if !trove.collateral.is_zero() {
            Cep18ContractRef::new(self.env(), asset).transfer(borrower, trove.collateral);
        }

        self.env().emit_event(TroveClosed {
            asset,
            owner: borrower,
        });
    }

    // ========== Liquidation Hooks (Engine Only) ==========

    /// Trove with pending redistribution rewards applied.
    pub fn get_entire_debt_and_coll(&mut self, asset: Address, borrower: Address) -> TroveData {
        self.require_liquidation_engine();
        let trove = self.get_trove(asset, borrower);
        if trove.status != TroveStatus::Active {
            return trove;
        }
        let key = TroveKey { asset, owner: borrower };
        let trove = self.apply_pending_rewards(key, trove);
        let ledger = self.ledgers.get(&asset).unwrap_or_default();
        self.troves.set(&key, trove.clone());
        self.snapshots.set(
            &key,
            RedistributionSnapshot {
                l_collateral: ledger.l_collateral,
                l_debt: ledger.l_debt,
            },
        );
        trove
    }

    /// Close a liquidated trove and send the pool's share of its collateral.
    pub fn close_liquidated_trove(
        &mut self,
        asset: Address,
        borrower: Address,
        collateral_to_pool: U256,
        stability_pool: Address,
    ) {
        self.require_liquidation_engine();
        let trove = self.take_active_trove(asset, borrower, TroveStatus::Liquidated);
        if collateral_to_pool > trove.collateral {
            self.env().revert(CdpError::InvariantViolation);
        }
        let mut ledger = self.ledgers.get(&asset).unwrap_or_default();
        record_system_snapshot(&mut ledger);
        self.ledgers.set(&asset, ledger);

        if !collateral_to_pool.is_zero() {
            Cep18ContractRef::new(self.env(), asset).transfer(stability_pool, collateral_to_pool);
        }
    }

    /// Spread `debt` and `collateral` over the active troves of `asset`.
    pub fn redistribute(&mut self, asset: Address, debt: U256, collateral: U256) {
        self.require_liquidation_engine();
        if debt.is_zero() && collateral.is_zero() {
            return;
        }
        let mut ledger = self.ledgers.get(&asset).unwrap_or_default();
        let result = apply_redistribution(&mut ledger, debt, collateral);
        self.checked(result);
        record_system_snapshot(&mut ledger);
        self.ledgers.set(&asset, ledger);

        self.env().emit_event(Redistributed {
            asset,
            debt,
            collateral,
        });
    }

    // ========== Query Functions ==========

    /// Stored trove, without pending redistribution rewards
    pub fn get_trove(&self, asset: Address, owner: Address) -> TroveData {
        self.troves
            .get(&TroveKey { asset, owner })
            .unwrap_or_default()
    }

    /// Trove including pending redistribution rewards
    pub fn get_entire_trove(&self, asset: Address, owner: Address) -> TroveData {
        let trove = self.get_trove(asset, owner);
        if trove.status != TroveStatus::Active {
            return trove;
        }
        self.apply_pending_rewards(TroveKey { asset, owner }, trove)
    }

    pub fn get_ledger(&self, asset: Address) -> RedistributionState {
        self.ledgers.get(&asset).unwrap_or_default()
    }

    pub fn get_borrowing_fee_bps(&self) -> u32 {
        self.borrowing_fee_bps.get().unwrap_or(DEFAULT_BORROWING_FEE_BPS)
    }

    pub fn is_asset_registered(&self, asset: Address) -> bool {
        self.assets.get(&asset).unwrap_or(false)
    }

    // ========== Internal Functions ==========

    fn apply_pending_rewards(&self, key: TroveKey, mut trove: TroveData) -> TroveData {
        let ledger = self.ledgers.get(&key.asset).unwrap_or_default();
        let snapshot = self.snapshots.get(&key).unwrap_or_default();
        let pending_coll = self.checked(pending_reward(
            trove.stake,
            ledger.l_collateral,
            snapshot.l_collateral,
        ));
        let pending_debt = self.checked(pending_reward(trove.stake, ledger.l_debt, snapshot.l_debt));
        trove.collateral = self.checked(fixed_point::add(trove.collateral, pending_coll));
        trove.debt = self.checked(fixed_point::add(trove.debt, pending_debt));
        trove
    }

    /// Removes an active trove from the ledger and marks it with `final_status`.
    fn take_active_trove(
        &mut self,
        asset: Address,
        owner: Address,
        final_status: TroveStatus,
    ) -> TroveData {
        let key = TroveKey { asset, owner };
        let trove = self.get_trove(asset, owner);
        if trove.status != TroveStatus::Active {
            self.env().revert(CdpError::TroveNotActive);
        }
        let trove = self.apply_pending_rewards(key, trove);

        let mut ledger = self.ledgers.get(&asset).unwrap_or_default();
        ledger.total_collateral = self.checked(fixed_point::sub(ledger.total_collateral, trove.collateral));
        ledger.total_debt = self.checked(fixed_point::sub(ledger.total_debt, trove.debt));
        ledger.total_stakes = self.checked(fixed_point::sub(ledger.total_stakes, trove.stake));
        ledger.active_troves = ledger.active_troves.saturating_sub(1);
        self.ledgers.set(&asset, ledger);

        self.troves.set(
            &key,
            TroveData {
                status: final_status,
                ..Default::default()
            },
        );
        trove
    }

    fn stablecoin_ref(&self) -> Cep18ContractRef {
        match self.stablecoin.get() {
            Some(token) => Cep18ContractRef::new(self.env(), token),
            None => self.env().revert(CdpError::ContractNotWired),
        }
    }

    fn require_owner(&self) {
        if self.owner.get() != Some(self.env().caller()) {
            self.env().revert(CdpError::PermissionDenied);
        }
    }

    fn require_liquidation_engine(&self) {
        if self.liquidation_engine.get().flatten() != Some(self.env().caller()) {
            self.env().revert(CdpError::PermissionDenied);
        }
    }

    fn checked<T>(&self, result: Result<T, CdpError>) -> T {
        match result {
            Ok(value) => value,
            Err(error) => self.env().revert(error),
        }
    }
}

/// Fee charged on `debt` at `fee_bps`.
pub fn borrowing_fee(debt: U256, fee_bps: u32) -> Result<U256, CdpError> {
    fixed_point::mul_div(debt, U256::from(fee_bps), U256::from(BPS_SCALE))
}

/// Reward of `stake` since the accumulator stood at `snapshot`.
pub fn pending_reward(stake: U256, accumulator: U256, snapshot: U256) -> Result<U256, CdpError> {
    let growth = fixed_point::sub(accumulator, snapshot)?;
    fixed_point::mul_div(stake, growth, precision())
}

/// Stake of a trove holding `collateral`.
///
/// Before the first liquidation stake equals collateral.
pub fn compute_stake(collateral: U256, ledger: &RedistributionState) -> Result<U256, CdpError> {
    if ledger.total_collateral_snapshot.is_zero() {
        return Ok(collateral);
    }
    fixed_point::mul_div(
        collateral,
        ledger.total_stakes_snapshot,
        ledger.total_collateral_snapshot,
    )
}

/// Records the stake/collateral ratio after a liquidation.
pub fn record_system_snapshot(ledger: &mut RedistributionState) {
    ledger.total_stakes_snapshot = ledger.total_stakes;
    ledger.total_collateral_snapshot = ledger.total_collateral;
}

/// Books `debt` and `collateral` as pending rewards of the remaining stakes.
pub fn apply_redistribution(
    ledger: &mut RedistributionState,
    debt: U256,
    collateral: U256,
) -> Result<(), CdpError> {
    if ledger.total_stakes.is_zero() {
        return Err(CdpError::NoActiveTroves);
    }
    let coll_share = per_unit_with_carry(collateral, ledger.total_stakes, ledger.last_collateral_error)?;
    let debt_share = per_unit_with_carry(debt, ledger.total_stakes, ledger.last_debt_error)?;

    ledger.l_collateral = fixed_point::add(ledger.l_collateral, coll_share.per_unit)?;
    ledger.l_debt = fixed_point::add(ledger.l_debt, debt_share.per_unit)?;
    ledger.last_collateral_error = coll_share.remainder;
    ledger.last_debt_error = debt_share.remainder;
    ledger.total_collateral = fixed_point::add(ledger.total_collateral, collateral)?;
    ledger.total_debt = fixed_point::add(ledger.total_debt, debt)?;
    Ok(())
}

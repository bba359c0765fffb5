//! Stability Pool Contract
//!
//! Holds stablecoin deposits, one pool per collateral asset, that absorb the
//! debt of liquidated troves. In return depositors receive the liquidated
//! collateral and a share of the reward token emission.
//!
//! Key mechanics:
//! - Users deposit stablecoin into the pool of a collateral asset
//! - When a trove is liquidated, the pool burns deposits 1:1 against its debt
//! - Depositors receive collateral proportionally to their deposit
//! - Product-sum algorithm keeps every operation O(1) in the number of
//!   depositors (see `product_sum`)
//! - Gains are realized on every deposit, withdrawal and claim; they are
//!   never compounded into the deposit

use odra::prelude::*;
use odra::ContractRef;
use odra::casper_types::U256;
use crate::errors::CdpError;
use crate::events::{
    DebtOffset, DepositProvided, DepositWithdrawn, EpochChanged, GainsPaid, PoolRegistered,
    ScaleChanged,
};
use crate::fixed_point;
use crate::interfaces::{Cep18ContractRef, RewardSourceContractRef};
use crate::product_sum::{self, SumIncrement};
use crate::types::{DepositKey, DepositRecord, DepositSnapshot, EpochScaleKey, PoolState};

/// Depositor position resolved against the current pool state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settlement {
    /// Deposit left after every offset since the snapshot
    pub compounded: U256,
    /// Collateral gained since the snapshot
    pub collateral_gain: U256,
    /// Reward tokens gained since the snapshot
    pub reward_gain: U256,
}

/// Which per-(epoch, scale) sum an increment belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SumKind {
    Collateral,
    Reward,
}

/// Stability Pool Contract
#[odra::module(events = [
    PoolRegistered,
    DepositProvided,
    DepositWithdrawn,
    GainsPaid,
    DebtOffset,
    ScaleChanged,
    EpochChanged
])]
pub struct StabilityPool {
    /// Deployer, registers pools and wires collaborators
    owner: Var<Address>,
    /// Stablecoin contract address
    stablecoin: Var<Address>,
    /// Liquidation engine contract address (sole caller of `offset`)
    liquidation_engine: Var<Option<Address>>,
    /// Reward issuer contract address
    reward_issuer: Var<Option<Address>>,

    // === Pool State ===
    /// Ledger state per collateral asset
    pools: Mapping<Address, PoolState>,
    /// Registered collateral assets, in registration order
    pool_assets: Var<Vec<Address>>,
    /// Cumulative debt absorbed per collateral asset
    total_debt_absorbed: Mapping<Address, U256>,

    // === Product-Sum Algorithm State ===
    /// Collateral sums S per (asset, epoch, scale)
    collateral_sums: Mapping<EpochScaleKey, U256>,
    /// Reward sums G per (asset, epoch, scale)
    reward_sums: Mapping<EpochScaleKey, U256>,

    // === Depositor State ===
    /// Depositor records per (asset, depositor)
    deposits: Mapping<DepositKey, DepositRecord>,
}

#[odra::module]
impl StabilityPool {
    /// Initialize the stability pool
    pub fn init(&mut self, stablecoin: Address) {
        self.owner.set(self.env().caller());
        self.stablecoin.set(stablecoin);
        self.liquidation_engine.set(None);
        self.reward_issuer.set(None);
        self.pool_assets.set(Vec::new());
    }

    /// Set liquidation engine address (owner only)
    pub fn set_liquidation_engine(&mut self, liquidation_engine: Address) {
        self.require_owner();
        self.liquidation_engine.set(Some(liquidation_engine));
    }

    /// Set reward issuer address (owner only)
    pub fn set_reward_issuer(&mut self, reward_issuer: Address) {
        self.require_owner();
        self.reward_issuer.set(Some(reward_issuer));
    }

    /// Open a pool for a collateral asset (owner only)
    pub fn register_pool(&mut self, asset: Address) {
        self.require_owner();
        if self.is_pool_registered(asset) {
            self.env().revert(CdpError::PoolAlreadyRegistered);
        }

        self.pools.set(&asset, PoolState::new());
        let mut assets = self.pool_assets.get().unwrap_or_default();
        assets.push(asset);
        self.pool_assets.set(assets);

        self.env().emit_event(PoolRegistered { asset });
    }

    // ========== Deposit Functions ==========

    /// Deposit stablecoin into the pool of `asset`.
    /// Note: Caller must have approved the pool to spend the stablecoin
    pub fn provide_to_sp(&mut self, asset: Address, amount: U256) {
        if amount.is_zero() {
            self.env().revert(CdpError::InvalidAmount);
        }
        let depositor = self.env().caller();
        let mut pool = self.load_pool(asset);
        self.trigger_issuance(asset, &mut pool);

        let key = DepositKey { asset, depositor };
        let record = self.deposits.get(&key).unwrap_or_default();
        let settlement = self.settle(asset, &pool, &record);

        let new_deposit = self.checked(fixed_point::add(settlement.compounded, amount));
        if record.initial_deposit.is_zero() {
            pool.depositor_count += 1;
        }
        pool.total_deposits = self.checked(fixed_point::add(pool.total_deposits, amount));
        pool.total_collateral =
            self.checked(fixed_point::sub(pool.total_collateral, settlement.collateral_gain));
        self.store_deposit(asset, depositor, &pool, new_deposit);
        self.pools.set(&asset, pool);

        let this = self.env().self_address();
        self.stablecoin_ref().transfer_from(depositor, this, amount);
        self.pay_gains(asset, depositor, &settlement);

        self.env().emit_event(DepositProvided {
            asset,
            depositor,
            amount,
            new_deposit,
        });
    }

    /// Withdraw stablecoin from the pool of `asset`; `U256::MAX` withdraws everything.
    pub fn withdraw_from_sp(&mut self, asset: Address, amount: U256) {
        if amount.is_zero() {
            self.env().revert(CdpError::InvalidAmount);
        }
        let depositor = self.env().caller();
        let mut pool = self.load_pool(asset);

        let key = DepositKey { asset, depositor };
        let record = self.deposits.get(&key).unwrap_or_default();
        if record.initial_deposit.is_zero() {
            self.env().revert(CdpError::InvalidAmount);
        }

        self.trigger_issuance(asset, &mut pool);
        let settlement = self.settle(asset, &pool, &record);
        let withdrawn = self.checked(resolve_withdrawal(
            amount,
            settlement.compounded,
            pool.total_deposits,
        ));

        pool.total_deposits = self.checked(fixed_point::sub(pool.total_deposits, withdrawn));
        // Rounding dust cannot outlive an empty pool
        let new_deposit = if pool.total_deposits.is_zero() {
            U256::zero()
        } else {
            settlement.compounded - withdrawn
        };
        pool.total_collateral =
            self.checked(fixed_point::sub(pool.total_collateral, settlement.collateral_gain));
        self.store_or_clear(asset, depositor, &mut pool, new_deposit);
        self.pools.set(&asset, pool);

        if !withdrawn.is_zero() {
            self.stablecoin_ref().transfer(depositor, withdrawn);
        }
        self.pay_gains(asset, depositor, &settlement);

        self.env().emit_event(DepositWithdrawn {
            asset,
            depositor,
            amount: withdrawn,
            new_deposit,
        });
    }

    /// Claim collateral and reward gains without changing the deposit
    pub fn claim_gains(&mut self, asset: Address) {
        let depositor = self.env().caller();
        let mut pool = self.load_pool(asset);

        let key = DepositKey { asset, depositor };
        let record = self.deposits.get(&key).unwrap_or_default();
        if record.initial_deposit.is_zero() {
            self.env().revert(CdpError::InvalidAmount);
        }

        self.trigger_issuance(asset, &mut pool);
        let settlement = self.settle(asset, &pool, &record);

        pool.total_collateral =
            self.checked(fixed_point::sub(pool.total_collateral, settlement.collateral_gain));
        self.store_or_clear(asset, depositor, &mut pool, settlement.compounded);
        self.pools.set(&asset, pool);

        self.pay_gains(asset, depositor, &settlement);
    }

    // ========== Liquidation Offset Functions ==========

    /// Absorb liquidated debt with pool deposits (called by the liquidation engine).
    ///
    /// The collateral must already have been transferred to this contract.
    pub fn offset(&mut self, asset: Address, debt_to_offset: U256, collateral_to_add: U256) {
        self.require_liquidation_engine();
        let mut pool = self.load_pool(asset);
        if debt_to_offset.is_zero() {
            return;
        }

        // Credit rewards earned by the deposits before they shrink
        self.trigger_issuance(asset, &mut pool);

        let outcome = product_sum::apply_offset(&mut pool, debt_to_offset, collateral_to_add);
        let Some(outcome) = self.checked(outcome) else {
            return;
        };
        self.add_to_sum(asset, outcome.collateral_increment, SumKind::Collateral);

        let absorbed = self.total_debt_absorbed.get(&asset).unwrap_or_default();
        let absorbed = self.checked(fixed_point::add(absorbed, debt_to_offset));
        self.total_debt_absorbed.set(&asset, absorbed);

        let (epoch, scale, p, total_deposits) =
            (pool.current_epoch, pool.current_scale, pool.p, pool.total_deposits);
        self.pools.set(&asset, pool);

        self.stablecoin_ref().burn(debt_to_offset);

        self.env().emit_event(DebtOffset {
            asset,
            debt: debt_to_offset,
            collateral: collateral_to_add,
            total_deposits,
            p,
        });
        if outcome.scale_changed {
            self.env().emit_event(ScaleChanged { asset, epoch, scale });
        }
        if outcome.epoch_changed {
            self.env().emit_event(EpochChanged { asset, epoch });
        }
    }

    // ========== Query Functions ==========

    /// Depositor's deposit after every offset since their last settlement
    pub fn get_compounded_deposit(&self, asset: Address, depositor: Address) -> U256 {
        self.pending_settlement(asset, depositor).compounded
    }

    /// Collateral the depositor would receive on their next settlement
    pub fn get_depositor_collateral_gain(&self, asset: Address, depositor: Address) -> U256 {
        self.pending_settlement(asset, depositor).collateral_gain
    }

    /// Reward tokens the depositor would receive on their next settlement,
    /// excluding emission not yet issued to the pool
    pub fn get_depositor_reward_gain(&self, asset: Address, depositor: Address) -> U256 {
        self.pending_settlement(asset, depositor).reward_gain
    }

    /// Get the accounting state of a pool
    pub fn get_pool(&self, asset: Address) -> PoolState {
        self.load_pool(asset)
    }

    /// Get total stablecoin deposited in a pool
    pub fn get_total_deposits(&self, asset: Address) -> U256 {
        self.load_pool(asset).total_deposits
    }

    /// Get cumulative debt the pool has absorbed
    pub fn get_total_debt_absorbed(&self, asset: Address) -> U256 {
        self.total_debt_absorbed.get(&asset).unwrap_or_default()
    }

    /// Get a depositor's stored deposit and snapshot
    pub fn get_deposit(&self, asset: Address, depositor: Address) -> DepositRecord {
        self.deposits
            .get(&DepositKey { asset, depositor })
            .unwrap_or_default()
    }

    /// Get the collateral sum `S` at `(epoch, scale)`
    pub fn get_collateral_sum(&self, asset: Address, epoch: u64, scale: u64) -> U256 {
        self.collateral_sums
            .get(&EpochScaleKey { asset, epoch, scale })
            .unwrap_or_default()
    }

    /// Get the reward sum `G` at `(epoch, scale)`
    pub fn get_reward_sum(&self, asset: Address, epoch: u64, scale: u64) -> U256 {
        self.reward_sums
            .get(&EpochScaleKey { asset, epoch, scale })
            .unwrap_or_default()
    }

    /// Check if a pool exists for `asset`
    pub fn is_pool_registered(&self, asset: Address) -> bool {
        self.pools.get(&asset).is_some()
    }

    /// Get all registered collateral assets
    pub fn get_pool_assets(&self) -> Vec<Address> {
        self.pool_assets.get().unwrap_or_default()
    }

    /// Get liquidation engine address
    pub fn get_liquidation_engine(&self) -> Option<Address> {
        self.liquidation_engine.get().flatten()
    }

    /// Get reward issuer address
    pub fn get_reward_issuer(&self) -> Option<Address> {
        self.reward_issuer.get().flatten()
    }

    // ========== Internal Functions ==========

    fn load_pool(&self, asset: Address) -> PoolState {
        match self.pools.get(&asset) {
            Some(pool) => pool,
            None => self.env().revert(CdpError::PoolNotFound),
        }
    }

    fn pending_settlement(&self, asset: Address, depositor: Address) -> Settlement {
        let pool = self.load_pool(asset);
        let record = self.get_deposit(asset, depositor);
        self.settle(asset, &pool, &record)
    }

    /// Resolves a deposit against the pool without mutating anything.
    fn settle(&self, asset: Address, pool: &PoolState, record: &DepositRecord) -> Settlement {
        let initial = record.initial_deposit;
        if initial.is_zero() {
            return Settlement::default();
        }
        let snapshot = &record.snapshot;
        let compounded = self.checked(product_sum::compounded_deposit(initial, snapshot, pool));

        let at_scale = EpochScaleKey {
            asset,
            epoch: snapshot.epoch,
            scale: snapshot.scale,
        };
        let next_scale = EpochScaleKey {
            scale: snapshot.scale + 1,
            ..at_scale
        };

        let collateral_gain = self.checked(product_sum::depositor_gain(
            initial,
            snapshot.p,
            snapshot.s,
            self.collateral_sums.get(&at_scale).unwrap_or_default(),
            self.collateral_sums.get(&next_scale).unwrap_or_default(),
        ));
        let reward_gain = self.checked(product_sum::depositor_gain(
            initial,
            snapshot.p,
            snapshot.g,
            self.reward_sums.get(&at_scale).unwrap_or_default(),
            self.reward_sums.get(&next_scale).unwrap_or_default(),
        ));

        Settlement {
            compounded,
            collateral_gain: collateral_gain.min(pool.total_collateral),
            reward_gain,
        }
    }

    /// Rolls reward issuance forward and credits it to the pool's G sum.
    fn trigger_issuance(&mut self, asset: Address, pool: &mut PoolState) {
        let Some(issuer) = self.reward_issuer.get().flatten() else {
            return;
        };
        let issuance = RewardSourceContractRef::new(self.env(), issuer).issue(asset);
        if let Some(increment) = self.checked(product_sum::apply_reward_issuance(pool, issuance)) {
            self.add_to_sum(asset, increment, SumKind::Reward);
        }
    }

    fn add_to_sum(&mut self, asset: Address, increment: SumIncrement, kind: SumKind) {
        let key = EpochScaleKey {
            asset,
            epoch: increment.epoch,
            scale: increment.scale,
        };
        let current = match kind {
            SumKind::Collateral => self.collateral_sums.get(&key),
            SumKind::Reward => self.reward_sums.get(&key),
        };
        let updated = self.checked(fixed_point::add(current.unwrap_or_default(), increment.amount));
        match kind {
            SumKind::Collateral => self.collateral_sums.set(&key, updated),
            SumKind::Reward => self.reward_sums.set(&key, updated),
        }
    }

    fn store_deposit(&mut self, asset: Address, depositor: Address, pool: &PoolState, amount: U256) {
        let slot = EpochScaleKey {
            asset,
            epoch: pool.current_epoch,
            scale: pool.current_scale,
        };
        let record = DepositRecord {
            initial_deposit: amount,
            snapshot: DepositSnapshot {
                p: pool.p,
                s: self.collateral_sums.get(&slot).unwrap_or_default(),
                g: self.reward_sums.get(&slot).unwrap_or_default(),
                scale: pool.current_scale,
                epoch: pool.current_epoch,
            },
        };
        self.deposits.set(&DepositKey { asset, depositor }, record);
    }

    /// Re-snapshots a live deposit, or drops a deposit that compounded to zero.
    fn store_or_clear(
        &mut self,
        asset: Address,
        depositor: Address,
        pool: &mut PoolState,
        amount: U256,
    ) {
        if amount.is_zero() {
            self.deposits
                .set(&DepositKey { asset, depositor }, DepositRecord::default());
            pool.depositor_count = pool.depositor_count.saturating_sub(1);
        } else {
            self.store_deposit(asset, depositor, pool, amount);
        }
    }

    fn pay_gains(&mut self, asset: Address, depositor: Address, settlement: &Settlement) {
        if settlement.collateral_gain.is_zero() && settlement.reward_gain.is_zero() {
            return;
        }
        if !settlement.collateral_gain.is_zero() {
            Cep18ContractRef::new(self.env(), asset).transfer(depositor, settlement.collateral_gain);
        }
        if !settlement.reward_gain.is_zero() {
            match self.reward_issuer.get().flatten() {
                Some(issuer) => RewardSourceContractRef::new(self.env(), issuer)
                    .send_reward(depositor, settlement.reward_gain),
                None => self.env().revert(CdpError::ContractNotWired),
            }
        }
        self.env().emit_event(GainsPaid {
            asset,
            depositor,
            collateral_gain: settlement.collateral_gain,
            reward_gain: settlement.reward_gain,
        });
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
        let engine = self.liquidation_engine.get().flatten();
        if engine != Some(self.env().caller()) {
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

/// Amount actually paid out for a withdrawal request.
///
/// `U256::MAX` requests the whole compounded deposit. The payout never
/// exceeds the pool's total deposits.
pub fn resolve_withdrawal(
    requested: U256,
    compounded: U256,
    total_deposits: U256,
) -> Result<U256, CdpError> {
    let amount = if requested == U256::MAX {
        compounded
    } else if requested > compounded {
        return Err(CdpError::InvalidAmount);
    } else {
        requested
    };
    Ok(amount.min(total_deposits))
}

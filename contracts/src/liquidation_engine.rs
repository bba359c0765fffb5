//! Liquidation Engine Contract
//!
//! Splits a liquidated trove between the stability pool and redistribution
//! to the other troves of the same asset.
//!
//! Liquidation flow:
//! 1. Read the trove's debt and collateral, pending rewards included
//! 2. Decide how much the pool absorbs (`split_liquidation`)
//! 3. Close the trove, moving the pool's collateral share to the pool
//! 4. Offset the absorbed debt against pool deposits
//! 5. Redistribute whatever the pool could not cover
//!
//! Whether a trove is under-collateralized is decided by the liquidator.

use odra::prelude::*;
use odra::ContractRef;
use odra::casper_types::U256;
use crate::errors::CdpError;
use crate::events::TroveLiquidated;
use crate::fixed_point;
use crate::interfaces::{OffsetPoolContractRef, TroveRegistryContractRef};
use crate::types::TroveStatus;

/// How one liquidation is divided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiquidationSplit {
    /// Debt burned against pool deposits
    pub debt_to_offset: U256,
    /// Collateral sent to the pool
    pub collateral_to_offset: U256,
    /// Debt spread over the remaining troves
    pub debt_to_redistribute: U256,
    /// Collateral spread over the remaining troves
    pub collateral_to_redistribute: U256,
}

/// Liquidation result for a single trove
#[odra::odra_type]
pub struct LiquidationResult {
    /// Owner of the liquidated trove
    pub borrower: Address,
    /// Debt absorbed by the stability pool
    pub debt_offset: U256,
    /// Collateral sent to the stability pool
    pub collateral_to_pool: U256,
    /// Debt redistributed to other troves
    pub debt_redistributed: U256,
    /// Collateral redistributed to other troves
    pub collateral_redistributed: U256,
}

/// Batch liquidation summary
#[odra::odra_type]
#[derive(Default)]
pub struct BatchLiquidationResult {
    /// Number of troves liquidated
    pub troves_liquidated: u32,
    /// Total debt absorbed by the pool
    pub total_debt_offset: U256,
    /// Total debt redistributed
    pub total_debt_redistributed: U256,
}

/// Liquidation statistics
#[odra::odra_type]
#[derive(Default)]
pub struct LiquidationStats {
    /// Total number of liquidations
    pub total_liquidations: u64,
    /// Debt absorbed by the stability pool (cumulative)
    pub total_debt_offset: U256,
    /// Debt redistributed to troves (cumulative)
    pub total_debt_redistributed: U256,
    /// Collateral sent to the stability pool (cumulative)
    pub total_collateral_to_pool: U256,
    /// Collateral redistributed to troves (cumulative)
    pub total_collateral_redistributed: U256,
}

/// Liquidation Engine Contract
#[odra::module(events = [TroveLiquidated])]
pub struct LiquidationEngine {
    /// Deployer, manages liquidators
    owner: Var<Address>,
    /// Stability Pool contract address
    stability_pool: Var<Address>,
    /// Trove registry contract address
    trove_registry: Var<Address>,
    /// Accounts allowed to liquidate
    liquidators: Mapping<Address, bool>,
    /// Cumulative statistics
    stats: Var<LiquidationStats>,
}

#[odra::module]
impl LiquidationEngine {
    /// Initialize the liquidation engine
    pub fn init(&mut self, stability_pool: Address, trove_registry: Address) {
        self.owner.set(self.env().caller());
        self.stability_pool.set(stability_pool);
        self.trove_registry.set(trove_registry);
        self.stats.set(LiquidationStats::default());
    }

    /// Allow or disallow an account to liquidate (owner only)
    pub fn set_liquidator(&mut self, account: Address, allowed: bool) {
        if self.owner.get() != Some(self.env().caller()) {
            self.env().revert(CdpError::PermissionDenied);
        }
        self.liquidators.set(&account, allowed);
    }

    // ========== Liquidation Functions ==========

    /// Liquidate a single trove
    pub fn liquidate(&mut self, asset: Address, borrower: Address) -> LiquidationResult {
        self.require_liquidator();
        match self.liquidate_trove(asset, borrower) {
            Some(result) => result,
            None => self.env().revert(CdpError::TroveNotActive),
        }
    }

    /// Liquidate several troves of one asset, skipping inactive ones
    pub fn batch_liquidate(
        &mut self,
        asset: Address,
        borrowers: Vec<Address>,
    ) -> BatchLiquidationResult {
        self.require_liquidator();

        let mut batch = BatchLiquidationResult::default();
        for borrower in borrowers {
            // Each trove sees the pool as left by the previous one
            let Some(result) = self.liquidate_trove(asset, borrower) else {
                continue;
            };
            batch.troves_liquidated += 1;
            batch.total_debt_offset =
                self.checked(fixed_point::add(batch.total_debt_offset, result.debt_offset));
            batch.total_debt_redistributed = self.checked(fixed_point::add(
                batch.total_debt_redistributed,
                result.debt_redistributed,
            ));
        }
        batch
    }

    // ========== Query Functions ==========

    pub fn get_stats(&self) -> LiquidationStats {
        self.stats.get().unwrap_or_default()
    }

    pub fn is_liquidator(&self, account: Address) -> bool {
        self.liquidators.get(&account).unwrap_or(false)
    }

    // ========== Internal Functions ==========

    fn liquidate_trove(&mut self, asset: Address, borrower: Address) -> Option<LiquidationResult> {
        let pool_addr = self.address_of(self.stability_pool.get());
        let registry_addr = self.address_of(self.trove_registry.get());
        let mut registry = TroveRegistryContractRef::new(self.env(), registry_addr);
        let mut pool = OffsetPoolContractRef::new(self.env(), pool_addr);

        let trove = registry.get_entire_debt_and_coll(asset, borrower);
        if trove.status != TroveStatus::Active {
            return None;
        }

        let total_deposits = pool.get_total_deposits(asset);
        let split = self.checked(split_liquidation(total_deposits, trove.debt, trove.collateral));

        registry.close_liquidated_trove(asset, borrower, split.collateral_to_offset, pool_addr);
        if !split.debt_to_offset.is_zero() {
            pool.offset(asset, split.debt_to_offset, split.collateral_to_offset);
        }
        if !split.debt_to_redistribute.is_zero() || !split.collateral_to_redistribute.is_zero() {
            registry.redistribute(
                asset,
                split.debt_to_redistribute,
                split.collateral_to_redistribute,
            );
        }

        self.record(&split);
        self.env().emit_event(TroveLiquidated {
            asset,
            borrower,
            debt_offset: split.debt_to_offset,
            collateral_to_pool: split.collateral_to_offset,
            debt_redistributed: split.debt_to_redistribute,
            collateral_redistributed: split.collateral_to_redistribute,
        });

        Some(LiquidationResult {
            borrower,
            debt_offset: split.debt_to_offset,
            collateral_to_pool: split.collateral_to_offset,
            debt_redistributed: split.debt_to_redistribute,
            collateral_redistributed: split.collateral_to_redistribute,
        })
    }

    fn record(&mut self, split: &LiquidationSplit) {
        let mut stats = self.get_stats();
        stats.total_liquidations += 1;
        stats.total_debt_offset =
            self.checked(fixed_point::add(stats.total_debt_offset, split.debt_to_offset));
        stats.total_debt_redistributed = self.checked(fixed_point::add(
            stats.total_debt_redistributed,
            split.debt_to_redistribute,
        ));
        stats.total_collateral_to_pool = self.checked(fixed_point::add(
            stats.total_collateral_to_pool,
            split.collateral_to_offset,
        ));
        stats.total_collateral_redistributed = self.checked(fixed_point::add(
            stats.total_collateral_redistributed,
            split.collateral_to_redistribute,
        ));
        self.stats.set(stats);
    }

    fn address_of(&self, address: Option<Address>) -> Address {
        match address {
            Some(address) => address,
            None => self.env().revert(CdpError::ContractNotWired),
        }
    }

    fn require_liquidator(&self) {
        if !self.is_liquidator(self.env().caller()) {
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

/// Decides how much of a liquidated trove the pool absorbs.
///
/// - Empty pool, or a trove without debt: everything is redistributed
/// - Pool covers the debt: everything is offset
/// - Otherwise the pool absorbs all its deposits with the matching
///   fraction of the collateral and the rest is redistributed
pub fn split_liquidation(
    total_deposits: U256,
    debt: U256,
    collateral: U256,
) -> Result<LiquidationSplit, CdpError> {
    if total_deposits.is_zero() || debt.is_zero() {
        return Ok(LiquidationSplit {
            debt_to_redistribute: debt,
            collateral_to_redistribute: collateral,
            ..Default::default()
        });
    }
    if total_deposits >= debt {
        return Ok(LiquidationSplit {
            debt_to_offset: debt,
            collateral_to_offset: collateral,
            ..Default::default()
        });
    }

    let collateral_to_offset = fixed_point::mul_div(collateral, total_deposits, debt)?;
    Ok(LiquidationSplit {
        debt_to_offset: total_deposits,
        collateral_to_offset,
        debt_to_redistribute: debt - total_deposits,
        collateral_to_redistribute: collateral - collateral_to_offset,
    })
}

//! CDP Ledger Integration Tests
//!
//! Deploys the full contract set on the Odra test VM and drives it the way
//! borrowers, depositors, liquidators and the treasury would.

#[cfg(test)]
mod tests {
    use cdp_ledger_contracts::errors::CdpError;
    use cdp_ledger_contracts::fee_staking::{FeeStaking, FeeStakingHostRef, FeeStakingInitArgs};
    use cdp_ledger_contracts::liquidation_engine::{
        LiquidationEngine, LiquidationEngineHostRef, LiquidationEngineInitArgs,
    };
    use cdp_ledger_contracts::reward_issuer::{
        RewardIssuer, RewardIssuerHostRef, RewardIssuerInitArgs,
    };
    use cdp_ledger_contracts::stability_pool::{
        StabilityPool, StabilityPoolHostRef, StabilityPoolInitArgs,
    };
    use cdp_ledger_contracts::token::{ProtocolToken, ProtocolTokenHostRef, ProtocolTokenInitArgs};
    use cdp_ledger_contracts::trove_manager::{
        TroveManager, TroveManagerHostRef, TroveManagerInitArgs,
    };
    use cdp_ledger_contracts::types::TroveStatus;
    use odra::casper_types::U256;
    use odra::host::{Deployer, HostEnv};
    use odra::prelude::*;
    use pretty_assertions::assert_eq;

    const ONE: u64 = 1_000_000_000_000_000_000;

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::from(ONE)
    }

    fn deploy_token(env: &HostEnv, symbol: &str) -> ProtocolTokenHostRef {
        ProtocolToken::deploy(
            env,
            ProtocolTokenInitArgs {
                name: String::from(symbol),
                symbol: String::from(symbol),
                decimals: 18,
            },
        )
    }

    /// Fully wired protocol with one collateral asset
    struct Protocol {
        env: HostEnv,
        owner: Address,
        treasury: Address,
        stablecoin: ProtocolTokenHostRef,
        reward_token: ProtocolTokenHostRef,
        collateral: ProtocolTokenHostRef,
        pool: StabilityPoolHostRef,
        issuer: RewardIssuerHostRef,
        staking: FeeStakingHostRef,
        troves: TroveManagerHostRef,
        engine: LiquidationEngineHostRef,
    }

    impl Protocol {
        fn deploy() -> Self {
            let env = odra_test::env();
            let owner = env.get_account(0);
            let treasury = env.get_account(9);
            env.set_caller(owner);

            let mut stablecoin = deploy_token(&env, "STB");
            let mut reward_token = deploy_token(&env, "RWD");
            let mut collateral = deploy_token(&env, "WCSPR");
            let stablecoin_addr = stablecoin.address().clone();
            let reward_token_addr = reward_token.address().clone();
            let asset = collateral.address().clone();

            let mut pool = StabilityPool::deploy(
                &env,
                StabilityPoolInitArgs {
                    stablecoin: stablecoin_addr,
                },
            );
            let pool_addr = pool.address().clone();

            let issuer = RewardIssuer::deploy(
                &env,
                RewardIssuerInitArgs {
                    reward_token: reward_token_addr,
                    stability_pool: pool_addr,
                    treasury,
                },
            );
            pool.set_reward_issuer(issuer.address().clone());

            let mut troves = TroveManager::deploy(
                &env,
                TroveManagerInitArgs {
                    stablecoin: stablecoin_addr,
                },
            );
            let troves_addr = troves.address().clone();

            let mut staking = FeeStaking::deploy(
                &env,
                FeeStakingInitArgs {
                    stake_token: reward_token_addr,
                    stablecoin: stablecoin_addr,
                },
            );
            let staking_addr = staking.address().clone();

            let mut engine = LiquidationEngine::deploy(
                &env,
                LiquidationEngineInitArgs {
                    stability_pool: pool_addr,
                    trove_registry: troves_addr,
                },
            );
            let engine_addr = engine.address().clone();

            pool.set_liquidation_engine(engine_addr);
            troves.set_liquidation_engine(engine_addr);
            troves.set_fee_staking(staking_addr);
            staking.set_fee_source(troves_addr, true);
            engine.set_liquidator(owner, true);

            stablecoin.add_minter(troves_addr);
            stablecoin.add_minter(owner);
            reward_token.add_minter(owner);
            collateral.add_minter(owner);

            pool.register_pool(asset);
            troves.add_asset(asset);
            staking.add_asset(asset);

            Self {
                env,
                owner,
                treasury,
                stablecoin,
                reward_token,
                collateral,
                pool,
                issuer,
                staking,
                troves,
                engine,
            }
        }

        fn asset(&self) -> Address {
            self.collateral.address().clone()
        }

        fn account(&self, index: usize) -> Address {
            self.env.get_account(index)
        }

        /// Mint stablecoin to `depositor` and deposit it into the pool.
        fn deposit(&mut self, depositor: Address, amount: U256) {
            let asset = self.asset();
            let pool_addr = self.pool.address().clone();
            self.stablecoin.mint(depositor, amount);

            self.env.set_caller(depositor);
            self.stablecoin.approve(pool_addr, amount);
            self.pool.provide_to_sp(asset, amount);
            self.env.set_caller(self.owner);
        }

        /// Mint collateral to `borrower` and open a trove with it.
        fn open_trove(&mut self, borrower: Address, collateral: U256, debt: U256) {
            let asset = self.asset();
            let troves_addr = self.troves.address().clone();
            self.collateral.mint(borrower, collateral);

            self.env.set_caller(borrower);
            self.collateral.approve(troves_addr, collateral);
            self.troves.open_trove(asset, collateral, debt);
            self.env.set_caller(self.owner);
        }

        /// Fund the pool's reward cap from the treasury.
        fn fund_rewards(&mut self, amount: U256, weekly: U256) {
            let asset = self.asset();
            let issuer_addr = self.issuer.address().clone();
            self.reward_token.mint(self.treasury, amount);

            self.env.set_caller(self.treasury);
            self.reward_token.approve(issuer_addr, amount);
            self.issuer.add_fund_to_pool(asset, amount);
            self.issuer.set_weekly_distribution(asset, weekly);
            self.env.set_caller(self.owner);
        }

        fn advance_seconds(&self, seconds: u64) {
            self.env.advance_block_time(seconds * 1000);
        }
    }

    // ===== Stability Pool =====

    #[test]
    fn test_deposit_and_withdraw_round_trip() {
        let mut protocol = Protocol::deploy();
        let asset = protocol.asset();
        let alice = protocol.account(1);

        protocol.deposit(alice, e18(1_000));
        assert_eq!(protocol.pool.get_total_deposits(asset), e18(1_000));
        assert_eq!(protocol.pool.get_compounded_deposit(asset, alice), e18(1_000));
        assert_eq!(protocol.pool.get_pool(asset).depositor_count, 1);

        protocol.env.set_caller(alice);
        protocol.pool.withdraw_from_sp(asset, e18(400));
        assert_eq!(protocol.pool.get_compounded_deposit(asset, alice), e18(600));
        protocol.pool.withdraw_from_sp(asset, U256::MAX);

        assert_eq!(protocol.stablecoin.balance_of(alice), e18(1_000));
        assert!(protocol.pool.get_total_deposits(asset).is_zero());
        assert!(protocol.pool.get_deposit(asset, alice).initial_deposit.is_zero());
        assert_eq!(protocol.pool.get_pool(asset).depositor_count, 0);
    }

    #[test]
    fn test_invalid_deposit_amounts() {
        let mut protocol = Protocol::deploy();
        let asset = protocol.asset();
        let alice = protocol.account(1);

        protocol.env.set_caller(alice);
        assert_eq!(
            protocol.pool.try_provide_to_sp(asset, U256::zero()),
            Err(CdpError::InvalidAmount.into())
        );
        assert_eq!(
            protocol.pool.try_withdraw_from_sp(asset, e18(1)),
            Err(CdpError::InvalidAmount.into())
        );
        protocol.env.set_caller(protocol.owner);

        protocol.deposit(alice, e18(10));
        protocol.env.set_caller(alice);
        assert_eq!(
            protocol.pool.try_withdraw_from_sp(asset, e18(11)),
            Err(CdpError::InvalidAmount.into())
        );
    }

    #[test]
    fn test_unknown_pool_and_duplicate_registration() {
        let mut protocol = Protocol::deploy();
        let asset = protocol.asset();
        let unknown = protocol.stablecoin.address().clone();

        assert_eq!(
            protocol.pool.try_get_total_deposits(unknown),
            Err(CdpError::PoolNotFound.into())
        );
        assert_eq!(
            protocol.pool.try_register_pool(asset),
            Err(CdpError::PoolAlreadyRegistered.into())
        );
        assert_eq!(protocol.pool.get_pool_assets(), vec![asset]);
    }

    #[test]
    fn test_offset_requires_liquidation_engine() {
        let mut protocol = Protocol::deploy();
        let asset = protocol.asset();
        let alice = protocol.account(1);
        protocol.deposit(alice, e18(100));

        assert_eq!(
            protocol.pool.try_offset(asset, e18(10), e18(1)),
            Err(CdpError::PermissionDenied.into())
        );
        assert_eq!(protocol.pool.get_total_deposits(asset), e18(100));
    }

    // ===== Liquidation =====

    #[test]
    fn test_liquidation_shares_collateral_pro_rata() {
        let mut protocol = Protocol::deploy();
        protocol.troves.set_borrowing_fee_bps(0);
        let asset = protocol.asset();
        let (alice, bob, carol) = (protocol.account(1), protocol.account(2), protocol.account(3));

        protocol.deposit(alice, e18(300));
        protocol.deposit(bob, e18(100));
        protocol.open_trove(carol, e18(4), e18(200));

        let result = protocol.engine.liquidate(asset, carol);
        assert_eq!(result.debt_offset, e18(200));
        assert_eq!(result.collateral_to_pool, e18(4));
        assert!(result.debt_redistributed.is_zero());

        assert_eq!(protocol.pool.get_total_deposits(asset), e18(200));
        assert_eq!(protocol.pool.get_compounded_deposit(asset, alice), e18(150));
        assert_eq!(protocol.pool.get_compounded_deposit(asset, bob), e18(50));
        assert_eq!(protocol.pool.get_depositor_collateral_gain(asset, alice), e18(3));
        assert_eq!(protocol.pool.get_depositor_collateral_gain(asset, bob), e18(1));
        assert_eq!(protocol.pool.get_total_debt_absorbed(asset), e18(200));
        assert_eq!(protocol.troves.get_trove(asset, carol).status, TroveStatus::Liquidated);

        // Carol still holds the borrowed stablecoin; the pool burned its share
        assert_eq!(protocol.stablecoin.total_supply(), e18(400));

        protocol.env.set_caller(alice);
        protocol.pool.withdraw_from_sp(asset, U256::MAX);
        assert_eq!(protocol.stablecoin.balance_of(alice), e18(150));
        assert_eq!(protocol.collateral.balance_of(alice), e18(3));

        protocol.env.set_caller(bob);
        protocol.pool.claim_gains(asset);
        assert_eq!(protocol.collateral.balance_of(bob), e18(1));
        assert_eq!(protocol.pool.get_compounded_deposit(asset, bob), e18(50));
        assert!(protocol.pool.get_depositor_collateral_gain(asset, bob).is_zero());
    }

    #[test]
    fn test_partial_offset_redistributes_remainder() {
        let mut protocol = Protocol::deploy();
        protocol.troves.set_borrowing_fee_bps(0);
        let asset = protocol.asset();
        let (alice, bob, carol) = (protocol.account(1), protocol.account(2), protocol.account(3));

        protocol.deposit(alice, e18(100));
        protocol.open_trove(bob, e18(10), e18(500));
        protocol.open_trove(carol, e18(20), e18(200));

        let result = protocol.engine.liquidate(asset, bob);
        assert_eq!(result.debt_offset, e18(100));
        assert_eq!(result.collateral_to_pool, e18(2));
        assert_eq!(result.debt_redistributed, e18(400));
        assert_eq!(result.collateral_redistributed, e18(8));

        // The pool was emptied, which starts a new epoch
        let pool = protocol.pool.get_pool(asset);
        assert!(pool.total_deposits.is_zero());
        assert_eq!(pool.current_epoch, 1);
        assert!(protocol.pool.get_compounded_deposit(asset, alice).is_zero());
        assert_eq!(protocol.pool.get_depositor_collateral_gain(asset, alice), e18(2));

        let carol_trove = protocol.troves.get_entire_trove(asset, carol);
        assert_eq!(carol_trove.collateral, e18(28));
        assert_eq!(carol_trove.debt, e18(600));
        let ledger = protocol.troves.get_ledger(asset);
        assert_eq!(ledger.total_debt, e18(600));
        assert_eq!(ledger.total_collateral, e18(28));
        assert_eq!(ledger.active_troves, 1);

        let stats = protocol.engine.get_stats();
        assert_eq!(stats.total_liquidations, 1);
        assert_eq!(stats.total_debt_offset, e18(100));
        assert_eq!(stats.total_debt_redistributed, e18(400));

        protocol.env.set_caller(alice);
        protocol.pool.claim_gains(asset);
        assert_eq!(protocol.collateral.balance_of(alice), e18(2));
        assert!(protocol.pool.get_deposit(asset, alice).initial_deposit.is_zero());

        // A fresh deposit after the epoch reset is unaffected by the old loss
        protocol.env.set_caller(protocol.owner);
        protocol.deposit(alice, e18(50));
        assert_eq!(protocol.pool.get_compounded_deposit(asset, alice), e18(50));
    }

    #[test]
    fn test_batch_liquidation_skips_inactive_troves() {
        let mut protocol = Protocol::deploy();
        protocol.troves.set_borrowing_fee_bps(0);
        let asset = protocol.asset();
        let (alice, bob, carol, dave) = (
            protocol.account(1),
            protocol.account(2),
            protocol.account(3),
            protocol.account(4),
        );

        protocol.deposit(alice, e18(1_000));
        protocol.open_trove(bob, e18(2), e18(100));
        protocol.open_trove(carol, e18(9), e18(450));

        let batch = protocol.engine.batch_liquidate(asset, vec![bob, dave, carol]);
        assert_eq!(batch.troves_liquidated, 2);
        assert_eq!(batch.total_debt_offset, e18(550));
        assert!(batch.total_debt_redistributed.is_zero());

        assert_eq!(protocol.pool.get_total_deposits(asset), e18(450));
        assert_eq!(protocol.pool.get_compounded_deposit(asset, alice), e18(450));
        assert_eq!(protocol.pool.get_depositor_collateral_gain(asset, alice), e18(11));
        assert_eq!(
            protocol.engine.try_liquidate(asset, bob),
            Err(CdpError::TroveNotActive.into())
        );
    }

    #[test]
    fn test_interleaved_deposits_conserve_pool_balance() {
        let mut protocol = Protocol::deploy();
        protocol.troves.set_borrowing_fee_bps(0);
        let asset = protocol.asset();
        let (alice, bob, carol) = (protocol.account(1), protocol.account(2), protocol.account(3));
        let (dave, erin) = (protocol.account(4), protocol.account(6));

        protocol.deposit(alice, e18(300));
        protocol.deposit(bob, e18(100));
        protocol.open_trove(dave, e18(2), e18(100));
        protocol.engine.liquidate(asset, dave);
        let alice_gain_before = protocol.pool.get_depositor_collateral_gain(asset, alice);
        assert_eq!(alice_gain_before, e18(3) / 2);

        protocol.deposit(carol, e18(75));
        protocol.env.set_caller(bob);
        protocol.pool.withdraw_from_sp(asset, e18(25));
        assert_eq!(protocol.collateral.balance_of(bob), e18(1) / 2);
        assert_eq!(protocol.stablecoin.balance_of(bob), e18(25));
        protocol.env.set_caller(protocol.owner);

        protocol.open_trove(erin, e18(7), e18(70));
        protocol.engine.liquidate(asset, erin);

        let alice_deposit = protocol.pool.get_compounded_deposit(asset, alice);
        let bob_deposit = protocol.pool.get_compounded_deposit(asset, bob);
        let carol_deposit = protocol.pool.get_compounded_deposit(asset, carol);
        assert_eq!(alice_deposit, e18(180));
        assert_eq!(bob_deposit, e18(40));
        assert_eq!(carol_deposit, e18(60));
        assert_eq!(
            alice_deposit + bob_deposit + carol_deposit,
            protocol.pool.get_total_deposits(asset)
        );

        let alice_gain = protocol.pool.get_depositor_collateral_gain(asset, alice);
        let bob_gain = protocol.pool.get_depositor_collateral_gain(asset, bob);
        let carol_gain = protocol.pool.get_depositor_collateral_gain(asset, carol);
        assert!(alice_gain >= alice_gain_before);
        assert_eq!(alice_gain, e18(6));
        assert_eq!(bob_gain, e18(1));
        assert_eq!(carol_gain, e18(3) / 2);
        assert_eq!(
            alice_gain + bob_gain + carol_gain,
            protocol.pool.get_pool(asset).total_collateral
        );
    }

    #[test]
    fn test_compounded_deposit_survives_scale_change() {
        let mut protocol = Protocol::deploy();
        protocol.troves.set_borrowing_fee_bps(0);
        let asset = protocol.asset();
        let (alice, bob, carol) = (protocol.account(1), protocol.account(2), protocol.account(3));

        protocol.deposit(alice, e18(100_000));
        protocol.open_trove(bob, e18(1), e18(99_999));
        protocol.engine.liquidate(asset, bob);
        let pool = protocol.pool.get_pool(asset);
        assert_eq!(pool.p, U256::from(10_000_000_000_000u64));
        assert_eq!(pool.current_scale, 0);

        // Leaves 1e13 wei, shrinking P below the floor
        let remaining = U256::from(10_000_000_000_000u64);
        protocol.open_trove(carol, e18(1), e18(1) - remaining);
        protocol.engine.liquidate(asset, carol);
        let pool = protocol.pool.get_pool(asset);
        assert_eq!(pool.current_scale, 1);
        assert_eq!(pool.current_epoch, 0);
        assert_eq!(pool.p, U256::from(100_000_000_000_000_000u64));
        assert_eq!(pool.total_deposits, remaining);

        assert_eq!(protocol.pool.get_compounded_deposit(asset, alice), remaining);
        assert_eq!(protocol.pool.get_depositor_collateral_gain(asset, alice), e18(2));

        protocol.env.set_caller(alice);
        protocol.pool.withdraw_from_sp(asset, U256::MAX);
        assert_eq!(protocol.stablecoin.balance_of(alice), remaining);
        assert_eq!(protocol.collateral.balance_of(alice), e18(2));
        assert!(protocol.pool.get_total_deposits(asset).is_zero());
    }

    #[test]
    fn test_two_liquidations_then_full_withdrawal() {
        let mut protocol = Protocol::deploy();
        protocol.troves.set_borrowing_fee_bps(0);
        let asset = protocol.asset();
        let (alice, bob, carol) = (protocol.account(1), protocol.account(2), protocol.account(3));

        protocol.deposit(alice, e18(200));
        protocol.open_trove(bob, e18(3), e18(50));
        protocol.open_trove(carol, e18(15), e18(150));

        protocol.engine.liquidate(asset, bob);
        let pool = protocol.pool.get_pool(asset);
        assert_eq!(pool.p, U256::from(750_000_000_000_000_000u64));
        assert_eq!(protocol.pool.get_compounded_deposit(asset, alice), e18(150));
        assert_eq!(protocol.pool.get_depositor_collateral_gain(asset, alice), e18(3));

        // Absorbs the rest of the pool
        protocol.engine.liquidate(asset, carol);
        let pool = protocol.pool.get_pool(asset);
        assert_eq!(pool.current_epoch, 1);
        assert!(pool.total_deposits.is_zero());
        assert!(protocol.pool.get_compounded_deposit(asset, alice).is_zero());
        assert_eq!(protocol.pool.get_depositor_collateral_gain(asset, alice), e18(18));

        protocol.env.set_caller(alice);
        protocol.pool.withdraw_from_sp(asset, U256::MAX);
        assert_eq!(protocol.collateral.balance_of(alice), e18(18));
        assert!(protocol.stablecoin.balance_of(alice).is_zero());
        assert!(protocol.pool.get_deposit(asset, alice).initial_deposit.is_zero());
        assert!(protocol.pool.get_pool(asset).total_collateral.is_zero());
        assert_eq!(protocol.pool.get_pool(asset).depositor_count, 0);
    }

    #[test]
    fn test_liquidation_requires_liquidator() {
        let mut protocol = Protocol::deploy();
        let asset = protocol.asset();
        let bob = protocol.account(2);
        protocol.open_trove(bob, e18(2), e18(100));

        protocol.env.set_caller(protocol.account(5));
        assert_eq!(
            protocol.engine.try_liquidate(asset, bob),
            Err(CdpError::PermissionDenied.into())
        );
        assert_eq!(protocol.troves.get_trove(asset, bob).status, TroveStatus::Active);
    }

    #[test]
    fn test_late_trove_shares_redistribution_by_collateral() {
        let mut protocol = Protocol::deploy();
        protocol.troves.set_borrowing_fee_bps(0);
        let asset = protocol.asset();
        let (alice, bob, carol, dave) = (
            protocol.account(1),
            protocol.account(2),
            protocol.account(3),
            protocol.account(4),
        );

        protocol.open_trove(alice, e18(10), e18(100));
        protocol.open_trove(bob, e18(10), e18(100));
        protocol.open_trove(carol, e18(10), e18(100));
        protocol.engine.liquidate(asset, carol);
        assert_eq!(protocol.troves.get_entire_trove(asset, bob).collateral, e18(15));

        // Dave's 15 matches Bob's 10 plus his pending 5
        protocol.open_trove(dave, e18(15), e18(100));
        assert_eq!(protocol.troves.get_trove(asset, dave).stake, e18(10));

        protocol.engine.liquidate(asset, alice);
        let bob_trove = protocol.troves.get_entire_trove(asset, bob);
        let dave_trove = protocol.troves.get_entire_trove(asset, dave);
        assert_eq!(bob_trove.collateral, e18(45) / 2);
        assert_eq!(dave_trove.collateral, e18(45) / 2);
        assert_eq!(bob_trove.debt, e18(225));
        assert_eq!(dave_trove.debt, e18(175));

        let ledger = protocol.troves.get_ledger(asset);
        assert_eq!(ledger.total_collateral, e18(45));
        assert_eq!(ledger.total_debt, e18(400));
        assert_eq!(ledger.total_stakes_snapshot, e18(20));
        assert_eq!(ledger.total_collateral_snapshot, e18(45));
    }

    // ===== Reward Issuance =====

    #[test]
    fn test_rewards_are_debounced_and_capped() {
        let mut protocol = Protocol::deploy();
        let asset = protocol.asset();
        let alice = protocol.account(1);

        // One token per second, 1000 tokens in total
        protocol.fund_rewards(e18(1_000), e18(604_800));
        assert_eq!(protocol.issuer.get_rate_per_second(asset), e18(1));
        protocol.deposit(alice, e18(100));

        protocol.advance_seconds(30);
        protocol.env.set_caller(alice);
        protocol.pool.claim_gains(asset);
        assert!(protocol.issuer.get_total_issued(asset).is_zero());

        protocol.advance_seconds(40);
        protocol.pool.claim_gains(asset);
        assert_eq!(protocol.issuer.get_total_issued(asset), e18(70));
        assert_eq!(protocol.reward_token.balance_of(alice), e18(70));

        protocol.advance_seconds(2_000);
        protocol.pool.claim_gains(asset);
        assert_eq!(protocol.issuer.get_total_issued(asset), e18(1_000));
        assert_eq!(protocol.reward_token.balance_of(alice), e18(1_000));

        protocol.advance_seconds(600);
        protocol.pool.claim_gains(asset);
        assert_eq!(protocol.reward_token.balance_of(alice), e18(1_000));
    }

    #[test]
    fn test_fund_transfer_closes_source_pool() {
        let mut protocol = Protocol::deploy();
        let asset = protocol.asset();
        let other = deploy_token(&protocol.env, "WBTC").address().clone();
        protocol.pool.register_pool(other);
        protocol.fund_rewards(e18(100), e18(604_800));

        protocol.env.set_caller(protocol.treasury);
        assert_eq!(
            protocol.issuer.try_transfer_fund_to_another_pool(asset, asset, e18(1)),
            Err(CdpError::InvalidConfig.into())
        );
        protocol.issuer.transfer_fund_to_another_pool(asset, other, e18(100));

        assert!(protocol.issuer.get_supply_cap(asset).is_zero());
        assert_eq!(protocol.issuer.get_last_update_time(asset), 0);
        assert_eq!(protocol.issuer.get_supply_cap(other), e18(100));

        let unknown = protocol.stablecoin.address().clone();
        assert_eq!(
            protocol.issuer.try_add_fund_to_pool(unknown, e18(1)),
            Err(CdpError::PoolNotFound.into())
        );
    }

    #[test]
    fn test_remove_fund_returns_tokens_to_treasury() {
        let mut protocol = Protocol::deploy();
        let asset = protocol.asset();
        protocol.fund_rewards(e18(100), e18(604_800));

        protocol.env.set_caller(protocol.treasury);
        protocol.issuer.remove_fund_from_pool(asset, e18(40));
        assert_eq!(protocol.issuer.get_supply_cap(asset), e18(60));
        assert_eq!(protocol.reward_token.balance_of(protocol.treasury), e18(40));

        protocol.env.set_caller(protocol.account(1));
        assert_eq!(
            protocol.issuer.try_remove_fund_from_pool(asset, e18(1)),
            Err(CdpError::PermissionDenied.into())
        );
    }

    // ===== Fee Staking =====

    #[test]
    fn test_borrowing_fee_goes_to_stakers() {
        let mut protocol = Protocol::deploy();
        let asset = protocol.asset();
        let (bob, staker) = (protocol.account(2), protocol.account(5));
        let staking_addr = protocol.staking.address().clone();

        protocol.reward_token.mint(staker, e18(100));
        protocol.env.set_caller(staker);
        protocol.reward_token.approve(staking_addr, e18(100));
        protocol.staking.stake(e18(100));
        protocol.env.set_caller(protocol.owner);

        // 0.5% of 1000
        protocol.open_trove(bob, e18(20), e18(1_000));
        assert_eq!(protocol.troves.get_trove(asset, bob).debt, e18(1_005));
        assert_eq!(protocol.stablecoin.balance_of(bob), e18(1_000));
        assert_eq!(protocol.staking.get_pending_stable_gain(staker), e18(5));

        protocol.env.set_caller(staker);
        protocol.staking.unstake(U256::MAX);
        assert_eq!(protocol.stablecoin.balance_of(staker), e18(5));
        assert_eq!(protocol.reward_token.balance_of(staker), e18(100));
        assert!(protocol.staking.get_total_staked().is_zero());
    }

    #[test]
    fn test_collateral_fee_paid_on_unstake() {
        let mut protocol = Protocol::deploy();
        let asset = protocol.asset();
        let staker = protocol.account(5);
        let staking_addr = protocol.staking.address().clone();

        protocol.reward_token.mint(staker, e18(100));
        protocol.env.set_caller(staker);
        protocol.reward_token.approve(staking_addr, e18(100));
        protocol.staking.stake(e18(100));
        protocol.env.set_caller(protocol.owner);

        protocol.staking.set_fee_source(protocol.owner, true);
        protocol.collateral.mint(staking_addr, e18(4));
        protocol.staking.increase_f_asset(asset, e18(4));
        assert_eq!(protocol.staking.get_f_asset(asset), e18(4) / 100);
        assert_eq!(protocol.staking.get_pending_asset_gain(asset, staker), e18(4));

        let unknown = protocol.stablecoin.address().clone();
        assert_eq!(
            protocol.staking.try_increase_f_asset(unknown, e18(1)),
            Err(CdpError::PoolNotFound.into())
        );

        protocol.env.set_caller(staker);
        protocol.staking.unstake(U256::MAX);
        assert_eq!(protocol.collateral.balance_of(staker), e18(4));
        assert_eq!(protocol.reward_token.balance_of(staker), e18(100));
        assert!(protocol.staking.get_pending_asset_gain(asset, staker).is_zero());
        assert!(protocol.collateral.balance_of(staking_addr).is_zero());
    }

    #[test]
    fn test_fee_booking_requires_fee_source() {
        let mut protocol = Protocol::deploy();
        assert_eq!(
            protocol.staking.try_increase_f_stable(e18(1)),
            Err(CdpError::PermissionDenied.into())
        );
    }

    #[test]
    fn test_close_trove_returns_collateral() {
        let mut protocol = Protocol::deploy();
        protocol.troves.set_borrowing_fee_bps(0);
        let asset = protocol.asset();
        let bob = protocol.account(2);
        protocol.open_trove(bob, e18(10), e18(100));

        protocol.env.set_caller(bob);
        protocol.troves.close_trove(asset);
        assert_eq!(protocol.collateral.balance_of(bob), e18(10));
        assert!(protocol.stablecoin.balance_of(bob).is_zero());
        assert_eq!(protocol.troves.get_trove(asset, bob).status, TroveStatus::Closed);
        assert_eq!(
            protocol.troves.try_close_trove(asset),
            Err(CdpError::TroveNotActive.into())
        );
    }
}

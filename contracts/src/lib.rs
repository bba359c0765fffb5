//! CDP Ledger Contracts
//!
//! Multi-collateral stability pool ledger with reward issuance and fee
//! staking, on Casper via Odra.
//!
//! ## Architecture
//!
//! - **StabilityPool**: Per-asset stablecoin deposits that absorb liquidated
//!   debt; product-sum accounting of compounded deposits, collateral gains
//!   and reward gains
//! - **RewardIssuer**: Treasury-funded, capped, time-based reward issuance
//!   per stability pool
//! - **FeeStaking**: Reward-token staking that earns borrowing and collateral fees
//! - **TroveManager**: Minimal trove registry with stake-based redistribution
//! - **LiquidationEngine**: Splits liquidated troves between pool offset and
//!   redistribution
//! - **ProtocolToken**: CEP-18 token used for the stablecoin, the reward token
//!   and test collateral
//!
//! ## Precision
//!
//! All accumulators use 1e18 fixed point. The running product `P` is rebased by
//! 1e9 (a new scale) whenever it would fall below 1e9, and a full pool
//! absorption starts a new epoch.

#![cfg_attr(target_arch = "wasm32", no_std)]

#[cfg(target_arch = "wasm32")]
extern crate alloc;

// Re-export odra for downstream usage
pub use odra;

// Core module declarations
pub mod types;
pub mod errors;
pub mod events;
pub mod interfaces;
pub mod fixed_point;
pub mod product_sum;

// Contract modules
pub mod token;
pub mod stability_pool;
pub mod reward_issuer;
pub mod fee_staking;
pub mod trove_manager;
pub mod liquidation_engine;

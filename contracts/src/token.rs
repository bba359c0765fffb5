//! Protocol Token Contract
//!
//! CEP-18 compatible fungible token used for the stablecoin, the reward
//! token and collateral tokens. Minting and burning on behalf of others is
//! restricted to minters appointed by the token owner.
//!
//! Balances, allowances and supply live in Odra storage and are mirrored
//! into the CEP-18 named keys and dictionaries so wallets can read them.

use odra::prelude::*;
use odra::casper_types::{U256, Key};
use odra::casper_types::bytesrepr::ToBytes;
use crate::errors::CdpError;
use crate::fixed_point;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

const NAME_KEY: &str = "name";
const SYMBOL_KEY: &str = "symbol";
const DECIMALS_KEY: &str = "decimals";
const TOTAL_SUPPLY_KEY: &str = "total_supply";
const BALANCES_DICT: &str = "balances";
const ALLOWANCES_DICT: &str = "allowances";

/// Protocol Token Contract
#[odra::module]
pub struct ProtocolToken {
    name: Var<String>,
    symbol: Var<String>,
    decimals: Var<u8>,
    total_supply: Var<U256>,
    balances: Mapping<Address, U256>,
    /// (owner, spender) -> remaining allowance
    allowances: Mapping<(Address, Address), U256>,
    /// Deployer, appoints minters
    owner: Var<Address>,
    /// Protocol contracts allowed to mint and burn for others
    minters: Mapping<Address, bool>,
}

#[odra::module]
impl ProtocolToken {
    /// Initialize the token. The deployer becomes the owner.
    pub fn init(&mut self, name: String, symbol: String, decimals: u8) {
        self.owner.set(self.env().caller());
        self.env().init_dictionary(BALANCES_DICT);
        self.env().init_dictionary(ALLOWANCES_DICT);
        self.env().set_named_value(NAME_KEY, name.clone());
        self.env().set_named_value(SYMBOL_KEY, symbol.clone());
        self.env().set_named_value(DECIMALS_KEY, decimals);
        self.name.set(name);
        self.symbol.set(symbol);
        self.decimals.set(decimals);
        self.write_supply(U256::zero());
    }

    // ========== CEP-18 Standard Functions ==========

    pub fn name(&self) -> String {
        self.name.get().unwrap_or_default()
    }

    pub fn symbol(&self) -> String {
        self.symbol.get().unwrap_or_default()
    }

    pub fn decimals(&self) -> u8 {
        self.decimals.get().unwrap_or(18)
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply.get().unwrap_or_default()
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(owner, spender)).unwrap_or_default()
    }

    pub fn transfer(&mut self, recipient: Address, amount: U256) -> bool {
        let sender = self.env().caller();
        self.move_balance(sender, recipient, amount);
        true
    }

    pub fn approve(&mut self, spender: Address, amount: U256) -> bool {
        let owner = self.env().caller();
        self.write_allowance(owner, spender, amount);
        true
    }

    /// Spend `amount` of the caller's allowance from `owner`.
    pub fn transfer_from(&mut self, owner: Address, recipient: Address, amount: U256) -> bool {
        let spender = self.env().caller();
        let remaining = self.allowance(owner, spender);
        if remaining < amount {
            self.env().revert(CdpError::InsufficientAllowance);
        }
        self.move_balance(owner, recipient, amount);
        self.write_allowance(owner, spender, remaining - amount);
        true
    }

    // ========== Supply Functions ==========

    /// Mint new tokens (minters only)
    pub fn mint(&mut self, to: Address, amount: U256) {
        self.require_minter();
        let balance = self.checked(fixed_point::add(self.balance_of(to), amount));
        let supply = self.checked(fixed_point::add(self.total_supply(), amount));
        self.write_balance(to, balance);
        self.write_supply(supply);
    }

    /// Burn tokens held by the caller
    pub fn burn(&mut self, amount: U256) {
        let holder = self.env().caller();
        self.destroy(holder, amount);
    }

    /// Burn tokens held by `from` (minters only, used for debt repayment)
    pub fn burn_from(&mut self, from: Address, amount: U256) {
        self.require_minter();
        self.destroy(from, amount);
    }

    // ========== Admin Functions ==========

    pub fn add_minter(&mut self, minter: Address) {
        self.require_owner();
        self.minters.set(&minter, true);
    }

    pub fn remove_minter(&mut self, minter: Address) {
        self.require_owner();
        self.minters.set(&minter, false);
    }

    pub fn is_minter(&self, account: Address) -> bool {
        self.minters.get(&account).unwrap_or(false)
    }

    // ========== Internal Functions ==========

    fn move_balance(&mut self, from: Address, to: Address, amount: U256) {
        let from_balance = self.debit(from, amount);
        self.write_balance(from, from_balance);
        // Read after the debit so self-transfers stay balanced
        let to_balance = self.checked(fixed_point::add(self.balance_of(to), amount));
        self.write_balance(to, to_balance);
    }

    fn destroy(&mut self, from: Address, amount: U256) {
        let balance = self.debit(from, amount);
        let supply = self.checked(fixed_point::sub(self.total_supply(), amount));
        self.write_balance(from, balance);
        self.write_supply(supply);
    }

    /// Balance of `account` after taking `amount` out of it.
    fn debit(&self, account: Address, amount: U256) -> U256 {
        let balance = self.balance_of(account);
        if balance < amount {
            self.env().revert(CdpError::InsufficientTokenBalance);
        }
        balance - amount
    }

    fn write_balance(&mut self, account: Address, amount: U256) {
        self.balances.set(&account, amount);
        let key = cep18_balance_key(account);
        self.env().set_dictionary_value(BALANCES_DICT, key.as_bytes(), amount);
    }

    fn write_allowance(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.set(&(owner, spender), amount);
        let key = cep18_allowance_key(owner, spender);
        self.env().set_dictionary_value(ALLOWANCES_DICT, key.as_bytes(), amount);
    }

    fn write_supply(&mut self, amount: U256) {
        self.total_supply.set(amount);
        self.env().set_named_value(TOTAL_SUPPLY_KEY, amount);
    }

    fn require_minter(&self) {
        if !self.is_minter(self.env().caller()) {
            self.env().revert(CdpError::PermissionDenied);
        }
    }

    fn require_owner(&self) {
        if self.owner.get() != Some(self.env().caller()) {
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

fn key_bytes(account: Address) -> Vec<u8> {
    Key::from(account).to_bytes().unwrap_or_default()
}

/// Dictionary item key of a CEP-18 balance.
fn cep18_balance_key(owner: Address) -> String {
    BASE64_STANDARD.encode(key_bytes(owner))
}

/// Dictionary item key of a CEP-18 allowance.
fn cep18_allowance_key(owner: Address, spender: Address) -> String {
    let mut bytes = key_bytes(owner);
    bytes.extend(key_bytes(spender));
    BASE64_STANDARD.encode(bytes)
}

// crates/bulwark-module/src/receipt_token.rs
//
// Receipt-token ledger.
//
// Each reserve pool owns a stake receipt token and a deposit receipt token;
// each reward pool owns a reward-deposit receipt token. Token addresses are
// derived from (module, pool id, kind) so they are known before the pool is
// created. Only the owning module mints and burns.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use bulwark_core::crypto::derive_address;
use bulwark_core::math::{BulwarkResult, SafeMath};
use bulwark_core::{Address, BulwarkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptTokenKind {
    /// Claim on a reserve pool's staked assets. Earns rewards.
    Stake,
    /// Claim on a reserve pool's deposited assets.
    Deposit,
    /// Claim on a reward pool's undripped assets.
    RewardDeposit,
}

impl ReceiptTokenKind {
    /// Tag mixed into the derived token address.
    pub fn tag(&self) -> u8 {
        match self {
            ReceiptTokenKind::Stake => 0,
            ReceiptTokenKind::Deposit => 1,
            ReceiptTokenKind::RewardDeposit => 2,
        }
    }
}

impl fmt::Display for ReceiptTokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptTokenKind::Stake => write!(f, "Stake"),
            ReceiptTokenKind::Deposit => write!(f, "Deposit"),
            ReceiptTokenKind::RewardDeposit => write!(f, "RewardDeposit"),
        }
    }
}

/// Address a receipt token for `(module, pool_id, kind)` is deployed at.
pub fn compute_receipt_token_address(
    module: &Address,
    pool_id: u16,
    kind: ReceiptTokenKind,
) -> Address {
    derive_address(module, pool_id, kind.tag())
}

/// Balances, supply and allowances of one receipt token.
#[derive(Debug, Clone)]
pub struct ReceiptToken {
    pub address: Address,
    pub module: Address,
    pub pool_id: u16,
    pub kind: ReceiptTokenKind,
    pub decimals: u8,
    total_supply: u128,
    balances: BTreeMap<Address, u128>,
    allowances: BTreeMap<(Address, Address), u128>,
}

impl ReceiptToken {
    /// Create the token at its deterministic address.
    pub fn deploy(module: Address, pool_id: u16, kind: ReceiptTokenKind, decimals: u8) -> Self {
        Self {
            address: compute_receipt_token_address(&module, pool_id, kind),
            module,
            pool_id,
            kind,
            decimals,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    pub fn mint(&mut self, to: &Address, amount: u128) -> BulwarkResult<()> {
        let supply = self.total_supply.safe_add(amount)?;
        let balance = self.balance_of(to).safe_add(amount)?;
        self.total_supply = supply;
        self.balances.insert(*to, balance);
        Ok(())
    }

    pub fn burn(&mut self, from: &Address, amount: u128) -> BulwarkResult<()> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(self.insufficient(from, balance, amount));
        }
        self.total_supply = self.total_supply.safe_sub(amount)?;
        self.set_balance(from, balance - amount);
        Ok(())
    }

    /// Accounts holding a nonzero balance.
    pub fn holders(&self) -> Vec<Address> {
        self.balances.keys().copied().collect()
    }

    /// Burn every balance, returning the retired supply. Allowances stay.
    pub fn retire_all(&mut self) -> u128 {
        self.balances.clear();
        std::mem::take(&mut self.total_supply)
    }

    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> BulwarkResult<()> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(self.insufficient(from, from_balance, amount));
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self.balance_of(to).safe_add(amount)?;
        self.set_balance(from, from_balance - amount);
        self.balances.insert(*to, to_balance);
        Ok(())
    }

    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) {
        self.allowances.insert((*owner, *spender), amount);
    }

    /// Consume `amount` of `spender`'s allowance over `owner`'s tokens.
    /// An allowance of `u128::MAX` is never decremented.
    pub fn spend_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> BulwarkResult<()> {
        let allowed = self.allowance(owner, spender);
        if allowed == u128::MAX {
            return Ok(());
        }
        if allowed < amount {
            return Err(BulwarkError::InsufficientBalance(format!(
                "{} may spend {} of {}'s {} receipt tokens, {} requested",
                spender.short(),
                allowed,
                owner.short(),
                self.kind,
                amount
            )));
        }
        self.allowances.insert((*owner, *spender), allowed - amount);
        Ok(())
    }

    fn set_balance(&mut self, holder: &Address, balance: u128) {
        if balance == 0 {
            self.balances.remove(holder);
        } else {
            self.balances.insert(*holder, balance);
        }
    }

    fn insufficient(&self, holder: &Address, balance: u128, amount: u128) -> BulwarkError {
        BulwarkError::InsufficientBalance(format!(
            "{} holds {} {} receipt tokens of pool {}, {} requested",
            holder.short(),
            balance,
            self.kind,
            self.pool_id,
            amount
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> ReceiptToken {
        ReceiptToken::deploy(Address::from_label("module"), 0, ReceiptTokenKind::Stake, 18)
    }

    #[test]
    fn test_address_is_predictable() {
        let module = Address::from_label("module");
        let t = ReceiptToken::deploy(module, 3, ReceiptTokenKind::Deposit, 6);
        assert_eq!(
            t.address,
            compute_receipt_token_address(&module, 3, ReceiptTokenKind::Deposit)
        );
        assert_ne!(
            t.address,
            compute_receipt_token_address(&module, 3, ReceiptTokenKind::Stake)
        );
    }

    #[test]
    fn test_mint_burn_supply() {
        let alice = Address::from_label("alice");
        let mut t = token();
        t.mint(&alice, 100).unwrap();
        assert_eq!(t.total_supply(), 100);
        t.burn(&alice, 40).unwrap();
        assert_eq!(t.balance_of(&alice), 60);
        assert_eq!(t.total_supply(), 60);
        assert!(matches!(
            t.burn(&alice, 61),
            Err(BulwarkError::InsufficientBalance(_))
        ));
    }

    #[test]
    fn test_transfer() {
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let mut t = token();
        t.mint(&alice, 10).unwrap();
        t.transfer(&alice, &bob, 4).unwrap();
        assert_eq!(t.balance_of(&alice), 6);
        assert_eq!(t.balance_of(&bob), 4);
        assert_eq!(t.total_supply(), 10);
        assert!(t.transfer(&alice, &bob, 7).is_err());
    }

    #[test]
    fn test_allowance() {
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let mut t = token();
        t.approve(&alice, &bob, 5);
        t.spend_allowance(&alice, &bob, 3).unwrap();
        assert_eq!(t.allowance(&alice, &bob), 2);
        assert!(t.spend_allowance(&alice, &bob, 3).is_err());

        t.approve(&alice, &bob, u128::MAX);
        t.spend_allowance(&alice, &bob, 1_000).unwrap();
        assert_eq!(t.allowance(&alice, &bob), u128::MAX);
    }

    #[test]
    fn test_retire_all() {
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let mut t = token();
        t.mint(&alice, 10).unwrap();
        t.mint(&bob, 5).unwrap();
        t.approve(&alice, &bob, 3);
        assert_eq!(t.holders().len(), 2);

        assert_eq!(t.retire_all(), 15);
        assert_eq!(t.total_supply(), 0);
        assert_eq!(t.balance_of(&alice), 0);
        assert!(t.holders().is_empty());
        assert_eq!(t.allowance(&alice, &bob), 3);
    }
}

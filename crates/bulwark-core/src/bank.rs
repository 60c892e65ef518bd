// crates/bulwark-core/src/bank.rs
//
// In-memory AssetBank used by the simulator and the test suites.

use std::collections::HashMap;

use crate::error::BulwarkError;
use crate::identity::{Address, AssetId};
use crate::traits::AssetBank;

const DEFAULT_DECIMALS: u8 = 18;

/// Balances of every asset for every holder, kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBank {
    decimals: HashMap<AssetId, u8>,
    balances: HashMap<(AssetId, Address), u128>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset's decimals. Unregistered assets report 18.
    pub fn register_asset(&mut self, asset: AssetId, decimals: u8) {
        self.decimals.insert(asset, decimals);
    }

    /// Credit `amount` out of thin air (faucet for scenarios and tests).
    pub fn mint(&mut self, asset: &AssetId, to: &Address, amount: u128) {
        let balance = self.balances.entry((*asset, *to)).or_insert(0);
        *balance = balance.saturating_add(amount);
    }
}

impl AssetBank for InMemoryBank {
    fn decimals(&self, asset: &AssetId) -> u8 {
        self.decimals.get(asset).copied().unwrap_or(DEFAULT_DECIMALS)
    }

    fn balance_of(&self, asset: &AssetId, holder: &Address) -> u128 {
        self.balances.get(&(*asset, *holder)).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), BulwarkError> {
        let from_balance = self.balance_of(asset, from);
        if from_balance < amount {
            return Err(BulwarkError::InsufficientBalance(format!(
                "{} holds {} of asset {} but {} was requested",
                from.short(),
                from_balance,
                asset.short(),
                amount
            )));
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let to_balance = self.balance_of(asset, to);
        let new_to = to_balance.checked_add(amount).ok_or_else(|| {
            BulwarkError::Math(format!("balance overflow for {}", to.short()))
        })?;
        self.balances.insert((*asset, *from), from_balance - amount);
        self.balances.insert((*asset, *to), new_to);
        Ok(())
    }
}

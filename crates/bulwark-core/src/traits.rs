// crates/bulwark-core/src/traits.rs

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BulwarkError;
use crate::identity::{Address, AssetId};

/// Time-based decay curve applied to undripped pool balances.
///
/// Implemented by the reference models in `drip_models` and by test doubles.
pub trait DripModel: Send + Sync {
    /// Identity of the model, used when hashing configurations.
    fn id(&self) -> Address;

    /// Fraction of `pool_amount` (WAD-scaled, expected in `[0, 1e18]`) that
    /// drips over `elapsed_seconds`.
    fn drip_factor(&self, pool_amount: u128, elapsed_seconds: u64) -> u128;
}

/// Observable state of an external trigger oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerState {
    Active,
    Triggered,
    Frozen,
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerState::Active => write!(f, "Active"),
            TriggerState::Triggered => write!(f, "Triggered"),
            TriggerState::Frozen => write!(f, "Frozen"),
        }
    }
}

/// External oracle whose state flip authorizes a slash.
pub trait Trigger: Send + Sync {
    fn id(&self) -> Address;

    /// Polled by the module when `trigger()` is called.
    fn state(&self) -> TriggerState;
}

/// Registry that created the module.
///
/// Enforces global pool caps, supplies the fee drip model, and is allowed
/// to pause, unpause and claim fees on every module it manages.
pub trait Manager: Send + Sync {
    fn id(&self) -> Address;

    fn allowed_reserve_pools(&self) -> usize;

    fn allowed_reward_pools(&self) -> usize;

    fn fee_drip_model(&self, module: &Address) -> Arc<dyn DripModel>;
}

/// Fungible balances of underlying assets.
///
/// The module mutates its own accounting before pushing assets out, and
/// pre-checks its balance so an outbound transfer never fails after commit.
pub trait AssetBank {
    fn decimals(&self, asset: &AssetId) -> u8;

    fn balance_of(&self, asset: &AssetId, holder: &Address) -> u128;

    /// Move `amount` of `asset`. Must leave balances untouched on error.
    fn transfer(
        &mut self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), BulwarkError>;
}

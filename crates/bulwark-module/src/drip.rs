// crates/bulwark-module/src/drip.rs
//
// Drip accrual engine.
//
// A pool's undripped balance decays on every accounting touch by the
// factor its drip model reports for the elapsed time. Drips are idempotent
// at a fixed timestamp and frozen while the module is paused.

use bulwark_core::math::{mul_wad_down, BulwarkResult, WAD};
use bulwark_core::{BulwarkError, DripModel};

use crate::module::SafetyModule;
use crate::state::SafetyModuleState;

/// Amount of `pool_amount` that drips over `elapsed_seconds`.
///
/// # Errors
/// `BulwarkError::InvalidDripFactor` if the model reports more than 100%.
pub fn compute_drip(
    model: &dyn DripModel,
    pool_amount: u128,
    elapsed_seconds: u64,
) -> BulwarkResult<u128> {
    if elapsed_seconds == 0 || pool_amount == 0 {
        return Ok(0);
    }
    let factor = model.drip_factor(pool_amount, elapsed_seconds);
    if factor > WAD {
        return Err(BulwarkError::InvalidDripFactor(factor));
    }
    mul_wad_down(pool_amount, factor)
}

/// Seconds since `last_drip_time`, zero if the clock went backwards.
pub fn elapsed_since(last_drip_time: u64, now: u64) -> u64 {
    now.saturating_sub(last_drip_time)
}

impl SafetyModule {
    pub(crate) fn drips_frozen(&self) -> bool {
        self.state == SafetyModuleState::Paused
    }

    /// Reward drip + index fold followed by the fee drip. Called at the start
    /// of every operation that reads pool balances.
    pub(crate) fn drip_all(&mut self, now: u64) -> BulwarkResult<()> {
        self.drip_rewards_internal(now)?;
        self.drip_fees_internal(now)
    }

    /// Restart every drip clock at `now` so paused time never accrues.
    pub(crate) fn reset_drip_clocks(&mut self, now: u64) {
        for pool in self.reward_pools.iter_mut() {
            pool.last_drip_time = now;
        }
        for pool in self.reserve_pools.iter_mut() {
            pool.last_fees_drip_time = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_core::Address;

    struct FixedFactor(u128);

    impl DripModel for FixedFactor {
        fn id(&self) -> Address {
            Address::ZERO
        }

        fn drip_factor(&self, _pool_amount: u128, _elapsed_seconds: u64) -> u128 {
            self.0
        }
    }

    #[test]
    fn test_one_percent_drip() {
        let dripped = compute_drip(&FixedFactor(WAD / 100), 100_000, 1).unwrap();
        assert_eq!(dripped, 1_000);
    }

    #[test]
    fn test_zero_elapsed_is_noop() {
        assert_eq!(compute_drip(&FixedFactor(WAD), 100_000, 0).unwrap(), 0);
    }

    #[test]
    fn test_empty_pool_is_noop() {
        // Not even a broken model is consulted for an empty pool.
        assert_eq!(compute_drip(&FixedFactor(WAD + 1), 0, 10).unwrap(), 0);
    }

    #[test]
    fn test_factor_above_one_is_rejected() {
        assert_eq!(
            compute_drip(&FixedFactor(WAD + 1), 100, 1),
            Err(BulwarkError::InvalidDripFactor(WAD + 1))
        );
    }

    #[test]
    fn test_full_drip_and_floor() {
        assert_eq!(compute_drip(&FixedFactor(WAD), 77, 5).unwrap(), 77);
        // 33.3% of 10 floors to 3.
        assert_eq!(compute_drip(&FixedFactor(WAD / 3), 10, 5).unwrap(), 3);
    }

    #[test]
    fn test_elapsed_since() {
        assert_eq!(elapsed_since(10, 25), 15);
        assert_eq!(elapsed_since(25, 10), 0);
    }
}

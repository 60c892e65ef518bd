// crates/bulwark-module/src/slash.rs
//
// Slash execution.
//
// A payout handler holding a pending slash seizes staked assets from any
// set of reserve pools, each bounded by floor(max_slash_percentage * stake).
// Per pool the stake is reduced first; then every pending unstake of that
// pool is rescaled by (stake - amount) / stake, largest redemption id
// first, and the pool's pending total is reset to the exact sum of the
// rescaled entries so it never drifts from the queue.

use std::collections::BTreeSet;

use bulwark_core::math::{mul_div_down, mul_wad_down, BulwarkResult, SafeMath};
use bulwark_core::{Address, AssetBank, BulwarkError};

use crate::module::{CallContext, SafetyModule};
use crate::state::SafetyModuleState;
use crate::types::{RedemptionKind, Slash};

impl SafetyModule {
    fn slash_reserve_pool(&mut self, reserve_pool_id: u16, amount: u128) -> BulwarkResult<()> {
        let idx = self.check_reserve_pool_id(reserve_pool_id)?;
        let pool = &mut self.reserve_pools[idx];
        let old_stake = pool.stake_amount;
        let bound = mul_wad_down(old_stake, pool.max_slash_percentage)?;
        if amount > bound {
            return Err(BulwarkError::ExceedsMaxSlashPercentage {
                reserve_pool_id,
                amount,
                stake_amount: old_stake,
            });
        }
        if amount == 0 {
            return Ok(());
        }

        let new_stake = old_stake.safe_sub(amount)?;
        pool.stake_amount = new_stake;

        let mut pending = 0u128;
        for redemption in self.redemptions.values_mut().rev() {
            if redemption.kind == RedemptionKind::Unstake
                && redemption.reserve_pool_id == reserve_pool_id
            {
                redemption.asset_amount = mul_div_down(redemption.asset_amount, new_stake, old_stake)?;
                pending = pending.safe_add(redemption.asset_amount)?;
            }
        }
        pool.pending_unstakes_amount = pending;
        Ok(())
    }

    /// Execute one pending slash, paying the seized assets to `receiver`.
    ///
    /// Only a payout handler with a pending slash may call it, and only
    /// while triggered. Executing the last pending slash returns the module
    /// to Active. All pools are slashed or none is.
    pub fn slash(
        &mut self,
        ctx: &CallContext,
        bank: &mut dyn AssetBank,
        slashes: &[Slash],
        receiver: &Address,
    ) -> BulwarkResult<()> {
        self.transact("slash", |m| {
            if m.state != SafetyModuleState::Triggered {
                return Err(BulwarkError::InvalidState(format!(
                    "cannot slash while {}",
                    m.state
                )));
            }
            let handler_pending = m.payout_handler_num_pending_slashes(&ctx.caller);
            if handler_pending == 0 {
                return Err(BulwarkError::Unauthorized(format!(
                    "{} has no pending slash",
                    ctx.caller.short()
                )));
            }
            m.drip_all(ctx.now)?;

            m.payout_handler_num_pending_slashes
                .insert(ctx.caller, handler_pending - 1);
            m.num_pending_slashes = m.num_pending_slashes.safe_sub(1)?;

            let mut seen = BTreeSet::new();
            let mut payouts = Vec::with_capacity(slashes.len());
            for s in slashes {
                if !seen.insert(s.reserve_pool_id) {
                    return Err(BulwarkError::AlreadySlashed(s.reserve_pool_id));
                }
                m.slash_reserve_pool(s.reserve_pool_id, s.amount)?;
                let asset = m.reserve_pools[s.reserve_pool_id as usize].asset;
                m.debit_asset_pool(&asset, s.amount)?;
                payouts.push((asset, *receiver, s.amount));
                tracing::info!(
                    "Reserve pool {} slashed by {}",
                    s.reserve_pool_id,
                    s.amount
                );
            }

            if m.num_pending_slashes == 0 {
                m.transition(SafetyModuleState::Active)?;
            }
            m.push_assets(bank, &payouts)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Fixture;
    use bulwark_core::TriggerState;

    fn triggered() -> Fixture {
        let mut f = Fixture::new();
        f.stake(f.alice, 1_000);
        f.trigger.set_state(TriggerState::Triggered);
        let anyone = f.ctx(f.bob);
        f.module.trigger(&anyone, f.trigger.as_ref()).unwrap();
        f
    }

    #[test]
    fn test_slash_requires_payout_handler() {
        let mut f = triggered();
        let alice = f.ctx(f.alice);
        let slashes = [Slash {
            reserve_pool_id: 0,
            amount: 100,
        }];
        assert!(matches!(
            f.module.slash(&alice, &mut f.bank, &slashes, &f.alice),
            Err(BulwarkError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_slash_requires_triggered() {
        let mut f = Fixture::new();
        f.stake(f.alice, 1_000);
        let handler = f.ctx(f.payout_handler);
        assert!(matches!(
            f.module.slash(&handler, &mut f.bank, &[], &f.payout_handler),
            Err(BulwarkError::InvalidState(_))
        ));
    }

    #[test]
    fn test_slash_pays_and_resolves() {
        let mut f = triggered();
        let handler = f.ctx(f.payout_handler);
        let slashes = [Slash {
            reserve_pool_id: 0,
            amount: 500,
        }];
        f.module
            .slash(&handler, &mut f.bank, &slashes, &f.payout_handler)
            .unwrap();
        assert_eq!(f.module.reserve_pool(0).unwrap().stake_amount, 500);
        assert_eq!(f.bank.balance_of(&f.reserve_asset, &f.payout_handler), 500);
        assert_eq!(f.module.asset_pool(&f.reserve_asset).amount, 500);
        assert_eq!(f.module.state(), SafetyModuleState::Active);
        assert_eq!(f.module.num_pending_slashes(), 0);

        // The authorization is spent.
        assert!(f
            .module
            .slash(&handler, &mut f.bank, &[], &f.payout_handler)
            .is_err());
    }

    #[test]
    fn test_slash_above_bound_rejected() {
        let mut f = triggered();
        let handler = f.ctx(f.payout_handler);
        let slashes = [Slash {
            reserve_pool_id: 0,
            amount: 501,
        }];
        assert!(matches!(
            f.module.slash(&handler, &mut f.bank, &slashes, &f.payout_handler),
            Err(BulwarkError::ExceedsMaxSlashPercentage { amount: 501, .. })
        ));
        assert_eq!(f.module.reserve_pool(0).unwrap().stake_amount, 1_000);
        assert_eq!(f.module.num_pending_slashes(), 1);
        assert_eq!(f.module.state(), SafetyModuleState::Triggered);
    }

    #[test]
    fn test_duplicate_pool_rejected() {
        let mut f = triggered();
        let handler = f.ctx(f.payout_handler);
        let slashes = [
            Slash {
                reserve_pool_id: 0,
                amount: 10,
            },
            Slash {
                reserve_pool_id: 0,
                amount: 10,
            },
        ];
        assert_eq!(
            f.module.slash(&handler, &mut f.bank, &slashes, &f.payout_handler),
            Err(BulwarkError::AlreadySlashed(0))
        );
        assert_eq!(f.module.reserve_pool(0).unwrap().stake_amount, 1_000);
    }

    #[test]
    fn test_slash_shrinks_pending_unstakes() {
        let mut f = Fixture::new();
        f.stake(f.alice, 1_000);
        let alice = f.ctx(f.alice);
        let (first, _) = f
            .module
            .unstake(&alice, &mut f.bank, 0, 300, &f.alice, &f.alice)
            .unwrap();
        let (second, _) = f
            .module
            .unstake(&alice, &mut f.bank, 0, 101, &f.alice, &f.alice)
            .unwrap();

        f.trigger.set_state(TriggerState::Triggered);
        f.module.trigger(&alice, f.trigger.as_ref()).unwrap();
        let handler = f.ctx(f.payout_handler);
        let slashes = [Slash {
            reserve_pool_id: 0,
            amount: 500,
        }];
        f.module
            .slash(&handler, &mut f.bank, &slashes, &f.payout_handler)
            .unwrap();

        assert_eq!(f.module.redemption(first).unwrap().asset_amount, 150);
        // floor(101 / 2)
        assert_eq!(f.module.redemption(second).unwrap().asset_amount, 50);
        let pool = f.module.reserve_pool(0).unwrap();
        assert_eq!(pool.pending_unstakes_amount, 200);
        assert_eq!(pool.stake_amount, 500);
    }
}

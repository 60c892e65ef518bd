// crates/bulwark-module/src/fees.rs
//
// Protocol fees: the manager's fee drip model decays each reserve pool's
// redeemable stake and deposits into `fee_amount`, which the manager
// claims.

use serde::{Deserialize, Serialize};

use bulwark_core::math::{BulwarkResult, SafeMath};
use bulwark_core::{Address, AssetBank, AssetId, BulwarkError};

use crate::drip::{compute_drip, elapsed_since};
use crate::module::{CallContext, SafetyModule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedFee {
    pub reserve_pool_id: u16,
    pub asset: AssetId,
    pub amount: u128,
}

impl SafetyModule {
    pub(crate) fn drip_fees_internal(&mut self, now: u64) -> BulwarkResult<()> {
        if self.drips_frozen() {
            return Ok(());
        }
        let model = self.manager.fee_drip_model(&self.address);

        let mut fees = Vec::with_capacity(self.reserve_pools.len());
        for pool in &self.reserve_pools {
            let elapsed = elapsed_since(pool.last_fees_drip_time, now);
            fees.push((
                compute_drip(model.as_ref(), pool.redeemable_stake()?, elapsed)?,
                compute_drip(model.as_ref(), pool.redeemable_deposits()?, elapsed)?,
            ));
        }

        for (id, (pool, (stake_fee, deposit_fee))) in
            self.reserve_pools.iter_mut().zip(fees).enumerate()
        {
            pool.stake_amount = pool.stake_amount.safe_sub(stake_fee)?;
            pool.deposit_amount = pool.deposit_amount.safe_sub(deposit_fee)?;
            pool.fee_amount = pool.fee_amount.safe_add(stake_fee.safe_add(deposit_fee)?)?;
            pool.last_fees_drip_time = pool.last_fees_drip_time.max(now);
            if stake_fee > 0 || deposit_fee > 0 {
                tracing::debug!(
                    "Reserve pool {} dripped fees: {} from stake, {} from deposits",
                    id,
                    stake_fee,
                    deposit_fee
                );
            }
        }
        Ok(())
    }

    /// Drip fees. Callable by anyone; a no-op while paused.
    pub fn drip_fees(&mut self, ctx: &CallContext) -> BulwarkResult<()> {
        self.transact("drip_fees", |m| m.drip_fees_internal(ctx.now))
    }

    /// Pay every reserve pool's accrued fees to `receiver`. Manager only.
    pub fn claim_fees(
        &mut self,
        ctx: &CallContext,
        bank: &mut dyn AssetBank,
        receiver: &Address,
    ) -> BulwarkResult<Vec<ClaimedFee>> {
        self.transact("claim_fees", |m| {
            if !m.is_manager(&ctx.caller) {
                return Err(BulwarkError::Unauthorized(format!(
                    "{} is not the manager",
                    ctx.caller.short()
                )));
            }
            m.drip_all(ctx.now)?;

            let mut claimed = Vec::new();
            for (id, pool) in m.reserve_pools.iter_mut().enumerate() {
                let amount = std::mem::take(&mut pool.fee_amount);
                if amount > 0 {
                    claimed.push(ClaimedFee {
                        reserve_pool_id: id as u16,
                        asset: pool.asset,
                        amount,
                    });
                }
            }
            let mut payouts = Vec::with_capacity(claimed.len());
            for c in &claimed {
                m.debit_asset_pool(&c.asset, c.amount)?;
                payouts.push((c.asset, *receiver, c.amount));
            }
            m.push_assets(bank, &payouts)?;

            tracing::info!(
                "Manager claimed fees from {} reserve pools to {}",
                claimed.len(),
                receiver.short()
            );
            Ok(claimed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_core::WAD;
    use crate::test_utils::Fixture;

    #[test]
    fn test_fee_drip_and_claim() {
        let mut f = Fixture::new();
        f.stake(f.alice, 1_000);
        f.deposit(f.bob, 2_000);
        f.fee_model.set_factor(WAD / 10);

        f.advance(1);
        let keeper = f.ctx(f.alice);
        f.module.drip_fees(&keeper).unwrap();
        let pool = f.module.reserve_pool(0).unwrap();
        assert_eq!(pool.stake_amount, 900);
        assert_eq!(pool.deposit_amount, 1_800);
        assert_eq!(pool.fee_amount, 300);

        f.fee_model.set_factor(0);
        let treasury = bulwark_core::Address::from_label("treasury");
        let stranger = f.ctx(f.alice);
        assert!(matches!(
            f.module.claim_fees(&stranger, &mut f.bank, &treasury),
            Err(BulwarkError::Unauthorized(_))
        ));

        let manager = f.ctx(f.manager);
        let claimed = f.module.claim_fees(&manager, &mut f.bank, &treasury).unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].amount, 300);
        assert_eq!(f.bank.balance_of(&f.reserve_asset, &treasury), 300);
        assert_eq!(f.module.reserve_pool(0).unwrap().fee_amount, 0);
        assert_eq!(f.module.asset_pool(&f.reserve_asset).amount, 2_700);
    }

    #[test]
    fn test_pending_redemptions_are_not_charged() {
        let mut f = Fixture::new();
        f.stake(f.alice, 1_000);
        let alice = f.ctx(f.alice);
        f.module
            .unstake(&alice, &mut f.bank, 0, 400, &f.alice, &f.alice)
            .unwrap();

        f.fee_model.set_factor(WAD / 2);
        f.advance(1);
        let keeper = f.ctx(f.alice);
        f.module.drip_fees(&keeper).unwrap();
        let pool = f.module.reserve_pool(0).unwrap();
        assert_eq!(pool.fee_amount, 300);
        assert_eq!(pool.pending_unstakes_amount, 400);
        assert_eq!(pool.stake_amount, 700);
    }
}

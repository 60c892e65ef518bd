// crates/bulwark-module/src/redemption.rs
//
// Redemption queue.
//
// Unstakes and withdrawals burn receipt tokens immediately and queue the
// asset amount under a new id. The assets stay in the pool (staked assets
// stay slashable) until `complete_redemption` is called after the delay
// captured at queue time. While paused, redemptions complete immediately;
// while triggered, completion waits for the pending slashes.

use bulwark_core::math::{BulwarkResult, SafeMath};
use bulwark_core::{Address, AssetBank, BulwarkError};

use crate::conversion::to_asset_amount;
use crate::module::{CallContext, SafetyModule};
use crate::state::SafetyModuleState;
use crate::types::{Redemption, RedemptionKind};

impl SafetyModule {
    /// Token and pool amount a redemption of `kind` converts against.
    fn redemption_basis(&self, kind: RedemptionKind, idx: usize) -> BulwarkResult<(Address, u128)> {
        let pool = &self.reserve_pools[idx];
        match kind {
            RedemptionKind::Unstake => Ok((pool.stake_receipt_token, pool.redeemable_stake()?)),
            RedemptionKind::Withdraw => Ok((pool.deposit_receipt_token, pool.redeemable_deposits()?)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn queue_redemption(
        &mut self,
        ctx: &CallContext,
        bank: &mut dyn AssetBank,
        kind: RedemptionKind,
        reserve_pool_id: u16,
        receipt_amount: u128,
        receiver: &Address,
        owner: &Address,
    ) -> BulwarkResult<(u64, u128)> {
        let idx = self.check_reserve_pool_id(reserve_pool_id)?;
        self.drip_all(ctx.now)?;

        let (token, basis) = self.redemption_basis(kind, idx)?;
        let supply = self.token(&token)?.total_supply();
        let asset_amount = to_asset_amount(receipt_amount, supply, basis)?;
        if asset_amount == 0 {
            return Err(BulwarkError::RoundsToZero);
        }

        if ctx.caller != *owner {
            self.token_mut(&token)?
                .spend_allowance(owner, &ctx.caller, receipt_amount)?;
        }
        if kind == RedemptionKind::Unstake {
            self.accrue_user_rewards(reserve_pool_id, owner)?;
        }
        self.token_mut(&token)?.burn(owner, receipt_amount)?;

        let pool = &mut self.reserve_pools[idx];
        let delay = match kind {
            RedemptionKind::Unstake => {
                pool.pending_unstakes_amount = pool.pending_unstakes_amount.safe_add(asset_amount)?;
                self.delays.unstake_delay
            }
            RedemptionKind::Withdraw => {
                pool.pending_withdrawals_amount =
                    pool.pending_withdrawals_amount.safe_add(asset_amount)?;
                self.delays.withdraw_delay
            }
        };

        let id = self.next_redemption_id;
        self.next_redemption_id = id.safe_add(1)?;
        self.redemptions.insert(
            id,
            Redemption {
                id,
                kind,
                reserve_pool_id,
                owner: *owner,
                receiver: *receiver,
                receipt_amount,
                asset_amount,
                queued_at: ctx.now,
                delay,
            },
        );
        tracing::info!(
            "{} redemption {} queued: {} receipt tokens of reserve pool {} for {} assets, ready at {}",
            kind,
            id,
            receipt_amount,
            reserve_pool_id,
            asset_amount,
            ctx.now.saturating_add(delay)
        );

        let immediate = self.state == SafetyModuleState::Paused
            || (delay == 0 && self.state == SafetyModuleState::Active);
        if immediate {
            self.complete_redemption_internal(bank, id)?;
        }
        Ok((id, asset_amount))
    }

    fn complete_redemption_internal(&mut self, bank: &mut dyn AssetBank, id: u64) -> BulwarkResult<u128> {
        let redemption = self
            .redemptions
            .remove(&id)
            .ok_or_else(|| BulwarkError::NotFound(format!("redemption {}", id)))?;
        let idx = self.check_reserve_pool_id(redemption.reserve_pool_id)?;
        let amount = redemption.asset_amount;

        let pool = &mut self.reserve_pools[idx];
        match redemption.kind {
            RedemptionKind::Unstake => {
                pool.stake_amount = pool.stake_amount.safe_sub(amount)?;
                pool.pending_unstakes_amount = pool.pending_unstakes_amount.safe_sub(amount)?;
            }
            RedemptionKind::Withdraw => {
                pool.deposit_amount = pool.deposit_amount.safe_sub(amount)?;
                pool.pending_withdrawals_amount = pool.pending_withdrawals_amount.safe_sub(amount)?;
            }
        }
        let asset = pool.asset;
        self.debit_asset_pool(&asset, amount)?;
        self.push_assets(bank, &[(asset, redemption.receiver, amount)])?;

        tracing::info!(
            "{} redemption {} completed: {} assets to {}",
            redemption.kind,
            id,
            amount,
            redemption.receiver.short()
        );
        Ok(amount)
    }

    /// Burn `stake_receipt_amount` of `owner`'s stake receipt tokens and
    /// queue their assets for `receiver`. A caller other than `owner`
    /// spends its allowance.
    ///
    /// Returns `(redemption id, asset amount)`.
    pub fn unstake(
        &mut self,
        ctx: &CallContext,
        bank: &mut dyn AssetBank,
        reserve_pool_id: u16,
        stake_receipt_amount: u128,
        receiver: &Address,
        owner: &Address,
    ) -> BulwarkResult<(u64, u128)> {
        self.transact("unstake", |m| {
            m.queue_redemption(
                ctx,
                bank,
                RedemptionKind::Unstake,
                reserve_pool_id,
                stake_receipt_amount,
                receiver,
                owner,
            )
        })
    }

    /// Burn deposit receipt tokens and queue a withdrawal.
    pub fn redeem(
        &mut self,
        ctx: &CallContext,
        bank: &mut dyn AssetBank,
        reserve_pool_id: u16,
        deposit_receipt_amount: u128,
        receiver: &Address,
        owner: &Address,
    ) -> BulwarkResult<(u64, u128)> {
        self.transact("redeem", |m| {
            m.queue_redemption(
                ctx,
                bank,
                RedemptionKind::Withdraw,
                reserve_pool_id,
                deposit_receipt_amount,
                receiver,
                owner,
            )
        })
    }

    /// Pay out a queued redemption once its delay has elapsed. Callable by
    /// anyone; the assets go to the redemption's receiver.
    pub fn complete_redemption(
        &mut self,
        ctx: &CallContext,
        bank: &mut dyn AssetBank,
        id: u64,
    ) -> BulwarkResult<u128> {
        self.transact("complete_redemption", |m| {
            let ready_at = m
                .redemptions
                .get(&id)
                .map(Redemption::ready_at)
                .ok_or_else(|| BulwarkError::NotFound(format!("redemption {}", id)))?;
            match m.state {
                SafetyModuleState::Triggered => {
                    return Err(BulwarkError::InvalidState(
                        "redemptions cannot complete while triggered".to_string(),
                    ))
                }
                SafetyModuleState::Active if ctx.now < ready_at => {
                    return Err(BulwarkError::DelayNotElapsed {
                        ready_at,
                        now: ctx.now,
                    })
                }
                _ => {}
            }
            m.drip_all(ctx.now)?;
            m.complete_redemption_internal(bank, id)
        })
    }

    /// Burn reward-deposit receipt tokens for their share of the reward
    /// pool's undripped balance, paid out immediately.
    pub fn redeem_undripped_rewards(
        &mut self,
        ctx: &CallContext,
        bank: &mut dyn AssetBank,
        reward_pool_id: u16,
        receipt_amount: u128,
        receiver: &Address,
        owner: &Address,
    ) -> BulwarkResult<u128> {
        self.transact("redeem_undripped_rewards", |m| {
            let idx = m.check_reward_pool_id(reward_pool_id)?;
            m.drip_all(ctx.now)?;

            let pool = &m.reward_pools[idx];
            let (asset, token, basis) = (pool.asset, pool.deposit_receipt_token, pool.undripped_rewards);
            let supply = m.token(&token)?.total_supply();
            let amount = to_asset_amount(receipt_amount, supply, basis)?;
            if amount == 0 {
                return Err(BulwarkError::RoundsToZero);
            }

            if ctx.caller != *owner {
                m.token_mut(&token)?
                    .spend_allowance(owner, &ctx.caller, receipt_amount)?;
            }
            m.token_mut(&token)?.burn(owner, receipt_amount)?;
            let pool = &mut m.reward_pools[idx];
            pool.undripped_rewards = pool.undripped_rewards.safe_sub(amount)?;
            m.debit_asset_pool(&asset, amount)?;
            m.push_assets(bank, &[(asset, *receiver, amount)])?;

            tracing::info!(
                "{} redeemed {} undripped rewards from reward pool {}",
                owner.short(),
                amount,
                reward_pool_id
            );
            Ok(amount)
        })
    }

    /// Assets `receipt_amount` would queue for at `now`, drips included.
    pub fn preview_redemption(
        &self,
        kind: RedemptionKind,
        reserve_pool_id: u16,
        receipt_amount: u128,
        now: u64,
    ) -> BulwarkResult<u128> {
        let idx = self.check_reserve_pool_id(reserve_pool_id)?;
        let mut sim = self.clone();
        sim.drip_all(now)?;
        let (token, basis) = sim.redemption_basis(kind, idx)?;
        to_asset_amount(receipt_amount, sim.token(&token)?.total_supply(), basis)
    }
}

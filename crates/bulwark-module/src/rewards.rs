// crates/bulwark-module/src/rewards.rs
//
// Rewards ledger.
//
// Every (reserve pool, reward pool) pair carries a WAD-scaled index of
// rewards per stake receipt token. A drip pass folds each reward pool's
// newly dripped amount into every reserve pool's index in proportion to
// the reserve pool's weight:
//
//   share   = floor(cumulative_dripped * weight / ZOC)
//   index  += floor((share - cumulative_claimed) * 1e18 / stake_supply)
//   cumulative_claimed = share
//
// When no stake receipt tokens exist the share is forfeited rather than
// credited to a later first staker.
//
// A user's claimable amount is `accrued + balance * (index - snapshot)`.
// Every balance change of a stake receipt token touches the holder first.

use serde::{Deserialize, Serialize};

use bulwark_core::math::{mul_div_down, to_u128, BulwarkResult, SafeMath, U256, WAD, ZOC};
use bulwark_core::{Address, AssetBank, BulwarkError};

use crate::drip::{compute_drip, elapsed_since};
use crate::module::{CallContext, SafetyModule};
use crate::receipt_token::ReceiptTokenKind;
use crate::types::{ClaimedReward, UserRewardsData};

/// Claimable rewards of one user in one reserve pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewClaimableRewards {
    pub reserve_pool_id: u16,
    pub claimable_rewards: Vec<ClaimedReward>,
}

impl SafetyModule {
    /// Drip every reward pool and fold the drips into the indices.
    ///
    /// All drips are computed before any pool is updated, so a bad drip
    /// factor aborts the pass without partial updates.
    pub(crate) fn drip_rewards_internal(&mut self, now: u64) -> BulwarkResult<()> {
        if self.drips_frozen() {
            return Ok(());
        }

        let mut dripped = Vec::with_capacity(self.reward_pools.len());
        for pool in &self.reward_pools {
            dripped.push(compute_drip(
                pool.drip_model.as_ref(),
                pool.undripped_rewards,
                elapsed_since(pool.last_drip_time, now),
            )?);
        }

        for (id, (pool, amount)) in self.reward_pools.iter_mut().zip(&dripped).enumerate() {
            pool.undripped_rewards = pool.undripped_rewards.safe_sub(*amount)?;
            pool.cumulative_dripped_rewards = pool.cumulative_dripped_rewards.safe_add(*amount)?;
            pool.last_drip_time = pool.last_drip_time.max(now);
            if *amount > 0 {
                tracing::debug!(
                    "Reward pool {} dripped {} ({} undripped)",
                    id,
                    amount,
                    pool.undripped_rewards
                );
            }
        }

        self.update_claimable_indices()
    }

    fn update_claimable_indices(&mut self) -> BulwarkResult<()> {
        let mut supplies = Vec::with_capacity(self.reserve_pools.len());
        for pool in &self.reserve_pools {
            supplies.push(self.token(&pool.stake_receipt_token)?.total_supply());
        }

        let reward_pools = &self.reward_pools;
        for (r, reserve) in self.reserve_pools.iter().enumerate() {
            let weight = reserve.rewards_pool_weight as u128;
            for (w, reward) in reward_pools.iter().enumerate() {
                let entry = &mut self.claimable_rewards[r][w];
                let share = mul_div_down(reward.cumulative_dripped_rewards, weight, ZOC as u128)?;
                let unclaimed = share.safe_sub(entry.cumulative_claimed_rewards)?;
                if unclaimed > 0 && supplies[r] > 0 {
                    // unclaimed * WAD fits in 256 bits for any u128 operands.
                    let delta = U256::from(unclaimed) * U256::from(WAD) / U256::from(supplies[r]);
                    entry.index_snapshot = entry.index_snapshot.safe_add(delta)?;
                }
                entry.cumulative_claimed_rewards = share;
            }
        }
        Ok(())
    }

    /// Bring `user`'s ledger entries for one reserve pool up to the current
    /// indices, using their current stake receipt balance.
    pub(crate) fn accrue_user_rewards(&mut self, reserve_pool_id: u16, user: &Address) -> BulwarkResult<()> {
        let r = self.check_reserve_pool_id(reserve_pool_id)?;
        let balance = self
            .token(&self.reserve_pools[r].stake_receipt_token)?
            .balance_of(user);

        let indices = &self.claimable_rewards[r];
        let entries = self.user_rewards.entry((reserve_pool_id, *user)).or_default();
        entries.resize(indices.len(), UserRewardsData::default());
        for (entry, claimable) in entries.iter_mut().zip(indices) {
            let delta = claimable.index_snapshot.safe_sub(entry.index_snapshot)?;
            if !delta.is_zero() && balance > 0 {
                let earned = U256::from(balance).safe_mul(delta)? / U256::from(WAD);
                entry.accrued_rewards = entry.accrued_rewards.safe_add(to_u128(earned)?)?;
            }
            entry.index_snapshot = claimable.index_snapshot;
        }
        Ok(())
    }

    /// Drip reward pools. Callable by anyone; a no-op while paused.
    pub fn drip_rewards(&mut self, ctx: &CallContext) -> BulwarkResult<()> {
        self.transact("drip_rewards", |m| m.drip_rewards_internal(ctx.now))
    }

    /// Pay the caller's accrued rewards in one reserve pool to `receiver`.
    pub fn claim_rewards(
        &mut self,
        ctx: &CallContext,
        bank: &mut dyn AssetBank,
        reserve_pool_id: u16,
        receiver: &Address,
    ) -> BulwarkResult<Vec<ClaimedReward>> {
        self.transact("claim_rewards", |m| {
            m.check_reserve_pool_id(reserve_pool_id)?;
            m.drip_all(ctx.now)?;
            m.accrue_user_rewards(reserve_pool_id, &ctx.caller)?;

            let mut claimed = Vec::new();
            let mut payouts = Vec::new();
            if let Some(entries) = m.user_rewards.get_mut(&(reserve_pool_id, ctx.caller)) {
                for (id, entry) in entries.iter_mut().enumerate() {
                    let amount = std::mem::take(&mut entry.accrued_rewards);
                    let asset = m.reward_pools[id].asset;
                    claimed.push(ClaimedReward {
                        reward_pool_id: id as u16,
                        asset,
                        amount,
                    });
                    if amount > 0 {
                        payouts.push((asset, *receiver, amount));
                    }
                }
            }
            for (asset, _, amount) in &payouts {
                m.debit_asset_pool(asset, *amount)?;
            }
            m.push_assets(bank, &payouts)?;

            tracing::debug!(
                "{} claimed rewards of reserve pool {}: {:?}",
                ctx.caller.short(),
                reserve_pool_id,
                claimed.iter().map(|c| c.amount).collect::<Vec<_>>()
            );
            Ok(claimed)
        })
    }

    /// Accrual hook run before a stake receipt token moves between holders.
    ///
    /// Only a stake receipt token of this module may call it; the pool is
    /// identified by the calling token.
    pub fn update_user_rewards_for_stake_token_transfer(
        &mut self,
        ctx: &CallContext,
        from: &Address,
        to: &Address,
    ) -> BulwarkResult<()> {
        self.transact("update_user_rewards_for_stake_token_transfer", |m| {
            let reserve_pool_id = match m.receipt_tokens.get(&ctx.caller) {
                Some(token) if token.kind == ReceiptTokenKind::Stake && token.module == m.address => {
                    token.pool_id
                }
                _ => {
                    return Err(BulwarkError::Unauthorized(format!(
                        "{} is not a stake receipt token of this module",
                        ctx.caller.short()
                    )))
                }
            };
            m.drip_rewards_internal(ctx.now)?;
            m.accrue_user_rewards(reserve_pool_id, from)?;
            m.accrue_user_rewards(reserve_pool_id, to)
        })
    }

    /// Move the caller's receipt tokens. Stake receipt tokens settle both
    /// holders' rewards first.
    pub fn transfer_receipt_tokens(
        &mut self,
        ctx: &CallContext,
        token: &Address,
        to: &Address,
        amount: u128,
    ) -> BulwarkResult<()> {
        self.transact("transfer_receipt_tokens", |m| {
            let kind = m.token(token)?.kind;
            if kind == ReceiptTokenKind::Stake {
                let hook_ctx = CallContext::new(*token, ctx.now);
                m.update_user_rewards_for_stake_token_transfer(&hook_ctx, &ctx.caller, to)?;
            }
            m.token_mut(token)?.transfer(&ctx.caller, to, amount)
        })
    }

    /// Let `spender` redeem up to `amount` of the caller's receipt tokens.
    pub fn approve_receipt_tokens(
        &mut self,
        ctx: &CallContext,
        token: &Address,
        spender: &Address,
        amount: u128,
    ) -> BulwarkResult<()> {
        self.token_mut(token)?.approve(&ctx.caller, spender, amount);
        Ok(())
    }

    /// What `claim_rewards` would pay `user` at `now`, per reserve pool.
    ///
    /// Runs the drip on a scratch copy; the module itself is untouched.
    pub fn preview_claimable_rewards(
        &self,
        reserve_pool_ids: &[u16],
        user: &Address,
        now: u64,
    ) -> BulwarkResult<Vec<PreviewClaimableRewards>> {
        let mut sim = self.clone();
        sim.drip_all(now)?;

        let mut previews = Vec::with_capacity(reserve_pool_ids.len());
        for &reserve_pool_id in reserve_pool_ids {
            sim.accrue_user_rewards(reserve_pool_id, user)?;
            let entries = sim.user_rewards(reserve_pool_id, user);
            let claimable_rewards = entries
                .iter()
                .enumerate()
                .map(|(id, entry)| ClaimedReward {
                    reward_pool_id: id as u16,
                    asset: sim.reward_pools[id].asset,
                    amount: entry.accrued_rewards,
                })
                .collect();
            previews.push(PreviewClaimableRewards {
                reserve_pool_id,
                claimable_rewards,
            });
        }
        Ok(previews)
    }
}

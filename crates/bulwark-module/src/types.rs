// crates/bulwark-module/src/types.rs
//
// Pool, ledger and queue records owned by a SafetyModule.
//
// All amounts are in the smallest unit of the underlying asset. Pools are
// addressed by dense u16 ids assigned in creation order; ids are never
// reused or removed.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use bulwark_core::math::{u256_dec, BulwarkResult, SafeMath, U256};
use bulwark_core::{Address, AssetId, DripModel};

/// Staked and deposited collateral backing the module's triggers.
///
/// `pending_unstakes_amount` is part of `stake_amount` and
/// `pending_withdrawals_amount` is part of `deposit_amount`: queued
/// redemptions keep their assets in the pool (and slashable, for stake)
/// until completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservePool {
    pub asset: AssetId,
    pub stake_receipt_token: Address,
    pub deposit_receipt_token: Address,
    pub stake_amount: u128,
    pub deposit_amount: u128,
    pub pending_unstakes_amount: u128,
    pub pending_withdrawals_amount: u128,
    /// Fees dripped out of stake and deposits, claimable by the manager.
    pub fee_amount: u128,
    /// WAD-scaled, at most 1e18.
    pub max_slash_percentage: u128,
    /// Share of every reward drip, in parts of ZOC.
    pub rewards_pool_weight: u16,
    pub last_fees_drip_time: u64,
}

impl ReservePool {
    /// Stake still backing outstanding stake receipt tokens.
    pub fn redeemable_stake(&self) -> BulwarkResult<u128> {
        self.stake_amount.safe_sub(self.pending_unstakes_amount)
    }

    /// Deposits still backing outstanding deposit receipt tokens.
    pub fn redeemable_deposits(&self) -> BulwarkResult<u128> {
        self.deposit_amount.safe_sub(self.pending_withdrawals_amount)
    }
}

/// Incentive assets dripped to stakers over time.
#[derive(Clone)]
pub struct RewardPool {
    pub asset: AssetId,
    pub drip_model: Arc<dyn DripModel>,
    pub deposit_receipt_token: Address,
    pub undripped_rewards: u128,
    /// Dripped since the last configuration finalize.
    pub cumulative_dripped_rewards: u128,
    pub last_drip_time: u64,
}

impl fmt::Debug for RewardPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewardPool")
            .field("asset", &self.asset)
            .field("drip_model", &self.drip_model.id())
            .field("deposit_receipt_token", &self.deposit_receipt_token)
            .field("undripped_rewards", &self.undripped_rewards)
            .field("cumulative_dripped_rewards", &self.cumulative_dripped_rewards)
            .field("last_drip_time", &self.last_drip_time)
            .finish()
    }
}

/// Module-side bookkeeping of one underlying asset across all pools.
///
/// Independent of the bank: a bank balance above `amount` means assets
/// were donated or sent without going through a deposit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPool {
    pub amount: u128,
}

/// Index state of one (reserve pool, reward pool) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableRewardsData {
    /// Cumulative rewards per stake receipt token, WAD-scaled.
    #[serde(with = "u256_dec")]
    pub index_snapshot: U256,
    /// Weighted share of the reward pool's cumulative drip already folded
    /// into `index_snapshot`.
    pub cumulative_claimed_rewards: u128,
}

/// A user's position in one (reserve pool, reward pool) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRewardsData {
    pub accrued_rewards: u128,
    #[serde(with = "u256_dec")]
    pub index_snapshot: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedemptionKind {
    /// Stake receipt tokens burned against staked assets.
    Unstake,
    /// Deposit receipt tokens burned against deposited assets.
    Withdraw,
}

impl fmt::Display for RedemptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedemptionKind::Unstake => write!(f, "Unstake"),
            RedemptionKind::Withdraw => write!(f, "Withdraw"),
        }
    }
}

/// A queued redemption. Receipt tokens are already burned; the asset
/// amount is fixed at queue time except that slashes shrink unstakes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: u64,
    pub kind: RedemptionKind,
    pub reserve_pool_id: u16,
    pub owner: Address,
    pub receiver: Address,
    pub receipt_amount: u128,
    pub asset_amount: u128,
    pub queued_at: u64,
    /// Delay captured at queue time; later config changes do not apply.
    pub delay: u64,
}

impl Redemption {
    pub fn ready_at(&self) -> u64 {
        self.queued_at.saturating_add(self.delay)
    }
}

/// Registration of a trigger with this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerData {
    pub exists: bool,
    pub payout_handler: Address,
    /// One-way: set when the trigger fires against this module.
    pub triggered: bool,
}

/// One reserve pool's share of a slash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slash {
    pub reserve_pool_id: u16,
    pub amount: u128,
}

/// Asset paid out by a claim, per reward pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedReward {
    pub reward_pool_id: u16,
    pub asset: AssetId,
    pub amount: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ReservePool {
        ReservePool {
            asset: Address::from_label("asset"),
            stake_receipt_token: Address::from_label("stk"),
            deposit_receipt_token: Address::from_label("dep"),
            stake_amount: 100,
            deposit_amount: 50,
            pending_unstakes_amount: 30,
            pending_withdrawals_amount: 50,
            fee_amount: 0,
            max_slash_percentage: 0,
            rewards_pool_weight: 0,
            last_fees_drip_time: 0,
        }
    }

    #[test]
    fn test_redeemable_amounts_exclude_pending() {
        let p = pool();
        assert_eq!(p.redeemable_stake().unwrap(), 70);
        assert_eq!(p.redeemable_deposits().unwrap(), 0);
    }

    #[test]
    fn test_redemption_ready_at_saturates() {
        let r = Redemption {
            id: 0,
            kind: RedemptionKind::Unstake,
            reserve_pool_id: 0,
            owner: Address::ZERO,
            receiver: Address::ZERO,
            receipt_amount: 1,
            asset_amount: 1,
            queued_at: u64::MAX - 1,
            delay: 10,
        };
        assert_eq!(r.ready_at(), u64::MAX);
    }
}

// crates/bulwark-module/src/module.rs
//
// The SafetyModule aggregate.
//
// One owned value holds every pool, ledger and queue of a module instance.
// Each component (depositor, redemption, rewards, fees, config, state,
// slash) adds its operations in its own `impl SafetyModule` block and
// touches only the fields it needs. No state is shared between module
// instances apart from the read-only collaborators (drip models, triggers,
// manager).
//
// Every public mutating operation runs through `transact`: the aggregate is
// snapshotted before the body runs and restored if it returns an error, so
// a failed call leaves no partial mutation behind. Bank transfers are the
// last step of an operation and are pre-checked where they move assets out.

use std::collections::BTreeMap;
use std::sync::Arc;

use bulwark_core::math::{BulwarkResult, SafeMath};
use bulwark_core::{Address, AssetBank, AssetId, BulwarkError, Manager};

use crate::config::{validate_update, ConfigUpdateMetadata, Delays, UpdateConfigsParams};
use crate::receipt_token::ReceiptToken;
use crate::state::SafetyModuleState;
use crate::types::{
    AssetPool, ClaimableRewardsData, Redemption, ReservePool, RewardPool, TriggerData,
    UserRewardsData,
};

/// Who is calling and when. Every entry point reads time from here only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub now: u64,
}

impl CallContext {
    pub fn new(caller: Address, now: u64) -> Self {
        Self { caller, now }
    }
}

/// A safety module instance.
#[derive(Clone)]
pub struct SafetyModule {
    pub(crate) address: Address,
    pub(crate) owner: Address,
    pub(crate) pauser: Address,
    pub(crate) manager: Arc<dyn Manager>,
    pub(crate) state: SafetyModuleState,
    pub(crate) reserve_pools: Vec<ReservePool>,
    pub(crate) reward_pools: Vec<RewardPool>,
    pub(crate) asset_pools: BTreeMap<AssetId, AssetPool>,
    pub(crate) receipt_tokens: BTreeMap<Address, ReceiptToken>,
    /// Indexed `[reserve_pool_id][reward_pool_id]`.
    pub(crate) claimable_rewards: Vec<Vec<ClaimableRewardsData>>,
    /// Keyed by (reserve pool id, user); one entry per reward pool.
    pub(crate) user_rewards: BTreeMap<(u16, Address), Vec<UserRewardsData>>,
    pub(crate) redemptions: BTreeMap<u64, Redemption>,
    pub(crate) next_redemption_id: u64,
    pub(crate) delays: Delays,
    pub(crate) triggers: BTreeMap<Address, TriggerData>,
    pub(crate) num_pending_slashes: u16,
    pub(crate) payout_handler_num_pending_slashes: BTreeMap<Address, u16>,
    pub(crate) last_config_update: ConfigUpdateMetadata,
}

impl SafetyModule {
    /// Deploy a module with its initial configuration applied immediately.
    ///
    /// The configuration is validated exactly like a queued update against
    /// an empty module. `bank` is only read, for asset decimals.
    ///
    /// # Errors
    /// Returns `BulwarkError::InvalidConfiguration` if `params` is invalid.
    pub fn new(
        address: Address,
        owner: Address,
        pauser: Address,
        manager: Arc<dyn Manager>,
        bank: &dyn AssetBank,
        params: &UpdateConfigsParams,
        now: u64,
    ) -> BulwarkResult<Self> {
        validate_update(
            params,
            &[],
            &[],
            &BTreeMap::new(),
            manager.allowed_reserve_pools(),
            manager.allowed_reward_pools(),
        )?;

        let mut module = Self {
            address,
            owner,
            pauser,
            manager,
            state: SafetyModuleState::Active,
            reserve_pools: Vec::new(),
            reward_pools: Vec::new(),
            asset_pools: BTreeMap::new(),
            receipt_tokens: BTreeMap::new(),
            claimable_rewards: Vec::new(),
            user_rewards: BTreeMap::new(),
            redemptions: BTreeMap::new(),
            next_redemption_id: 0,
            delays: params.delays_config,
            triggers: BTreeMap::new(),
            num_pending_slashes: 0,
            payout_handler_num_pending_slashes: BTreeMap::new(),
            last_config_update: ConfigUpdateMetadata::default(),
        };
        module.apply_config_update(bank, params, now)?;

        tracing::info!(
            "Safety module {} deployed: {} reserve pools, {} reward pools",
            address.short(),
            module.reserve_pools.len(),
            module.reward_pools.len()
        );
        Ok(module)
    }

    /// Run `op` atomically: on error the module is restored to its state
    /// before the call.
    pub(crate) fn transact<T>(
        &mut self,
        name: &str,
        op: impl FnOnce(&mut Self) -> BulwarkResult<T>,
    ) -> BulwarkResult<T> {
        let snapshot = self.clone();
        match op(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!("{} reverted: {}", name, e);
                *self = snapshot;
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------
    // Roles
    // -----------------------------------------------------------------

    pub(crate) fn is_manager(&self, caller: &Address) -> bool {
        *caller == self.manager.id()
    }

    pub(crate) fn require_owner(&self, ctx: &CallContext) -> BulwarkResult<()> {
        if ctx.caller != self.owner {
            return Err(BulwarkError::Unauthorized(format!(
                "{} is not the owner",
                ctx.caller.short()
            )));
        }
        Ok(())
    }

    pub(crate) fn require_owner_or_manager(&self, ctx: &CallContext) -> BulwarkResult<()> {
        if ctx.caller != self.owner && !self.is_manager(&ctx.caller) {
            return Err(BulwarkError::Unauthorized(format!(
                "{} is neither owner nor manager",
                ctx.caller.short()
            )));
        }
        Ok(())
    }

    /// Hand the pauser role to `new_pauser`. Owner only.
    pub fn update_pauser(&mut self, ctx: &CallContext, new_pauser: Address) -> BulwarkResult<()> {
        self.require_owner(ctx)?;
        tracing::info!("Pauser updated: {} -> {}", self.pauser.short(), new_pauser.short());
        self.pauser = new_pauser;
        Ok(())
    }

    /// Hand ownership to `new_owner`. Owner only.
    pub fn transfer_ownership(&mut self, ctx: &CallContext, new_owner: Address) -> BulwarkResult<()> {
        self.require_owner(ctx)?;
        if new_owner.is_zero() {
            return Err(BulwarkError::InvalidConfiguration(
                "owner cannot be the zero address".to_string(),
            ));
        }
        tracing::info!("Ownership transferred: {} -> {}", self.owner.short(), new_owner.short());
        self.owner = new_owner;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Checked lookups
    // -----------------------------------------------------------------

    pub(crate) fn check_reserve_pool_id(&self, id: u16) -> BulwarkResult<usize> {
        let idx = id as usize;
        if idx >= self.reserve_pools.len() {
            return Err(BulwarkError::OutOfBounds {
                kind: "reserve",
                id,
                len: self.reserve_pools.len(),
            });
        }
        Ok(idx)
    }

    pub(crate) fn check_reward_pool_id(&self, id: u16) -> BulwarkResult<usize> {
        let idx = id as usize;
        if idx >= self.reward_pools.len() {
            return Err(BulwarkError::OutOfBounds {
                kind: "reward",
                id,
                len: self.reward_pools.len(),
            });
        }
        Ok(idx)
    }

    pub(crate) fn token(&self, address: &Address) -> BulwarkResult<&ReceiptToken> {
        self.receipt_tokens
            .get(address)
            .ok_or_else(|| BulwarkError::NotFound(format!("receipt token {}", address.short())))
    }

    pub(crate) fn token_mut(&mut self, address: &Address) -> BulwarkResult<&mut ReceiptToken> {
        self.receipt_tokens
            .get_mut(address)
            .ok_or_else(|| BulwarkError::NotFound(format!("receipt token {}", address.short())))
    }

    // -----------------------------------------------------------------
    // Asset bookkeeping
    // -----------------------------------------------------------------

    pub(crate) fn credit_asset_pool(&mut self, asset: &AssetId, amount: u128) -> BulwarkResult<()> {
        let pool = self.asset_pools.entry(*asset).or_default();
        pool.amount = pool.amount.safe_add(amount)?;
        Ok(())
    }

    pub(crate) fn debit_asset_pool(&mut self, asset: &AssetId, amount: u128) -> BulwarkResult<()> {
        let pool = self.asset_pools.entry(*asset).or_default();
        pool.amount = pool.amount.safe_sub(amount)?;
        Ok(())
    }

    /// Reject a deposit of `amount` that the bank balance does not cover.
    ///
    /// `incoming` is what the caller is about to transfer in as part of the
    /// same operation (zero for the without-transfer variants).
    pub(crate) fn check_deposit_backed(
        &self,
        bank: &dyn AssetBank,
        asset: &AssetId,
        amount: u128,
        incoming: u128,
    ) -> BulwarkResult<()> {
        let tracked = self.asset_pool(asset).amount.safe_add(amount)?;
        let held = bank.balance_of(asset, &self.address).safe_add(incoming)?;
        if held < tracked {
            return Err(BulwarkError::InvalidDeposit(format!(
                "module holds {} of asset {} but would track {}",
                held,
                asset.short(),
                tracked
            )));
        }
        Ok(())
    }

    /// Pay out `(asset, receiver, amount)` triples from the module.
    ///
    /// All balances are checked before the first transfer so that either
    /// every payout happens or none does.
    pub(crate) fn push_assets(
        &self,
        bank: &mut dyn AssetBank,
        payouts: &[(AssetId, Address, u128)],
    ) -> BulwarkResult<()> {
        let mut totals: BTreeMap<AssetId, u128> = BTreeMap::new();
        for (asset, _, amount) in payouts {
            let total = totals.entry(*asset).or_insert(0);
            *total = total.safe_add(*amount)?;
        }
        for (asset, total) in &totals {
            let held = bank.balance_of(asset, &self.address);
            if held < *total {
                return Err(BulwarkError::InsufficientBalance(format!(
                    "module holds {} of asset {} but owes {}",
                    held,
                    asset.short(),
                    total
                )));
            }
        }
        for (asset, receiver, amount) in payouts {
            if *amount > 0 {
                bank.transfer(asset, &self.address, receiver, *amount)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn pauser(&self) -> Address {
        self.pauser
    }

    pub fn manager_id(&self) -> Address {
        self.manager.id()
    }

    pub fn state(&self) -> SafetyModuleState {
        self.state
    }

    pub fn delays(&self) -> Delays {
        self.delays
    }

    pub fn last_config_update(&self) -> ConfigUpdateMetadata {
        self.last_config_update
    }

    pub fn num_pending_slashes(&self) -> u16 {
        self.num_pending_slashes
    }

    pub fn payout_handler_num_pending_slashes(&self, handler: &Address) -> u16 {
        self.payout_handler_num_pending_slashes
            .get(handler)
            .copied()
            .unwrap_or(0)
    }

    pub fn reserve_pools(&self) -> &[ReservePool] {
        &self.reserve_pools
    }

    pub fn reward_pools(&self) -> &[RewardPool] {
        &self.reward_pools
    }

    pub fn reserve_pool(&self, id: u16) -> BulwarkResult<&ReservePool> {
        let idx = self.check_reserve_pool_id(id)?;
        Ok(&self.reserve_pools[idx])
    }

    pub fn reward_pool(&self, id: u16) -> BulwarkResult<&RewardPool> {
        let idx = self.check_reward_pool_id(id)?;
        Ok(&self.reward_pools[idx])
    }

    pub fn asset_pool(&self, asset: &AssetId) -> AssetPool {
        self.asset_pools.get(asset).copied().unwrap_or_default()
    }

    pub fn receipt_token(&self, address: &Address) -> Option<&ReceiptToken> {
        self.receipt_tokens.get(address)
    }

    pub fn redemption(&self, id: u64) -> Option<&Redemption> {
        self.redemptions.get(&id)
    }

    pub fn redemptions(&self) -> impl Iterator<Item = &Redemption> {
        self.redemptions.values()
    }

    pub fn trigger_data(&self, trigger: &Address) -> Option<TriggerData> {
        self.triggers.get(trigger).copied()
    }

    pub fn claimable_rewards_data(
        &self,
        reserve_pool_id: u16,
        reward_pool_id: u16,
    ) -> BulwarkResult<ClaimableRewardsData> {
        let r = self.check_reserve_pool_id(reserve_pool_id)?;
        let w = self.check_reward_pool_id(reward_pool_id)?;
        Ok(self.claimable_rewards[r][w])
    }

    /// A user's per-reward-pool ledger entries for one reserve pool, as of
    /// their last accounting touch.
    pub fn user_rewards(&self, reserve_pool_id: u16, user: &Address) -> Vec<UserRewardsData> {
        self.user_rewards
            .get(&(reserve_pool_id, *user))
            .cloned()
            .unwrap_or_default()
    }

    /// Stake receipt token balance of `user` in a reserve pool.
    pub fn stake_receipt_balance(&self, reserve_pool_id: u16, user: &Address) -> BulwarkResult<u128> {
        let pool = self.reserve_pool(reserve_pool_id)?;
        Ok(self.token(&pool.stake_receipt_token)?.balance_of(user))
    }

    /// Deposit receipt token balance of `user` in a reserve pool.
    pub fn deposit_receipt_balance(&self, reserve_pool_id: u16, user: &Address) -> BulwarkResult<u128> {
        let pool = self.reserve_pool(reserve_pool_id)?;
        Ok(self.token(&pool.deposit_receipt_token)?.balance_of(user))
    }
}

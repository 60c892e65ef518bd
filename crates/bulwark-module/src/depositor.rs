// crates/bulwark-module/src/depositor.rs
//
// Stake and deposit entry points.
//
// Each has a pulling variant, which transfers the assets from the caller as
// its final step, and a `_without_transfer` variant for assets already sent
// to the module. Either way the module's bank balance must cover its
// tracked asset pool plus the new amount.

use bulwark_core::math::{BulwarkResult, SafeMath};
use bulwark_core::{Address, AssetBank, BulwarkError};

use crate::conversion::to_receipt_amount;
use crate::module::{CallContext, SafetyModule};
use crate::receipt_token::ReceiptTokenKind;
use crate::state::SafetyModuleState;

impl SafetyModule {
    fn require_not_paused(&self, action: &str) -> BulwarkResult<()> {
        if self.state == SafetyModuleState::Paused {
            return Err(BulwarkError::InvalidState(format!(
                "cannot {} while paused",
                action
            )));
        }
        Ok(())
    }

    /// Receipt tokens `amount` buys against `basis`, rejecting zero.
    ///
    /// Receipt tokens outstanding against an empty pool redeem for nothing.
    /// They are retired first so the deposit prices as the pool's first.
    fn shares_for(&mut self, token: &Address, basis: u128, amount: u128) -> BulwarkResult<u128> {
        if basis == 0 && amount > 0 && self.token(token)?.total_supply() > 0 {
            self.retire_worthless_receipts(token)?;
        }
        let supply = self.token(token)?.total_supply();
        let shares = to_receipt_amount(amount, supply, basis)?;
        if shares == 0 {
            return Err(BulwarkError::RoundsToZero);
        }
        Ok(shares)
    }

    fn retire_worthless_receipts(&mut self, token: &Address) -> BulwarkResult<()> {
        let (kind, pool_id, holders) = {
            let t = self.token(token)?;
            (t.kind, t.pool_id, t.holders())
        };
        // Stake holders keep the rewards earned up to now.
        if kind == ReceiptTokenKind::Stake {
            for holder in &holders {
                self.accrue_user_rewards(pool_id, holder)?;
            }
        }
        let retired = self.token_mut(token)?.retire_all();
        tracing::warn!(
            "Retired {} {} receipt tokens of pool {} from {} holders: pool is empty",
            retired,
            kind,
            pool_id,
            holders.len()
        );
        Ok(())
    }

    fn stake_internal(
        &mut self,
        ctx: &CallContext,
        bank: &dyn AssetBank,
        reserve_pool_id: u16,
        amount: u128,
        receiver: &Address,
        incoming: u128,
    ) -> BulwarkResult<u128> {
        self.require_not_paused("stake")?;
        let idx = self.check_reserve_pool_id(reserve_pool_id)?;
        self.drip_all(ctx.now)?;

        let pool = &self.reserve_pools[idx];
        let (asset, token) = (pool.asset, pool.stake_receipt_token);
        let basis = pool.redeemable_stake()?;
        let shares = self.shares_for(&token, basis, amount)?;
        self.check_deposit_backed(bank, &asset, amount, incoming)?;

        // Settle the receiver at the old balance before minting.
        self.accrue_user_rewards(reserve_pool_id, receiver)?;
        self.token_mut(&token)?.mint(receiver, shares)?;
        let pool = &mut self.reserve_pools[idx];
        pool.stake_amount = pool.stake_amount.safe_add(amount)?;
        self.credit_asset_pool(&asset, amount)?;

        tracing::info!(
            "{} staked {} into reserve pool {} for {} receipt tokens",
            receiver.short(),
            amount,
            reserve_pool_id,
            shares
        );
        Ok(shares)
    }

    /// Stake `amount` of the pool's asset pulled from the caller, minting
    /// stake receipt tokens to `receiver`.
    pub fn stake(
        &mut self,
        ctx: &CallContext,
        bank: &mut dyn AssetBank,
        reserve_pool_id: u16,
        amount: u128,
        receiver: &Address,
    ) -> BulwarkResult<u128> {
        self.transact("stake", |m| {
            let shares = m.stake_internal(ctx, &*bank, reserve_pool_id, amount, receiver, amount)?;
            let asset = m.reserve_pools[reserve_pool_id as usize].asset;
            bank.transfer(&asset, &ctx.caller, &m.address, amount)?;
            Ok(shares)
        })
    }

    /// Stake assets already transferred to the module.
    pub fn stake_without_transfer(
        &mut self,
        ctx: &CallContext,
        bank: &dyn AssetBank,
        reserve_pool_id: u16,
        amount: u128,
        receiver: &Address,
    ) -> BulwarkResult<u128> {
        self.transact("stake_without_transfer", |m| {
            m.stake_internal(ctx, bank, reserve_pool_id, amount, receiver, 0)
        })
    }

    fn deposit_reserve_internal(
        &mut self,
        ctx: &CallContext,
        bank: &dyn AssetBank,
        reserve_pool_id: u16,
        amount: u128,
        receiver: &Address,
        incoming: u128,
    ) -> BulwarkResult<u128> {
        self.require_not_paused("deposit")?;
        let idx = self.check_reserve_pool_id(reserve_pool_id)?;
        self.drip_all(ctx.now)?;

        let pool = &self.reserve_pools[idx];
        let (asset, token) = (pool.asset, pool.deposit_receipt_token);
        let basis = pool.redeemable_deposits()?;
        let shares = self.shares_for(&token, basis, amount)?;
        self.check_deposit_backed(bank, &asset, amount, incoming)?;

        self.token_mut(&token)?.mint(receiver, shares)?;
        let pool = &mut self.reserve_pools[idx];
        pool.deposit_amount = pool.deposit_amount.safe_add(amount)?;
        self.credit_asset_pool(&asset, amount)?;

        tracing::info!(
            "{} deposited {} into reserve pool {} for {} receipt tokens",
            receiver.short(),
            amount,
            reserve_pool_id,
            shares
        );
        Ok(shares)
    }

    /// Deposit withdrawable reserve assets pulled from the caller.
    pub fn deposit_reserve_assets(
        &mut self,
        ctx: &CallContext,
        bank: &mut dyn AssetBank,
        reserve_pool_id: u16,
        amount: u128,
        receiver: &Address,
    ) -> BulwarkResult<u128> {
        self.transact("deposit_reserve_assets", |m| {
            let shares =
                m.deposit_reserve_internal(ctx, &*bank, reserve_pool_id, amount, receiver, amount)?;
            let asset = m.reserve_pools[reserve_pool_id as usize].asset;
            bank.transfer(&asset, &ctx.caller, &m.address, amount)?;
            Ok(shares)
        })
    }

    pub fn deposit_reserve_assets_without_transfer(
        &mut self,
        ctx: &CallContext,
        bank: &dyn AssetBank,
        reserve_pool_id: u16,
        amount: u128,
        receiver: &Address,
    ) -> BulwarkResult<u128> {
        self.transact("deposit_reserve_assets_without_transfer", |m| {
            m.deposit_reserve_internal(ctx, bank, reserve_pool_id, amount, receiver, 0)
        })
    }

    fn deposit_reward_internal(
        &mut self,
        ctx: &CallContext,
        bank: &dyn AssetBank,
        reward_pool_id: u16,
        amount: u128,
        receiver: &Address,
        incoming: u128,
    ) -> BulwarkResult<u128> {
        self.require_not_paused("deposit rewards")?;
        let idx = self.check_reward_pool_id(reward_pool_id)?;
        self.drip_all(ctx.now)?;

        let pool = &self.reward_pools[idx];
        let (asset, token) = (pool.asset, pool.deposit_receipt_token);
        let basis = pool.undripped_rewards;
        let shares = self.shares_for(&token, basis, amount)?;
        self.check_deposit_backed(bank, &asset, amount, incoming)?;

        self.token_mut(&token)?.mint(receiver, shares)?;
        let pool = &mut self.reward_pools[idx];
        pool.undripped_rewards = pool.undripped_rewards.safe_add(amount)?;
        self.credit_asset_pool(&asset, amount)?;

        tracing::info!(
            "{} deposited {} rewards into reward pool {}",
            receiver.short(),
            amount,
            reward_pool_id
        );
        Ok(shares)
    }

    /// Add undripped rewards pulled from the caller.
    pub fn deposit_reward_assets(
        &mut self,
        ctx: &CallContext,
        bank: &mut dyn AssetBank,
        reward_pool_id: u16,
        amount: u128,
        receiver: &Address,
    ) -> BulwarkResult<u128> {
        self.transact("deposit_reward_assets", |m| {
            let shares =
                m.deposit_reward_internal(ctx, &*bank, reward_pool_id, amount, receiver, amount)?;
            let asset = m.reward_pools[reward_pool_id as usize].asset;
            bank.transfer(&asset, &ctx.caller, &m.address, amount)?;
            Ok(shares)
        })
    }

    pub fn deposit_reward_assets_without_transfer(
        &mut self,
        ctx: &CallContext,
        bank: &dyn AssetBank,
        reward_pool_id: u16,
        amount: u128,
        receiver: &Address,
    ) -> BulwarkResult<u128> {
        self.transact("deposit_reward_assets_without_transfer", |m| {
            m.deposit_reward_internal(ctx, bank, reward_pool_id, amount, receiver, 0)
        })
    }
}

// crates/bulwark-module/src/config.rs
//
// Two-phase configuration pipeline.
//
// `update_configs` validates a full configuration and queues its hash with
// an apply window of [now + delay, now + delay + grace]. The owner later
// resubmits the same payload to `finalize_update_configs`, which applies it
// if the hash matches and the window is open. Queuing again replaces any
// pending update.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use bulwark_core::crypto::CanonicalHasher;
use bulwark_core::identity::hex32;
use bulwark_core::math::{BulwarkResult, WAD, ZOC};
use bulwark_core::{Address, AssetBank, AssetId, BulwarkError, DripModel, Trigger, TriggerState};

use crate::module::{CallContext, SafetyModule};
use crate::receipt_token::{ReceiptToken, ReceiptTokenKind};
use crate::state::SafetyModuleState;
use crate::types::{ClaimableRewardsData, ReservePool, RewardPool, TriggerData};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delays {
    pub config_update_delay: u64,
    pub config_update_grace_period: u64,
    pub unstake_delay: u64,
    pub withdraw_delay: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservePoolConfig {
    /// WAD-scaled, at most 1e18.
    pub max_slash_percentage: u128,
    pub asset: AssetId,
    /// Parts of ZOC.
    pub rewards_pool_weight: u16,
}

#[derive(Clone)]
pub struct RewardPoolConfig {
    pub asset: AssetId,
    pub drip_model: Arc<dyn DripModel>,
}

impl fmt::Debug for RewardPoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewardPoolConfig")
            .field("asset", &self.asset)
            .field("drip_model", &self.drip_model.id())
            .finish()
    }
}

#[derive(Clone)]
pub struct TriggerConfig {
    pub trigger: Arc<dyn Trigger>,
    pub payout_handler: Address,
    /// False deregisters the trigger.
    pub exists: bool,
}

impl fmt::Debug for TriggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerConfig")
            .field("trigger", &self.trigger.id())
            .field("payout_handler", &self.payout_handler)
            .field("exists", &self.exists)
            .finish()
    }
}

/// A complete configuration: every reserve and reward pool, trigger
/// registration changes, and the delays.
///
/// Pools are listed in id order. Existing pools must keep their position
/// and asset; new pools are appended.
#[derive(Debug, Clone)]
pub struct UpdateConfigsParams {
    pub reserve_pool_configs: Vec<ReservePoolConfig>,
    pub reward_pool_configs: Vec<RewardPoolConfig>,
    pub trigger_config_updates: Vec<TriggerConfig>,
    pub delays_config: Delays,
}

impl UpdateConfigsParams {
    /// Canonical hash of the payload. Drip models and triggers are hashed
    /// by identity.
    pub fn hash(&self) -> [u8; 32] {
        let mut h = CanonicalHasher::new("bulwark.update_configs");
        h.len(self.reserve_pool_configs.len());
        for c in &self.reserve_pool_configs {
            h.u128(c.max_slash_percentage)
                .address(&c.asset)
                .u16(c.rewards_pool_weight);
        }
        h.len(self.reward_pool_configs.len());
        for c in &self.reward_pool_configs {
            h.address(&c.asset).address(&c.drip_model.id());
        }
        h.len(self.trigger_config_updates.len());
        for c in &self.trigger_config_updates {
            h.address(&c.trigger.id())
                .address(&c.payout_handler)
                .bool(c.exists);
        }
        let d = &self.delays_config;
        h.u64(d.config_update_delay)
            .u64(d.config_update_grace_period)
            .u64(d.unstake_delay)
            .u64(d.withdraw_delay);
        h.finish()
    }
}

/// Hex form of [`UpdateConfigsParams::hash`].
pub fn config_hash(params: &UpdateConfigsParams) -> String {
    format!("0x{}", hex::encode(params.hash()))
}

/// The pending configuration update, all zero when none is queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdateMetadata {
    #[serde(with = "hex32")]
    pub queued_config_update_hash: [u8; 32],
    pub config_update_time: u64,
    pub config_update_deadline: u64,
}

impl ConfigUpdateMetadata {
    pub fn is_pending(&self) -> bool {
        self.queued_config_update_hash != [0u8; 32]
    }
}

/// Check `params` against the current pool set, trigger registrations and
/// manager caps.
///
/// # Errors
/// `BulwarkError::InvalidConfiguration` naming the first rule violated.
pub fn validate_update(
    params: &UpdateConfigsParams,
    reserve_pools: &[ReservePool],
    reward_pools: &[RewardPool],
    triggers: &BTreeMap<Address, TriggerData>,
    allowed_reserve_pools: usize,
    allowed_reward_pools: usize,
) -> BulwarkResult<()> {
    let invalid = |msg: String| Err(BulwarkError::InvalidConfiguration(msg));

    let n_reserve = params.reserve_pool_configs.len();
    let n_reward = params.reward_pool_configs.len();
    if n_reserve > allowed_reserve_pools {
        return invalid(format!(
            "{} reserve pools exceed the cap of {}",
            n_reserve, allowed_reserve_pools
        ));
    }
    if n_reward > allowed_reward_pools {
        return invalid(format!(
            "{} reward pools exceed the cap of {}",
            n_reward, allowed_reward_pools
        ));
    }
    if n_reserve < reserve_pools.len() || n_reward < reward_pools.len() {
        return invalid("pools cannot be removed".to_string());
    }

    let weight_sum: u32 = params
        .reserve_pool_configs
        .iter()
        .map(|c| c.rewards_pool_weight as u32)
        .sum();
    if weight_sum != ZOC as u32 {
        return invalid(format!("reward weights sum to {}, expected {}", weight_sum, ZOC));
    }

    for (id, c) in params.reserve_pool_configs.iter().enumerate() {
        if c.max_slash_percentage > WAD {
            return invalid(format!(
                "reserve pool {} max slash percentage {} exceeds 1e18",
                id, c.max_slash_percentage
            ));
        }
        if let Some(existing) = reserve_pools.get(id) {
            if existing.asset != c.asset {
                return invalid(format!("reserve pool {} asset cannot change", id));
            }
        }
    }
    for (id, existing) in reward_pools.iter().enumerate() {
        if existing.asset != params.reward_pool_configs[id].asset {
            return invalid(format!("reward pool {} asset cannot change", id));
        }
    }

    let d = &params.delays_config;
    if d.config_update_delay <= d.unstake_delay || d.config_update_delay <= d.withdraw_delay {
        return invalid(format!(
            "config update delay {} must exceed unstake delay {} and withdraw delay {}",
            d.config_update_delay, d.unstake_delay, d.withdraw_delay
        ));
    }

    for c in &params.trigger_config_updates {
        let id = c.trigger.id();
        if c.trigger.state() == TriggerState::Triggered {
            return invalid(format!("trigger {} is already triggered", id.short()));
        }
        if triggers.get(&id).map(|t| t.triggered).unwrap_or(false) {
            return invalid(format!("trigger {} already fired against this module", id.short()));
        }
    }

    Ok(())
}

impl SafetyModule {
    fn validate_against_current(&self, params: &UpdateConfigsParams) -> BulwarkResult<()> {
        validate_update(
            params,
            &self.reserve_pools,
            &self.reward_pools,
            &self.triggers,
            self.manager.allowed_reserve_pools(),
            self.manager.allowed_reward_pools(),
        )
    }

    /// Whether `params` would be accepted by `update_configs` right now.
    pub fn is_valid_update(&self, params: &UpdateConfigsParams) -> bool {
        self.validate_against_current(params).is_ok()
    }

    /// Queue a configuration update. Owner only.
    ///
    /// The window is computed from the delays currently in force.
    pub fn update_configs(
        &mut self,
        ctx: &CallContext,
        params: &UpdateConfigsParams,
    ) -> BulwarkResult<ConfigUpdateMetadata> {
        self.transact("update_configs", |m| {
            m.require_owner(ctx)?;
            m.validate_against_current(params)?;

            let config_update_time = ctx.now.saturating_add(m.delays.config_update_delay);
            let metadata = ConfigUpdateMetadata {
                queued_config_update_hash: params.hash(),
                config_update_time,
                config_update_deadline: config_update_time
                    .saturating_add(m.delays.config_update_grace_period),
            };
            m.last_config_update = metadata;

            tracing::info!(
                "Config update {} queued: applicable in [{}, {}]",
                config_hash(params),
                metadata.config_update_time,
                metadata.config_update_deadline
            );
            Ok(metadata)
        })
    }

    /// Apply the queued configuration update. Owner only.
    ///
    /// `bank` is read for the decimals of newly added pool assets.
    pub fn finalize_update_configs(
        &mut self,
        ctx: &CallContext,
        bank: &dyn AssetBank,
        params: &UpdateConfigsParams,
    ) -> BulwarkResult<()> {
        self.transact("finalize_update_configs", |m| {
            m.require_owner(ctx)?;

            let pending = m.last_config_update;
            if !pending.is_pending() {
                return Err(BulwarkError::InvalidStateTransition(
                    "no configuration update is queued".to_string(),
                ));
            }
            if ctx.now < pending.config_update_time || ctx.now > pending.config_update_deadline {
                return Err(BulwarkError::InvalidStateTransition(format!(
                    "{} is outside the update window [{}, {}]",
                    ctx.now, pending.config_update_time, pending.config_update_deadline
                )));
            }
            if m.state == SafetyModuleState::Triggered {
                return Err(BulwarkError::InvalidState(
                    "cannot finalize a configuration while triggered".to_string(),
                ));
            }
            if params.hash() != pending.queued_config_update_hash {
                return Err(BulwarkError::InvalidConfiguration(
                    "payload does not match the queued configuration".to_string(),
                ));
            }
            for c in &params.trigger_config_updates {
                let id = c.trigger.id();
                let used = m.triggers.get(&id).map(|t| t.triggered).unwrap_or(false);
                if used || c.trigger.state() == TriggerState::Triggered {
                    return Err(BulwarkError::InvalidConfiguration(format!(
                        "trigger {} is no longer usable",
                        id.short()
                    )));
                }
            }

            m.apply_config_update(bank, params, ctx.now)?;
            tracing::info!("Config update {} finalized", config_hash(params));
            Ok(())
        })
    }

    /// Reconcile drips, then install the pool set, triggers and delays.
    pub(crate) fn apply_config_update(
        &mut self,
        bank: &dyn AssetBank,
        params: &UpdateConfigsParams,
        now: u64,
    ) -> BulwarkResult<()> {
        self.drip_all(now)?;

        // Weights may change below, so cumulative counters restart from a
        // fully folded index.
        for pool in self.reward_pools.iter_mut() {
            pool.cumulative_dripped_rewards = 0;
        }
        for row in self.claimable_rewards.iter_mut() {
            for entry in row.iter_mut() {
                entry.cumulative_claimed_rewards = 0;
            }
        }

        for (id, c) in params.reserve_pool_configs.iter().enumerate() {
            if let Some(pool) = self.reserve_pools.get_mut(id) {
                pool.max_slash_percentage = c.max_slash_percentage;
                pool.rewards_pool_weight = c.rewards_pool_weight;
            } else {
                self.initialize_reserve_pool(bank, id as u16, c, now);
            }
        }

        for (id, c) in params.reward_pool_configs.iter().enumerate() {
            if let Some(pool) = self.reward_pools.get_mut(id) {
                pool.drip_model = c.drip_model.clone();
            } else {
                self.initialize_reward_pool(bank, id as u16, c, now);
            }
        }

        let n_reward = self.reward_pools.len();
        for row in self.claimable_rewards.iter_mut() {
            row.resize(n_reward, ClaimableRewardsData::default());
        }

        for c in &params.trigger_config_updates {
            let entry = self.triggers.entry(c.trigger.id()).or_insert(TriggerData {
                exists: c.exists,
                payout_handler: c.payout_handler,
                triggered: false,
            });
            entry.exists = c.exists;
            entry.payout_handler = c.payout_handler;
        }

        self.delays = params.delays_config;
        self.last_config_update = ConfigUpdateMetadata::default();
        Ok(())
    }

    fn initialize_reserve_pool(
        &mut self,
        bank: &dyn AssetBank,
        id: u16,
        c: &ReservePoolConfig,
        now: u64,
    ) {
        let decimals = bank.decimals(&c.asset);
        let stake = ReceiptToken::deploy(self.address, id, ReceiptTokenKind::Stake, decimals);
        let deposit = ReceiptToken::deploy(self.address, id, ReceiptTokenKind::Deposit, decimals);

        self.reserve_pools.push(ReservePool {
            asset: c.asset,
            stake_receipt_token: stake.address,
            deposit_receipt_token: deposit.address,
            stake_amount: 0,
            deposit_amount: 0,
            pending_unstakes_amount: 0,
            pending_withdrawals_amount: 0,
            fee_amount: 0,
            max_slash_percentage: c.max_slash_percentage,
            rewards_pool_weight: c.rewards_pool_weight,
            last_fees_drip_time: now,
        });
        self.receipt_tokens.insert(stake.address, stake);
        self.receipt_tokens.insert(deposit.address, deposit);
        self.asset_pools.entry(c.asset).or_default();
        self.claimable_rewards
            .push(vec![ClaimableRewardsData::default(); self.reward_pools.len()]);

        tracing::info!("Reserve pool {} initialized for asset {}", id, c.asset.short());
    }

    fn initialize_reward_pool(
        &mut self,
        bank: &dyn AssetBank,
        id: u16,
        c: &RewardPoolConfig,
        now: u64,
    ) {
        let decimals = bank.decimals(&c.asset);
        let token = ReceiptToken::deploy(self.address, id, ReceiptTokenKind::RewardDeposit, decimals);

        self.reward_pools.push(RewardPool {
            asset: c.asset,
            drip_model: c.drip_model.clone(),
            deposit_receipt_token: token.address,
            undripped_rewards: 0,
            cumulative_dripped_rewards: 0,
            last_drip_time: now,
        });
        self.receipt_tokens.insert(token.address, token);
        self.asset_pools.entry(c.asset).or_default();

        tracing::info!("Reward pool {} initialized for asset {}", id, c.asset.short());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt_token::compute_receipt_token_address;
    use crate::test_utils::{default_params, Fixture, MockDripModel, MockTrigger};

    fn two_pool_params(f: &Fixture) -> UpdateConfigsParams {
        let mut params = default_params(f);
        params.reserve_pool_configs[0].rewards_pool_weight = 4_000;
        params.reserve_pool_configs.push(ReservePoolConfig {
            max_slash_percentage: WAD,
            asset: f.reserve_asset,
            rewards_pool_weight: 6_000,
        });
        params
    }

    #[test]
    fn test_hash_changes_with_payload() {
        let f = Fixture::new();
        let a = default_params(&f);
        let mut b = a.clone();
        assert_eq!(a.hash(), b.hash());
        b.reserve_pool_configs[0].max_slash_percentage -= 1;
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_validation_rules() {
        let f = Fixture::new();
        assert!(f.module.is_valid_update(&default_params(&f)));

        let mut bad_weight = default_params(&f);
        bad_weight.reserve_pool_configs[0].rewards_pool_weight = 9_999;
        assert!(!f.module.is_valid_update(&bad_weight));

        let mut bad_slash = default_params(&f);
        bad_slash.reserve_pool_configs[0].max_slash_percentage = WAD + 1;
        assert!(!f.module.is_valid_update(&bad_slash));

        let mut bad_delay = default_params(&f);
        bad_delay.delays_config.unstake_delay = bad_delay.delays_config.config_update_delay;
        assert!(!f.module.is_valid_update(&bad_delay));

        let mut bad_asset = default_params(&f);
        bad_asset.reserve_pool_configs[0].asset = Address::from_label("other");
        assert!(!f.module.is_valid_update(&bad_asset));

        let mut removed = default_params(&f);
        removed.reward_pool_configs.clear();
        assert!(!f.module.is_valid_update(&removed));

        let mut too_many = two_pool_params(&f);
        for _ in 0..f.max_reserve_pools {
            too_many.reserve_pool_configs.push(ReservePoolConfig {
                max_slash_percentage: WAD,
                asset: f.reserve_asset,
                rewards_pool_weight: 0,
            });
        }
        assert!(!f.module.is_valid_update(&too_many));
    }

    #[test]
    fn test_triggered_trigger_rejected() {
        let f = Fixture::new();
        let fresh = Arc::new(MockTrigger::new("fresh"));
        fresh.set_state(TriggerState::Triggered);
        let mut params = default_params(&f);
        params.trigger_config_updates.push(TriggerConfig {
            trigger: fresh,
            payout_handler: f.payout_handler,
            exists: true,
        });
        assert!(!f.module.is_valid_update(&params));
    }

    #[test]
    fn test_update_is_owner_only() {
        let mut f = Fixture::new();
        let params = default_params(&f);
        let alice = f.ctx(f.alice);
        assert!(matches!(
            f.module.update_configs(&alice, &params),
            Err(BulwarkError::Unauthorized(_))
        ));
        assert!(!f.module.last_config_update().is_pending());
    }

    #[test]
    fn test_queue_and_finalize_adds_pool() {
        let mut f = Fixture::new();
        let params = two_pool_params(&f);
        let owner = f.ctx(f.owner);
        let meta = f.module.update_configs(&owner, &params).unwrap();
        assert_eq!(meta.config_update_time, f.now + 100);
        assert_eq!(meta.config_update_deadline, f.now + 150);

        f.advance(100);
        let owner = f.ctx(f.owner);
        f.module
            .finalize_update_configs(&owner, &f.bank, &params)
            .unwrap();

        assert_eq!(f.module.reserve_pools().len(), 2);
        let weights: u32 = f
            .module
            .reserve_pools()
            .iter()
            .map(|p| p.rewards_pool_weight as u32)
            .sum();
        assert_eq!(weights, ZOC as u32);
        let added = f.module.reserve_pool(1).unwrap();
        assert_eq!(
            added.stake_receipt_token,
            compute_receipt_token_address(&f.module.address(), 1, ReceiptTokenKind::Stake)
        );
        assert!(f.module.receipt_token(&added.stake_receipt_token).is_some());
        assert!(!f.module.last_config_update().is_pending());
        assert!(f.module.claimable_rewards_data(1, 0).unwrap().index_snapshot.is_zero());
    }

    #[test]
    fn test_requeue_replaces_pending() {
        let mut f = Fixture::new();
        let first = two_pool_params(&f);
        let mut second = default_params(&f);
        second.delays_config.unstake_delay = 20;
        let owner = f.ctx(f.owner);
        f.module.update_configs(&owner, &first).unwrap();
        f.module.update_configs(&owner, &second).unwrap();

        f.advance(100);
        let owner = f.ctx(f.owner);
        assert!(matches!(
            f.module.finalize_update_configs(&owner, &f.bank, &first),
            Err(BulwarkError::InvalidConfiguration(_))
        ));
        f.module
            .finalize_update_configs(&owner, &f.bank, &second)
            .unwrap();
        assert_eq!(f.module.delays().unstake_delay, 20);
    }

    #[test]
    fn test_finalize_without_pending() {
        let mut f = Fixture::new();
        let params = default_params(&f);
        let owner = f.ctx(f.owner);
        assert!(matches!(
            f.module.finalize_update_configs(&owner, &f.bank, &params),
            Err(BulwarkError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_finalize_swaps_reward_drip_model() {
        let mut f = Fixture::new();
        let mut params = default_params(&f);
        let replacement = Arc::new(MockDripModel::new("replacement", WAD / 2));
        params.reward_pool_configs[0].drip_model = replacement.clone();
        let owner = f.ctx(f.owner);
        f.module.update_configs(&owner, &params).unwrap();
        f.advance(120);
        let owner = f.ctx(f.owner);
        f.module
            .finalize_update_configs(&owner, &f.bank, &params)
            .unwrap();
        assert_eq!(
            f.module.reward_pool(0).unwrap().drip_model.id(),
            replacement.id()
        );
    }
}

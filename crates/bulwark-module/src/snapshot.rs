// crates/bulwark-module/src/snapshot.rs
//
// Read-only, serializable view of a whole module.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bulwark_core::math::BulwarkResult;
use bulwark_core::{Address, AssetId};

use crate::config::{ConfigUpdateMetadata, Delays};
use crate::module::SafetyModule;
use crate::state::SafetyModuleState;
use crate::types::{ClaimableRewardsData, Redemption, ReservePool, TriggerData};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservePoolSnapshot {
    pub id: u16,
    pub pool: ReservePool,
    pub stake_receipt_supply: u128,
    pub deposit_receipt_supply: u128,
    /// One entry per reward pool.
    pub claimable_rewards: Vec<ClaimableRewardsData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPoolSnapshot {
    pub id: u16,
    pub asset: AssetId,
    pub drip_model: Address,
    pub deposit_receipt_token: Address,
    pub deposit_receipt_supply: u128,
    pub undripped_rewards: u128,
    pub cumulative_dripped_rewards: u128,
    pub last_drip_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSnapshot {
    pub trigger: Address,
    #[serde(flatten)]
    pub data: TriggerData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    pub address: Address,
    pub owner: Address,
    pub pauser: Address,
    pub manager: Address,
    pub state: SafetyModuleState,
    pub delays: Delays,
    pub last_config_update: ConfigUpdateMetadata,
    pub num_pending_slashes: u16,
    pub reserve_pools: Vec<ReservePoolSnapshot>,
    pub reward_pools: Vec<RewardPoolSnapshot>,
    pub asset_pools: BTreeMap<AssetId, u128>,
    pub redemptions: Vec<Redemption>,
    pub triggers: Vec<TriggerSnapshot>,
}

impl ModuleSnapshot {
    pub fn to_json_pretty(&self) -> BulwarkResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> BulwarkResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl SafetyModule {
    /// Capture every pool, queue and registration as plain data.
    pub fn snapshot(&self) -> BulwarkResult<ModuleSnapshot> {
        let mut reserve_pools = Vec::with_capacity(self.reserve_pools.len());
        for (id, pool) in self.reserve_pools.iter().enumerate() {
            reserve_pools.push(ReservePoolSnapshot {
                id: id as u16,
                pool: pool.clone(),
                stake_receipt_supply: self.token(&pool.stake_receipt_token)?.total_supply(),
                deposit_receipt_supply: self.token(&pool.deposit_receipt_token)?.total_supply(),
                claimable_rewards: self.claimable_rewards[id].clone(),
            });
        }

        let mut reward_pools = Vec::with_capacity(self.reward_pools.len());
        for (id, pool) in self.reward_pools.iter().enumerate() {
            reward_pools.push(RewardPoolSnapshot {
                id: id as u16,
                asset: pool.asset,
                drip_model: pool.drip_model.id(),
                deposit_receipt_token: pool.deposit_receipt_token,
                deposit_receipt_supply: self.token(&pool.deposit_receipt_token)?.total_supply(),
                undripped_rewards: pool.undripped_rewards,
                cumulative_dripped_rewards: pool.cumulative_dripped_rewards,
                last_drip_time: pool.last_drip_time,
            });
        }

        Ok(ModuleSnapshot {
            address: self.address,
            owner: self.owner,
            pauser: self.pauser,
            manager: self.manager.id(),
            state: self.state,
            delays: self.delays,
            last_config_update: self.last_config_update,
            num_pending_slashes: self.num_pending_slashes,
            reserve_pools,
            reward_pools,
            asset_pools: self
                .asset_pools
                .iter()
                .map(|(asset, pool)| (*asset, pool.amount))
                .collect(),
            redemptions: self.redemptions.values().cloned().collect(),
            triggers: self
                .triggers
                .iter()
                .map(|(trigger, data)| TriggerSnapshot {
                    trigger: *trigger,
                    data: *data,
                })
                .collect(),
        })
    }
}

// crates/bulwark-cli/src/scenario.rs
//
// Scenario simulator: deploys a SafetyModule from a ScenarioConfig against
// an in-memory bank and replays the configured actions on a virtual clock.
//
// Labels are mapped to addresses with `Address::from_label`. Triggers are
// local oracles whose state only changes through `fire_trigger` actions.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;

use bulwark_core::{
    Address, BulwarkError, ConstantDripModel, DripModel, ExponentialDripModel,
    InMemoryBank, LinearDripModel, StaticManager, Trigger, TriggerState,
};
use bulwark_module::{
    config_hash, CallContext, Delays, ModuleSnapshot, ReservePoolConfig, RewardPoolConfig,
    SafetyModule, Slash, TriggerConfig, UpdateConfigsParams,
};

use crate::config::{
    Action, DelaysConfig, DripModelKind, ReservePoolSpec, RewardPoolSpec, ScenarioConfig,
};

/// Label of the account that runs permissionless drips.
const KEEPER: &str = "keeper";

/// Errors raised while building or replaying a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario file references something it never declared.
    #[error("Invalid scenario: {0}")]
    Invalid(String),

    /// Deploying the module failed.
    #[error("Deployment failed: {0}")]
    Deploy(#[source] BulwarkError),

    /// An action was rejected and the scenario stops on errors.
    #[error("Action #{index} ({action}) failed: {source}")]
    Action {
        index: usize,
        action: String,
        #[source]
        source: BulwarkError,
    },

    #[error("Snapshot failed: {0}")]
    Snapshot(#[source] BulwarkError),
}

/// A trigger oracle driven by the scenario script.
pub struct ScenarioTrigger {
    id: Address,
    state: Mutex<TriggerState>,
}

impl ScenarioTrigger {
    pub fn new(name: &str) -> Self {
        Self {
            id: Address::from_label(&format!("trigger:{}", name)),
            state: Mutex::new(TriggerState::Active),
        }
    }

    pub fn fire(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = TriggerState::Triggered;
        }
    }
}

impl Trigger for ScenarioTrigger {
    fn id(&self) -> Address {
        self.id
    }

    fn state(&self) -> TriggerState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(TriggerState::Frozen)
    }
}

/// Result of replaying one action.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub index: usize,
    pub time: u64,
    pub action: String,
    pub ok: bool,
    pub detail: String,
}

/// Everything a run produces: per-action outcomes and the final module.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub module: String,
    pub final_time: u64,
    pub outcomes: Vec<Outcome>,
    pub snapshot: ModuleSnapshot,
}

/// Pool layout currently in force, kept so updates can be expressed as
/// partial overrides.
#[derive(Debug, Clone)]
struct Layout {
    reserve_pools: Vec<ReservePoolSpec>,
    reward_pools: Vec<RewardPoolSpec>,
    delays: DelaysConfig,
}

pub struct Simulator {
    config: ScenarioConfig,
    module: SafetyModule,
    bank: InMemoryBank,
    triggers: BTreeMap<String, Arc<ScenarioTrigger>>,
    layout: Layout,
    pending_update: Option<(UpdateConfigsParams, Layout)>,
    now: u64,
}

impl Simulator {
    /// Register assets, fund balances and deploy the module.
    pub fn new(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        let mut bank = InMemoryBank::new();
        for spec in &config.reserve_pools {
            if let Some(decimals) = spec.decimals {
                bank.register_asset(asset_address(&spec.asset), decimals);
            }
        }
        for spec in &config.reward_pools {
            if let Some(decimals) = spec.decimals {
                bank.register_asset(asset_address(&spec.asset), decimals);
            }
        }
        for balance in &config.balances {
            bank.mint(
                &asset_address(&balance.asset),
                &actor(&balance.holder),
                balance.amount as u128,
            );
        }

        let triggers: BTreeMap<String, Arc<ScenarioTrigger>> = config
            .triggers
            .iter()
            .map(|t| (t.name.clone(), Arc::new(ScenarioTrigger::new(&t.name))))
            .collect();

        let layout = Layout {
            reserve_pools: config.reserve_pools.clone(),
            reward_pools: config.reward_pools.clone(),
            delays: config.delays.clone(),
        };
        let mut params = build_params(&layout);
        for spec in &config.triggers {
            let trigger = triggers
                .get(&spec.name)
                .cloned()
                .ok_or_else(|| ScenarioError::Invalid(format!("trigger {}", spec.name)))?;
            params.trigger_config_updates.push(TriggerConfig {
                trigger,
                payout_handler: actor(&spec.payout_handler),
                exists: true,
            });
        }

        let fee_model: Arc<dyn DripModel> = Arc::new(ExponentialDripModel::new(
            Address::from_label("manager:fee-drip"),
            config.fee_drip_rate as u128,
        ));
        let manager = StaticManager::new(
            actor(&config.manager),
            config.allowed_reserve_pools,
            config.allowed_reward_pools,
            fee_model,
        );

        let module = SafetyModule::new(
            Address::from_label(&format!("module:{}", config.module)),
            actor(&config.owner),
            actor(&config.pauser),
            Arc::new(manager),
            &bank,
            &params,
            config.start_time,
        )
        .map_err(ScenarioError::Deploy)?;

        tracing::info!(
            "Deployed {} with {} reserve pool(s), {} reward pool(s), {} trigger(s) at t={}",
            config.module,
            layout.reserve_pools.len(),
            layout.reward_pools.len(),
            triggers.len(),
            config.start_time
        );

        Ok(Self {
            now: config.start_time,
            config,
            module,
            bank,
            triggers,
            layout,
            pending_update: None,
        })
    }

    pub fn module(&self) -> &SafetyModule {
        &self.module
    }

    #[cfg(test)]
    pub fn bank(&self) -> &InMemoryBank {
        &self.bank
    }

    #[cfg(test)]
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Replay every configured action in order.
    pub fn run(mut self) -> Result<Report, ScenarioError> {
        let actions = self.config.actions.clone();
        let mut outcomes = Vec::with_capacity(actions.len());

        for (index, action) in actions.iter().enumerate() {
            let name = action_name(action);
            match self.apply(action) {
                Ok(detail) => {
                    tracing::info!("[t={}] #{} {}: {}", self.now, index, name, detail);
                    outcomes.push(Outcome {
                        index,
                        time: self.now,
                        action: name.to_string(),
                        ok: true,
                        detail,
                    });
                }
                Err(ScenarioError::Action { source, .. }) if !self.config.stop_on_error => {
                    tracing::warn!("[t={}] #{} {} rejected: {}", self.now, index, name, source);
                    outcomes.push(Outcome {
                        index,
                        time: self.now,
                        action: name.to_string(),
                        ok: false,
                        detail: source.to_string(),
                    });
                }
                Err(ScenarioError::Action { source, .. }) => {
                    return Err(ScenarioError::Action {
                        index,
                        action: name.to_string(),
                        source,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let snapshot = self.module.snapshot().map_err(ScenarioError::Snapshot)?;
        Ok(Report {
            module: self.config.module.clone(),
            final_time: self.now,
            outcomes,
            snapshot,
        })
    }

    /// Apply one action and describe what it did.
    pub fn apply(&mut self, action: &Action) -> Result<String, ScenarioError> {
        let name = action_name(action);
        self.dispatch(action).map_err(|e| match e {
            Dispatch::Module(source) => ScenarioError::Action {
                index: 0,
                action: name.to_string(),
                source,
            },
            Dispatch::Scenario(e) => e,
        })
    }

    fn ctx(&self, label: &str) -> CallContext {
        CallContext::new(actor(label), self.now)
    }

    fn trigger(&self, name: &str) -> Result<Arc<ScenarioTrigger>, Dispatch> {
        self.triggers
            .get(name)
            .cloned()
            .ok_or_else(|| Dispatch::Scenario(ScenarioError::Invalid(format!("unknown trigger {}", name))))
    }

    fn dispatch(&mut self, action: &Action) -> Result<String, Dispatch> {
        let detail = match action {
            Action::Advance { seconds } => {
                self.now = self.now.saturating_add(*seconds);
                format!("clock at {}", self.now)
            }
            Action::Stake { actor: who, pool, amount } => {
                let ctx = self.ctx(who);
                let minted =
                    self.module
                        .stake(&ctx, &mut self.bank, *pool, *amount as u128, &ctx.caller)?;
                format!("staked {} into pool {}, minted {} receipt", amount, pool, minted)
            }
            Action::Deposit { actor: who, pool, amount } => {
                let ctx = self.ctx(who);
                let minted = self.module.deposit_reserve_assets(
                    &ctx,
                    &mut self.bank,
                    *pool,
                    *amount as u128,
                    &ctx.caller,
                )?;
                format!("deposited {} into pool {}, minted {} receipt", amount, pool, minted)
            }
            Action::DepositRewards { actor: who, pool, amount } => {
                let ctx = self.ctx(who);
                let minted = self.module.deposit_reward_assets(
                    &ctx,
                    &mut self.bank,
                    *pool,
                    *amount as u128,
                    &ctx.caller,
                )?;
                format!("funded reward pool {} with {}, minted {} receipt", pool, amount, minted)
            }
            Action::Unstake { actor: who, pool, receipt_amount } => {
                let ctx = self.ctx(who);
                let (id, assets) = self.module.unstake(
                    &ctx,
                    &mut self.bank,
                    *pool,
                    *receipt_amount as u128,
                    &ctx.caller,
                    &ctx.caller,
                )?;
                format!("redemption {} queued for {} assets", id, assets)
            }
            Action::Redeem { actor: who, pool, receipt_amount } => {
                let ctx = self.ctx(who);
                let (id, assets) = self.module.redeem(
                    &ctx,
                    &mut self.bank,
                    *pool,
                    *receipt_amount as u128,
                    &ctx.caller,
                    &ctx.caller,
                )?;
                format!("redemption {} queued for {} assets", id, assets)
            }
            Action::RedeemRewards { actor: who, pool, receipt_amount } => {
                let ctx = self.ctx(who);
                let assets = self.module.redeem_undripped_rewards(
                    &ctx,
                    &mut self.bank,
                    *pool,
                    *receipt_amount as u128,
                    &ctx.caller,
                    &ctx.caller,
                )?;
                format!("withdrew {} undripped rewards", assets)
            }
            Action::CompleteRedemption { actor: who, id } => {
                let ctx = self.ctx(who);
                let assets = self.module.complete_redemption(&ctx, &mut self.bank, *id)?;
                format!("redemption {} paid {}", id, assets)
            }
            Action::ClaimRewards { actor: who, pool } => {
                let ctx = self.ctx(who);
                let claimed = self
                    .module
                    .claim_rewards(&ctx, &mut self.bank, *pool, &ctx.caller)?;
                let total: u128 = claimed.iter().map(|c| c.amount).sum();
                format!("claimed {} across {} reward pool(s)", total, claimed.len())
            }
            Action::TransferStake { actor: who, pool, to, amount } => {
                let ctx = self.ctx(who);
                let token = self.module.reserve_pool(*pool)?.stake_receipt_token;
                self.module
                    .transfer_receipt_tokens(&ctx, &token, &actor(to), *amount as u128)?;
                format!("moved {} stake receipt to {}", amount, to)
            }
            Action::Drip => {
                let ctx = self.ctx(KEEPER);
                self.module.drip_rewards(&ctx)?;
                self.module.drip_fees(&ctx)?;
                "dripped rewards and fees".to_string()
            }
            Action::ClaimFees { receiver } => {
                let ctx = self.ctx(&self.config.manager);
                let claimed = self
                    .module
                    .claim_fees(&ctx, &mut self.bank, &actor(receiver))?;
                let total: u128 = claimed.iter().map(|c| c.amount).sum();
                format!("claimed {} in fees", total)
            }
            Action::Pause { actor: who } => {
                let ctx = self.ctx(who);
                self.module.pause(&ctx)?;
                format!("state {}", self.module.state())
            }
            Action::Unpause { actor: who } => {
                let ctx = self.ctx(who);
                self.module.unpause(&ctx)?;
                format!("state {}", self.module.state())
            }
            Action::FireTrigger { trigger } => {
                self.trigger(trigger)?.fire();
                format!("trigger {} fired", trigger)
            }
            Action::Trigger { actor: who, trigger } => {
                let oracle = self.trigger(trigger)?;
                let ctx = self.ctx(who);
                self.module.trigger(&ctx, oracle.as_ref())?;
                format!(
                    "state {}, {} slash(es) pending",
                    self.module.state(),
                    self.module.num_pending_slashes()
                )
            }
            Action::Slash { actor: who, slashes, receiver } => {
                let ctx = self.ctx(who);
                let slashes: Vec<Slash> = slashes
                    .iter()
                    .map(|s| Slash {
                        reserve_pool_id: s.pool,
                        amount: s.amount as u128,
                    })
                    .collect();
                self.module
                    .slash(&ctx, &mut self.bank, &slashes, &actor(receiver))?;
                let total: u128 = slashes.iter().map(|s| s.amount).sum();
                format!("slashed {} to {}, state {}", total, receiver, self.module.state())
            }
            Action::UpdateConfigs {
                reserve_pools,
                reward_pools,
                delays,
            } => {
                let layout = Layout {
                    reserve_pools: reserve_pools
                        .clone()
                        .unwrap_or_else(|| self.layout.reserve_pools.clone()),
                    reward_pools: reward_pools
                        .clone()
                        .unwrap_or_else(|| self.layout.reward_pools.clone()),
                    delays: delays.clone().unwrap_or_else(|| self.layout.delays.clone()),
                };
                for spec in &layout.reserve_pools {
                    if let Some(decimals) = spec.decimals {
                        self.bank.register_asset(asset_address(&spec.asset), decimals);
                    }
                }
                for spec in &layout.reward_pools {
                    if let Some(decimals) = spec.decimals {
                        self.bank.register_asset(asset_address(&spec.asset), decimals);
                    }
                }
                let params = build_params(&layout);
                let ctx = self.ctx(&self.config.owner);
                let metadata = self.module.update_configs(&ctx, &params)?;
                let detail = format!(
                    "update {} applicable in [{}, {}]",
                    config_hash(&params),
                    metadata.config_update_time,
                    metadata.config_update_deadline
                );
                self.pending_update = Some((params, layout));
                detail
            }
            Action::FinalizeConfigs => {
                let (params, layout) = self.pending_update.clone().ok_or_else(|| {
                    Dispatch::Scenario(ScenarioError::Invalid(
                        "finalize_configs without a preceding update_configs".to_string(),
                    ))
                })?;
                let ctx = self.ctx(&self.config.owner);
                self.module.finalize_update_configs(&ctx, &self.bank, &params)?;
                self.layout = layout;
                self.pending_update = None;
                format!(
                    "applied: {} reserve pool(s), {} reward pool(s)",
                    self.module.reserve_pools().len(),
                    self.module.reward_pools().len()
                )
            }
        };
        Ok(detail)
    }
}

/// Internal split between rejected module calls and broken scripts.
enum Dispatch {
    Module(BulwarkError),
    Scenario(ScenarioError),
}

impl From<BulwarkError> for Dispatch {
    fn from(e: BulwarkError) -> Self {
        Dispatch::Module(e)
    }
}

pub fn actor(label: &str) -> Address {
    Address::from_label(label)
}

pub fn asset_address(name: &str) -> Address {
    Address::from_label(&format!("asset:{}", name))
}

fn drip_model(spec: &RewardPoolSpec) -> Arc<dyn DripModel> {
    let rate = spec.drip_rate as u128;
    let id = Address::from_label(&format!(
        "drip:{}:{:?}:{}",
        spec.asset, spec.drip_model, spec.drip_rate
    ));
    match spec.drip_model {
        DripModelKind::Exponential => Arc::new(ExponentialDripModel::new(id, rate)),
        DripModelKind::Constant => Arc::new(ConstantDripModel::new(id, rate)),
        DripModelKind::Linear => Arc::new(LinearDripModel::new(id, rate)),
    }
}

fn build_params(layout: &Layout) -> UpdateConfigsParams {
    UpdateConfigsParams {
        reserve_pool_configs: layout
            .reserve_pools
            .iter()
            .map(|spec| ReservePoolConfig {
                max_slash_percentage: spec.max_slash_percentage as u128,
                asset: asset_address(&spec.asset),
                rewards_pool_weight: spec.weight,
            })
            .collect(),
        reward_pool_configs: layout
            .reward_pools
            .iter()
            .map(|spec| RewardPoolConfig {
                asset: asset_address(&spec.asset),
                drip_model: drip_model(spec),
            })
            .collect(),
        trigger_config_updates: Vec::new(),
        delays_config: Delays {
            config_update_delay: layout.delays.config_update_delay,
            config_update_grace_period: layout.delays.config_update_grace_period,
            unstake_delay: layout.delays.unstake_delay,
            withdraw_delay: layout.delays.withdraw_delay,
        },
    }
}

/// Build the deployment configuration without running anything.
pub fn deployment_params(config: &ScenarioConfig) -> UpdateConfigsParams {
    build_params(&Layout {
        reserve_pools: config.reserve_pools.clone(),
        reward_pools: config.reward_pools.clone(),
        delays: config.delays.clone(),
    })
}

fn action_name(action: &Action) -> &'static str {
    match action {
        Action::Advance { .. } => "advance",
        Action::Stake { .. } => "stake",
        Action::Deposit { .. } => "deposit",
        Action::DepositRewards { .. } => "deposit_rewards",
        Action::Unstake { .. } => "unstake",
        Action::Redeem { .. } => "redeem",
        Action::RedeemRewards { .. } => "redeem_rewards",
        Action::CompleteRedemption { .. } => "complete_redemption",
        Action::ClaimRewards { .. } => "claim_rewards",
        Action::TransferStake { .. } => "transfer_stake",
        Action::Drip => "drip",
        Action::ClaimFees { .. } => "claim_fees",
        Action::Pause { .. } => "pause",
        Action::Unpause { .. } => "unpause",
        Action::FireTrigger { .. } => "fire_trigger",
        Action::Trigger { .. } => "trigger",
        Action::Slash { .. } => "slash",
        Action::UpdateConfigs { .. } => "update_configs",
        Action::FinalizeConfigs => "finalize_configs",
    }
}

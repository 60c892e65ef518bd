// crates/bulwark-module/src/lib.rs
//
// bulwark-module: the safety module accounting and state-transition engine.
//
// Stakers and depositors back reserve pools with collateral; reward pools
// drip incentives to stakers; a fired trigger lets its payout handler
// slash staked collateral. All operations live on the `SafetyModule`
// aggregate, split by component across the modules below.
//
// Amounts are in the smallest unit of the underlying asset. Fractions are
// WAD-scaled (1e18) and weights are parts of ZOC (10,000).

pub mod config;
pub mod conversion;
pub mod depositor;
pub mod drip;
pub mod fees;
pub mod module;
pub mod receipt_token;
pub mod redemption;
pub mod rewards;
pub mod slash;
pub mod snapshot;
pub mod state;
pub mod types;

// Re-export key types for ergonomic access from downstream crates.
pub use config::{
    config_hash, ConfigUpdateMetadata, Delays, ReservePoolConfig, RewardPoolConfig,
    TriggerConfig, UpdateConfigsParams,
};
pub use conversion::{to_asset_amount, to_receipt_amount, RECEIPT_DECIMALS_OFFSET};
pub use fees::ClaimedFee;
pub use module::{CallContext, SafetyModule};
pub use receipt_token::{compute_receipt_token_address, ReceiptToken, ReceiptTokenKind};
pub use rewards::PreviewClaimableRewards;
pub use snapshot::ModuleSnapshot;
pub use state::SafetyModuleState;
pub use types::{
    AssetPool, ClaimableRewardsData, ClaimedReward, Redemption, RedemptionKind, ReservePool,
    RewardPool, Slash, TriggerData, UserRewardsData,
};

#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::{Arc, Mutex};

    use bulwark_core::{
        Address, DripModel, InMemoryBank, StaticManager, Trigger, TriggerState, WAD, ZOC,
    };

    use crate::config::{Delays, ReservePoolConfig, RewardPoolConfig, TriggerConfig, UpdateConfigsParams};
    use crate::module::{CallContext, SafetyModule};

    /// Drip model whose factor the test sets directly.
    pub struct MockDripModel {
        id: Address,
        factor: Mutex<u128>,
    }

    impl MockDripModel {
        pub fn new(label: &str, factor: u128) -> Self {
            Self {
                id: Address::from_label(label),
                factor: Mutex::new(factor),
            }
        }

        pub fn set_factor(&self, factor: u128) {
            *self.factor.lock().unwrap() = factor;
        }
    }

    impl DripModel for MockDripModel {
        fn id(&self) -> Address {
            self.id
        }

        fn drip_factor(&self, _pool_amount: u128, _elapsed_seconds: u64) -> u128 {
            *self.factor.lock().unwrap()
        }
    }

    pub struct MockTrigger {
        id: Address,
        state: Mutex<TriggerState>,
    }

    impl MockTrigger {
        pub fn new(label: &str) -> Self {
            Self {
                id: Address::from_label(label),
                state: Mutex::new(TriggerState::Active),
            }
        }

        pub fn set_state(&self, state: TriggerState) {
            *self.state.lock().unwrap() = state;
        }
    }

    impl Trigger for MockTrigger {
        fn id(&self) -> Address {
            self.id
        }

        fn state(&self) -> TriggerState {
            *self.state.lock().unwrap()
        }
    }

    /// A deployed module with one reserve pool, one reward pool and one
    /// trigger, plus a bank and named actors.
    pub struct Fixture {
        pub module: SafetyModule,
        pub bank: InMemoryBank,
        pub owner: Address,
        pub pauser: Address,
        pub manager: Address,
        pub payout_handler: Address,
        pub alice: Address,
        pub bob: Address,
        pub reserve_asset: Address,
        pub reward_asset: Address,
        pub reward_model: Arc<MockDripModel>,
        pub fee_model: Arc<MockDripModel>,
        pub trigger: Arc<MockTrigger>,
        pub max_reserve_pools: usize,
        pub now: u64,
    }

    fn params(
        reserve_asset: Address,
        reward_asset: Address,
        reward_model: Arc<MockDripModel>,
        trigger: Arc<MockTrigger>,
        payout_handler: Address,
    ) -> UpdateConfigsParams {
        UpdateConfigsParams {
            reserve_pool_configs: vec![ReservePoolConfig {
                max_slash_percentage: WAD / 2,
                asset: reserve_asset,
                rewards_pool_weight: ZOC,
            }],
            reward_pool_configs: vec![RewardPoolConfig {
                asset: reward_asset,
                drip_model: reward_model,
            }],
            trigger_config_updates: vec![TriggerConfig {
                trigger,
                payout_handler,
                exists: true,
            }],
            delays_config: Delays {
                config_update_delay: 100,
                config_update_grace_period: 50,
                unstake_delay: 10,
                withdraw_delay: 10,
            },
        }
    }

    /// The configuration the fixture was deployed with.
    pub fn default_params(f: &Fixture) -> UpdateConfigsParams {
        params(
            f.reserve_asset,
            f.reward_asset,
            f.reward_model.clone(),
            f.trigger.clone(),
            f.payout_handler,
        )
    }

    impl Fixture {
        pub fn new() -> Self {
            let now = 1_000;
            let owner = Address::from_label("owner");
            let pauser = Address::from_label("pauser");
            let manager = Address::from_label("manager");
            let payout_handler = Address::from_label("payout_handler");
            let reserve_asset = Address::from_label("reserve_asset");
            let reward_asset = Address::from_label("reward_asset");
            let reward_model = Arc::new(MockDripModel::new("reward_model", 0));
            let fee_model = Arc::new(MockDripModel::new("fee_model", 0));
            let trigger = Arc::new(MockTrigger::new("trigger"));
            let max_reserve_pools = 4;

            let mut bank = InMemoryBank::new();
            bank.register_asset(reserve_asset, 6);
            bank.register_asset(reward_asset, 18);

            let static_manager =
                StaticManager::new(manager, max_reserve_pools, 4, fee_model.clone());
            let module = SafetyModule::new(
                Address::from_label("module"),
                owner,
                pauser,
                Arc::new(static_manager),
                &bank,
                &params(
                    reserve_asset,
                    reward_asset,
                    reward_model.clone(),
                    trigger.clone(),
                    payout_handler,
                ),
                now,
            )
            .unwrap();

            Self {
                module,
                bank,
                owner,
                pauser,
                manager,
                payout_handler,
                alice: Address::from_label("alice"),
                bob: Address::from_label("bob"),
                reserve_asset,
                reward_asset,
                reward_model,
                fee_model,
                trigger,
                max_reserve_pools,
                now,
            }
        }

        pub fn ctx(&self, caller: Address) -> CallContext {
            CallContext::new(caller, self.now)
        }

        pub fn advance(&mut self, seconds: u64) {
            self.now += seconds;
        }

        /// Mint `amount` of the reserve asset to `who` and stake it in pool 0.
        pub fn stake(&mut self, who: Address, amount: u128) -> u128 {
            self.bank.mint(&self.reserve_asset, &who, amount);
            let ctx = self.ctx(who);
            self.module
                .stake(&ctx, &mut self.bank, 0, amount, &who)
                .unwrap()
        }

        pub fn deposit(&mut self, who: Address, amount: u128) -> u128 {
            self.bank.mint(&self.reserve_asset, &who, amount);
            let ctx = self.ctx(who);
            self.module
                .deposit_reserve_assets(&ctx, &mut self.bank, 0, amount, &who)
                .unwrap()
        }

        /// Deposit `amount` of undripped rewards into reward pool 0 from the owner.
        pub fn fund_rewards(&mut self, amount: u128) -> u128 {
            let owner = self.owner;
            self.bank.mint(&self.reward_asset, &owner, amount);
            let ctx = self.ctx(owner);
            self.module
                .deposit_reward_assets(&ctx, &mut self.bank, 0, amount, &owner)
                .unwrap()
        }
    }
}

// crates/bulwark-module/tests/properties.rs
//
// Property tests for the conversion engine, drip accrual and the rewards
// ledger.

use std::sync::Arc;

use proptest::prelude::*;

use bulwark_core::{
    Address, AssetBank, ConstantDripModel, InMemoryBank, StaticManager, Trigger, TriggerState, WAD, ZOC,
};
use bulwark_module::{
    to_asset_amount, to_receipt_amount, CallContext, Delays, ReservePoolConfig, RewardPoolConfig,
    SafetyModule, UpdateConfigsParams, RECEIPT_DECIMALS_OFFSET,
};

struct InertTrigger;

impl Trigger for InertTrigger {
    fn id(&self) -> Address {
        Address::from_label("inert")
    }

    fn state(&self) -> TriggerState {
        TriggerState::Active
    }
}

fn params(weights: &[u16], drip_factor: u128) -> UpdateConfigsParams {
    UpdateConfigsParams {
        reserve_pool_configs: weights
            .iter()
            .map(|w| ReservePoolConfig {
                max_slash_percentage: WAD,
                asset: Address::from_label("usdc"),
                rewards_pool_weight: *w,
            })
            .collect(),
        reward_pool_configs: vec![RewardPoolConfig {
            asset: Address::from_label("gov"),
            drip_model: Arc::new(ConstantDripModel::new(Address::from_label("drip"), drip_factor)),
        }],
        trigger_config_updates: vec![],
        delays_config: Delays {
            config_update_delay: 10,
            config_update_grace_period: 10,
            unstake_delay: 1,
            withdraw_delay: 1,
        },
    }
}

fn deploy(bank: &InMemoryBank, weights: &[u16], drip_factor: u128) -> SafetyModule {
    let manager = StaticManager::new(
        Address::from_label("manager"),
        8,
        8,
        Arc::new(ConstantDripModel::new(Address::from_label("no-fees"), 0)),
    );
    SafetyModule::new(
        Address::from_label("module"),
        Address::from_label("owner"),
        Address::from_label("pauser"),
        Arc::new(manager),
        bank,
        &params(weights, drip_factor),
        0,
    )
    .unwrap()
}

fn fund_rewards(module: &mut SafetyModule, bank: &mut InMemoryBank, amount: u128, now: u64) {
    let funder = Address::from_label("funder");
    bank.mint(&Address::from_label("gov"), &funder, amount);
    module
        .deposit_reward_assets(&CallContext::new(funder, now), bank, 0, amount, &funder)
        .unwrap();
}

// Products of two of these stay well inside u128.
fn amount_strategy() -> impl Strategy<Value = u128> {
    0u128..1_000_000_000_000_000_000
}

fn nonzero_strategy() -> impl Strategy<Value = u128> {
    1u128..1_000_000_000_000_000_000
}

fn factor_strategy() -> impl Strategy<Value = u128> {
    0u128..=WAD
}

proptest! {
    #[test]
    fn prop_conversion_never_gains(
        amount in amount_strategy(),
        supply in nonzero_strategy(),
        pool in nonzero_strategy()
    ) {
        let receipt = to_receipt_amount(amount, supply, pool).unwrap();
        prop_assert!(to_asset_amount(receipt, supply, pool).unwrap() <= amount);

        let assets = to_asset_amount(amount, supply, pool).unwrap();
        prop_assert!(to_receipt_amount(assets, supply, pool).unwrap() <= amount);
    }
}

proptest! {
    #[test]
    fn prop_exact_ratio_round_trips(
        amount in 0u128..1_000_000_000,
        supply in 1u128..1_000_000,
        ratio in 1u128..1_000
    ) {
        // Pool holds exactly `ratio` assets per receipt token.
        let pool = supply * ratio;
        let assets = amount * ratio;
        let receipt = to_receipt_amount(assets, supply, pool).unwrap();
        prop_assert_eq!(receipt, amount);
        prop_assert_eq!(to_asset_amount(receipt, supply, pool).unwrap(), assets);
    }
}

proptest! {
    #[test]
    fn prop_zero_supply_bootstrap(amount in amount_strategy(), pool in amount_strategy()) {
        prop_assert_eq!(
            to_receipt_amount(amount, 0, pool).unwrap(),
            amount * 10u128.pow(RECEIPT_DECIMALS_OFFSET)
        );
        prop_assert_eq!(to_asset_amount(amount, 0, pool).unwrap(), 0);
    }
}

proptest! {
    #[test]
    fn prop_drip_monotonic_and_idempotent(
        rewards in 1u128..1_000_000_000_000,
        factor in factor_strategy(),
        steps in prop::collection::vec(0u64..100, 1..20)
    ) {
        let mut bank = InMemoryBank::new();
        let mut module = deploy(&bank, &[ZOC], factor);
        fund_rewards(&mut module, &mut bank, rewards, 0);

        let keeper = Address::from_label("keeper");
        let mut now = 0u64;
        let mut last = module.reward_pool(0).unwrap().undripped_rewards;
        for step in steps {
            now += step;
            module.drip_rewards(&CallContext::new(keeper, now)).unwrap();
            let pool = module.reward_pool(0).unwrap();
            prop_assert!(pool.undripped_rewards <= last);
            prop_assert_eq!(pool.undripped_rewards + pool.cumulative_dripped_rewards, rewards);
            last = pool.undripped_rewards;

            module.drip_rewards(&CallContext::new(keeper, now)).unwrap();
            prop_assert_eq!(module.reward_pool(0).unwrap().undripped_rewards, last);
        }
    }
}

proptest! {
    #[test]
    fn prop_claims_never_exceed_dripped(
        stakes in prop::collection::vec(1u128..1_000_000_000, 1..5),
        rewards in 1u128..1_000_000_000_000,
        factor in factor_strategy(),
        rounds in 1usize..8
    ) {
        let mut bank = InMemoryBank::new();
        let mut module = deploy(&bank, &[ZOC], factor);
        let usdc = Address::from_label("usdc");
        let gov = Address::from_label("gov");

        let stakers: Vec<Address> = (0..stakes.len())
            .map(|i| Address::from_label(&format!("staker-{}", i)))
            .collect();
        for (who, amount) in stakers.iter().zip(&stakes) {
            bank.mint(&usdc, who, *amount);
            module
                .stake(&CallContext::new(*who, 0), &mut bank, 0, *amount, who)
                .unwrap();
        }
        fund_rewards(&mut module, &mut bank, rewards, 0);

        let mut claimed = 0u128;
        for round in 1..=rounds {
            let now = round as u64 * 7;
            for who in &stakers {
                let paid = module
                    .claim_rewards(&CallContext::new(*who, now), &mut bank, 0, who)
                    .unwrap();
                claimed += paid.iter().map(|c| c.amount).sum::<u128>();
            }
        }

        let dripped = module.reward_pool(0).unwrap().cumulative_dripped_rewards;
        prop_assert!(claimed <= dripped);
        let held: u128 = stakers.iter().map(|who| bank.balance_of(&gov, who)).sum();
        prop_assert_eq!(held, claimed);
    }
}

proptest! {
    #[test]
    fn prop_only_full_weight_sets_are_valid(
        weights in prop::collection::vec(0u16..=ZOC, 1..5)
    ) {
        let bank = InMemoryBank::new();
        let module = deploy(&bank, &[ZOC], 0);
        let mut candidate = params(&weights, 0);
        candidate.trigger_config_updates = vec![bulwark_module::TriggerConfig {
            trigger: Arc::new(InertTrigger),
            payout_handler: Address::from_label("handler"),
            exists: true,
        }];
        let sum: u32 = weights.iter().map(|w| *w as u32).sum();
        prop_assert_eq!(module.is_valid_update(&candidate), sum == ZOC as u32);
    }
}

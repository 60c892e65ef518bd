// crates/bulwark-cli/src/config.rs
//
// Scenario configuration for the Bulwark CLI.
// Loaded from a TOML file or populated with sensible defaults.
//
// Actors, assets and triggers are named by plain labels; the simulator maps
// each label to a deterministic address. Amounts are in the smallest unit
// of the asset and fractions are WAD-scaled (1e18 = 100%).

use serde::Deserialize;
use std::fs;

/// A module deployment plus the actions to replay against it.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_module")]
    pub module: String,

    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_pauser")]
    pub pauser: String,

    #[serde(default = "default_manager")]
    pub manager: String,

    /// Clock value at deployment, in seconds.
    #[serde(default)]
    pub start_time: u64,

    #[serde(default = "default_pool_cap")]
    pub allowed_reserve_pools: usize,

    #[serde(default = "default_pool_cap")]
    pub allowed_reward_pools: usize,

    /// Per-second WAD rate of the manager's exponential fee drip. Zero
    /// disables fees.
    #[serde(default)]
    pub fee_drip_rate: u64,

    /// Abort the run at the first failing action instead of recording it.
    #[serde(default)]
    pub stop_on_error: bool,

    #[serde(default)]
    pub delays: DelaysConfig,

    #[serde(default = "default_reserve_pools")]
    pub reserve_pools: Vec<ReservePoolSpec>,

    #[serde(default = "default_reward_pools")]
    pub reward_pools: Vec<RewardPoolSpec>,

    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,

    /// Initial bank balances.
    #[serde(default)]
    pub balances: Vec<BalanceSpec>,

    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelaysConfig {
    #[serde(default = "default_config_update_delay")]
    pub config_update_delay: u64,
    #[serde(default = "default_config_update_grace_period")]
    pub config_update_grace_period: u64,
    #[serde(default = "default_redemption_delay")]
    pub unstake_delay: u64,
    #[serde(default = "default_redemption_delay")]
    pub withdraw_delay: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservePoolSpec {
    pub asset: String,
    /// Parts of 10,000.
    pub weight: u16,
    #[serde(default = "default_max_slash_percentage")]
    pub max_slash_percentage: u64,
    /// Decimals registered for the asset in the simulated bank.
    #[serde(default)]
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DripModelKind {
    /// `drip_rate` is a per-second WAD rate.
    Exponential,
    /// `drip_rate` is a WAD fraction applied on every drip.
    Constant,
    /// `drip_rate` is an asset amount per second.
    Linear,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewardPoolSpec {
    pub asset: String,
    #[serde(default = "default_drip_model")]
    pub drip_model: DripModelKind,
    #[serde(default)]
    pub drip_rate: u64,
    #[serde(default)]
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerSpec {
    pub name: String,
    pub payout_handler: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceSpec {
    pub holder: String,
    pub asset: String,
    pub amount: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlashSpec {
    pub pool: u16,
    pub amount: u64,
}

/// One scripted call against the module, in file order.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Advance {
        seconds: u64,
    },
    Stake {
        actor: String,
        pool: u16,
        amount: u64,
    },
    Deposit {
        actor: String,
        pool: u16,
        amount: u64,
    },
    DepositRewards {
        actor: String,
        pool: u16,
        amount: u64,
    },
    Unstake {
        actor: String,
        pool: u16,
        receipt_amount: u64,
    },
    Redeem {
        actor: String,
        pool: u16,
        receipt_amount: u64,
    },
    RedeemRewards {
        actor: String,
        pool: u16,
        receipt_amount: u64,
    },
    CompleteRedemption {
        actor: String,
        id: u64,
    },
    ClaimRewards {
        actor: String,
        pool: u16,
    },
    TransferStake {
        actor: String,
        pool: u16,
        to: String,
        amount: u64,
    },
    Drip,
    ClaimFees {
        receiver: String,
    },
    Pause {
        actor: String,
    },
    Unpause {
        actor: String,
    },
    /// Flip the named trigger oracle to Triggered.
    FireTrigger {
        trigger: String,
    },
    Trigger {
        actor: String,
        trigger: String,
    },
    Slash {
        actor: String,
        slashes: Vec<SlashSpec>,
        receiver: String,
    },
    /// Queue the deployment's configuration with the given changes.
    UpdateConfigs {
        #[serde(default)]
        reserve_pools: Option<Vec<ReservePoolSpec>>,
        #[serde(default)]
        reward_pools: Option<Vec<RewardPoolSpec>>,
        #[serde(default)]
        delays: Option<DelaysConfig>,
    },
    /// Finalize the most recently queued configuration.
    FinalizeConfigs,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_module() -> String {
    "safety-module".to_string()
}

fn default_owner() -> String {
    "owner".to_string()
}

fn default_pauser() -> String {
    "pauser".to_string()
}

fn default_manager() -> String {
    "manager".to_string()
}

fn default_pool_cap() -> usize {
    8
}

fn default_config_update_delay() -> u64 {
    86_400
}

fn default_config_update_grace_period() -> u64 {
    43_200
}

fn default_redemption_delay() -> u64 {
    3_600
}

fn default_max_slash_percentage() -> u64 {
    500_000_000_000_000_000
}

fn default_drip_model() -> DripModelKind {
    DripModelKind::Exponential
}

fn default_reserve_pools() -> Vec<ReservePoolSpec> {
    vec![ReservePoolSpec {
        asset: "usdc".to_string(),
        weight: 10_000,
        max_slash_percentage: default_max_slash_percentage(),
        decimals: Some(6),
    }]
}

fn default_reward_pools() -> Vec<RewardPoolSpec> {
    vec![RewardPoolSpec {
        asset: "gov".to_string(),
        drip_model: DripModelKind::Exponential,
        // About 1% per day.
        drip_rate: 116_323_331_638,
        decimals: None,
    }]
}

impl Default for DelaysConfig {
    fn default() -> Self {
        Self {
            config_update_delay: default_config_update_delay(),
            config_update_grace_period: default_config_update_grace_period(),
            unstake_delay: default_redemption_delay(),
            withdraw_delay: default_redemption_delay(),
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            module: default_module(),
            owner: default_owner(),
            pauser: default_pauser(),
            manager: default_manager(),
            start_time: 0,
            allowed_reserve_pools: default_pool_cap(),
            allowed_reward_pools: default_pool_cap(),
            fee_drip_rate: 0,
            stop_on_error: false,
            delays: DelaysConfig::default(),
            reserve_pools: default_reserve_pools(),
            reward_pools: default_reward_pools(),
            triggers: Vec::new(),
            balances: Vec::new(),
            actions: Vec::new(),
        }
    }
}

impl ScenarioConfig {
    /// Load a scenario from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(expand_tilde(path))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: ScenarioConfig = toml::from_str(contents)?;
        Ok(config)
    }
}

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ScenarioConfig::parse("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.reserve_pools.len(), 1);
        assert_eq!(config.reserve_pools[0].weight, 10_000);
        assert_eq!(config.delays.unstake_delay, 3_600);
        assert!(config.actions.is_empty());
    }

    #[test]
    fn test_parse_actions() {
        let toml = r#"
            start_time = 100

            [[triggers]]
            name = "exploit"
            payout_handler = "claims"

            [[actions]]
            action = "stake"
            actor = "alice"
            pool = 0
            amount = 1000

            [[actions]]
            action = "advance"
            seconds = 60

            [[actions]]
            action = "slash"
            actor = "claims"
            receiver = "claims"
            slashes = [{ pool = 0, amount = 10 }]

            [[actions]]
            action = "drip"
        "#;
        let config = ScenarioConfig::parse(toml).unwrap();
        assert_eq!(config.start_time, 100);
        assert_eq!(config.triggers[0].payout_handler, "claims");
        assert_eq!(config.actions.len(), 4);
        assert!(matches!(
            &config.actions[0],
            Action::Stake { actor, pool: 0, amount: 1000 } if actor == "alice"
        ));
        assert!(matches!(&config.actions[2], Action::Slash { slashes, .. } if slashes.len() == 1));
        assert!(matches!(config.actions[3], Action::Drip));
    }

    #[test]
    fn test_reward_pool_drip_model_names() {
        let toml = r#"
            [[reward_pools]]
            asset = "op"
            drip_model = "linear"
            drip_rate = 5
        "#;
        let config = ScenarioConfig::parse(toml).unwrap();
        assert_eq!(config.reward_pools[0].drip_model, DripModelKind::Linear);
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/tmp/scenario.toml"), "/tmp/scenario.toml");
    }
}

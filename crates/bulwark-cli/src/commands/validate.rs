// crates/bulwark-cli/src/commands/validate.rs
//
// `bulwark validate`: check that the scenario deploys without replaying it.

use crate::config::ScenarioConfig;
use crate::scenario::Simulator;

/// Deploy the module described by `config` and report the result.
pub fn run(config: &ScenarioConfig) -> Result<(), Box<dyn std::error::Error>> {
    let sim = Simulator::new(config.clone())?;
    let module = sim.module();

    println!("Configuration is valid");
    println!("  Reserve pools: {}", module.reserve_pools().len());
    println!("  Reward pools:  {}", module.reward_pools().len());
    println!("  Triggers:      {}", config.triggers.len());
    println!("  Actions:       {}", config.actions.len());

    let delays = module.delays();
    println!(
        "  Delays:        update {}s (+{}s grace), unstake {}s, withdraw {}s",
        delays.config_update_delay,
        delays.config_update_grace_period,
        delays.unstake_delay,
        delays.withdraw_delay
    );

    Ok(())
}

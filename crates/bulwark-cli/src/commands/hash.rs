// crates/bulwark-cli/src/commands/hash.rs
//
// `bulwark hash`: print the canonical hash of the deployment configuration,
// the value `update_configs` would queue for it.

use bulwark_module::config_hash;

use crate::config::ScenarioConfig;
use crate::scenario::deployment_params;

pub fn run(config: &ScenarioConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_hash(&deployment_params(config)));
    Ok(())
}

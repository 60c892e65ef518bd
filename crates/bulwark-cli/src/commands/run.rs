// crates/bulwark-cli/src/commands/run.rs
//
// `bulwark run`: deploy the scenario's module and replay its actions.

use crate::config::ScenarioConfig;
use crate::output::{
    format_json, format_table, outcome_rows, redemption_rows, reserve_pool_rows, reward_pool_rows,
    OutputFormat,
};
use crate::scenario::Simulator;

/// Run the scenario and print the outcome log and final pools.
pub fn run(config: &ScenarioConfig, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let report = Simulator::new(config.clone())?.run()?;

    if format == OutputFormat::Json {
        println!("{}", format_json(&report));
        return Ok(());
    }

    let rejected = report.outcomes.iter().filter(|o| !o.ok).count();
    println!(
        "Scenario {}  |  Actions: {} ({} rejected)  |  Final time: {}  |  State: {}",
        report.module,
        report.outcomes.len(),
        rejected,
        report.final_time,
        report.snapshot.state
    );
    println!();

    if !report.outcomes.is_empty() {
        println!("{}", format_table(&outcome_rows(&report.outcomes)));
        println!();
    }

    println!("Reserve pools");
    println!("{}", format_table(&reserve_pool_rows(&report.snapshot)));
    println!();
    println!("Reward pools");
    println!("{}", format_table(&reward_pool_rows(&report.snapshot)));

    let redemptions = redemption_rows(&report.snapshot);
    if !redemptions.is_empty() {
        println!();
        println!("Pending redemptions");
        println!("{}", format_table(&redemptions));
    }

    if report.snapshot.num_pending_slashes > 0 {
        println!();
        println!("Pending slashes: {}", report.snapshot.num_pending_slashes);
    }

    Ok(())
}

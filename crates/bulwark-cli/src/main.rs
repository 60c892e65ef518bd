// crates/bulwark-cli/src/main.rs
//
// CLI entrypoint for the Bulwark safety module tools.
//
// Loads a scenario file, then deploys and replays it, validates it, or
// prints its configuration hash.

mod commands;
mod config;
mod output;
mod scenario;

use clap::{Parser, Subcommand};
use config::ScenarioConfig;
use output::OutputFormat;

/// Bulwark CLI: scenario runner for the safety module engine.
#[derive(Parser, Debug)]
#[command(
    name = "bulwark",
    version = "0.1.0",
    about = "Deploy a safety module from a TOML scenario and replay staking, reward and slashing actions"
)]
struct Cli {
    /// Path to the TOML scenario file.
    #[arg(long, global = true, default_value = "~/.bulwark/scenario.toml")]
    config: String,

    /// Overrides the scenario's log level. RUST_LOG takes precedence.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Deploy the module and replay every action.
    Run {
        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Deploy the module without replaying actions.
    Validate,

    /// Print the canonical hash of the deployment configuration.
    Hash,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let scenario = ScenarioConfig::load(&cli.config)
        .map_err(|e| format!("could not load scenario from {}: {}", cli.config, e))?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| scenario.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    tracing::debug!("Loaded scenario from {}", cli.config);

    match &cli.command {
        Commands::Run { json } => {
            commands::run::run(&scenario, OutputFormat::from_json_flag(*json))?
        }
        Commands::Validate => commands::validate::run(&scenario)?,
        Commands::Hash => commands::hash::run(&scenario)?,
    }

    Ok(())
}

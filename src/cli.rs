use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::simulation::IntervalErrorPolicy;

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: run the scenario and persist its results.
    #[clap(name = "simulate")]
    Simulate(Box<SimulateArgs>),

    /// Parse and validate a scenario without running it.
    #[clap(name = "validate")]
    Validate(ScenarioArgs),
}

#[derive(Parser)]
pub struct ScenarioArgs {
    /// Scenario TOML file.
    #[clap(long, env = "REPARTO_SCENARIO")]
    pub scenario: PathBuf,
}

#[derive(Parser)]
pub struct SimulateArgs {
    #[clap(flatten)]
    pub scenario: ScenarioArgs,

    /// Metered consumption CSV: `timestamp,participant_id,energy_kwh`.
    #[clap(long, env = "REPARTO_CONSUMPTION")]
    pub consumption: PathBuf,

    /// Hourly prices CSV: `timestamp,import,export`, Red Eléctrica is queried when omitted.
    #[clap(long, env = "REPARTO_PRICES")]
    pub prices: Option<PathBuf>,

    /// Output directory for the state file and the results.
    #[clap(long, default_value = "output", env = "REPARTO_OUTPUT")]
    pub output: PathBuf,

    /// Overrides the scenario's interval error policy.
    #[clap(long, value_enum, env = "REPARTO_ON_INTERVAL_ERROR")]
    pub on_interval_error: Option<IntervalErrorPolicy>,
}

#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod api;
mod cli;
mod config;
mod core;
mod prelude;
mod quantity;
mod store;
mod tables;

use std::sync::{Arc, atomic::AtomicBool};

use clap::{Parser, crate_version};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{Pvgis, Ree},
    cli::{Args, Command, SimulateArgs},
    config::Scenario,
    core::{orchestrator::Orchestrator, provider::PriceSource},
    prelude::*,
    store::{ConsumptionCsv, DirectorySink, PriceCsv},
    tables::{build_assets_table, build_global_table, build_participants_table},
};

#[tokio::main]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .without_time()
        .compact()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!(version = crate_version!(), "starting…");

    match Args::parse().command {
        Command::Simulate(args) => {
            simulate(*args).await?;
        }
        Command::Validate(args) => {
            Scenario::read_from(&args.scenario)?;
            info!("the scenario is valid");
        }
    }

    info!("done!");
    Ok(())
}

#[instrument(skip_all)]
async fn simulate(args: SimulateArgs) -> Result {
    let scenario = Scenario::read_from(&args.scenario.scenario)?;
    let mut simulation = scenario.to_simulation();
    if let Some(policy) = args.on_interval_error {
        simulation.on_interval_error = policy;
    }

    let cancelled = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&cancelled))?;
    signal_hook::flag::register(SIGINT, Arc::clone(&cancelled))?;

    let consumption = ConsumptionCsv::new(args.consumption);
    let environment = Pvgis::try_new(scenario.community.utc_offset_hours)?;
    let prices: Box<dyn PriceSource> = match args.prices {
        Some(path) => Box::new(PriceCsv::new(path)),
        None => Box::new(Ree::try_new()?),
    };
    let mut sink = DirectorySink::try_new(args.output)?;

    let results = Orchestrator::builder()
        .consumption(&consumption)
        .environment(&environment)
        .prices(prices.as_ref())
        .cancelled(cancelled)
        .build()
        .run(&mut simulation, &scenario.community, &mut sink)
        .await?;

    println!("{}", build_participants_table(&results));
    println!("{}", build_assets_table(&results));
    println!("{}", build_global_table(&results));
    info!(path = %sink.results_path().display(), "results persisted");
    Ok(())
}

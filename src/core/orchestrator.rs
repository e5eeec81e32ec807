use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::{NaiveDateTime, Timelike};
use itertools::Itertools;

use crate::{
    core::{
        aggregate::{Aggregator, Results},
        allocation::{AllocationEngine, IntervalInput},
        community::{AssetId, Community, ParticipantId},
        pricing::PriceSeries,
        provider::{ConsumptionSource, EnvironmentSource, PriceSource, ResultSink, Site},
        record::{EnvironmentalRecord, GenerationInterval, ParticipantInterval, StorageInterval},
        retry::Backoff,
        series::{Series, resample},
        simulation::{IntervalErrorPolicy, Simulation, SimulationState},
        storage::dispatcher::Dispatcher,
    },
    prelude::*,
    quantity::energy::KilowattHours,
};

/// Everything the interval loop needs, fetched up front.
struct Inputs {
    consumption: BTreeMap<ParticipantId, Series>,
    environment: Vec<EnvironmentalRecord>,
    generation: BTreeMap<AssetId, Series>,
    prices: PriceSeries,
}

#[derive(Default)]
struct IntervalLog {
    participants: Vec<ParticipantInterval>,
    storage: Vec<StorageInterval>,
    generation: Vec<GenerationInterval>,
    n_skipped: usize,
}

/// Runs a simulation from the inputs to the persisted results.
#[derive(bon::Builder)]
pub struct Orchestrator<'a> {
    consumption: &'a dyn ConsumptionSource,
    environment: &'a dyn EnvironmentSource,
    prices: &'a dyn PriceSource,

    #[builder(default)]
    backoff: Backoff,

    /// Checked between intervals, a set flag fails the run.
    cancelled: Option<Arc<AtomicBool>>,
}

impl Orchestrator<'_> {
    #[instrument(skip_all, fields(simulation.id = simulation.id))]
    pub async fn run(
        &self,
        simulation: &mut Simulation,
        community: &Community,
        sink: &mut dyn ResultSink,
    ) -> Result<Results> {
        if let Err(error) = community.validate() {
            simulation.transition(SimulationState::Failed)?;
            sink.record_state(simulation)?;
            return Err(error.context("invalid community"));
        }
        simulation.transition(SimulationState::Running)?;
        sink.record_state(simulation)?;

        match self.execute(simulation, community, sink).await {
            Ok(results) => {
                simulation.transition(SimulationState::Completed)?;
                sink.record_state(simulation)?;
                Ok(results)
            }
            Err(error) => {
                error!("simulation failed: {error:#}");
                if let Err(rollback_error) = sink.rollback() {
                    error!("rollback failed: {rollback_error:#}");
                }
                simulation.transition(SimulationState::Failed)?;
                sink.record_state(simulation)?;
                Err(error)
            }
        }
    }

    async fn execute(
        &self,
        simulation: &Simulation,
        community: &Community,
        sink: &mut dyn ResultSink,
    ) -> Result<Results> {
        let inputs = self.fetch_inputs(simulation, community).await?;
        let log = self.simulate(simulation, community, &inputs)?;

        let results = Aggregator::builder()
            .community(community)
            .window(simulation.window)
            .participant_intervals(&log.participants)
            .storage_intervals(&log.storage)
            .generation_intervals(&log.generation)
            .environment(&inputs.environment)
            .build()
            .aggregate()?;

        sink.begin()?;
        sink.write_environment(&inputs.environment)?;
        sink.write_participant_intervals(&log.participants)?;
        sink.write_storage_intervals(&log.storage)?;
        sink.write_generation_intervals(&log.generation)?;
        sink.write_results(&results)?;
        sink.commit()?;
        info!(n_intervals = log.participants.len(), "persisted");

        Ok(results)
    }

    #[instrument(skip_all)]
    async fn fetch_inputs(&self, simulation: &Simulation, community: &Community) -> Result<Inputs> {
        let window = simulation.window;
        let site = Site { latitude: community.latitude, longitude: community.longitude };

        let participant_ids =
            community.participants.iter().map(|participant| participant.id).collect_vec();
        let records = {
            let (source, participant_ids) = (self.consumption, participant_ids.as_slice());
            self.backoff
                .retry("consumption", move || source.fetch_consumption(participant_ids, window))
                .await?
        };
        ensure!(!records.is_empty(), "no consumption data for the requested period");
        let by_participant = records
            .into_iter()
            .filter(|record| window.contains(record.timestamp))
            .into_group_map_by(|record| record.participant_id);
        let mut consumption = BTreeMap::new();
        for participant_id in participant_ids {
            let series: Series = by_participant
                .get(&participant_id)
                .with_context(|| format!("no consumption data for participant {participant_id}"))?
                .iter()
                .map(|record| (record.timestamp, record.energy))
                .collect();
            consumption.insert(participant_id, resample(&series, window, simulation.interval));
        }
        info!(n_participants = consumption.len(), "fetched consumption");

        let environment = if community.generation_assets.is_empty() {
            Vec::new()
        } else {
            let source = self.environment;
            self.backoff
                .retry("environmental series", move || {
                    source.fetch_environmental_series(site, window)
                })
                .await?
        };
        info!(n_records = environment.len(), "fetched environmental series");

        let mut generation = BTreeMap::new();
        for asset in &community.generation_assets {
            let model = asset.model();
            let (model, source, weather) = (model.as_ref(), self.environment, environment.as_slice());
            let series = self
                .backoff
                .retry("generation", move || model.generate(source, weather, site, window))
                .await
                .with_context(|| format!("failed to compute the generation of asset {}", asset.id))?;
            let total: KilowattHours = series.values().copied().sum();
            info!(
                asset.id = %asset.id,
                technology = asset.technology.name(),
                %total,
                "precomputed generation",
            );
            generation.insert(asset.id, resample(&series, window, simulation.interval));
        }

        let prices = if community.has_dynamic_contracts() {
            let source = self.prices;
            let prices = self.backoff.retry("prices", move || source.fetch_prices(window)).await?;
            info!(n_prices = prices.len(), "fetched dynamic prices");
            prices
        } else {
            PriceSeries::default()
        };

        Ok(Inputs { consumption, environment, generation, prices })
    }

    #[instrument(skip_all)]
    fn simulate(
        &self,
        simulation: &Simulation,
        community: &Community,
        inputs: &Inputs,
    ) -> Result<IntervalLog> {
        let engine = AllocationEngine::builder()
            .community(community)
            .strategy(simulation.strategy)
            .prices(&inputs.prices)
            .build();
        let mut dispatcher = Dispatcher::new(community.storage_assets.iter().cloned());
        let mut log = IntervalLog::default();

        for timestamp in simulation.window.steps(simulation.interval) {
            if self.is_cancelled() {
                bail!("the simulation has been cancelled");
            }

            let consumption: BTreeMap<_, _> = inputs
                .consumption
                .iter()
                .filter_map(|(participant_id, series)| {
                    series.get(&timestamp).map(|energy| (*participant_id, *energy))
                })
                .collect();
            let generation = Self::generation_at(inputs, community, timestamp);
            let input = IntervalInput {
                timestamp,
                duration: simulation.interval,
                generation: generation.iter().map(|record| record.generated).sum(),
                consumption: &consumption,
            };

            match engine.run_interval(&input, &mut dispatcher) {
                Ok(outcome) => {
                    log.participants.extend(outcome.participants);
                    log.storage.extend(outcome.storage);
                    log.generation.extend(generation);
                }
                Err(error) => match simulation.on_interval_error {
                    IntervalErrorPolicy::Abort => return Err(error.into()),
                    IntervalErrorPolicy::Skip => {
                        warn!(%timestamp, "skipping the interval: {error}");
                        log.n_skipped += 1;
                    }
                },
            }
            if timestamp.hour() == 0 && timestamp.minute() == 0 {
                debug!(%timestamp, "simulating…");
            }
        }

        info!(
            n_participant_intervals = log.participants.len(),
            n_skipped = log.n_skipped,
            "simulated",
        );
        for unit in dispatcher.units() {
            info!(
                asset.id = %unit.asset.id,
                state_of_charge = %unit.state.state_of_charge,
                equivalent_cycles = unit.state.equivalent_cycles,
                degradation = unit.degradation().fraction(),
                "final storage state",
            );
        }
        Ok(log)
    }

    /// Generation of every asset over the interval, zero where the series has no sample.
    fn generation_at(
        inputs: &Inputs,
        community: &Community,
        timestamp: NaiveDateTime,
    ) -> Vec<GenerationInterval> {
        community
            .generation_assets
            .iter()
            .map(|asset| GenerationInterval {
                timestamp,
                asset_id: asset.id,
                generated: inputs
                    .generation
                    .get(&asset.id)
                    .and_then(|series| series.get(&timestamp))
                    .copied()
                    .unwrap_or(KilowattHours::ZERO),
            })
            .collect()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

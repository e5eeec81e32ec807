//! Collaborators the simulation fetches its inputs from and persists its results to.

use async_trait::async_trait;

use crate::{
    core::{
        aggregate::Results,
        community::{ParticipantId, PhotovoltaicParameters},
        pricing::PriceSeries,
        record::{
            ConsumptionRecord,
            EnvironmentalRecord,
            GenerationInterval,
            ParticipantInterval,
            StorageInterval,
        },
        series::Series,
        simulation::Simulation,
    },
    prelude::*,
    quantity::{power::Kilowatts, time_range::TimeRange},
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Site {
    pub latitude: f64,
    pub longitude: f64,
}

pub struct PhotovoltaicQuery<'a> {
    pub site: Site,
    pub window: TimeRange,
    pub nominal_power: Kilowatts,
    pub parameters: &'a PhotovoltaicParameters,
}

#[async_trait]
pub trait ConsumptionSource: Send + Sync {
    async fn fetch_consumption(
        &self,
        participants: &[ParticipantId],
        window: TimeRange,
    ) -> Result<Vec<ConsumptionRecord>>;
}

#[async_trait]
pub trait EnvironmentSource: Send + Sync {
    /// Hourly weather at the site.
    async fn fetch_environmental_series(
        &self,
        site: Site,
        window: TimeRange,
    ) -> Result<Vec<EnvironmentalRecord>>;

    /// Hourly output of a photovoltaic installation at the site.
    async fn fetch_pv_generation(&self, query: &PhotovoltaicQuery<'_>) -> Result<Series>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_prices(&self, window: TimeRange) -> Result<PriceSeries>;
}

/// Persistence of a simulation.
///
/// Writes between [`ResultSink::begin`] and [`ResultSink::commit`] become visible together or not
/// at all.
pub trait ResultSink {
    fn record_state(&mut self, simulation: &Simulation) -> Result;

    fn begin(&mut self) -> Result;

    fn write_environment(&mut self, records: &[EnvironmentalRecord]) -> Result;

    fn write_participant_intervals(&mut self, records: &[ParticipantInterval]) -> Result;

    fn write_storage_intervals(&mut self, records: &[StorageInterval]) -> Result;

    fn write_generation_intervals(&mut self, records: &[GenerationInterval]) -> Result;

    fn write_results(&mut self, results: &Results) -> Result;

    fn commit(&mut self) -> Result;

    /// Discard everything written since [`ResultSink::begin`], no-op without an open transaction.
    fn rollback(&mut self) -> Result;
}

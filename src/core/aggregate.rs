pub mod asset;
pub mod billing;
pub mod global;
pub mod participant;
pub mod totals;

use itertools::Itertools;
use serde::Serialize;

use crate::{
    core::{
        aggregate::{
            asset::{GenerationAssetResult, StorageAssetResult},
            global::GlobalResult,
            participant::ParticipantResult,
        },
        community::Community,
        record::{EnvironmentalRecord, GenerationInterval, ParticipantInterval, StorageInterval},
    },
    prelude::*,
    quantity::time_range::TimeRange,
};

/// Aggregate results of a simulation, created once and never changed.
#[derive(Clone, Debug, Serialize)]
pub struct Results {
    pub participants: Vec<ParticipantResult>,
    pub generation_assets: Vec<GenerationAssetResult>,
    pub storage_assets: Vec<StorageAssetResult>,
    pub global: GlobalResult,
}

/// Turns interval records into aggregate results, a pure function of its inputs.
#[derive(bon::Builder)]
pub struct Aggregator<'a> {
    community: &'a Community,
    window: TimeRange,
    participant_intervals: &'a [ParticipantInterval],
    storage_intervals: &'a [StorageInterval],
    generation_intervals: &'a [GenerationInterval],
    environment: &'a [EnvironmentalRecord],
}

impl Aggregator<'_> {
    #[instrument(skip_all, fields(n_participant_intervals = self.participant_intervals.len()))]
    pub fn aggregate(&self) -> Result<Results> {
        let participant_intervals =
            self.participant_intervals.iter().into_group_map_by(|record| record.participant_id);
        let participants = self
            .community
            .participants
            .iter()
            .map(|participant| {
                let contract = self
                    .community
                    .contract_of(participant)
                    .with_context(|| format!("participant {} has no contract", participant.id))?;
                let records =
                    participant_intervals.get(&participant.id).map_or(&[][..], Vec::as_slice);
                Ok(ParticipantResult::aggregate(participant, contract, records, self.window))
            })
            .collect::<Result<Vec<_>>>()?;

        let generation_intervals =
            self.generation_intervals.iter().into_group_map_by(|record| record.asset_id);
        let generation_assets = self
            .community
            .generation_assets
            .iter()
            .map(|asset| {
                let records = generation_intervals.get(&asset.id).map_or(&[][..], Vec::as_slice);
                GenerationAssetResult::aggregate(asset, records, self.environment, self.window)
            })
            .collect_vec();

        let storage_intervals =
            self.storage_intervals.iter().into_group_map_by(|record| record.asset_id);
        let storage_assets = self
            .community
            .storage_assets
            .iter()
            .map(|asset| {
                let records = storage_intervals.get(&asset.id).map_or(&[][..], Vec::as_slice);
                StorageAssetResult::aggregate(asset, records)
            })
            .collect_vec();

        let global = GlobalResult::aggregate(
            &participants,
            &generation_assets,
            self.community.investment(),
            self.window,
        );
        info!(
            savings = %global.savings,
            self_sufficiency = ?global.self_sufficiency_ratio,
            "aggregated",
        );
        Ok(Results { participants, generation_assets, storage_assets, global })
    }
}

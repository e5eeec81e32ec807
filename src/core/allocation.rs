use std::collections::BTreeMap;

use chrono::{NaiveDateTime, TimeDelta, Timelike};

use crate::{
    core::{
        community::{Community, Contract, ParticipantId, SHARE_TOLERANCE, SurplusStrategy},
        pricing::{Direction, PriceLookup, resolve_price},
        record::{ParticipantInterval, StorageInterval},
        storage::dispatcher::Dispatcher,
    },
    prelude::*,
    quantity::{energy::KilowattHours, rate::KilowattHourRate},
};

/// Reason an interval could not be processed. Storage state is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum IntervalError {
    #[error("consumption of participant {participant_id} is missing at {timestamp}")]
    MissingConsumption { timestamp: NaiveDateTime, participant_id: ParticipantId },

    #[error("participant {participant_id} has no contract")]
    MissingContract { participant_id: ParticipantId },

    #[error("invalid {quantity} at {timestamp}: {value}")]
    InvalidEnergy { timestamp: NaiveDateTime, quantity: &'static str, value: f64 },

    #[error("allocation shares sum to {total:.4} at {timestamp}, exceeding the whole generation")]
    OverAllocated { timestamp: NaiveDateTime, total: f64 },
}

pub struct IntervalInput<'a> {
    pub timestamp: NaiveDateTime,
    pub duration: TimeDelta,

    /// Total generation of the community over the interval.
    pub generation: KilowattHours,

    pub consumption: &'a BTreeMap<ParticipantId, KilowattHours>,
}

#[derive(Debug)]
pub struct IntervalOutcome {
    pub participants: Vec<ParticipantInterval>,
    pub storage: Vec<StorageInterval>,
}

/// Splits the community generation of an interval between the participants.
#[derive(bon::Builder)]
pub struct AllocationEngine<'a, L> {
    community: &'a Community,
    strategy: SurplusStrategy,
    prices: &'a L,
}

impl<L: PriceLookup> AllocationEngine<'_, L> {
    #[instrument(skip_all, level = "debug", fields(timestamp = %input.timestamp))]
    pub fn run_interval(
        &self,
        input: &IntervalInput<'_>,
        dispatcher: &mut Dispatcher,
    ) -> Result<IntervalOutcome, IntervalError> {
        let shares = self.validate(input)?;
        dispatcher.begin_interval(input.duration);
        let mut flows = dispatcher.idle_flows();
        let mut participants = Vec::with_capacity(shares.len());

        for (participant, contract, consumption, share) in shares {
            let allocated = input.generation * share;
            let autoconsumption = consumption.min(allocated);
            let net = allocated - consumption;

            let dispatch = dispatcher.dispatch(net);
            for (total, flow) in flows.iter_mut().zip(&dispatch.flows) {
                *total += *flow;
            }

            let residual = net - dispatch.net();
            let surplus = residual.max(KilowattHours::ZERO);
            let (surplus_compensated, surplus_curtailed, export_price) =
                if self.strategy.exports_surplus() {
                    let price =
                        resolve_price(contract, input.timestamp, Direction::Export, self.prices);
                    (surplus, KilowattHours::ZERO, price)
                } else {
                    (KilowattHours::ZERO, surplus, KilowattHourRate::ZERO)
                };

            participants.push(ParticipantInterval {
                timestamp: input.timestamp,
                participant_id: participant,
                consumption,
                allocated,
                autoconsumption,
                storage_absorbed: dispatch.absorbed,
                storage_delivered: dispatch.delivered,
                net_storage_flow: dispatch.net(),
                grid_import: (-residual).max(KilowattHours::ZERO),
                surplus_compensated,
                surplus_curtailed,
                import_price: resolve_price(
                    contract,
                    input.timestamp,
                    Direction::Import,
                    self.prices,
                ),
                export_price,
            });
        }

        Ok(IntervalOutcome { participants, storage: dispatcher.records(input.timestamp, &flows) })
    }

    /// Check all inputs before any storage state changes.
    fn validate(
        &self,
        input: &IntervalInput<'_>,
    ) -> Result<Vec<(ParticipantId, &Contract, KilowattHours, f64)>, IntervalError> {
        let timestamp = input.timestamp;
        if !input.generation.is_finite() || input.generation < KilowattHours::ZERO {
            return Err(IntervalError::InvalidEnergy {
                timestamp,
                quantity: "generation",
                value: input.generation.0,
            });
        }

        let hour = timestamp.hour();
        let total = self.community.total_share_at(hour);
        if total > 1.0 + SHARE_TOLERANCE {
            return Err(IntervalError::OverAllocated { timestamp, total });
        }

        self.community
            .participants
            .iter()
            .map(|participant| {
                let participant_id = participant.id;
                let consumption = *input
                    .consumption
                    .get(&participant_id)
                    .ok_or(IntervalError::MissingConsumption { timestamp, participant_id })?;
                if !consumption.is_finite() || consumption < KilowattHours::ZERO {
                    return Err(IntervalError::InvalidEnergy {
                        timestamp,
                        quantity: "consumption",
                        value: consumption.0,
                    });
                }
                let contract = self
                    .community
                    .contract_of(participant)
                    .ok_or(IntervalError::MissingContract { participant_id })?;
                Ok((participant_id, contract, consumption, participant.share_at(hour)))
            })
            .collect()
    }
}

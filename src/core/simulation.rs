use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};

use crate::{core::community::SurplusStrategy, prelude::*, quantity::time_range::TimeRange};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationState {
    #[display("PENDING")]
    Pending,

    #[display("RUNNING")]
    Running,

    #[display("COMPLETED")]
    Completed,

    #[display("FAILED")]
    Failed,
}

impl SimulationState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    const fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Failed)
                | (Self::Running, Self::Completed | Self::Failed)
        )
    }
}

/// What to do with an interval that cannot be processed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalErrorPolicy {
    /// Fail the whole simulation.
    #[default]
    Abort,

    /// Log the error and leave the interval out.
    Skip,
}

#[serde_as]
#[derive(Clone, Debug, Serialize)]
pub struct Simulation {
    pub id: u32,
    pub name: String,
    pub window: TimeRange,

    #[serde_as(as = "DurationSeconds<i64>")]
    pub interval: TimeDelta,

    pub strategy: SurplusStrategy,
    pub on_interval_error: IntervalErrorPolicy,
    state: SimulationState,
}

impl Simulation {
    pub const fn new(
        id: u32,
        name: String,
        window: TimeRange,
        interval: TimeDelta,
        strategy: SurplusStrategy,
        on_interval_error: IntervalErrorPolicy,
    ) -> Self {
        Self { id, name, window, interval, strategy, on_interval_error, state: SimulationState::Pending }
    }

    pub const fn state(&self) -> SimulationState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: SimulationState) -> Result {
        ensure!(!self.state.is_terminal(), "simulation {} is already {}", self.id, self.state);
        ensure!(
            self.state.can_become(next),
            "simulation {} cannot go from {} to {next}",
            self.id,
            self.state,
        );
        info!(id = self.id, from = %self.state, to = %next, "transition");
        self.state = next;
        Ok(())
    }
}

//! Scenario file: the simulation window and the community it runs on.

use std::{fmt::Debug, fs, path::Path};

use chrono::{NaiveDateTime, TimeDelta};
use serde::Deserialize;

use crate::{
    core::{
        community::{Community, SurplusStrategy},
        simulation::{IntervalErrorPolicy, Simulation},
    },
    prelude::*,
    quantity::time_range::TimeRange,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub simulation: SimulationSection,
    pub community: Community,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationSection {
    pub id: u32,
    pub name: String,
    pub start: NaiveDateTime,

    /// Exclusive.
    pub end: NaiveDateTime,

    #[serde(default = "SimulationSection::default_interval_minutes")]
    pub interval_minutes: u32,

    /// Overrides the community strategy for this run.
    #[serde(default)]
    pub strategy: Option<SurplusStrategy>,

    #[serde(default)]
    pub on_interval_error: IntervalErrorPolicy,
}

impl SimulationSection {
    const fn default_interval_minutes() -> u32 {
        60
    }
}

impl Scenario {
    #[instrument(skip_all, fields(path = ?path))]
    pub fn read_from<P: AsRef<Path> + Debug>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let scenario: Self = toml::from_slice(
            &fs::read(path).with_context(|| format!("failed to read `{}`", path.display()))?,
        )
        .with_context(|| format!("failed to parse `{}`", path.display()))?;
        scenario.validate()?;
        info!(
            community = %scenario.community.name,
            n_participants = scenario.community.participants.len(),
            n_generation_assets = scenario.community.generation_assets.len(),
            n_storage_assets = scenario.community.storage_assets.len(),
            "read the scenario",
        );
        Ok(scenario)
    }

    pub fn validate(&self) -> Result {
        let section = &self.simulation;
        ensure!(section.start < section.end, "the simulation must end after it starts");
        ensure!(
            (1..=1440).contains(&section.interval_minutes) && 1440 % section.interval_minutes == 0,
            "the interval must divide a day evenly",
        );
        self.community.validate().context("invalid community")
    }

    pub fn to_simulation(&self) -> Simulation {
        let section = &self.simulation;
        Simulation::new(
            section.id,
            section.name.clone(),
            TimeRange::new(section.start, section.end),
            TimeDelta::minutes(section.interval_minutes.into()),
            section.strategy.unwrap_or(self.community.strategy),
            section.on_interval_error,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        community::{AllocationCoefficient, ContractKind, GenerationTechnology},
        simulation::SimulationState,
    };

    const DEMO: &str = include_str!("../demos/scenario.toml");

    #[test]
    fn test_demo_scenario() -> Result {
        let scenario: Scenario = toml::from_str(DEMO)?;
        scenario.validate()?;

        let community = &scenario.community;
        assert_eq!(community.participants.len(), 3);
        assert_eq!(community.contract_of(&community.participants[1]).unwrap().kind, ContractKind::DynamicPvpc);
        assert_eq!(community.contract_of(&community.participants[2]).unwrap().kind, ContractKind::FixedMarket);
        assert!(matches!(
            community.participants[1].coefficient,
            Some(AllocationCoefficient::Scheduled { .. }),
        ));
        assert_eq!(community.participants[1].share_at(12), 0.4);
        assert_eq!(community.participants[1].share_at(18), 0.3);
        assert!(matches!(
            community.generation_assets[0].technology,
            GenerationTechnology::Photovoltaic(_),
        ));

        let simulation = scenario.to_simulation();
        assert_eq!(simulation.interval, TimeDelta::hours(1));
        assert_eq!(simulation.strategy, SurplusStrategy::CollectiveWithCompensation);
        assert_eq!(simulation.on_interval_error, IntervalErrorPolicy::Skip);
        assert_eq!(simulation.state(), SimulationState::Pending);
        assert_eq!(simulation.window.days(), 366.0);
        Ok(())
    }

    #[test]
    fn test_strategy_override() -> Result {
        let source = DEMO.replace(
            "on_interval_error = \"skip\"",
            "strategy = \"individual-without-surplus\"",
        );
        let scenario: Scenario = toml::from_str(&source)?;
        let simulation = scenario.to_simulation();
        assert_eq!(simulation.strategy, SurplusStrategy::IndividualWithoutSurplus);
        assert_eq!(simulation.on_interval_error, IntervalErrorPolicy::Abort);
        Ok(())
    }

    #[test]
    fn test_unknown_field() {
        let source = DEMO.replace("interval_minutes = 60", "interval_minutes = 60\nspeed = 11");
        assert!(toml::from_str::<Scenario>(&source).is_err());
    }

    #[test]
    fn test_unknown_contract_kind() -> Result {
        let source = DEMO.replace("kind = \"fixed-market\"", "kind = \"indexed\"");
        let scenario: Scenario = toml::from_str(&source)?;
        let contract = scenario.community.default_contract.as_ref().unwrap();
        assert_eq!(contract.kind, ContractKind::Unknown);
        Ok(())
    }

    #[test]
    fn test_invalid_window() -> Result {
        let source = DEMO.replace("end = \"2025-01-01T00:00:00\"", "end = \"2023-01-01T00:00:00\"");
        let scenario: Scenario = toml::from_str(&source)?;
        assert!(scenario.validate().is_err());
        Ok(())
    }

    #[test]
    fn test_over_allocated() -> Result {
        let source = DEMO.replace("share = 0.2", "share = 0.5");
        let scenario: Scenario = toml::from_str(&source)?;
        assert!(scenario.validate().is_err());
        Ok(())
    }
}

//! Static description of an energy community: participants, contracts, and assets.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::{
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts, rate::KilowattHourRate},
};

/// Tolerance for the sum of allocation shares.
pub(crate) const SHARE_TOLERANCE: f64 = 1e-9;

#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[display("#{_0}")]
pub struct ParticipantId(pub u32);

#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[display("#{_0}")]
pub struct AssetId(pub u32);

/// How the community treats the generation left over after self-consumption.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "kebab-case")]
pub enum SurplusStrategy {
    #[display("individual without surplus")]
    IndividualWithoutSurplus,

    #[display("collective without surplus")]
    CollectiveWithoutSurplus,

    #[display("individual with compensation")]
    IndividualWithCompensation,

    #[display("collective with compensation")]
    CollectiveWithCompensation,
}

impl SurplusStrategy {
    /// Whether the remaining surplus is fed into the grid and compensated.
    pub const fn exports_surplus(self) -> bool {
        matches!(self, Self::IndividualWithCompensation | Self::CollectiveWithCompensation)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "kebab-case")]
pub enum ContractKind {
    /// Fixed prices agreed with a retailer on the free market.
    #[display("fixed")]
    FixedMarket,

    /// Spanish regulated tariff, priced hourly.
    #[display("PVPC")]
    DynamicPvpc,

    #[serde(other)]
    #[display("unknown")]
    Unknown,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Contract {
    pub kind: ContractKind,

    /// Fixed import price, also the fallback for dynamic contracts.
    pub import_price: KilowattHourRate,

    #[serde(default)]
    pub export_price: KilowattHourRate,

    #[serde(default)]
    pub contracted_power: Kilowatts,

    /// Euro per contracted kilowatt per day.
    #[serde(default)]
    pub power_price: f64,
}

impl Contract {
    fn validate(&self) -> Result {
        ensure!(
            self.import_price.is_finite() && self.import_price >= KilowattHourRate::ZERO,
            "import price must be a non-negative number",
        );
        ensure!(self.export_price.is_finite(), "export price must be a number");
        ensure!(
            self.contracted_power.is_finite() && self.contracted_power >= Kilowatts::ZERO,
            "contracted power must be a non-negative number",
        );
        ensure!(
            self.power_price.is_finite() && self.power_price >= 0.0,
            "power price must be a non-negative number",
        );
        Ok(())
    }
}

/// Share of the community generation assigned to a participant.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AllocationCoefficient {
    Fixed {
        share: f64,
    },

    /// Hour-of-day shares, hours without an entry use the default.
    Scheduled {
        #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
        #[serde(default)]
        hourly: BTreeMap<u32, f64>,

        default: f64,
    },
}

impl AllocationCoefficient {
    pub fn share_at(&self, hour: u32) -> f64 {
        match self {
            Self::Fixed { share } => *share,
            Self::Scheduled { hourly, default } => hourly.get(&hour).copied().unwrap_or(*default),
        }
    }

    fn validate(&self) -> Result {
        match self {
            Self::Fixed { share } => {
                ensure!(*share > 0.0 && *share <= 1.0, "a fixed share must be within (0, 1]");
            }
            Self::Scheduled { hourly, .. } => {
                ensure!(
                    hourly.keys().all(|hour| *hour < 24),
                    "scheduled hours must be within 0..24",
                );
            }
        }
        ensure!(
            (0..24).map(|hour| self.share_at(hour)).all(|share| (0.0..=1.0).contains(&share)),
            "shares must be within [0, 1]",
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,

    #[serde(default)]
    pub contract: Option<Contract>,

    /// Participants without a coefficient receive no generation.
    #[serde(default)]
    pub coefficient: Option<AllocationCoefficient>,
}

impl Participant {
    pub fn share_at(&self, hour: u32) -> f64 {
        self.coefficient.as_ref().map_or(0.0, |coefficient| coefficient.share_at(hour))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
pub enum CellTechnology {
    #[serde(rename = "crystSi")]
    #[display("crystSi")]
    CrystallineSilicon,

    #[serde(rename = "CIS")]
    #[display("CIS")]
    CopperIndiumSelenide,

    #[serde(rename = "CdTe")]
    #[display("CdTe")]
    CadmiumTelluride,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhotovoltaicParameters {
    /// Panel inclination from the horizontal, degrees.
    pub tilt: f64,

    /// Panel orientation, degrees: 0 is south, -90 is east.
    pub azimuth: f64,

    /// System losses, percent.
    #[serde(default = "PhotovoltaicParameters::default_loss")]
    pub loss: f64,

    #[serde(default = "PhotovoltaicParameters::default_cell")]
    pub cell: CellTechnology,
}

impl PhotovoltaicParameters {
    const fn default_loss() -> f64 {
        14.0
    }

    const fn default_cell() -> CellTechnology {
        CellTechnology::CrystallineSilicon
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindTurbineParameters {
    /// Lookup table of wind speed (m/s) to electrical output, ascending by wind speed.
    pub power_curve: Vec<(f64, Kilowatts)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GenerationTechnology {
    Photovoltaic(PhotovoltaicParameters),
    WindTurbine(WindTurbineParameters),
}

impl GenerationTechnology {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Photovoltaic(_) => "photovoltaic",
            Self::WindTurbine(_) => "wind turbine",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationAsset {
    pub id: AssetId,
    pub name: String,
    pub nominal_power: Kilowatts,

    #[serde(default)]
    pub investment: Cost,

    pub technology: GenerationTechnology,
}

impl GenerationAsset {
    fn validate(&self) -> Result {
        ensure!(
            self.nominal_power.is_finite() && self.nominal_power > Kilowatts::ZERO,
            "nominal power must be positive",
        );
        if let GenerationTechnology::WindTurbine(parameters) = &self.technology {
            ensure!(!parameters.power_curve.is_empty(), "the power curve is empty");
            ensure!(
                parameters.power_curve.windows(2).all(|pair| pair[0].0 < pair[1].0),
                "the power curve must be strictly ascending by wind speed",
            );
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageAsset {
    pub id: AssetId,
    pub name: String,

    /// Nominal capacity before any degradation.
    pub capacity: KilowattHours,

    pub max_charge_power: Kilowatts,
    pub max_discharge_power: Kilowatts,

    /// Round-trip efficiency, percent.
    pub efficiency: f64,

    /// Maximum depth of discharge, percent.
    pub max_depth_of_discharge: f64,

    #[serde(default)]
    pub initial_state_of_charge: KilowattHours,

    #[serde(default)]
    pub investment: Cost,
}

impl StorageAsset {
    fn validate(&self) -> Result {
        ensure!(
            self.capacity.is_finite() && self.capacity > KilowattHours::ZERO,
            "capacity must be positive",
        );
        ensure!(
            self.max_charge_power >= Kilowatts::ZERO && self.max_discharge_power >= Kilowatts::ZERO,
            "power limits must be non-negative",
        );
        ensure!(
            self.efficiency > 0.0 && self.efficiency <= 100.0,
            "efficiency must be within (0, 100]",
        );
        ensure!(
            self.max_depth_of_discharge > 0.0 && self.max_depth_of_discharge <= 100.0,
            "maximum depth of discharge must be within (0, 100]",
        );
        ensure!(
            self.initial_state_of_charge >= KilowattHours::ZERO
                && self.initial_state_of_charge <= self.capacity,
            "initial state of charge must be within [0, capacity]",
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Community {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub strategy: SurplusStrategy,

    /// Offset of the community wall clock from UTC, hours.
    #[serde(default = "Community::default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Applies to participants that do not have their own contract.
    #[serde(default)]
    pub default_contract: Option<Contract>,

    pub participants: Vec<Participant>,

    #[serde(default)]
    pub generation_assets: Vec<GenerationAsset>,

    #[serde(default)]
    pub storage_assets: Vec<StorageAsset>,
}

impl Community {
    const fn default_utc_offset_hours() -> i32 {
        1
    }

    pub fn contract_of<'a>(&'a self, participant: &'a Participant) -> Option<&'a Contract> {
        participant.contract.as_ref().or(self.default_contract.as_ref())
    }

    pub fn has_dynamic_contracts(&self) -> bool {
        self.participants.iter().filter_map(|participant| self.contract_of(participant)).any(
            |contract| contract.kind == ContractKind::DynamicPvpc,
        )
    }

    /// Sum of all participant shares at the given hour of day.
    pub fn total_share_at(&self, hour: u32) -> f64 {
        self.participants.iter().map(|participant| participant.share_at(hour)).sum()
    }

    pub fn investment(&self) -> Cost {
        self.generation_assets
            .iter()
            .map(|asset| asset.investment)
            .chain(self.storage_assets.iter().map(|asset| asset.investment))
            .sum()
    }

    pub fn validate(&self) -> Result {
        ensure!(
            (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude),
            "invalid community location",
        );
        ensure!(!self.participants.is_empty(), "the community has no participants");

        let mut participant_ids = BTreeSet::new();
        for participant in &self.participants {
            ensure!(
                participant_ids.insert(participant.id),
                "duplicate participant {}",
                participant.id,
            );
            let contract = self
                .contract_of(participant)
                .with_context(|| format!("participant {} has no contract", participant.id))?;
            contract
                .validate()
                .with_context(|| format!("invalid contract of participant {}", participant.id))?;
            if contract.kind == ContractKind::Unknown {
                warn!(
                    participant_id = %participant.id,
                    "unrecognised contract type, the import price applies in both directions",
                );
            }
            if let Some(coefficient) = &participant.coefficient {
                coefficient.validate().with_context(|| {
                    format!("invalid allocation coefficient of participant {}", participant.id)
                })?;
            }
        }
        for hour in 0..24 {
            let total = self.total_share_at(hour);
            ensure!(
                total <= 1.0 + SHARE_TOLERANCE,
                "allocation shares sum to {total:.4} at {hour}:00, exceeding the whole generation",
            );
        }

        let mut asset_ids = BTreeSet::new();
        for asset in &self.generation_assets {
            ensure!(asset_ids.insert(asset.id), "duplicate asset {}", asset.id);
            asset.validate().with_context(|| format!("invalid generation asset {}", asset.id))?;
        }
        for asset in &self.storage_assets {
            ensure!(asset_ids.insert(asset.id), "duplicate asset {}", asset.id);
            asset.validate().with_context(|| format!("invalid storage asset {}", asset.id))?;
        }
        Ok(())
    }
}

//! Per-interval records produced by the simulation and the inputs it consumes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
    core::community::{AssetId, ParticipantId},
    quantity::{energy::KilowattHours, rate::KilowattHourRate},
};

/// Metered consumption of one participant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub timestamp: NaiveDateTime,
    pub participant_id: ParticipantId,

    #[serde(rename = "energy_kwh")]
    pub energy: KilowattHours,
}

/// Hourly weather at the community location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalRecord {
    pub timestamp: NaiveDateTime,

    /// In-plane irradiation over the hour, Wh/m².
    pub irradiance: f64,

    /// Air temperature, °C.
    pub temperature: f64,

    /// Wind speed, m/s.
    pub wind_speed: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParticipantInterval {
    pub timestamp: NaiveDateTime,
    pub participant_id: ParticipantId,
    pub consumption: KilowattHours,

    /// Generation assigned through the allocation coefficient.
    pub allocated: KilowattHours,

    /// Allocated generation consumed directly.
    pub autoconsumption: KilowattHours,

    /// Surplus taken by storage, conversion losses included.
    pub storage_absorbed: KilowattHours,

    /// Deficit covered by storage.
    pub storage_delivered: KilowattHours,

    /// Positive when storage absorbs, negative when it delivers.
    pub net_storage_flow: KilowattHours,

    pub grid_import: KilowattHours,
    pub surplus_compensated: KilowattHours,

    /// Surplus that could be neither stored nor exported.
    pub surplus_curtailed: KilowattHours,

    pub import_price: KilowattHourRate,
    pub export_price: KilowattHourRate,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StorageInterval {
    pub timestamp: NaiveDateTime,
    pub asset_id: AssetId,
    pub charged: KilowattHours,
    pub discharged: KilowattHours,
    pub losses: KilowattHours,

    /// State of charge at the end of the interval.
    pub state_of_charge: KilowattHours,

    pub equivalent_cycles: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationInterval {
    pub timestamp: NaiveDateTime,
    pub asset_id: AssetId,
    pub generated: KilowattHours,
}

use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

use crate::{
    core::{
        community::{AssetId, GenerationAsset, GenerationTechnology, StorageAsset},
        record::{EnvironmentalRecord, GenerationInterval, StorageInterval},
        storage::degradation::{DEGRADATION_PER_CYCLE, MAX_DEGRADATION},
    },
    quantity::{energy::KilowattHours, time_range::TimeRange},
};

#[derive(Clone, Debug, Serialize)]
pub struct GenerationAssetResult {
    pub asset_id: AssetId,
    pub name: String,
    pub technology: &'static str,
    pub generated: KilowattHours,

    /// Generation over the nominal output for the whole window, percent.
    pub capacity_factor: f64,

    /// Generation over the nominal output at the site irradiation, percent, photovoltaic only.
    pub performance_ratio: Option<f64>,
}

impl GenerationAssetResult {
    pub fn aggregate(
        asset: &GenerationAsset,
        records: &[&GenerationInterval],
        environment: &[EnvironmentalRecord],
        window: TimeRange,
    ) -> Self {
        let generated: KilowattHours = records.iter().map(|record| record.generated).sum();
        let nominal = asset.nominal_power * window.duration();
        let capacity_factor =
            if nominal > KilowattHours::ZERO { generated / nominal * 100.0 } else { 0.0 };

        let performance_ratio = match asset.technology {
            GenerationTechnology::Photovoltaic(_) => {
                // Wh/m² over the hour → kWh/m², at the 1 kW/m² reference.
                let irradiation: f64 = environment
                    .iter()
                    .filter(|record| window.contains(record.timestamp))
                    .map(|record| record.irradiance / 1000.0)
                    .sum();
                let reference = asset.nominal_power.0 * irradiation;
                (reference > 0.0).then(|| generated.0 / reference * 100.0)
            }
            GenerationTechnology::WindTurbine(_) => None,
        };

        Self {
            asset_id: asset.id,
            name: asset.name.clone(),
            technology: asset.technology.name(),
            generated,
            capacity_factor,
            performance_ratio,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StorageAssetResult {
    pub asset_id: AssetId,
    pub name: String,
    pub charged: KilowattHours,
    pub discharged: KilowattHours,
    pub losses: KilowattHours,
    pub equivalent_cycles: f64,

    /// State of charge over the nominal capacity, percent.
    pub mean_state_of_charge: f64,
    pub min_state_of_charge: f64,
    pub max_state_of_charge: f64,

    /// Estimated capacity loss, percent.
    pub degradation: f64,
}

impl StorageAssetResult {
    pub fn aggregate(asset: &StorageAsset, records: &[&StorageInterval]) -> Self {
        let charged: KilowattHours = records.iter().map(|record| record.charged).sum();
        let discharged: KilowattHours = records.iter().map(|record| record.discharged).sum();
        let losses: KilowattHours = records.iter().map(|record| record.losses).sum();
        let equivalent_cycles = discharged / asset.capacity;

        let fill = records
            .iter()
            .map(|record| record.state_of_charge / asset.capacity * 100.0)
            .collect_vec();
        #[allow(clippy::cast_precision_loss)]
        let mean_state_of_charge =
            if fill.is_empty() { 0.0 } else { fill.iter().sum::<f64>() / fill.len() as f64 };
        let (min_state_of_charge, max_state_of_charge) =
            match fill.iter().copied().minmax_by(f64::total_cmp) {
                MinMaxResult::NoElements => (0.0, 0.0),
                MinMaxResult::OneElement(value) => (value, value),
                MinMaxResult::MinMax(min, max) => (min, max),
            };

        // Deeper average cycling wears the cells faster.
        let mean_depth_of_discharge = 1.0 - mean_state_of_charge / 100.0;
        let degradation = (equivalent_cycles
            * DEGRADATION_PER_CYCLE
            * 100.0
            * (1.0 + mean_depth_of_discharge))
            .min(MAX_DEGRADATION * 100.0);

        Self {
            asset_id: asset.id,
            name: asset.name.clone(),
            charged,
            discharged,
            losses,
            equivalent_cycles,
            mean_state_of_charge,
            min_state_of_charge,
            max_state_of_charge,
            degradation,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    use super::*;
    use crate::{
        core::community::{CellTechnology, PhotovoltaicParameters, tests::battery},
        quantity::{cost::Cost, power::Kilowatts},
    };

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn photovoltaic() -> GenerationAsset {
        GenerationAsset {
            id: AssetId(10),
            name: "roof".to_string(),
            nominal_power: Kilowatts::from(5.0),
            investment: Cost::ZERO,
            technology: GenerationTechnology::Photovoltaic(PhotovoltaicParameters {
                tilt: 30.0,
                azimuth: 0.0,
                loss: 14.0,
                cell: CellTechnology::CrystallineSilicon,
            }),
        }
    }

    #[test]
    fn test_generation_kpis() {
        let records = [(10, 3.0), (11, 4.0)].map(|(hour, generated)| GenerationInterval {
            timestamp: at(hour),
            asset_id: AssetId(10),
            generated: KilowattHours::from(generated),
        });
        let environment = [(10, 800.0), (11, 1000.0)].map(|(hour, irradiance)| EnvironmentalRecord {
            timestamp: at(hour),
            irradiance,
            temperature: 25.0,
            wind_speed: 2.0,
        });
        let window = TimeRange::new(at(10), at(10) + TimeDelta::hours(2));
        let result = GenerationAssetResult::aggregate(
            &photovoltaic(),
            &records.iter().collect_vec(),
            &environment,
            window,
        );
        assert_abs_diff_eq!(result.generated.0, 7.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.capacity_factor, 70.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.performance_ratio.unwrap(), 7.0 / (5.0 * 1.8) * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_storage_kpis() {
        let records = [(0, 2.0, 0.0, 2.0), (1, 0.0, 1.0, 1.0), (2, 0.0, 0.0, 1.0)].map(
            |(hour, charged, discharged, soc)| StorageInterval {
                timestamp: at(hour),
                asset_id: AssetId(1),
                charged: KilowattHours::from(charged),
                discharged: KilowattHours::from(discharged),
                losses: KilowattHours::from(0.1),
                state_of_charge: KilowattHours::from(soc),
                equivalent_cycles: 0.0,
            },
        );
        let result = StorageAssetResult::aggregate(&battery(1), &records.iter().collect_vec());
        assert_abs_diff_eq!(result.charged.0, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.equivalent_cycles, 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(result.losses.0, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(result.mean_state_of_charge, 40.0 / 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.min_state_of_charge, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.max_state_of_charge, 20.0, epsilon = 1e-9);
        let mean_depth = 1.0 - 40.0 / 300.0;
        assert_abs_diff_eq!(result.degradation, 0.1 * 0.4 * (1.0 + mean_depth), epsilon = 1e-9);
    }

    #[test]
    fn test_storage_degradation_cap() {
        let records = [StorageInterval {
            timestamp: at(0),
            asset_id: AssetId(1),
            charged: KilowattHours::ZERO,
            discharged: KilowattHours::from(10_000.0),
            losses: KilowattHours::ZERO,
            state_of_charge: KilowattHours::ZERO,
            equivalent_cycles: 1000.0,
        }];
        let result = StorageAssetResult::aggregate(&battery(1), &records.iter().collect_vec());
        assert_abs_diff_eq!(result.degradation, 80.0, epsilon = 1e-9);
    }
}

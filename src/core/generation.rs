use async_trait::async_trait;
use chrono::TimeDelta;

use crate::{
    core::{
        community::{GenerationAsset, GenerationTechnology, PhotovoltaicParameters},
        provider::{EnvironmentSource, PhotovoltaicQuery, Site},
        record::EnvironmentalRecord,
        series::Series,
    },
    prelude::*,
    quantity::{power::Kilowatts, time_range::TimeRange},
};

/// Weather records are hourly means.
const WEATHER_STEP: TimeDelta = TimeDelta::hours(1);

#[async_trait]
pub trait GenerationModel: Send + Sync {
    /// Energy produced over the window, keyed by the start of each sample.
    async fn generate(
        &self,
        environment: &dyn EnvironmentSource,
        weather: &[EnvironmentalRecord],
        site: Site,
        window: TimeRange,
    ) -> Result<Series>;
}

impl GenerationAsset {
    pub fn model(&self) -> Box<dyn GenerationModel + '_> {
        match &self.technology {
            GenerationTechnology::Photovoltaic(parameters) => {
                Box::new(PhotovoltaicModel { nominal_power: self.nominal_power, parameters })
            }
            GenerationTechnology::WindTurbine(parameters) => Box::new(WindTurbineModel {
                nominal_power: self.nominal_power,
                power_curve: &parameters.power_curve,
            }),
        }
    }
}

/// Delegates to the irradiance model of the environment source.
pub struct PhotovoltaicModel<'a> {
    nominal_power: Kilowatts,
    parameters: &'a PhotovoltaicParameters,
}

#[async_trait]
impl<'a> GenerationModel for PhotovoltaicModel<'a> {
    async fn generate(
        &self,
        environment: &dyn EnvironmentSource,
        _weather: &[EnvironmentalRecord],
        site: Site,
        window: TimeRange,
    ) -> Result<Series> {
        let query = PhotovoltaicQuery {
            site,
            window,
            nominal_power: self.nominal_power,
            parameters: self.parameters,
        };
        environment.fetch_pv_generation(&query).await
    }
}

pub struct WindTurbineModel<'a> {
    nominal_power: Kilowatts,
    power_curve: &'a [(f64, Kilowatts)],
}

impl WindTurbineModel<'_> {
    /// Interpolate the power curve, no output outside of it.
    pub fn power_at(&self, wind_speed: f64) -> Kilowatts {
        let power = self
            .power_curve
            .windows(2)
            .find(|pair| (pair[0].0..=pair[1].0).contains(&wind_speed))
            .map_or_else(
                || match self.power_curve {
                    [(speed, power)] if *speed == wind_speed => *power,
                    _ => Kilowatts::ZERO,
                },
                |pair| {
                    let ((left_speed, left_power), (right_speed, right_power)) = (pair[0], pair[1]);
                    let ratio = (wind_speed - left_speed) / (right_speed - left_speed);
                    left_power + (right_power - left_power) * ratio
                },
            );
        power.clamp(Kilowatts::ZERO, self.nominal_power)
    }
}

#[async_trait]
impl<'a> GenerationModel for WindTurbineModel<'a> {
    async fn generate(
        &self,
        _environment: &dyn EnvironmentSource,
        weather: &[EnvironmentalRecord],
        _site: Site,
        window: TimeRange,
    ) -> Result<Series> {
        Ok(weather
            .iter()
            .filter(|record| window.contains(record.timestamp))
            .map(|record| (record.timestamp, self.power_at(record.wind_speed) * WEATHER_STEP))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::quantity::Quantity;

    fn turbine() -> WindTurbineModel<'static> {
        const CURVE: &[(f64, Kilowatts)] = &[
            (3.0, Kilowatts::ZERO),
            (8.0, Quantity(5.0)),
            (12.0, Quantity(10.0)),
            (25.0, Quantity(10.0)),
        ];
        WindTurbineModel { nominal_power: Kilowatts::from(10.0), power_curve: CURVE }
    }

    #[test]
    fn test_power_curve() {
        let turbine = turbine();
        assert_abs_diff_eq!(turbine.power_at(2.0).0, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(turbine.power_at(5.5).0, 2.5, epsilon = 1e-9);
        assert_abs_diff_eq!(turbine.power_at(8.0).0, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(turbine.power_at(20.0).0, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(turbine.power_at(30.0).0, 0.0, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_wind_generation() {
        struct NoEnvironment;

        #[async_trait]
        impl EnvironmentSource for NoEnvironment {
            async fn fetch_environmental_series(
                &self,
                _site: Site,
                _window: TimeRange,
            ) -> Result<Vec<EnvironmentalRecord>> {
                bail!("not expected")
            }

            async fn fetch_pv_generation(&self, _query: &PhotovoltaicQuery<'_>) -> Result<Series> {
                bail!("not expected")
            }
        }

        let at = |hour| -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(hour, 0, 0).unwrap()
        };
        let weather = [0, 1, 2].map(|hour| EnvironmentalRecord {
            timestamp: at(hour),
            irradiance: 0.0,
            temperature: 10.0,
            wind_speed: 5.5,
        });
        let series = turbine()
            .generate(
                &NoEnvironment,
                &weather,
                Site { latitude: 43.0, longitude: -8.0 },
                TimeRange::new(at(1), at(3)),
            )
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_abs_diff_eq!(series[&at(1)].0, 2.5, epsilon = 1e-9);
    }
}

//! [PVGIS](https://joint-research-centre.ec.europa.eu/photovoltaic-geographical-information-system-pvgis_en)
//! hourly radiation and PV output.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};
use reqwest::Client;
use serde::{Deserialize, Deserializer, de};

use crate::{
    api::client,
    core::{
        provider::{EnvironmentSource, PhotovoltaicQuery, Site},
        record::EnvironmentalRecord,
        series::Series,
    },
    prelude::*,
    quantity::{energy::KilowattHours, time_range::TimeRange},
};

const URL: &str = "https://re.jrc.ec.europa.eu/api/v5_3/seriescalc";

/// Leap year, so that every simulated calendar hour has a counterpart.
const REFERENCE_YEAR: i32 = 2020;

pub struct Api {
    client: Client,

    /// Offset of the community's clock from UTC.
    utc_offset: TimeDelta,
}

impl Api {
    pub fn try_new(utc_offset_hours: i32) -> Result<Self> {
        Ok(Self { client: client::try_new()?, utc_offset: TimeDelta::hours(utc_offset_hours.into()) })
    }

    #[instrument(skip_all, fields(latitude = site.latitude, longitude = site.longitude))]
    async fn get_hourly(&self, site: Site, parameters: &[(&str, String)]) -> Result<Vec<HourlyRecord>> {
        info!("fetching…");
        let records = self
            .client
            .get(URL)
            .query(&[
                ("lat", site.latitude.to_string()),
                ("lon", site.longitude.to_string()),
                ("startyear", REFERENCE_YEAR.to_string()),
                ("endyear", REFERENCE_YEAR.to_string()),
                ("outputformat", "json".to_string()),
            ])
            .query(parameters)
            .send()
            .await
            .context("failed to call")?
            .error_for_status()
            .context("request failed")?
            .json::<Response>()
            .await
            .context("failed to deserialize the response")?
            .outputs
            .hourly;
        info!(n_records = records.len(), "fetched");
        Ok(records)
    }

    /// Lay the reference year over the window, matching local calendar hours.
    fn project<'a>(
        &self,
        records: &'a [HourlyRecord],
        window: TimeRange,
    ) -> impl Iterator<Item = (NaiveDateTime, &'a HourlyRecord)> {
        let by_hour: HashMap<_, _> = records
            .iter()
            .map(|record| {
                let local = record.time + self.utc_offset;
                ((local.month(), local.day(), local.hour()), record)
            })
            .collect();
        window.steps(TimeDelta::hours(1)).filter_map(move |timestamp| {
            by_hour
                .get(&(timestamp.month(), timestamp.day(), timestamp.hour()))
                .map(|record| (timestamp, *record))
        })
    }
}

#[async_trait]
impl EnvironmentSource for Api {
    async fn fetch_environmental_series(
        &self,
        site: Site,
        window: TimeRange,
    ) -> Result<Vec<EnvironmentalRecord>> {
        let records = self.get_hourly(site, &[("pvcalculation", "0".to_string())]).await?;
        Ok(self
            .project(&records, window)
            .map(|(timestamp, record)| EnvironmentalRecord {
                timestamp,
                irradiance: record.irradiance,
                temperature: record.temperature,
                wind_speed: record.wind_speed,
            })
            .collect())
    }

    async fn fetch_pv_generation(&self, query: &PhotovoltaicQuery<'_>) -> Result<Series> {
        let parameters = [
            ("pvcalculation", "1".to_string()),
            ("peakpower", query.nominal_power.0.to_string()),
            ("loss", query.parameters.loss.to_string()),
            ("angle", query.parameters.tilt.to_string()),
            ("aspect", query.parameters.azimuth.to_string()),
            ("pvtechchoice", query.parameters.cell.to_string()),
        ];
        let records = self.get_hourly(query.site, &parameters).await?;
        Ok(self
            .project(&records, query.window)
            .map(|(timestamp, record)| (timestamp, KilowattHours::from(record.power / 1000.0)))
            .collect())
    }
}

#[derive(Deserialize)]
struct Response {
    outputs: Outputs,
}

#[derive(Deserialize)]
struct Outputs {
    hourly: Vec<HourlyRecord>,
}

#[derive(Deserialize)]
struct HourlyRecord {
    /// Start of the hour, UTC.
    #[serde(deserialize_with = "HourlyRecord::deserialize_time")]
    time: NaiveDateTime,

    /// PV output, watts.
    #[serde(rename = "P", default)]
    power: f64,

    /// In-plane irradiance, W/m².
    #[serde(rename = "G(i)", default)]
    irradiance: f64,

    #[serde(rename = "T2m")]
    temperature: f64,

    #[serde(rename = "WS10m")]
    wind_speed: f64,
}

impl HourlyRecord {
    /// PVGIS stamps hours as `20200101:0010`, the minutes mark the sun position sample.
    fn deserialize_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let time = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&time, "%Y%m%d:%H%M")
            .ok()
            .and_then(|time| time.with_minute(0))
            .ok_or_else(|| de::Error::invalid_value(de::Unexpected::Str(&time), &"YYYYMMDD:HHMM"))
    }
}

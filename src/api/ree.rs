//! [Red Eléctrica](https://www.ree.es/es/apidatos) market prices.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDateTime, TimeDelta, Timelike};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    api::client,
    core::{
        pricing::{DynamicPrice, PriceSeries},
        provider::PriceSource,
    },
    prelude::*,
    quantity::{rate::KilowattHourRate, time_range::TimeRange},
};

const URL: &str = "https://apidatos.ree.es/es/datos/mercados/precios-mercados-tiempo-real";

pub struct Api(Client);

impl Api {
    pub fn try_new() -> Result<Self> {
        Ok(Self(client::try_new()?))
    }

    /// The API refuses hourly ranges longer than a month.
    #[instrument(skip_all, fields(start = %chunk.start, end = %chunk.end))]
    async fn get_chunk(&self, chunk: TimeRange) -> Result<PriceSeries> {
        info!("fetching…");
        let indicators = self
            .0
            .get(URL)
            .query(&[
                ("start_date", chunk.start.format("%Y-%m-%dT%H:%M").to_string()),
                ("end_date", (chunk.end - TimeDelta::minutes(1)).format("%Y-%m-%dT%H:%M").to_string()),
                ("time_trunc", "hour".to_string()),
            ])
            .send()
            .await
            .context("failed to call")?
            .error_for_status()
            .context("request failed")?
            .json::<Response>()
            .await
            .context("failed to deserialize the response")?
            .included;
        let series = Self::merge(indicators)?;
        info!(n_prices = series.len(), "fetched");
        Ok(series)
    }

    /// Join the PVPC and spot indicators by the hour.
    fn merge(indicators: Vec<Indicator>) -> Result<PriceSeries> {
        let mut import = None;
        let mut export = None;
        for indicator in indicators {
            if indicator.kind.starts_with("PVPC") {
                import = Some(indicator.hourly());
            } else if indicator.kind.starts_with("Precio mercado spot") {
                export = Some(indicator.hourly());
            } else {
                debug!(indicator.kind, "ignored");
            }
        }
        let import = import.context("the response has no PVPC prices")?;
        let export = export.unwrap_or_else(|| {
            warn!("the response has no spot prices");
            BTreeMap::new()
        });
        Ok(import
            .into_iter()
            .map(|(timestamp, import)| {
                (timestamp, DynamicPrice { import, export: export.get(&timestamp).copied() })
            })
            .collect())
    }

    /// Split the window into calendar-month chunks.
    fn chunks(window: TimeRange) -> impl Iterator<Item = TimeRange> {
        std::iter::successors(Some(window.start), |start| {
            let first_of_month = start.date().with_day0(0)?.and_hms_opt(0, 0, 0)?;
            first_of_month.checked_add_months(Months::new(1))
        })
        .take_while(move |start| *start < window.end)
        .map(move |start| {
            let end = start
                .date()
                .with_day0(0)
                .and_then(|first| first.checked_add_months(Months::new(1)))
                .and_then(|next| next.and_hms_opt(0, 0, 0))
                .map_or(window.end, |next| next.min(window.end));
            TimeRange::new(start, end)
        })
    }
}

#[async_trait]
impl PriceSource for Api {
    async fn fetch_prices(&self, window: TimeRange) -> Result<PriceSeries> {
        let mut series = PriceSeries::default();
        for chunk in Self::chunks(window) {
            series.extend(self.get_chunk(chunk).await?);
        }
        Ok(series)
    }
}

#[derive(Deserialize)]
struct Response {
    included: Vec<Indicator>,
}

#[derive(Deserialize)]
struct Indicator {
    #[serde(rename = "type")]
    kind: String,

    attributes: Attributes,
}

impl Indicator {
    fn hourly(self) -> BTreeMap<NaiveDateTime, KilowattHourRate> {
        self.attributes
            .values
            .into_iter()
            .filter_map(|value| {
                let timestamp = value.datetime.naive_local().with_minute(0)?;
                Some((timestamp, KilowattHourRate::from_megawatt_hour_rate(value.value)))
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct Attributes {
    values: Vec<Value>,
}

#[derive(Deserialize)]
struct Value {
    /// Euro per megawatt-hour.
    value: f64,

    /// Local Spanish time with its offset.
    datetime: DateTime<FixedOffset>,
}

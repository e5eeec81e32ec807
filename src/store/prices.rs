use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DurationRound, NaiveDateTime, TimeDelta};
use serde::Deserialize;

use crate::{
    core::{
        pricing::{DynamicPrice, PriceSeries},
        provider::PriceSource,
    },
    prelude::*,
    quantity::{rate::KilowattHourRate, time_range::TimeRange},
};

/// Offline hourly prices as `timestamp,import,export` rows in €/kWh, the export column may be empty.
///
/// Rows apply to the whole hour they fall in, a later row for the same hour wins.
pub struct PriceCsv(PathBuf);

impl PriceCsv {
    pub const fn new(path: PathBuf) -> Self {
        Self(path)
    }
}

#[derive(Deserialize)]
struct Row {
    timestamp: NaiveDateTime,
    import: KilowattHourRate,
    export: Option<KilowattHourRate>,
}

#[async_trait]
impl PriceSource for PriceCsv {
    #[instrument(skip_all, fields(path = %self.0.display()))]
    async fn fetch_prices(&self, window: TimeRange) -> Result<PriceSeries> {
        let mut reader = csv::Reader::from_path(&self.0)
            .with_context(|| format!("failed to open `{}`", self.0.display()))?;
        let mut series = PriceSeries::default();
        for (index, row) in reader.deserialize::<Row>().enumerate() {
            let row = row.with_context(|| format!("malformed row #{}", index + 1))?;
            if window.contains(row.timestamp) {
                let hour = row
                    .timestamp
                    .duration_trunc(TimeDelta::hours(1))
                    .with_context(|| format!("invalid timestamp in row #{}", index + 1))?;
                series.extend([(hour, DynamicPrice { import: row.import, export: row.export })]);
            }
        }
        info!(n_prices = series.len(), "read prices");
        Ok(series)
    }
}

use std::path::PathBuf;

use async_trait::async_trait;

use crate::{
    core::{community::ParticipantId, provider::ConsumptionSource, record::ConsumptionRecord},
    prelude::*,
    quantity::time_range::TimeRange,
};

/// Metered consumption as `timestamp,participant_id,energy_kwh` rows.
pub struct ConsumptionCsv(PathBuf);

impl ConsumptionCsv {
    pub const fn new(path: PathBuf) -> Self {
        Self(path)
    }
}

#[async_trait]
impl ConsumptionSource for ConsumptionCsv {
    #[instrument(skip_all, fields(path = %self.0.display()))]
    async fn fetch_consumption(
        &self,
        participants: &[ParticipantId],
        window: TimeRange,
    ) -> Result<Vec<ConsumptionRecord>> {
        let mut reader = csv::Reader::from_path(&self.0)
            .with_context(|| format!("failed to open `{}`", self.0.display()))?;
        let mut records = Vec::new();
        for (index, record) in reader.deserialize::<ConsumptionRecord>().enumerate() {
            let record = record.with_context(|| format!("malformed row #{}", index + 1))?;
            if window.contains(record.timestamp) && participants.contains(&record.participant_id) {
                records.push(record);
            }
        }
        records.sort_by_key(|record| (record.timestamp, record.participant_id));
        info!(n_records = records.len(), "read consumption");
        Ok(records)
    }
}

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{
    core::{
        aggregate::Results,
        provider::ResultSink,
        record::{EnvironmentalRecord, GenerationInterval, ParticipantInterval, StorageInterval},
        simulation::{Simulation, SimulationState},
    },
    prelude::*,
};

const STATE_FILE: &str = "simulation.json";
const STAGING_DIR: &str = ".staging";
const RESULTS_DIR: &str = "results";

/// Persists a simulation under an output directory.
///
/// Transactional writes go to a staging directory that replaces `results/` on commit.
/// `results/` only exists next to a completed simulation.
pub struct DirectorySink {
    root: PathBuf,
    staging: Option<PathBuf>,
}

impl DirectorySink {
    pub fn try_new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).with_context(|| format!("failed to create `{}`", root.display()))?;
        Ok(Self { root, staging: None })
    }

    pub fn results_path(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    fn staging(&self) -> Result<&Path> {
        self.staging.as_deref().context("no open transaction")
    }

    fn write_csv<T: Serialize>(&self, name: &str, records: &[T]) -> Result {
        let path = self.staging()?.join(name);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create `{}`", path.display()))?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        debug!(path = %path.display(), n_records = records.len(), "written");
        Ok(())
    }

    /// Remove the results left by an earlier simulation.
    fn discard_results(&self) -> Result {
        let path = self.results_path();
        if path.exists() {
            fs::remove_dir_all(&path)
                .with_context(|| format!("failed to remove `{}`", path.display()))?;
            info!(path = %path.display(), "removed the previous results");
        }
        Ok(())
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result {
        let temporary = path.with_extension("json.tmp");
        fs::write(&temporary, serde_json::to_vec_pretty(value)?)
            .with_context(|| format!("failed to write `{}`", temporary.display()))?;
        fs::rename(&temporary, path)
            .with_context(|| format!("failed to replace `{}`", path.display()))?;
        Ok(())
    }
}

impl ResultSink for DirectorySink {
    fn record_state(&mut self, simulation: &Simulation) -> Result {
        info!(simulation.id, state = %simulation.state(), "state changed");
        Self::write_json(&self.root.join(STATE_FILE), simulation)?;
        if simulation.state() != SimulationState::Completed {
            self.discard_results()?;
        }
        Ok(())
    }

    fn begin(&mut self) -> Result {
        ensure!(self.staging.is_none(), "a transaction is already open");
        let staging = self.root.join(STAGING_DIR);
        if staging.exists() {
            warn!(path = %staging.display(), "removing a stale staging directory");
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir(&staging)
            .with_context(|| format!("failed to create `{}`", staging.display()))?;
        self.staging = Some(staging);
        Ok(())
    }

    fn write_environment(&mut self, records: &[EnvironmentalRecord]) -> Result {
        self.write_csv("environment.csv", records)
    }

    fn write_participant_intervals(&mut self, records: &[ParticipantInterval]) -> Result {
        self.write_csv("participant_intervals.csv", records)
    }

    fn write_storage_intervals(&mut self, records: &[StorageInterval]) -> Result {
        self.write_csv("storage_intervals.csv", records)
    }

    fn write_generation_intervals(&mut self, records: &[GenerationInterval]) -> Result {
        self.write_csv("generation_intervals.csv", records)
    }

    fn write_results(&mut self, results: &Results) -> Result {
        Self::write_json(&self.staging()?.join("results.json"), results)
    }

    fn commit(&mut self) -> Result {
        let staging = self.staging.take().context("no open transaction")?;
        let target = self.results_path();
        if target.exists() {
            fs::remove_dir_all(&target)
                .with_context(|| format!("failed to remove `{}`", target.display()))?;
        }
        fs::rename(&staging, &target)
            .with_context(|| format!("failed to move the results into `{}`", target.display()))?;
        info!(path = %target.display(), "committed");
        Ok(())
    }

    fn rollback(&mut self) -> Result {
        if let Some(staging) = self.staging.take() {
            fs::remove_dir_all(&staging)
                .with_context(|| format!("failed to remove `{}`", staging.display()))?;
            warn!("rolled back");
        }
        Ok(())
    }
}

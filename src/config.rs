//! Run configuration and the tunable constants of the pipeline.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct RunConfig {
    pub description: Option<String>,
    pub panels: Vec<PanelTask>,
    #[serde(default)]
    pub sample: SampleConfig,
    #[serde(default)]
    pub main_job: MainJobThresholds,
    #[serde(default = "default_spell_id_offset")]
    pub spell_id_offset: u64,
}

/// One panel-year and the wave files that make it up, in wave order.
#[derive(Deserialize, Debug, Clone)]
pub struct PanelTask {
    pub panel_year: i32,
    pub description: Option<String>,
    pub waves: Vec<String>,
}

/// Inclusive age band of the analysis sample.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct SampleConfig {
    pub min_age: i32,
    pub max_age: i32,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self { min_age: 18, max_age: 65 }
    }
}

/// Day offsets from the reference month start used to decide which of two
/// concurrent jobs covers the month.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct MainJobThresholds {
    /// The main job must start no later than this many days into the month.
    pub start_within_days: u64,
    /// ... and end no earlier than this many days into the month.
    pub end_after_days: u64,
    /// The other job is ruled out if it ends before this many days.
    pub other_end_before_days: u64,
}

impl Default for MainJobThresholds {
    fn default() -> Self {
        Self {
            start_within_days: 14,
            end_after_days: 21,
            other_end_before_days: 7,
        }
    }
}

fn default_spell_id_offset() -> u64 {
    100_000
}

/// Settings shared by every panel-year of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub sample: SampleConfig,
    pub main_job: MainJobThresholds,
    /// Spell ids are offset by `panel_year * spell_id_offset`.
    pub spell_id_offset: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample: SampleConfig::default(),
            main_job: MainJobThresholds::default(),
            spell_id_offset: default_spell_id_offset(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open run configuration file: {}", path.display()))?;
        let config: RunConfig = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse run configuration YAML from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sample.min_age > self.sample.max_age {
            anyhow::bail!(
                "Invalid sample age band: min_age {} is greater than max_age {}",
                self.sample.min_age,
                self.sample.max_age
            );
        }
        let mut seen = std::collections::HashSet::new();
        for task in &self.panels {
            if !seen.insert(task.panel_year) {
                anyhow::bail!("Panel {} is listed more than once in the run configuration", task.panel_year);
            }
            if task.waves.is_empty() {
                anyhow::bail!("Panel {} has no wave file patterns", task.panel_year);
            }
            if crate::spells::spell_id_base(task.panel_year, self.spell_id_offset).is_none() {
                anyhow::bail!(
                    "Panel {}: spell_id_offset {} does not give a valid spell id range",
                    task.panel_year,
                    self.spell_id_offset
                );
            }
        }
        Ok(())
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            sample: self.sample,
            main_job: self.main_job,
            spell_id_offset: self.spell_id_offset,
        }
    }
}

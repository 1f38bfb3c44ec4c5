//! Per-panel diagnostic counts.

use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use log::info;
use serde::Serialize;

use crate::filter::FilterReport;
use crate::record::PersonMonth;
use crate::spells::{SpellRef, SpellTyping};

/// Distinct spells of one type, how many individuals they belong to, and how
/// many of them have both a source and a destination occupation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpellCounts {
    pub spells: usize,
    pub individuals: usize,
    pub spells_with_occupations: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PanelSummary {
    pub panel_year: i32,
    pub rows: usize,
    pub individuals: usize,
    pub ubar: SpellCounts,
    pub ustar: SpellCounts,
    pub u: SpellCounts,
    pub employed_without_main_job: usize,
    pub employed_without_occupation: usize,
    pub filter: FilterReport,
}

fn count_spells(rows: &[PersonMonth], level: fn(&SpellTyping) -> Option<SpellRef>) -> SpellCounts {
    let mut spells = HashSet::new();
    let mut individuals = HashSet::new();
    let mut resolved = HashSet::new();
    for row in rows {
        let Some(spell) = level(&row.spells) else {
            continue;
        };
        spells.insert(spell.id);
        individuals.insert(row.individual_key);
        if row.occupation.source_occupation.is_some() && row.occupation.destination_occupation.is_some() {
            resolved.insert(spell.id);
        }
    }
    SpellCounts {
        spells: spells.len(),
        individuals: individuals.len(),
        spells_with_occupations: resolved.len(),
    }
}

pub fn summarize(panel_year: i32, rows: &[PersonMonth], filter: FilterReport) -> PanelSummary {
    let employed = || rows.iter().filter(|row| row.status.employed);
    PanelSummary {
        panel_year,
        rows: rows.len(),
        individuals: rows.iter().map(|row| row.individual_key).collect::<HashSet<_>>().len(),
        ubar: count_spells(rows, |t| t.ubar),
        ustar: count_spells(rows, |t| t.ustar),
        u: count_spells(rows, |t| t.u),
        employed_without_main_job: employed().filter(|row| row.occupation.main_job.is_none()).count(),
        employed_without_occupation: employed().filter(|row| row.occupation.occupation.is_none()).count(),
        filter,
    }
}

impl PanelSummary {
    pub fn log(&self) {
        info!(
            "Panel {}: {} rows, {} individuals",
            self.panel_year, self.rows, self.individuals
        );
        for (name, counts) in [("ubar", &self.ubar), ("ustar", &self.ustar), ("u", &self.u)] {
            info!(
                "  {} spells: {} ({} individuals), {} with source and destination occupation",
                name, counts.spells, counts.individuals, counts.spells_with_occupations
            );
        }
        info!(
            "  Employed months without a main job: {}, without an occupation: {}",
            self.employed_without_main_job, self.employed_without_occupation
        );
    }
}

/// Everything written to `summary.json` at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: String,
    pub description: Option<String>,
    pub panels: Vec<PanelSummary>,
    pub failed_panels: Vec<i32>,
}

impl RunReport {
    /// Panels are listed by panel year whatever order they finished in.
    pub fn new(description: Option<String>, mut panels: Vec<PanelSummary>, mut failed_panels: Vec<i32>) -> Self {
        panels.sort_by_key(|summary| summary.panel_year);
        failed_panels.sort_unstable();
        Self {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            description,
            panels,
            failed_panels,
        }
    }
}

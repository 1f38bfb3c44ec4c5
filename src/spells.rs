//! Employment to non-employment to employment spells.
//!
//! Inside each contiguous spell of an individual, runs of non-employed
//! months are candidate spells. A candidate survives only if it is entered
//! from an employed month and left into an employed month, both observed.
//! Surviving spells are typed at three nested levels:
//!
//! * `ubar`: any surviving non-employment run,
//! * `ustar`: a `ubar` spell with at least one unemployed month,
//! * `u`: a `ubar` spell in which every month is unemployed.
//!
//! Ids are assigned densely in row order and never renumbered after
//! qualification, then offset by `panel_year * spell_id_offset` so that
//! spells of pooled panels stay distinct.

use std::collections::HashMap;

use log::debug;

use crate::continuity::Continuity;
use crate::error::{PanelError, Result};
use crate::record::PersonMonth;
use crate::status::MonthlyStatus;
use crate::window::Groups;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpellRef {
    pub id: u64,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpellTyping {
    /// Employed last month, not employed this month.
    pub start_of_ubar: bool,
    /// Not employed this month, employed next month.
    pub end_of_ubar: bool,
    pub ubar: Option<SpellRef>,
    pub ustar: Option<SpellRef>,
    pub u: Option<SpellRef>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Candidate {
    rows: u32,
    unemployed_rows: u32,
    has_start: bool,
    has_end: bool,
}

impl Candidate {
    fn qualifies(&self) -> bool {
        self.has_start && self.has_end
    }
}

pub fn type_spells(
    rows: &[PersonMonth],
    statuses: &[MonthlyStatus],
    continuity: &[Continuity],
    panel_year: i32,
    spell_id_offset: u64,
) -> Result<Vec<SpellTyping>> {
    let keys: Vec<(u64, u32)> = rows
        .iter()
        .zip(continuity)
        .map(|(row, c)| (row.individual_key, c.spell_number))
        .collect();
    let spells = Groups::by_key(&keys, |key| *key);

    let employed: Vec<bool> = statuses.iter().map(|s| s.employed).collect();
    let prev_employed = spells.shift(&employed, -1);
    let next_employed = spells.shift(&employed, 1);

    let starts: Vec<bool> = (0..rows.len())
        .map(|i| prev_employed[i] == Some(true) && !employed[i])
        .collect();
    let ends: Vec<bool> = (0..rows.len())
        .map(|i| next_employed[i] == Some(true) && !employed[i])
        .collect();
    let starts_so_far = spells.running(&starts, 0u32, |acc, &s| acc + u32::from(s));

    // Arena of candidate runs keyed by (individual, spell, run).
    let mut arena: HashMap<(u64, u32, u32), usize> = HashMap::new();
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut candidate_of: Vec<Option<usize>> = Vec::with_capacity(rows.len());
    for i in 0..rows.len() {
        if employed[i] {
            candidate_of.push(None);
            continue;
        }
        let (individual, spell) = keys[i];
        let run = starts_so_far[i] + 1;
        let index = *arena.entry((individual, spell, run)).or_insert_with(|| {
            candidates.push(Candidate::default());
            candidates.len() - 1
        });
        let candidate = &mut candidates[index];
        candidate.rows += 1;
        candidate.unemployed_rows += u32::from(statuses[i].unemployed);
        candidate.has_start |= starts[i];
        candidate.has_end |= ends[i];
        candidate_of.push(Some(index));
    }

    let overflow = || PanelError::SpellIdOverflow {
        panel_year,
        spell_id_offset,
    };
    // Largest id handed out is base + candidates.len().
    let base = spell_id_base(panel_year, spell_id_offset)
        .filter(|base| base.checked_add(candidates.len() as u64).is_some())
        .ok_or_else(overflow)?;
    let typed: Vec<SpellTyping> = (0..rows.len())
        .map(|i| {
            let mut typing = SpellTyping {
                start_of_ubar: starts[i],
                end_of_ubar: ends[i],
                ..Default::default()
            };
            let Some(index) = candidate_of[i] else {
                return typing;
            };
            let candidate = candidates[index];
            if !candidate.qualifies() {
                return typing;
            }
            let spell = SpellRef {
                id: base + index as u64 + 1,
                length: candidate.rows,
            };
            typing.ubar = Some(spell);
            if candidate.unemployed_rows > 0 {
                typing.ustar = Some(spell);
            }
            if candidate.unemployed_rows == candidate.rows {
                typing.u = Some(spell);
            }
            typing
        })
        .collect();

    debug!(
        "Spells: {} candidate runs, {} qualify",
        candidates.len(),
        candidates.iter().filter(|c| c.qualifies()).count()
    );
    Ok(typed)
}

/// First id of a panel-year's spell range, `None` for a negative year or
/// when the product overflows.
pub fn spell_id_base(panel_year: i32, spell_id_offset: u64) -> Option<u64> {
    u64::try_from(panel_year).ok()?.checked_mul(spell_id_offset)
}

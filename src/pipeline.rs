//! One panel-year from raw wave records to the augmented table.

use log::debug;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::record::{PersonMonth, RawRecord};
use crate::summary::{self, PanelSummary};
use crate::{continuity, demographics, filter, identity, occupation, spells, status, weights};

#[derive(Debug, Clone)]
pub struct PanelOutput {
    pub panel_year: i32,
    /// Sorted by (individual, calendar month).
    pub rows: Vec<PersonMonth>,
    pub summary: PanelSummary,
}

/// Runs every stage over the concatenated waves of one panel-year. Reads no
/// state beyond its arguments, so panels can be processed in parallel.
pub fn process_panel(panel_year: i32, records: Vec<RawRecord>, config: &PipelineConfig) -> Result<PanelOutput> {
    let rows = identity::normalize(panel_year, records)?;
    let (mut rows, filter_report) = filter::apply(rows, &config.sample);
    identity::check_contract(panel_year, &rows)?;

    for row in rows.iter_mut() {
        row.demographics = demographics::recode(&row.raw);
    }

    let statuses = status::classify(&rows);
    let continuity = continuity::segment(&rows);
    let typed = spells::type_spells(&rows, &statuses, &continuity, panel_year, config.spell_id_offset)?;
    let flows = occupation::resolve(&rows, &statuses, &typed, &config.main_job);
    let raw_weights: Vec<Option<f64>> = rows.iter().map(|row| row.raw.weight).collect();
    let normalized = weights::normalize(&raw_weights);

    for (i, row) in rows.iter_mut().enumerate() {
        row.status = statuses[i];
        row.continuity = continuity[i];
        row.spells = typed[i];
        row.occupation = flows[i];
        row.normalized_weight = normalized[i];
    }
    debug!("Panel {}: all stages complete", panel_year);

    let summary = summary::summarize(panel_year, &rows, filter_report);
    Ok(PanelOutput {
        panel_year,
        rows,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PanelError;

    /// An in-sample employed (`E`) or idle (`N`) month.
    fn month(subject_key: u64, month: i32, state: char, occ: i32) -> RawRecord {
        let employed = state == 'E';
        RawRecord {
            subject_key,
            year: 2001,
            month,
            interview_status: Some(1),
            birth_year: Some(1970),
            armed_forces_ever: Some(2),
            monthly_status: Some(if employed { 1 } else { 8 }),
            job_id_1: employed.then_some(9),
            occupation_1: employed.then_some(occ),
            occupation_allocated_1: employed.then_some(0),
            weight: Some(1000.0),
            ..Default::default()
        }
    }

    fn person(subject_key: u64, pattern: &str, occ: i32) -> Vec<RawRecord> {
        pattern
            .chars()
            .enumerate()
            .filter(|(_, c)| *c != '.')
            .map(|(i, c)| month(subject_key, i as i32 + 1, c, occ + i as i32))
            .collect()
    }

    #[test]
    fn augments_rows_and_counts_spells() {
        let mut records = person(1, "ENNE", 100);
        records.extend(person(2, "EEEE", 200));
        records.extend(person(3, "ENE.N", 300));
        let output = process_panel(2001, records, &PipelineConfig::default()).unwrap();

        assert_eq!(output.rows.len(), 12);
        let spell_rows: Vec<&PersonMonth> = output.rows.iter().filter(|r| r.spells.ubar.is_some()).collect();
        assert_eq!(spell_rows.len(), 3);
        assert_eq!(spell_rows[0].occupation.source_occupation, Some(100));
        assert_eq!(spell_rows[0].occupation.destination_occupation, Some(103));
        assert_eq!(spell_rows[2].raw.subject_key, 3);
        assert_eq!(spell_rows[2].raw.month, 2);

        let summary = &output.summary;
        assert_eq!(summary.rows, 12);
        assert_eq!(summary.individuals, 3);
        assert_eq!(summary.ubar.spells, 2);
        assert_eq!(summary.ubar.individuals, 2);
        assert_eq!(summary.ubar.spells_with_occupations, 2);
        assert_eq!(summary.ustar.spells, 0);
        assert_eq!(summary.u.spells, 0);
        assert_eq!(summary.employed_without_main_job, 0);
        assert_eq!(summary.filter.retained_individuals, 3);

        let total: f64 = output.rows.iter().filter_map(|r| r.normalized_weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(output.rows.iter().all(|r| r.demographics.age == Some(31)));
    }

    #[test]
    fn every_row_has_exactly_one_labor_force_state() {
        let mut records = person(1, "ENNEE", 100);
        let mut looking = month(2, 1, 'N', 0);
        looking.monthly_status = Some(6);
        looking.week_2 = Some(4);
        records.push(looking);
        let mut retiring = month(2, 2, 'N', 0);
        retiring.not_working_reason = Some(4);
        records.push(retiring);
        records.push(month(2, 3, 'E', 500));

        let output = process_panel(2001, records, &PipelineConfig::default()).unwrap();
        for row in &output.rows {
            let s = row.status;
            assert_eq!(u8::from(s.employed) + u8::from(s.unemployed) + u8::from(s.out_of_labor_force), 1);
        }
        let person_two: Vec<_> = output.rows.iter().filter(|r| r.raw.subject_key == 2).collect();
        assert!(person_two[0].status.unemployed);
        assert!(person_two[1].status.retired && person_two[2].status.retired);
        assert!(!person_two[2].status.employed);
    }

    #[test]
    fn duplicate_months_abort_the_panel() {
        let records = vec![month(1, 1, 'E', 10), month(1, 1, 'E', 10)];
        assert!(matches!(
            process_panel(2001, records, &PipelineConfig::default()),
            Err(PanelError::DuplicateMonth { .. })
        ));
    }

    #[test]
    fn spell_ids_differ_between_panels() {
        let first = process_panel(1996, person(1, "ENE", 1), &PipelineConfig::default()).unwrap();
        let second = process_panel(2001, person(1, "ENE", 1), &PipelineConfig::default()).unwrap();
        assert_ne!(first.rows[1].spells.ubar, second.rows[1].spells.ubar);
        assert_ne!(first.rows[1].individual_key, second.rows[1].individual_key);
    }
}

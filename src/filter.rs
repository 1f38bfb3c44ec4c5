//! Sample restrictions.
//!
//! Each step is a hard filter. Person-level flags are a max over the rows
//! that survived the previous steps, broadcast back onto every row of the
//! person, so dropping a person never touches another person's rows.

use log::info;
use serde::Serialize;

use crate::codes::{armed_forces, interview};
use crate::config::SampleConfig;
use crate::identity;
use crate::record::{PersonMonth, RawRecord};
use crate::window::Groups;

/// Rows removed by each restriction, in the order they are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub input_rows: usize,
    pub dropped_interview: usize,
    pub dropped_self_employed: usize,
    pub dropped_age: usize,
    pub dropped_armed_forces: usize,
    pub retained_rows: usize,
    pub retained_individuals: usize,
}

pub fn completed_interview(raw: &RawRecord) -> bool {
    raw.interview_status
        .is_some_and(|code| interview::COMPLETED.contains(&code))
}

pub fn is_self_employed(raw: &RawRecord) -> bool {
    raw.business_count.is_some_and(|count| count >= 1)
        || raw.business_id_1.is_some()
        || raw.business_id_2.is_some()
}

pub fn age(raw: &RawRecord) -> Option<i32> {
    raw.birth_year.map(|birth| raw.year - birth)
}

/// 1 if ever served, 0 if never, −1 if not in universe.
pub fn armed_forces_flag(raw: &RawRecord) -> Option<i8> {
    match raw.armed_forces_ever {
        Some(armed_forces::YES) => Some(1),
        Some(armed_forces::NO) => Some(0),
        Some(armed_forces::NOT_IN_UNIVERSE) => Some(-1),
        _ => None,
    }
}

fn retain_by_mask(rows: &mut Vec<PersonMonth>, keep: Vec<bool>) -> usize {
    let before = rows.len();
    let mut mask = keep.into_iter();
    rows.retain(|_| mask.next().unwrap_or(false));
    before - rows.len()
}

/// Drops every row of individuals for whom `flag` holds on any row.
fn drop_flagged_individuals<F>(rows: &mut Vec<PersonMonth>, flag: F) -> usize
where
    F: Fn(&PersonMonth) -> bool,
{
    let individuals = Groups::by_key(rows.as_slice(), |row| row.individual_key);
    let row_flags: Vec<bool> = rows.iter().map(flag).collect();
    let ever = individuals.broadcast(&row_flags, |vals| vals.iter().any(|&v| v));
    retain_by_mask(rows, ever.into_iter().map(|e| !e).collect())
}

/// Applies the sample restrictions to rows sorted by (individual, month).
pub fn apply(mut rows: Vec<PersonMonth>, sample: &SampleConfig) -> (Vec<PersonMonth>, FilterReport) {
    let mut report = FilterReport {
        input_rows: rows.len(),
        ..Default::default()
    };

    let keep = rows.iter().map(|row| completed_interview(&row.raw)).collect();
    report.dropped_interview = retain_by_mask(&mut rows, keep);

    report.dropped_self_employed = drop_flagged_individuals(&mut rows, |row| is_self_employed(&row.raw));

    let keep = rows
        .iter()
        .map(|row| age(&row.raw).is_some_and(|a| (sample.min_age..=sample.max_age).contains(&a)))
        .collect();
    report.dropped_age = retain_by_mask(&mut rows, keep);

    let individuals = Groups::by_key(&rows, |row| row.individual_key);
    let codes: Vec<Option<i8>> = rows.iter().map(|row| armed_forces_flag(&row.raw)).collect();
    let person_flag = individuals.broadcast(&codes, |vals| vals.iter().copied().max().flatten());
    report.dropped_armed_forces =
        retain_by_mask(&mut rows, person_flag.into_iter().map(|f| f != Some(1)).collect());

    identity::renumber_occurrence(&mut rows);
    report.retained_rows = rows.len();
    report.retained_individuals = Groups::by_key(&rows, |row| row.individual_key).len();

    info!(
        "Sample filter: {} rows in, dropped {} (interview), {} (self-employed), {} (age), {} (armed forces); \
         {} rows / {} individuals kept",
        report.input_rows,
        report.dropped_interview,
        report.dropped_self_employed,
        report.dropped_age,
        report.dropped_armed_forces,
        report.retained_rows,
        report.retained_individuals
    );
    (rows, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(subject_key: u64, month: i32) -> RawRecord {
        RawRecord {
            subject_key,
            year: 1996,
            month,
            interview_status: Some(1),
            birth_year: Some(1960),
            armed_forces_ever: Some(armed_forces::NO),
            ..Default::default()
        }
    }

    fn run(records: Vec<RawRecord>) -> (Vec<PersonMonth>, FilterReport) {
        let rows = identity::normalize(1996, records).unwrap();
        apply(rows, &SampleConfig::default())
    }

    fn subjects(rows: &[PersonMonth]) -> Vec<(u64, i32)> {
        rows.iter().map(|r| (r.raw.subject_key, r.raw.month)).collect()
    }

    #[test]
    fn drops_rows_without_completed_interview() {
        let mut noninterview = row(1, 2);
        noninterview.interview_status = Some(3);
        let (rows, report) = run(vec![row(1, 1), noninterview, row(1, 3)]);
        assert_eq!(subjects(&rows), vec![(1, 1), (1, 3)]);
        assert_eq!(report.dropped_interview, 1);
        assert_eq!(rows[1].occurrence, 2);
    }

    #[test]
    fn self_employment_on_one_row_drops_the_person() {
        let mut business = row(1, 2);
        business.business_id_2 = Some(101);
        let (rows, report) = run(vec![row(1, 1), business, row(2, 1)]);
        assert_eq!(subjects(&rows), vec![(2, 1)]);
        assert_eq!(report.dropped_self_employed, 2);
    }

    #[test]
    fn age_band_is_inclusive_and_row_level() {
        let mut young = row(1, 1);
        young.birth_year = Some(1978);
        let mut edge = row(2, 1);
        edge.birth_year = Some(1931);
        let mut old = row(3, 1);
        old.birth_year = Some(1930);
        let mut unknown = row(4, 1);
        unknown.birth_year = None;
        let (rows, report) = run(vec![young, edge, old, unknown]);
        assert_eq!(subjects(&rows), vec![(1, 1), (2, 1)]);
        assert_eq!(report.dropped_age, 2);
    }

    #[test]
    fn armed_forces_drops_only_confirmed_service() {
        let mut served = row(1, 2);
        served.armed_forces_ever = Some(armed_forces::YES);
        let mut out_of_universe = row(2, 1);
        out_of_universe.armed_forces_ever = Some(armed_forces::NOT_IN_UNIVERSE);
        let (rows, report) = run(vec![row(1, 1), served, out_of_universe, row(3, 1)]);
        assert_eq!(subjects(&rows), vec![(2, 1), (3, 1)]);
        assert_eq!(report.dropped_armed_forces, 2);
        assert_eq!(report.retained_individuals, 2);
    }

    #[test]
    fn person_flags_use_rows_that_survived_earlier_steps() {
        // The business row is a non-interview, so it never reaches step two.
        let mut business = row(1, 2);
        business.interview_status = Some(4);
        business.business_count = Some(2);
        let (rows, _) = run(vec![row(1, 1), business]);
        assert_eq!(subjects(&rows), vec![(1, 1)]);
    }
}

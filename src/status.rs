//! Monthly labor force status.
//!
//! Combines the monthly recode with the weekly recodes of the same and the
//! neighboring months of each individual. Rows must be sorted by
//! (individual, calendar month) and already filtered.
//!
//! Retirement is absorbing: from the first month an individual is seen to
//! retire, every later row is retired and forced out of the labor force.

use chrono::NaiveDate;
use log::debug;

use crate::codes::{class_of_worker, job_end_reason, monthly, not_working_reason, weekly};
use crate::identity::{month_after, month_before};
use crate::occupation::JobSlot;
use crate::record::{PersonMonth, RawRecord};
use crate::window::Groups;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthlyStatus {
    /// Flags from the monthly recode alone.
    pub monthly_employed: bool,
    pub monthly_unemployed: bool,
    pub monthly_out_of_labor_force: bool,

    /// Flags from monthly and weekly recodes, after the retirement override.
    pub employed: bool,
    pub unemployed: bool,
    pub out_of_labor_force: bool,
    pub in_labor_force: bool,

    pub retired: bool,
    /// Person-level: ever employed by a government while employed.
    pub government: bool,
}

fn is_code(code: Option<i32>, value: i32) -> bool {
    code == Some(value)
}

fn in_codes(code: Option<i32>, values: &[i32]) -> bool {
    code.is_some_and(|c| values.contains(&c))
}

fn employed_all_month(raw: &RawRecord) -> bool {
    in_codes(raw.monthly_status, &monthly::EMPLOYED_ALL_MONTH)
}

pub fn monthly_flags(code: Option<i32>) -> (bool, bool, bool) {
    (
        in_codes(code, &monthly::EMPLOYED),
        in_codes(code, &monthly::UNEMPLOYED),
        is_code(code, monthly::OUT_OF_LABOR_FORCE),
    )
}

/// Employed if the monthly recode says "with a job all month" or the week-2
/// recode says "with a job that week".
pub fn combined_employment(raw: &RawRecord) -> bool {
    employed_all_month(raw) || in_codes(raw.week_2, &weekly::WITH_JOB)
}

/// The row and its neighbors as seen by the unemployment rules.
struct Neighborhood<'a> {
    raw: &'a RawRecord,
    month: NaiveDate,
    prev_month: Option<NaiveDate>,
    prev_weeks: Option<[Option<i32>; 5]>,
    next_month: Option<NaiveDate>,
    next_employed: Option<bool>,
}

/// Evaluates the four unemployment cases for a row that is not employed.
fn unemployment_cases(n: &Neighborhood<'_>) -> [bool; 4] {
    let raw = n.raw;
    let not_all_month = !employed_all_month(raw);
    let week2_looking = is_code(raw.week_2, weekly::LOOKING);
    let week2_not_looking = is_code(raw.week_2, weekly::NOT_LOOKING);

    let looking_this_week = week2_looking && not_all_month;

    let looked_week_one = week2_not_looking && is_code(raw.week_1, weekly::LOOKING) && not_all_month;

    let adjacent_prev = n.prev_month.is_some() && n.prev_month == month_before(n.month);
    let looked_last_month = week2_not_looking
        && not_all_month
        && adjacent_prev
        && n.prev_weeks
            .is_some_and(|weeks| weeks[1..].iter().any(|&w| is_code(w, weekly::LOOKING)));

    // Left-censored spell: first observed month, employed the month after.
    let adjacent_next = n.next_month.is_some() && n.next_month == month_after(n.month);
    let first_row_before_job = n.prev_month.is_none()
        && adjacent_next
        && n.next_employed == Some(true)
        && week2_not_looking
        && not_all_month;

    [looking_this_week, looked_week_one, looked_last_month, first_row_before_job]
}

fn retirement_trigger(raw: &RawRecord, out_of_labor_force: bool, prev_employed: Option<bool>) -> bool {
    let declares_retired = is_code(raw.not_working_reason, not_working_reason::RETIRED);
    let quit_to_retire = [JobSlot::First, JobSlot::Second]
        .iter()
        .any(|&slot| is_code(raw.job(slot).end_reason, job_end_reason::RETIRED));
    out_of_labor_force && (declares_retired || (prev_employed == Some(true) && quit_to_retire))
}

fn works_for_government(raw: &RawRecord) -> bool {
    [JobSlot::First, JobSlot::Second]
        .iter()
        .any(|&slot| in_codes(raw.job(slot).class_of_worker, &class_of_worker::GOVERNMENT))
}

pub fn classify(rows: &[PersonMonth]) -> Vec<MonthlyStatus> {
    let individuals = Groups::by_key(rows, |row| row.individual_key);
    let months: Vec<NaiveDate> = rows.iter().map(|row| row.calendar_month).collect();
    let weeks: Vec<[Option<i32>; 5]> = rows.iter().map(|row| row.raw.weeks()).collect();
    let employed: Vec<bool> = rows.iter().map(|row| combined_employment(&row.raw)).collect();

    let prev_months = individuals.shift(&months, -1);
    let next_months = individuals.shift(&months, 1);
    let prev_weeks = individuals.shift(&weeks, -1);
    let prev_employed = individuals.shift(&employed, -1);
    let next_employed = individuals.shift(&employed, 1);

    let mut statuses: Vec<MonthlyStatus> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let (monthly_employed, monthly_unemployed, monthly_out_of_labor_force) =
                monthly_flags(row.raw.monthly_status);
            let unemployed = !employed[i]
                && unemployment_cases(&Neighborhood {
                    raw: &row.raw,
                    month: months[i],
                    prev_month: prev_months[i],
                    prev_weeks: prev_weeks[i],
                    next_month: next_months[i],
                    next_employed: next_employed[i],
                })
                .iter()
                .any(|&case| case);
            MonthlyStatus {
                monthly_employed,
                monthly_unemployed,
                monthly_out_of_labor_force,
                employed: employed[i],
                unemployed,
                out_of_labor_force: !employed[i] && !unemployed,
                in_labor_force: employed[i] || unemployed,
                retired: false,
                government: false,
            }
        })
        .collect();

    let first_retired: Vec<Option<NaiveDate>> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            retirement_trigger(&row.raw, statuses[i].out_of_labor_force, prev_employed[i])
                .then_some(months[i])
        })
        .collect();
    let first_retired = individuals.broadcast(&first_retired, |vals| vals.iter().flatten().min().copied());

    let mut retired_rows = 0usize;
    for (i, status) in statuses.iter_mut().enumerate() {
        if first_retired[i].is_some_and(|first| months[i] >= first) {
            retired_rows += 1;
            status.retired = true;
            status.employed = false;
            status.unemployed = false;
            status.out_of_labor_force = true;
            status.in_labor_force = false;
        }
    }

    let government: Vec<bool> = rows
        .iter()
        .zip(&statuses)
        .map(|(row, status)| status.employed && works_for_government(&row.raw))
        .collect();
    let government = individuals.broadcast(&government, |vals| vals.iter().any(|&g| g));
    for (status, gov) in statuses.iter_mut().zip(government) {
        status.government = gov;
    }

    debug!(
        "Status: {} rows, {} employed, {} unemployed, {} retired",
        statuses.len(),
        statuses.iter().filter(|s| s.employed).count(),
        statuses.iter().filter(|s| s.unemployed).count(),
        retired_rows
    );
    statuses
}

//! Individual keys, calendar months and occurrence order.

use chrono::{Months, NaiveDate};
use log::debug;

use crate::error::{PanelError, Result};
use crate::record::{PersonMonth, RawRecord};
use crate::window::Groups;

/// Decimal concatenation of panel year and subject key, e.g. `1996 ‖ 12345`
/// gives `199612345`. Keys of different panel-years never collide.
pub fn individual_key(panel_year: i32, subject_key: u64) -> Option<u64> {
    let year = u64::try_from(panel_year).ok()?;
    let digits = subject_key.checked_ilog10().map_or(1, |d| d + 1);
    year.checked_mul(10u64.checked_pow(digits)?)?
        .checked_add(subject_key)
}

pub fn month_after(month: NaiveDate) -> Option<NaiveDate> {
    month.checked_add_months(Months::new(1))
}

pub fn month_before(month: NaiveDate) -> Option<NaiveDate> {
    month.checked_sub_months(Months::new(1))
}

/// True when `later` is exactly the calendar month after `earlier`.
pub fn is_next_month(earlier: NaiveDate, later: NaiveDate) -> bool {
    month_after(earlier) == Some(later)
}

/// Builds panel rows from the concatenated wave records of one panel-year,
/// sorted by (individual, calendar month) with arrival order breaking ties.
pub fn normalize(panel_year: i32, records: Vec<RawRecord>) -> Result<Vec<PersonMonth>> {
    let mut rows = records
        .into_iter()
        .map(|raw| PersonMonth::new(panel_year, raw))
        .collect::<Result<Vec<_>>>()?;
    // stable: equal (individual, month) pairs keep wave order
    rows.sort_by_key(|row| (row.individual_key, row.calendar_month));
    renumber_occurrence(&mut rows);
    debug!("Panel {}: normalized {} rows", panel_year, rows.len());
    Ok(rows)
}

/// Dense 1-based occurrence per individual in current row order.
pub fn renumber_occurrence(rows: &mut [PersonMonth]) {
    let individuals = Groups::by_key(&*rows, |row| row.individual_key);
    for (row, position) in rows.iter_mut().zip(individuals.positions()) {
        row.occurrence = position as u32 + 1;
    }
}

/// Verifies that every individual's calendar months strictly increase.
pub fn check_contract(panel_year: i32, rows: &[PersonMonth]) -> Result<()> {
    for pair in rows.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.individual_key == next.individual_key && next.calendar_month <= prev.calendar_month {
            return Err(PanelError::DuplicateMonth {
                panel_year,
                individual_key: next.individual_key,
                month: next.calendar_month,
            });
        }
    }
    Ok(())
}

//! Main job and occupation flows across non-employment spells.
//!
//! Respondents report up to two concurrent jobs. For every employed month
//! one of them is designated the main job by a fixed rule order. The main
//! job's occupation, when directly reported, is the month's occupation.
//! A spell's source occupation is read from the month before it starts and
//! its destination occupation from the month after it ends.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};

use crate::codes::occupation_allocation;
use crate::config::MainJobThresholds;
use crate::identity::{month_after, month_before};
use crate::record::{JobReport, PersonMonth, RawRecord};
use crate::spells::SpellTyping;
use crate::status::MonthlyStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobSlot {
    First,
    Second,
}

impl JobSlot {
    pub fn other(self) -> Self {
        match self {
            JobSlot::First => JobSlot::Second,
            JobSlot::Second => JobSlot::First,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            JobSlot::First => 1,
            JobSlot::Second => 2,
        }
    }
}

/// Which rule designated the main job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainJobRule {
    SingleJob,
    Dates,
    Hours,
    Earnings,
}

impl MainJobRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleJob => "single_job",
            Self::Dates => "dates",
            Self::Hours => "hours",
            Self::Earnings => "earnings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainJob {
    pub slot: JobSlot,
    pub rule: MainJobRule,
    pub firm_id: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccupationFlow {
    pub main_job: Option<MainJob>,
    pub occupation: Option<i32>,
    pub source_occupation: Option<i32>,
    pub destination_occupation: Option<i32>,
}

struct MonthWindow {
    start_cutoff: NaiveDate,
    end_cutoff: NaiveDate,
    early_end_cutoff: NaiveDate,
}

impl MonthWindow {
    fn new(month: NaiveDate, thresholds: &MainJobThresholds) -> Option<Self> {
        Some(Self {
            start_cutoff: month.checked_add_days(Days::new(thresholds.start_within_days))?,
            end_cutoff: month.checked_add_days(Days::new(thresholds.end_after_days))?,
            early_end_cutoff: month.checked_add_days(Days::new(thresholds.other_end_before_days))?,
        })
    }

    fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.start_cutoff && end >= self.end_cutoff
    }

    fn rules_out(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start > self.start_cutoff || end < self.early_end_cutoff
    }
}

fn by_dates(jobs: [JobReport; 2], window: &MonthWindow) -> Option<JobSlot> {
    let dates: Vec<(NaiveDate, NaiveDate)> = jobs
        .iter()
        .map(|job| Some((job.start?, job.end?)))
        .collect::<Option<_>>()?;
    [JobSlot::First, JobSlot::Second].into_iter().find(|&slot| {
        let (start, end) = dates[usize::from(slot.number() - 1)];
        let (other_start, other_end) = dates[usize::from(slot.other().number() - 1)];
        window.covers(start, end) && window.rules_out(other_start, other_end)
    })
}

fn by_hours(jobs: [JobReport; 2]) -> Option<JobSlot> {
    let (first, second) = (jobs[0].hours?, jobs[1].hours?);
    match first.cmp(&second) {
        std::cmp::Ordering::Greater => Some(JobSlot::First),
        std::cmp::Ordering::Less => Some(JobSlot::Second),
        std::cmp::Ordering::Equal => None,
    }
}

fn by_earnings(jobs: [JobReport; 2]) -> Option<JobSlot> {
    let (first, second) = (jobs[0].earnings?, jobs[1].earnings?);
    if first >= second {
        Some(JobSlot::First)
    } else {
        Some(JobSlot::Second)
    }
}

/// Designates the main job of an employed month; `None` when the month is
/// not employed or no rule decides.
pub fn resolve_main_job(
    raw: &RawRecord,
    month: NaiveDate,
    employed: bool,
    thresholds: &MainJobThresholds,
) -> Option<MainJob> {
    if !employed {
        return None;
    }
    let jobs = [raw.job(JobSlot::First), raw.job(JobSlot::Second)];
    let (slot, rule) = match (jobs[0].id, jobs[1].id) {
        (None, None) => return None,
        (Some(_), None) => (JobSlot::First, MainJobRule::SingleJob),
        (None, Some(_)) => (JobSlot::Second, MainJobRule::SingleJob),
        (Some(_), Some(_)) => {
            let window = MonthWindow::new(month, thresholds)?;
            by_dates(jobs, &window)
                .map(|slot| (slot, MainJobRule::Dates))
                .or_else(|| by_hours(jobs).map(|slot| (slot, MainJobRule::Hours)))
                .or_else(|| by_earnings(jobs).map(|slot| (slot, MainJobRule::Earnings)))?
        }
    };
    let firm_id = jobs[usize::from(slot.number() - 1)].id?;
    Some(MainJob { slot, rule, firm_id })
}

/// Occupation of the main job if it was reported rather than imputed.
pub fn main_occupation(raw: &RawRecord, main_job: Option<MainJob>) -> Option<i32> {
    let job = raw.job(main_job?.slot);
    if job.occupation_allocated == Some(occupation_allocation::NOT_ALLOCATED) {
        job.occupation
    } else {
        None
    }
}

pub fn resolve(
    rows: &[PersonMonth],
    statuses: &[MonthlyStatus],
    spells: &[SpellTyping],
    thresholds: &MainJobThresholds,
) -> Vec<OccupationFlow> {
    let mut flows: Vec<OccupationFlow> = rows
        .iter()
        .zip(statuses)
        .map(|(row, status)| {
            let main_job = resolve_main_job(&row.raw, row.calendar_month, status.employed, thresholds);
            OccupationFlow {
                main_job,
                occupation: main_occupation(&row.raw, main_job),
                ..Default::default()
            }
        })
        .collect();

    let occupation_at: HashMap<(u64, NaiveDate), Option<i32>> = rows
        .iter()
        .zip(&flows)
        .map(|(row, flow)| ((row.individual_key, row.calendar_month), flow.occupation))
        .collect();
    let lookup = |individual: u64, month: Option<NaiveDate>| -> Option<i32> {
        occupation_at.get(&(individual, month?)).copied().flatten()
    };

    // First and last month of every surviving spell.
    let mut bounds: HashMap<u64, (u64, NaiveDate, NaiveDate)> = HashMap::new();
    for (row, typing) in rows.iter().zip(spells) {
        if let Some(spell) = typing.ubar {
            bounds
                .entry(spell.id)
                .and_modify(|(_, first, last)| {
                    *first = (*first).min(row.calendar_month);
                    *last = (*last).max(row.calendar_month);
                })
                .or_insert((row.individual_key, row.calendar_month, row.calendar_month));
        }
    }
    let attributed: HashMap<u64, (Option<i32>, Option<i32>)> = bounds
        .into_iter()
        .map(|(id, (individual, first, last))| {
            let source = lookup(individual, month_before(first));
            let destination = lookup(individual, month_after(last));
            (id, (source, destination))
        })
        .collect();

    for (flow, typing) in flows.iter_mut().zip(spells) {
        if let Some((source, destination)) = typing.ubar.and_then(|spell| attributed.get(&spell.id)) {
            flow.source_occupation = *source;
            flow.destination_occupation = *destination;
        }
    }
    flows
}

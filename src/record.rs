//! Person-month records: the raw wave row and the augmented panel row.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::codes::NOT_IN_UNIVERSE;
use crate::continuity::Continuity;
use crate::demographics::Demographics;
use crate::error::{PanelError, Result};
use crate::identity;
use crate::occupation::{JobSlot, OccupationFlow};
use crate::spells::SpellTyping;
use crate::status::MonthlyStatus;

/// One person-month as read from a wave file.
///
/// Field names follow the survey's variable names through `serde(rename)`.
/// Every optional field defaults to missing when its column is absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "lgtkey", deserialize_with = "de_key")]
    pub subject_key: u64,
    #[serde(rename = "rhcalyr", deserialize_with = "de_required_code")]
    pub year: i32,
    #[serde(rename = "rhcalmn", deserialize_with = "de_required_code")]
    pub month: i32,
    #[serde(rename = "swave", default, deserialize_with = "de_code")]
    pub wave: Option<i32>,

    #[serde(rename = "eppintvw", default, deserialize_with = "de_code")]
    pub interview_status: Option<i32>,
    #[serde(rename = "tbyear", default, deserialize_with = "de_code")]
    pub birth_year: Option<i32>,
    #[serde(rename = "esex", default, deserialize_with = "de_code")]
    pub sex: Option<i32>,
    #[serde(rename = "ems", default, deserialize_with = "de_code")]
    pub marital_status: Option<i32>,
    #[serde(rename = "eeducate", default, deserialize_with = "de_code")]
    pub education: Option<i32>,
    #[serde(rename = "erace", default, deserialize_with = "de_code")]
    pub race: Option<i32>,
    #[serde(rename = "eafever", default, deserialize_with = "de_code")]
    pub armed_forces_ever: Option<i32>,
    #[serde(rename = "ebuscntr", default, deserialize_with = "de_code")]
    pub business_count: Option<i32>,
    #[serde(rename = "ebno1", default, deserialize_with = "de_present_id")]
    pub business_id_1: Option<i64>,
    #[serde(rename = "ebno2", default, deserialize_with = "de_present_id")]
    pub business_id_2: Option<i64>,

    #[serde(rename = "rmesr", default, deserialize_with = "de_code")]
    pub monthly_status: Option<i32>,
    #[serde(rename = "rwkesr1", default, deserialize_with = "de_code")]
    pub week_1: Option<i32>,
    #[serde(rename = "rwkesr2", default, deserialize_with = "de_code")]
    pub week_2: Option<i32>,
    #[serde(rename = "rwkesr3", default, deserialize_with = "de_code")]
    pub week_3: Option<i32>,
    #[serde(rename = "rwkesr4", default, deserialize_with = "de_code")]
    pub week_4: Option<i32>,
    #[serde(rename = "rwkesr5", default, deserialize_with = "de_code")]
    pub week_5: Option<i32>,
    #[serde(rename = "ersend1", default, deserialize_with = "de_code")]
    pub end_reason_1: Option<i32>,
    #[serde(rename = "ersend2", default, deserialize_with = "de_code")]
    pub end_reason_2: Option<i32>,
    #[serde(rename = "ersnowrk", default, deserialize_with = "de_code")]
    pub not_working_reason: Option<i32>,

    #[serde(rename = "eeno1", default, deserialize_with = "de_present_id")]
    pub job_id_1: Option<i64>,
    #[serde(rename = "eeno2", default, deserialize_with = "de_present_id")]
    pub job_id_2: Option<i64>,
    #[serde(rename = "tsjdate1", default, deserialize_with = "de_yyyymmdd")]
    pub job_start_1: Option<NaiveDate>,
    #[serde(rename = "tsjdate2", default, deserialize_with = "de_yyyymmdd")]
    pub job_start_2: Option<NaiveDate>,
    #[serde(rename = "tejdate1", default, deserialize_with = "de_yyyymmdd")]
    pub job_end_1: Option<NaiveDate>,
    #[serde(rename = "tejdate2", default, deserialize_with = "de_yyyymmdd")]
    pub job_end_2: Option<NaiveDate>,
    #[serde(rename = "ejbhrs1", default, deserialize_with = "de_present_code")]
    pub hours_1: Option<i32>,
    #[serde(rename = "ejbhrs2", default, deserialize_with = "de_present_code")]
    pub hours_2: Option<i32>,
    #[serde(rename = "tpmsum1", default, deserialize_with = "de_amount")]
    pub earnings_1: Option<f64>,
    #[serde(rename = "tpmsum2", default, deserialize_with = "de_amount")]
    pub earnings_2: Option<f64>,
    #[serde(rename = "eclwrk1", default, deserialize_with = "de_code")]
    pub class_of_worker_1: Option<i32>,
    #[serde(rename = "eclwrk2", default, deserialize_with = "de_code")]
    pub class_of_worker_2: Option<i32>,
    #[serde(rename = "tjbocc1", default, deserialize_with = "de_present_code")]
    pub occupation_1: Option<i32>,
    #[serde(rename = "tjbocc2", default, deserialize_with = "de_present_code")]
    pub occupation_2: Option<i32>,
    #[serde(rename = "ajbocc1", default, deserialize_with = "de_code")]
    pub occupation_allocated_1: Option<i32>,
    #[serde(rename = "ajbocc2", default, deserialize_with = "de_code")]
    pub occupation_allocated_2: Option<i32>,

    #[serde(rename = "tpearn", default, deserialize_with = "de_amount")]
    pub total_earnings: Option<f64>,
    #[serde(rename = "wpfinwgt", default, deserialize_with = "de_amount")]
    pub weight: Option<f64>,
}

/// The attributes of one of the two concurrently reported jobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobReport {
    pub id: Option<i64>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub hours: Option<i32>,
    pub earnings: Option<f64>,
    pub class_of_worker: Option<i32>,
    pub occupation: Option<i32>,
    pub occupation_allocated: Option<i32>,
    pub end_reason: Option<i32>,
}

impl RawRecord {
    /// Weekly status codes for weeks 1 through 5.
    pub fn weeks(&self) -> [Option<i32>; 5] {
        [self.week_1, self.week_2, self.week_3, self.week_4, self.week_5]
    }

    pub fn job(&self, slot: JobSlot) -> JobReport {
        match slot {
            JobSlot::First => JobReport {
                id: self.job_id_1,
                start: self.job_start_1,
                end: self.job_end_1,
                hours: self.hours_1,
                earnings: self.earnings_1,
                class_of_worker: self.class_of_worker_1,
                occupation: self.occupation_1,
                occupation_allocated: self.occupation_allocated_1,
                end_reason: self.end_reason_1,
            },
            JobSlot::Second => JobReport {
                id: self.job_id_2,
                start: self.job_start_2,
                end: self.job_end_2,
                hours: self.hours_2,
                earnings: self.earnings_2,
                class_of_worker: self.class_of_worker_2,
                occupation: self.occupation_2,
                occupation_allocated: self.occupation_allocated_2,
                end_reason: self.end_reason_2,
            },
        }
    }
}

/// A person-month of one panel-year with every derived field.
///
/// Built by [`identity::normalize`]; each later stage fills its own block.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonMonth {
    pub raw: RawRecord,
    pub panel_year: i32,
    pub individual_key: u64,
    pub calendar_month: NaiveDate,
    pub occurrence: u32,
    pub demographics: Demographics,
    pub status: MonthlyStatus,
    pub continuity: Continuity,
    pub spells: SpellTyping,
    pub occupation: OccupationFlow,
    pub normalized_weight: Option<f64>,
}

impl PersonMonth {
    pub fn new(panel_year: i32, raw: RawRecord) -> Result<Self> {
        let individual_key = identity::individual_key(panel_year, raw.subject_key).ok_or(
            PanelError::KeyOverflow {
                panel_year,
                subject_key: raw.subject_key,
            },
        )?;
        let calendar_month = u32::try_from(raw.month)
            .ok()
            .and_then(|m| NaiveDate::from_ymd_opt(raw.year, m, 1))
            .ok_or(PanelError::InvalidCalendarMonth {
                panel_year,
                subject_key: raw.subject_key,
                year: raw.year,
                month: raw.month.max(0) as u32,
            })?;
        Ok(Self {
            raw,
            panel_year,
            individual_key,
            calendar_month,
            occurrence: 0,
            demographics: Demographics::default(),
            status: MonthlyStatus::default(),
            continuity: Continuity::default(),
            spells: SpellTyping::default(),
            occupation: OccupationFlow::default(),
            normalized_weight: None,
        })
    }
}

// Wave files come from statistical packages that sometimes write integer
// codes as "4.0"; every integer field goes through this parser.
fn parse_number(field: &str) -> Option<f64> {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_integer(field: &str) -> Option<i64> {
    let trimmed = field.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| parse_number(trimmed).filter(|v| v.fract() == 0.0).map(|v| v as i64))
}

fn de_code<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let field = Option::<String>::deserialize(deserializer)?;
    Ok(field
        .as_deref()
        .and_then(parse_integer)
        .and_then(|v| i32::try_from(v).ok()))
}

fn de_required_code<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let field = String::deserialize(deserializer)?;
    parse_integer(&field)
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| serde::de::Error::custom(format!("expected an integer, found '{}'", field)))
}

fn de_key<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let field = String::deserialize(deserializer)?;
    parse_integer(&field)
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid subject key '{}'", field)))
}

/// Like `de_code`, with the not-in-universe sentinel read as missing.
fn de_present_code<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_code(deserializer)?.filter(|&v| i64::from(v) != NOT_IN_UNIVERSE))
}

fn de_present_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let field = Option::<String>::deserialize(deserializer)?;
    Ok(field
        .as_deref()
        .and_then(parse_integer)
        .filter(|&v| v != NOT_IN_UNIVERSE))
}

fn de_amount<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let field = Option::<String>::deserialize(deserializer)?;
    Ok(field.as_deref().and_then(parse_number))
}

/// `YYYYMMDD` integer dates; the sentinel and unparseable values are missing.
fn de_yyyymmdd<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let field = Option::<String>::deserialize(deserializer)?;
    Ok(field.as_deref().and_then(parse_integer).and_then(date_from_yyyymmdd))
}

pub fn date_from_yyyymmdd(value: i64) -> Option<NaiveDate> {
    if value <= 0 {
        return None;
    }
    let year = i32::try_from(value / 10_000).ok()?;
    let month = u32::try_from((value / 100) % 100).ok()?;
    let day = u32::try_from(value % 100).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(csv_text: &str) -> Vec<RawRecord> {
        let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
        reader.deserialize().collect::<std::result::Result<_, _>>().unwrap()
    }

    #[test]
    fn reads_sentinels_as_missing() {
        let rows = parse(
            "lgtkey,rhcalyr,rhcalmn,eeno1,eeno2,ejbhrs1,tsjdate1,tejdate1\n\
             42,1996,3,-1,17,-1,19950301,-1\n",
        );
        let row = &rows[0];
        assert_eq!(row.subject_key, 42);
        assert_eq!(row.job_id_1, None);
        assert_eq!(row.job_id_2, Some(17));
        assert_eq!(row.hours_1, None);
        assert_eq!(row.job_start_1, NaiveDate::from_ymd_opt(1995, 3, 1));
        assert_eq!(row.job_end_1, None);
    }

    #[test]
    fn tolerates_float_codes_and_absent_columns() {
        let rows = parse("lgtkey,rhcalyr,rhcalmn,rmesr,wpfinwgt\n7,2001.0,12.0,6.0,1523.5\n");
        let row = &rows[0];
        assert_eq!(row.year, 2001);
        assert_eq!(row.month, 12);
        assert_eq!(row.monthly_status, Some(6));
        assert_eq!(row.weight, Some(1523.5));
        assert_eq!(row.week_2, None);
        assert_eq!(row.occupation_1, None);
    }

    #[test]
    fn armed_forces_sentinel_is_kept_as_a_code() {
        let rows = parse("lgtkey,rhcalyr,rhcalmn,eafever\n1,1996,1,-1\n");
        assert_eq!(rows[0].armed_forces_ever, Some(-1));
    }

    #[test]
    fn rejects_invalid_calendar_month() {
        let raw = RawRecord {
            subject_key: 3,
            year: 1996,
            month: 13,
            ..Default::default()
        };
        assert!(matches!(
            PersonMonth::new(1996, raw),
            Err(PanelError::InvalidCalendarMonth { month: 13, .. })
        ));
    }

    #[test]
    fn job_views_select_the_right_columns() {
        let raw = RawRecord {
            job_id_1: Some(1),
            job_id_2: Some(2),
            hours_2: Some(35),
            ..Default::default()
        };
        assert_eq!(raw.job(JobSlot::First).id, Some(1));
        assert_eq!(raw.job(JobSlot::Second).hours, Some(35));
    }

    #[test]
    fn parses_yyyymmdd() {
        assert_eq!(date_from_yyyymmdd(20080229), NaiveDate::from_ymd_opt(2008, 2, 29));
        assert_eq!(date_from_yyyymmdd(20070229), None);
        assert_eq!(date_from_yyyymmdd(-1), None);
    }
}

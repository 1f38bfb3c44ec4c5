//! Demographic recodes carried into the output table.

use crate::filter;
use crate::record::RawRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Demographics {
    pub age: Option<i32>,
    pub male: Option<bool>,
    /// 1 below high school .. 5 graduate degree, −1 not in universe.
    pub education: Option<i8>,
    /// 1 white, 2 black, 3 residual.
    pub race: Option<i8>,
    pub marital_status: Option<i32>,
}

pub fn education_band(code: Option<i32>) -> Option<i8> {
    match code? {
        -1 => Some(-1),
        31..=38 => Some(1),
        39 => Some(2),
        40..=43 => Some(3),
        44 => Some(4),
        45..=47 => Some(5),
        _ => None,
    }
}

pub fn race_group(code: Option<i32>) -> Option<i8> {
    match code? {
        1 => Some(1),
        2 => Some(2),
        3 | 4 => Some(3),
        _ => None,
    }
}

pub fn recode(raw: &RawRecord) -> Demographics {
    Demographics {
        age: filter::age(raw),
        male: match raw.sex {
            Some(1) => Some(true),
            Some(2) => Some(false),
            _ => None,
        },
        education: education_band(raw.education),
        race: race_group(raw.race),
        marital_status: raw.marital_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn education_bands() {
        assert_eq!(education_band(Some(31)), Some(1));
        assert_eq!(education_band(Some(39)), Some(2));
        assert_eq!(education_band(Some(43)), Some(3));
        assert_eq!(education_band(Some(44)), Some(4));
        assert_eq!(education_band(Some(47)), Some(5));
        assert_eq!(education_band(Some(-1)), Some(-1));
        assert_eq!(education_band(Some(48)), None);
        assert_eq!(education_band(None), None);
    }

    #[test]
    fn recodes_a_row() {
        let raw = RawRecord {
            year: 2004,
            birth_year: Some(1970),
            sex: Some(2),
            race: Some(4),
            marital_status: Some(6),
            ..Default::default()
        };
        let demo = recode(&raw);
        assert_eq!(demo.age, Some(34));
        assert_eq!(demo.male, Some(false));
        assert_eq!(demo.race, Some(3));
        assert_eq!(demo.education, None);
        assert_eq!(demo.marital_status, Some(6));
    }
}

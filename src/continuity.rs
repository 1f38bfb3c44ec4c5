//! Contiguous observation spells.

use crate::identity::is_next_month;
use crate::record::PersonMonth;
use crate::window::Groups;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Continuity {
    /// The individual's next row exists but is not the next calendar month.
    /// Marks the last month of a spell.
    pub discontinuity: bool,
    pub spell_number: u32,
    pub spell_length: u32,
}

pub fn segment(rows: &[PersonMonth]) -> Vec<Continuity> {
    let individuals = Groups::by_key(rows, |row| row.individual_key);
    let months: Vec<_> = rows.iter().map(|row| row.calendar_month).collect();
    let next_months = individuals.shift(&months, 1);

    let discontinuity: Vec<bool> = months
        .iter()
        .zip(&next_months)
        .map(|(&month, next)| next.is_some_and(|next| !is_next_month(month, next)))
        .collect();
    let breaks_so_far = individuals.running(&discontinuity, 0u32, |acc, &d| acc + u32::from(d));

    // The break row closes the old spell rather than opening the new one.
    let spell_numbers: Vec<u32> = breaks_so_far
        .iter()
        .zip(&discontinuity)
        .map(|(&count, &d)| count + 1 - u32::from(d))
        .collect();

    let spell_keys: Vec<(u64, u32)> = rows
        .iter()
        .zip(&spell_numbers)
        .map(|(row, &spell)| (row.individual_key, spell))
        .collect();
    let spells = Groups::by_key(&spell_keys, |key| *key);

    discontinuity
        .into_iter()
        .zip(spell_numbers)
        .zip(spells.group_sizes())
        .map(|((discontinuity, spell_number), len)| Continuity {
            discontinuity,
            spell_number,
            spell_length: len as u32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity;
    use crate::record::RawRecord;

    fn months(subject_key: u64, months: &[(i32, i32)]) -> Vec<RawRecord> {
        months
            .iter()
            .map(|&(year, month)| RawRecord {
                subject_key,
                year,
                month,
                ..Default::default()
            })
            .collect()
    }

    fn segment_records(records: Vec<RawRecord>) -> Vec<(bool, u32, u32)> {
        let rows = identity::normalize(1996, records).unwrap();
        segment(&rows)
            .into_iter()
            .map(|c| (c.discontinuity, c.spell_number, c.spell_length))
            .collect()
    }

    #[test]
    fn gaps_split_spells_and_break_row_stays_in_old_spell() {
        let records = months(1, &[(1996, 1), (1996, 2), (1996, 5), (1996, 6), (1996, 7), (1996, 9)]);
        assert_eq!(
            segment_records(records),
            vec![
                (false, 1, 2),
                (true, 1, 2),
                (false, 2, 3),
                (false, 2, 3),
                (true, 2, 3),
                (false, 3, 1),
            ]
        );
    }

    #[test]
    fn year_boundary_is_contiguous_and_individuals_are_independent() {
        let mut records = months(1, &[(1996, 12), (1997, 1)]);
        records.extend(months(2, &[(1997, 2)]));
        assert_eq!(
            segment_records(records),
            vec![(false, 1, 2), (false, 1, 2), (false, 1, 1)]
        );
    }
}

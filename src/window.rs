//! Grouped window operations over rows that are already sorted.
//!
//! A [`Groups`] value records the contiguous index ranges of rows that share
//! a key. Columns are plain slices aligned with the rows, so one grouping can
//! serve shifts and reductions over any number of derived columns.

use std::ops::Range;

#[derive(Debug, Clone, Default)]
pub struct Groups {
    ranges: Vec<Range<usize>>,
    group_of: Vec<usize>,
}

impl Groups {
    /// Groups consecutive rows with equal keys. Rows must already be sorted
    /// so that equal keys are adjacent.
    pub fn by_key<T, K, F>(rows: &[T], key: F) -> Self
    where
        F: Fn(&T) -> K,
        K: PartialEq,
    {
        let mut ranges = Vec::new();
        let mut group_of = Vec::with_capacity(rows.len());
        let mut start = 0;
        for i in 1..=rows.len() {
            if i == rows.len() || key(&rows[i]) != key(&rows[start]) {
                group_of.extend(std::iter::repeat(ranges.len()).take(i - start));
                ranges.push(start..i);
                start = i;
            }
        }
        Self { ranges, group_of }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.ranges.iter().cloned()
    }

    /// Value of the row `offset` positions away inside the same group, or
    /// `None` when that position falls outside the group.
    pub fn shift<T: Clone>(&self, column: &[T], offset: isize) -> Vec<Option<T>> {
        debug_assert_eq!(column.len(), self.group_of.len());
        (0..column.len())
            .map(|i| {
                let range = &self.ranges[self.group_of[i]];
                let target = i as isize + offset;
                if target >= range.start as isize && target < range.end as isize {
                    Some(column[target as usize].clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Reduces every group's slice of `column` and repeats the result for
    /// each row of that group.
    pub fn broadcast<T, R, F>(&self, column: &[T], reduce: F) -> Vec<R>
    where
        R: Clone,
        F: Fn(&[T]) -> R,
    {
        debug_assert_eq!(column.len(), self.group_of.len());
        let mut out = Vec::with_capacity(column.len());
        for range in &self.ranges {
            let value = reduce(&column[range.clone()]);
            out.extend(std::iter::repeat(value).take(range.len()));
        }
        out
    }

    /// Inclusive running fold within each group, restarting at group edges.
    pub fn running<T, A, F>(&self, column: &[T], init: A, step: F) -> Vec<A>
    where
        A: Clone,
        F: Fn(&A, &T) -> A,
    {
        debug_assert_eq!(column.len(), self.group_of.len());
        let mut out = Vec::with_capacity(column.len());
        for range in &self.ranges {
            let mut acc = init.clone();
            for value in &column[range.clone()] {
                acc = step(&acc, value);
                out.push(acc.clone());
            }
        }
        out
    }

    /// Number of rows in each row's group.
    pub fn group_sizes(&self) -> Vec<usize> {
        self.group_of.iter().map(|&g| self.ranges[g].len()).collect()
    }

    /// Zero-based position of each row inside its group.
    pub fn positions(&self) -> Vec<usize> {
        self.group_of
            .iter()
            .enumerate()
            .map(|(i, &g)| i - self.ranges[g].start)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<u32> {
        vec![1, 1, 1, 2, 3, 3]
    }

    #[test]
    fn groups_adjacent_keys() {
        let groups = Groups::by_key(&keys(), |k| *k);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups.ranges().collect::<Vec<_>>(), vec![0..3, 3..4, 4..6]);
        assert_eq!(groups.group_sizes(), vec![3, 3, 3, 1, 2, 2]);
        assert_eq!(groups.positions(), vec![0, 1, 2, 0, 0, 1]);
    }

    #[test]
    fn shift_stops_at_group_edges() {
        let groups = Groups::by_key(&keys(), |k| *k);
        let column = vec!['a', 'b', 'c', 'd', 'e', 'f'];
        assert_eq!(
            groups.shift(&column, -1),
            vec![None, Some('a'), Some('b'), None, None, Some('e')]
        );
        assert_eq!(
            groups.shift(&column, 1),
            vec![Some('b'), Some('c'), None, None, Some('f'), None]
        );
    }

    #[test]
    fn broadcast_and_running_restart_per_group() {
        let groups = Groups::by_key(&keys(), |k| *k);
        let column = vec![0, 1, 0, 5, 1, 1];
        let max = groups.broadcast(&column, |vals| vals.iter().copied().max().unwrap_or(0));
        assert_eq!(max, vec![1, 1, 1, 5, 1, 1]);
        let cumsum = groups.running(&column, 0, |acc, v| acc + v);
        assert_eq!(cumsum, vec![0, 1, 1, 5, 1, 2]);
    }

    #[test]
    fn empty_input_has_no_groups() {
        let groups = Groups::by_key(&Vec::<u32>::new(), |k| *k);
        assert!(groups.is_empty());
        assert!(groups.shift(&Vec::<u32>::new(), 1).is_empty());
    }
}

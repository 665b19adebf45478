//! Disjoint interval sets for double-count-free durations.
//!
//! Nested or overlapping occurrences of one zone would inflate its total if
//! their durations were summed directly. Instead every occurrence is inserted
//! into a [`MergedDurations`], which keeps the union of all inserted intervals
//! as a flat sorted list of boundaries `[s0, e0, s1, e1, ...]` with
//! `s0 < e0 <= s1 < e1 <= ...`.

/// Union of half-open `[start, end)` intervals, in nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedDurations {
    bounds: Vec<i64>,
}

impl MergedDurations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from existing boundaries, which must already be merged.
    pub fn from_bounds(bounds: Vec<i64>) -> Self {
        let merged = Self { bounds };
        merged.total();
        merged
    }

    pub fn bounds(&self) -> &[i64] {
        &self.bounds
    }

    /// Add `[start, end)` to the union.
    ///
    /// Only the boundaries the new interval touches are replaced. An empty
    /// interval leaves the set unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`, or if the set has lost its ordering.
    pub fn insert(&mut self, start: i64, end: i64) {
        assert!(start <= end, "interval ends before it starts: [{start}, {end})");
        if start == end {
            return;
        }

        // First boundary not less than `start`.
        let first = self.bounds.partition_point(|&b| b < start);
        // One past the last boundary not greater than `end`.
        let last = self.bounds.partition_point(|&b| b <= end);
        assert!(
            first <= last,
            "merged boundaries out of order around [{start}, {end}): {:?}",
            self.bounds
        );

        // An odd number of boundaries before a point means it lies inside an
        // existing interval, which already supplies the boundary.
        let start_is_covered = first % 2 == 1;
        let end_is_covered = last % 2 == 1;

        let replacement = [
            (!start_is_covered).then_some(start),
            (!end_is_covered).then_some(end),
        ];
        self.bounds
            .splice(first..last, replacement.into_iter().flatten());
    }

    /// Sum of the covered lengths.
    ///
    /// # Panics
    ///
    /// Panics if the boundaries are not an even-length non-decreasing list,
    /// which would mean `insert` broke its own invariant.
    pub fn total(&self) -> i64 {
        assert!(
            self.bounds.len() % 2 == 0,
            "merged boundaries have odd length: {:?}",
            self.bounds
        );
        assert!(
            self.bounds.windows(2).all(|pair| pair[0] <= pair[1]),
            "merged boundaries out of order: {:?}",
            self.bounds
        );
        self.bounds
            .chunks_exact(2)
            .map(|pair| pair[1] - pair[0])
            .sum()
    }
}

impl FromIterator<(i64, i64)> for MergedDurations {
    fn from_iter<I: IntoIterator<Item = (i64, i64)>>(iter: I) -> Self {
        let mut merged = Self::new();
        for (start, end) in iter {
            merged.insert(start, end);
        }
        merged
    }
}

//! Match filtering and the read-coverage gate.
//!
//! The filter selects the subset of a read's matches that pass the score,
//! expected-value, identity and top-percent thresholds for one
//! classification. Its output is an ordered index set reused across reads.

use crate::intervals::IntervalUnion;
use crate::types::ReadBlock;

/// Indices of the matches that passed filtering, in input order.
///
/// Reused across reads via `clear()`; the driver keeps one per stream
/// position (primary read, mate read) and never allocates in the loop.
#[derive(Debug, Default)]
pub struct ActiveMatches {
    indices: Vec<usize>,
}

impl ActiveMatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }

    /// Number of matches that passed.
    pub fn cardinality(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }
}

/// Select the matches of `read` usable for assignment in one
/// classification.
///
/// A match passes when its bit score is at least `min_score`, its expected
/// value is at most `max_expected`, its percent identity is at least
/// `min_percent_identity` (matches with unknown identity pass), and it
/// carries a positive class id at `class_idx`. The top-percent rule then
/// drops matches scoring below `(1 - top_percent/100)` of the best passing
/// score; `top_percent = 100` disables it. Relative order is preserved.
pub fn compute_active_matches(
    min_score: f64,
    top_percent: f64,
    max_expected: f64,
    min_percent_identity: f64,
    read: &ReadBlock,
    class_idx: usize,
    active: &mut ActiveMatches,
) {
    active.clear();
    let mut best_score = f64::MIN;

    for (i, m) in read.matches.iter().enumerate() {
        if (m.bit_score as f64) < min_score {
            continue;
        }
        if m.expected > max_expected {
            continue;
        }
        if min_percent_identity > 0.0
            && m.percent_identity > 0.0
            && (m.percent_identity as f64) < min_percent_identity
        {
            continue;
        }
        if m.class_id(class_idx) <= 0 {
            continue;
        }
        active.indices.push(i);
        best_score = best_score.max(m.bit_score as f64);
    }

    if top_percent < 100.0 && !active.indices.is_empty() {
        let threshold = best_score * (1.0 - top_percent / 100.0);
        let matches = &read.matches;
        active
            .indices
            .retain(|&i| matches[i].bit_score as f64 >= threshold);
    }
}

/// Check that enough of the read is covered by its filtered matches.
///
/// The required cover is `floor(0.01 * min_percent * read.length)`; zero
/// always passes. In short-read mode (`intervals` is `None`) a single
/// match must reach the required length. In long-read mode the filtered
/// matches' query intervals are streamed into `intervals` and the gate
/// passes as soon as the running union reaches the requirement.
pub fn ensure_covered(
    min_percent: f64,
    read: &ReadBlock,
    active: &ActiveMatches,
    mut intervals: Option<&mut IntervalUnion>,
) -> bool {
    let required = (0.01 * min_percent * read.length as f64) as i64;
    if required == 0 {
        return true;
    }

    if let Some(iv) = intervals.as_deref_mut() {
        iv.clear();
    }

    for i in active.iter() {
        let m = &read.matches[i];
        match intervals.as_deref_mut() {
            None => {
                if m.aligned_length() >= required {
                    return true;
                }
            }
            Some(iv) => {
                let (lo, hi) = m.query_interval();
                iv.add(lo, hi);
                if iv.covered_length() >= required {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchBlock;

    fn mk_match(score: f32, expected: f64, identity: f32, id: i32) -> MatchBlock {
        MatchBlock {
            bit_score: score,
            expected,
            percent_identity: identity,
            aligned_query_start: 1,
            aligned_query_end: 100,
            class_ids: vec![id],
        }
    }

    fn mk_read(matches: Vec<MatchBlock>) -> ReadBlock {
        ReadBlock {
            uid: 1,
            name: "r".into(),
            length: 1000,
            weight: 1,
            matches,
            ..Default::default()
        }
    }

    #[test]
    fn test_min_score_filter() {
        let read = mk_read(vec![
            mk_match(100.0, 1e-10, 99.0, 562),
            mk_match(10.0, 1e-10, 99.0, 562),
        ]);
        let mut active = ActiveMatches::new();
        compute_active_matches(50.0, 100.0, 10.0, 0.0, &read, 0, &mut active);
        assert_eq!(active.as_slice(), &[0]);
    }

    #[test]
    fn test_max_expected_filter() {
        let read = mk_read(vec![
            mk_match(100.0, 1e-10, 99.0, 562),
            mk_match(100.0, 50.0, 99.0, 562),
        ]);
        let mut active = ActiveMatches::new();
        compute_active_matches(0.0, 100.0, 10.0, 0.0, &read, 0, &mut active);
        assert_eq!(active.as_slice(), &[0]);
    }

    #[test]
    fn test_unknown_identity_passes() {
        let read = mk_read(vec![
            mk_match(100.0, 1e-10, 0.0, 562),
            mk_match(100.0, 1e-10, 80.0, 562),
        ]);
        let mut active = ActiveMatches::new();
        compute_active_matches(0.0, 100.0, 10.0, 90.0, &read, 0, &mut active);
        assert_eq!(active.as_slice(), &[0], "unknown identity passes, 80% fails");
    }

    #[test]
    fn test_matches_without_id_are_skipped() {
        let read = mk_read(vec![
            mk_match(100.0, 1e-10, 99.0, 0),
            mk_match(90.0, 1e-10, 99.0, 562),
        ]);
        let mut active = ActiveMatches::new();
        compute_active_matches(0.0, 100.0, 10.0, 0.0, &read, 0, &mut active);
        assert_eq!(active.as_slice(), &[1]);
    }

    #[test]
    fn test_top_percent_keeps_near_best() {
        // scores 100 and 95 with topPercent=10: cutoff 90, both kept
        let read = mk_read(vec![
            mk_match(100.0, 1e-10, 99.0, 562),
            mk_match(95.0, 1e-10, 99.0, 622),
            mk_match(85.0, 1e-10, 99.0, 620),
        ]);
        let mut active = ActiveMatches::new();
        compute_active_matches(0.0, 10.0, 10.0, 0.0, &read, 0, &mut active);
        assert_eq!(active.as_slice(), &[0, 1]);
    }

    #[test]
    fn test_top_percent_100_is_noop() {
        let read = mk_read(vec![
            mk_match(100.0, 1e-10, 99.0, 562),
            mk_match(1.0, 1e-10, 99.0, 622),
        ]);
        let mut active = ActiveMatches::new();
        compute_active_matches(0.0, 100.0, 10.0, 0.0, &read, 0, &mut active);
        assert_eq!(active.cardinality(), 2);
    }

    #[test]
    fn test_no_passing_matches_yields_empty() {
        let read = mk_read(vec![mk_match(10.0, 1e-10, 99.0, 562)]);
        let mut active = ActiveMatches::new();
        compute_active_matches(50.0, 100.0, 10.0, 0.0, &read, 0, &mut active);
        assert!(active.is_empty());
    }

    #[test]
    fn test_filter_is_stable_and_reusable() {
        let read = mk_read(vec![
            mk_match(95.0, 1e-10, 99.0, 562),
            mk_match(100.0, 1e-10, 99.0, 622),
            mk_match(96.0, 1e-10, 99.0, 620),
        ]);
        let mut active = ActiveMatches::new();
        compute_active_matches(0.0, 100.0, 10.0, 0.0, &read, 0, &mut active);
        assert_eq!(active.as_slice(), &[0, 1, 2]);
        // reuse keeps no stale state
        compute_active_matches(99.0, 100.0, 10.0, 0.0, &read, 0, &mut active);
        assert_eq!(active.as_slice(), &[1]);
    }

    fn spanning_match(start: i64, end: i64) -> MatchBlock {
        MatchBlock {
            bit_score: 100.0,
            expected: 1e-10,
            percent_identity: 99.0,
            aligned_query_start: start,
            aligned_query_end: end,
            class_ids: vec![562],
        }
    }

    fn all_active(read: &ReadBlock) -> ActiveMatches {
        let mut active = ActiveMatches::new();
        compute_active_matches(0.0, 100.0, 10.0, 0.0, read, 0, &mut active);
        active
    }

    #[test]
    fn test_coverage_zero_requirement_passes() {
        let read = mk_read(vec![]);
        let active = all_active(&read);
        assert!(ensure_covered(0.0, &read, &active, None));
    }

    #[test]
    fn test_coverage_short_read_single_match() {
        let read = mk_read(vec![spanning_match(1, 600), spanning_match(1, 100)]);
        let active = all_active(&read);
        assert!(ensure_covered(50.0, &read, &active, None));

        let read = mk_read(vec![spanning_match(1, 300), spanning_match(400, 600)]);
        let active = all_active(&read);
        assert!(
            !ensure_covered(50.0, &read, &active, None),
            "short-read mode does not accumulate across matches"
        );
    }

    #[test]
    fn test_coverage_long_read_union() {
        let mut iv = IntervalUnion::new();

        let read = mk_read(vec![spanning_match(1, 300), spanning_match(600, 1000)]);
        let active = all_active(&read);
        assert!(ensure_covered(50.0, &read, &active, Some(&mut iv)));

        let read = mk_read(vec![spanning_match(1, 300), spanning_match(600, 800)]);
        let active = all_active(&read);
        assert!(ensure_covered(50.0, &read, &active, Some(&mut iv)));

        let read = mk_read(vec![spanning_match(1, 300), spanning_match(600, 700)]);
        let active = all_active(&read);
        assert!(!ensure_covered(50.0, &read, &active, Some(&mut iv)));
    }
}

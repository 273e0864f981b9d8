//! Incremental union of closed integer intervals over query coordinates.
//!
//! The coverage gate inserts one interval per filtered match and reads the
//! running union length after every insertion, so insertion keeps a cached
//! total instead of recomputing the union on demand.

use std::collections::BTreeMap;

/// A set of closed intervals `[start, end]` with a cached union length.
///
/// Intervals are stored start-keyed and non-overlapping; an insertion
/// absorbs every stored interval it touches. The structure is reused
/// across reads via `clear()`, which keeps the allocation.
#[derive(Debug, Default)]
pub struct IntervalUnion {
    // start -> end, disjoint and non-adjacent after every insert
    spans: BTreeMap<i64, i64>,
    covered: i64,
}

impl IntervalUnion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all intervals. Keeps the allocation for reuse.
    pub fn clear(&mut self) {
        self.spans.clear();
        self.covered = 0;
    }

    /// Insert the closed interval `[start, end]`; order of endpoints does
    /// not matter. Overlapping and adjacent stored intervals are merged.
    pub fn add(&mut self, start: i64, end: i64) {
        let (mut lo, mut hi) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };

        // Absorb a predecessor that overlaps or touches [lo, hi].
        if let Some((&ps, &pe)) = self.spans.range(..=lo).next_back() {
            if pe + 1 >= lo {
                if pe >= hi {
                    return; // already fully covered
                }
                self.spans.remove(&ps);
                self.covered -= pe - ps + 1;
                lo = ps;
                hi = hi.max(pe);
            }
        }

        // Absorb successors starting inside or adjacent to [lo, hi].
        loop {
            let next = self.spans.range(lo..).next().map(|(&s, &e)| (s, e));
            match next {
                Some((ns, ne)) if ns <= hi + 1 => {
                    self.spans.remove(&ns);
                    self.covered -= ne - ns + 1;
                    hi = hi.max(ne);
                }
                _ => break,
            }
        }

        self.covered += hi - lo + 1;
        self.spans.insert(lo, hi);
    }

    /// Total number of positions covered by the union.
    pub fn covered_length(&self) -> i64 {
        self.covered
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

//! Coverage-based LCA assignment for long reads.
//!
//! Same selection rule as the weighted LCA, but an id's weight is the
//! number of query positions its matches cover (union, not sum), so a
//! gene hit repeated many times does not outweigh a longer alignment.

use std::collections::HashMap;
use std::sync::Arc;

use crate::classification::ClassificationTree;
use crate::filter::ActiveMatches;
use crate::intervals::IntervalUnion;
use crate::types::{ClassId, ReadBlock};

use super::weighted::{push_to_ancestors, select_covering_id};

pub struct CoverageLca {
    tree: Arc<ClassificationTree>,
    class_idx: usize,
    percent: f64,
    // reused across reads
    by_id: HashMap<ClassId, Vec<usize>>,
    accumulated: HashMap<ClassId, f64>,
    intervals: IntervalUnion,
}

impl CoverageLca {
    pub fn new(tree: Arc<ClassificationTree>, class_idx: usize, percent: f64) -> Self {
        CoverageLca {
            tree,
            class_idx,
            percent,
            by_id: HashMap::new(),
            accumulated: HashMap::new(),
            intervals: IntervalUnion::new(),
        }
    }

    pub fn compute_id(&mut self, active: &ActiveMatches, read: &ReadBlock) -> ClassId {
        self.by_id.clear();
        self.accumulated.clear();

        for i in active.iter() {
            let id = read.matches[i].class_id(self.class_idx);
            if id > 0 && self.tree.contains(id) {
                self.by_id.entry(id).or_default().push(i);
            }
        }

        let mut total = 0.0f64;
        for (&id, match_indices) in &self.by_id {
            self.intervals.clear();
            for &i in match_indices {
                let (lo, hi) = read.matches[i].query_interval();
                self.intervals.add(lo, hi);
            }
            let covered = self.intervals.covered_length() as f64;
            total += covered;
            push_to_ancestors(&self.tree, &mut self.accumulated, id, covered);
        }

        select_covering_id(&self.tree, &self.accumulated, total, self.percent)
    }

    pub fn lca(&self, a: ClassId, b: ClassId) -> ClassId {
        self.tree.lca(a, b)
    }
}

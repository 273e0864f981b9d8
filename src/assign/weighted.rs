//! Weighted LCA assignment.
//!
//! Every filtered match pushes its bit score onto its class id and all of
//! that id's ancestors. The assignment is the deepest id whose cumulative
//! weight reaches the configured fraction of the total; equally deep
//! candidates fold to their common ancestor.

use std::collections::HashMap;
use std::sync::Arc;

use crate::classification::ClassificationTree;
use crate::constants::{ROOT_ID, UNASSIGNED_ID};
use crate::filter::ActiveMatches;
use crate::types::{ClassId, ReadBlock};

pub struct WeightedLca {
    tree: Arc<ClassificationTree>,
    class_idx: usize,
    /// Required weight fraction in (0,100].
    percent: f64,
    // reused across reads
    accumulated: HashMap<ClassId, f64>,
}

impl WeightedLca {
    pub fn new(tree: Arc<ClassificationTree>, class_idx: usize, percent: f64) -> Self {
        WeightedLca {
            tree,
            class_idx,
            percent,
            accumulated: HashMap::new(),
        }
    }

    pub fn compute_id(&mut self, active: &ActiveMatches, read: &ReadBlock) -> ClassId {
        self.accumulated.clear();
        let mut total = 0.0f64;

        for i in active.iter() {
            let m = &read.matches[i];
            let id = m.class_id(self.class_idx);
            if id <= 0 || !self.tree.contains(id) {
                continue;
            }
            let weight = m.bit_score as f64;
            total += weight;
            push_to_ancestors(&self.tree, &mut self.accumulated, id, weight);
        }

        select_covering_id(&self.tree, &self.accumulated, total, self.percent)
    }

    pub fn lca(&self, a: ClassId, b: ClassId) -> ClassId {
        self.tree.lca(a, b)
    }
}

/// Add `weight` to `id` and every ancestor up to and including the root.
pub(super) fn push_to_ancestors(
    tree: &ClassificationTree,
    accumulated: &mut HashMap<ClassId, f64>,
    id: ClassId,
    weight: f64,
) {
    let mut cur = id;
    loop {
        *accumulated.entry(cur).or_insert(0.0) += weight;
        if cur == ROOT_ID {
            break;
        }
        match tree.parent(cur) {
            Some(p) if p != cur => cur = p,
            _ => break,
        }
    }
}

/// Pick the deepest id whose accumulated weight reaches
/// `percent/100 * total`; ties at equal depth fold to their LCA.
pub(super) fn select_covering_id(
    tree: &ClassificationTree,
    accumulated: &HashMap<ClassId, f64>,
    total: f64,
    percent: f64,
) -> ClassId {
    if total <= 0.0 {
        return UNASSIGNED_ID;
    }
    let threshold = percent / 100.0 * total;

    let mut best_depth = 0u32;
    let mut winners: Vec<ClassId> = Vec::new();
    for (&id, &weight) in accumulated {
        if weight + 1e-9 < threshold {
            continue;
        }
        let depth = match tree.depth(id) {
            Some(d) => d,
            None => continue,
        };
        if depth > best_depth || winners.is_empty() {
            best_depth = depth;
            winners.clear();
            winners.push(id);
        } else if depth == best_depth {
            winners.push(id);
        }
    }

    if winners.is_empty() {
        return UNASSIGNED_ID;
    }
    winners.sort_unstable();
    winners
        .into_iter()
        .fold(UNASSIGNED_ID, |acc, id| tree.lca(acc, id))
}

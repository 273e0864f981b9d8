//! Naive LCA assignment: intersect the class ids of all filtered matches
//! by walking the classification tree.
//!
//! Used for taxonomy (optionally with the 16S percent-identity clamp) and
//! for functional classifications that opt in to LCA.

use std::sync::Arc;

use crate::classification::{ClassificationTree, Rank};
use crate::constants::{
    IDENTITY_CLASS, IDENTITY_FAMILY, IDENTITY_GENUS, IDENTITY_ORDER, IDENTITY_PHYLUM,
    IDENTITY_SPECIES, UNASSIGNED_ID,
};
use crate::filter::ActiveMatches;
use crate::types::{ClassId, ReadBlock};

/// Deepest rank a 16S-style alignment identity permits, or `None` when no
/// threshold is met (no clamping).
pub(crate) fn identity_rank_ceiling(max_identity: f32) -> Option<Rank> {
    if max_identity >= IDENTITY_SPECIES {
        Some(Rank::Species)
    } else if max_identity >= IDENTITY_GENUS {
        Some(Rank::Genus)
    } else if max_identity >= IDENTITY_FAMILY {
        Some(Rank::Family)
    } else if max_identity >= IDENTITY_ORDER {
        Some(Rank::Order)
    } else if max_identity >= IDENTITY_CLASS {
        Some(Rank::Class)
    } else if max_identity >= IDENTITY_PHYLUM {
        Some(Rank::Phylum)
    } else {
        None
    }
}

/// Clamp `id` so it is no deeper than the rank permitted by the best
/// percent identity among the filtered matches. Matches with unknown
/// identity (0) are ignored.
pub(crate) fn clamp_by_identity(
    tree: &ClassificationTree,
    id: ClassId,
    active: &ActiveMatches,
    read: &ReadBlock,
) -> ClassId {
    let best_identity = active
        .iter()
        .map(|i| read.matches[i].percent_identity)
        .filter(|&p| p > 0.0)
        .fold(0.0f32, f32::max);
    if best_identity <= 0.0 {
        return id;
    }
    match identity_rank_ceiling(best_identity) {
        Some(ceiling) => tree.ancestor_at_or_above(id, ceiling),
        None => id,
    }
}

/// Fold-LCA assignment over the filtered match set.
pub struct NaiveLca {
    tree: Arc<ClassificationTree>,
    class_idx: usize,
    identity_filter: bool,
}

impl NaiveLca {
    pub fn new(tree: Arc<ClassificationTree>, class_idx: usize, identity_filter: bool) -> Self {
        NaiveLca {
            tree,
            class_idx,
            identity_filter,
        }
    }

    pub fn compute_id(&self, active: &ActiveMatches, read: &ReadBlock) -> ClassId {
        let mut result = UNASSIGNED_ID;
        for i in active.iter() {
            let id = read.matches[i].class_id(self.class_idx);
            if id > 0 {
                result = self.tree.lca(result, id);
            }
        }
        if result > 0 && self.identity_filter {
            result = clamp_by_identity(&self.tree, result, active, read);
        }
        result
    }

    pub fn lca(&self, a: ClassId, b: ClassId) -> ClassId {
        self.tree.lca(a, b)
    }
}

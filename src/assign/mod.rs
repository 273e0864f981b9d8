//! Assignment strategies: compute a class id from a filtered match set.
//!
//! One strategy instance exists per classification per run, selected from
//! the configured mode at setup and dispatched through the `Assigner`
//! variants' uniform entry points.

mod best_hit;
mod coverage;
mod lca;
mod multi_gene;
mod weighted;

pub use best_hit::BestHit;
pub use coverage::CoverageLca;
pub use lca::NaiveLca;
pub use multi_gene::{MultiGeneBestHit, MultiGeneLca};
pub use weighted::WeightedLca;

use std::sync::Arc;

use crate::classification::ClassificationTree;
use crate::config::{AnalysisConfig, LcaAlgorithm};
use crate::filter::ActiveMatches;
use crate::types::{ClassId, ReadBlock};

/// Tagged dispatch over the assignment strategies.
pub enum Assigner {
    NaiveLca(NaiveLca),
    WeightedLca(WeightedLca),
    CoverageLca(CoverageLca),
    MultiGeneLca(MultiGeneLca),
    BestHit(BestHit),
    MultiGeneBestHit(MultiGeneBestHit),
}

impl Assigner {
    /// Select the strategy for one classification, mirroring the mode
    /// rules: taxonomy follows the configured LCA algorithm; a functional
    /// classification uses plain LCA when opted in, otherwise best-hit
    /// (segmented in naive-long-read mode).
    ///
    /// `top_percent` is the driver-corrected value (long-read mode resets
    /// it to 100), not necessarily `config.top_percent`; the multi-gene
    /// LCA applies it per segment.
    pub fn for_classification(
        config: &AnalysisConfig,
        top_percent: f64,
        tree: Arc<ClassificationTree>,
        class_idx: usize,
        is_taxonomy: bool,
        use_lca: bool,
    ) -> Assigner {
        if is_taxonomy {
            match config.lca_algorithm {
                LcaAlgorithm::Naive => Assigner::NaiveLca(NaiveLca::new(
                    tree,
                    class_idx,
                    config.use_identity_filter,
                )),
                LcaAlgorithm::Weighted => Assigner::WeightedLca(WeightedLca::new(
                    tree,
                    class_idx,
                    config.weighted_lca_percent,
                )),
                LcaAlgorithm::NaiveLongRead => Assigner::MultiGeneLca(MultiGeneLca::new(
                    tree,
                    class_idx,
                    top_percent,
                    config.use_identity_filter,
                )),
                LcaAlgorithm::CoverageLongRead => Assigner::CoverageLca(CoverageLca::new(
                    tree,
                    class_idx,
                    config.weighted_lca_percent,
                )),
            }
        } else if use_lca {
            Assigner::NaiveLca(NaiveLca::new(tree, class_idx, false))
        } else if config.lca_algorithm == LcaAlgorithm::NaiveLongRead {
            Assigner::MultiGeneBestHit(MultiGeneBestHit::new(class_idx))
        } else {
            Assigner::BestHit(BestHit::new(class_idx))
        }
    }

    /// Compute the class id for a read from its filtered matches;
    /// positive when assigned, 0 otherwise. Never fails.
    pub fn compute_id(&mut self, active: &ActiveMatches, read: &ReadBlock) -> ClassId {
        match self {
            Assigner::NaiveLca(a) => a.compute_id(active, read),
            Assigner::WeightedLca(a) => a.compute_id(active, read),
            Assigner::CoverageLca(a) => a.compute_id(active, read),
            Assigner::MultiGeneLca(a) => a.compute_id(active, read),
            Assigner::BestHit(a) => a.compute_id(active, read),
            Assigner::MultiGeneBestHit(a) => a.compute_id(active, read),
        }
    }

    /// Secondary per-segment assignments from the last `compute_id` call.
    /// Returns the number of assigned segments; non-segmenting strategies
    /// report 0 and leave `out` empty.
    pub fn other_class_ids(
        &self,
        class_idx: usize,
        num_classifications: usize,
        out: &mut Vec<Vec<ClassId>>,
    ) -> usize {
        match self {
            Assigner::MultiGeneLca(a) => a.other_class_ids(class_idx, num_classifications, out),
            Assigner::MultiGeneBestHit(a) => {
                a.other_class_ids(class_idx, num_classifications, out)
            }
            _ => {
                out.clear();
                0
            }
        }
    }

    /// LCA in this strategy's classification tree; identity for
    /// strategies without one (best-hit keeps its argument).
    pub fn lca(&self, a: ClassId, b: ClassId) -> ClassId {
        match self {
            Assigner::NaiveLca(x) => x.lca(a, b),
            Assigner::WeightedLca(x) => x.lca(a, b),
            Assigner::CoverageLca(x) => x.lca(a, b),
            Assigner::MultiGeneLca(x) => x.lca(a, b),
            Assigner::BestHit(_) | Assigner::MultiGeneBestHit(_) => a,
        }
    }
}

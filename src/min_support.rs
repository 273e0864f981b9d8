//! Min-support and disabled-id correction.
//!
//! After streaming, classes whose accumulated weight falls below the
//! support threshold hand their reads to an ancestor; disabled classes
//! hand theirs to the nearest enabled ancestor regardless of weight. The
//! tree is visited bottom-up in a fixed order, so the resulting mapping
//! is independent of input ordering.

use std::collections::{HashMap, HashSet};

use crate::classification::{ClassificationTree, ClassificationView};
use crate::constants::ROOT_ID;
use crate::types::ClassId;

/// Compute the `from -> to` redirection map for one classification.
///
/// `weights` is the logged weight per class id (sentinels and unknown ids
/// are ignored); `threshold` of 0 disables the support check and only
/// disabled ids move. The root always survives.
pub fn apply_min_support(
    tree: &ClassificationTree,
    view: &ClassificationView,
    weights: &HashMap<ClassId, f64>,
    threshold: f64,
) -> HashMap<ClassId, ClassId> {
    // accumulated weight per node: own weight plus redirected descendants
    let mut accumulated: HashMap<ClassId, f64> = weights
        .iter()
        .filter(|(&id, _)| id > 0 && tree.contains(id))
        .map(|(&id, &w)| (id, w))
        .collect();

    let mut removed: HashSet<ClassId> = HashSet::new();

    // children precede parents in depth-descending order, so a parent
    // sees all weight pushed up from its failed subtree
    for id in tree.ids_by_depth_desc() {
        if id == ROOT_ID {
            continue;
        }
        let weight = accumulated.get(&id).copied().unwrap_or(0.0);
        let below_support = threshold > 0.0 && weight < threshold;
        if below_support || view.is_disabled(id) {
            removed.insert(id);
            if weight > 0.0 {
                if let Some(parent) = tree.parent(id) {
                    *accumulated.entry(parent).or_insert(0.0) += weight;
                }
            }
        }
    }

    // map every removed id that actually carries reads to its nearest
    // surviving ancestor
    let mut changes: HashMap<ClassId, ClassId> = HashMap::new();
    for (&id, _) in weights {
        if !removed.contains(&id) {
            continue;
        }
        let mut target = tree.parent(id).unwrap_or(ROOT_ID);
        while target != ROOT_ID && removed.contains(&target) {
            target = tree.parent(target).unwrap_or(ROOT_ID);
        }
        changes.insert(id, target);
    }
    changes
}

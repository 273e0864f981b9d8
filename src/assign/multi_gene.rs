//! Gene-segment assignment for long reads.
//!
//! A long read can carry several distinct gene alignments. Matches are
//! partitioned into non-overlapping query segments greedily by descending
//! score; a match joins an existing segment when its query interval
//! overlaps the segment by more than half of the shorter interval,
//! otherwise it founds a new segment.

use std::sync::Arc;

use crate::classification::ClassificationTree;
use crate::constants::{SEGMENT_OVERLAP_FRACTION, UNASSIGNED_ID};
use crate::filter::ActiveMatches;
use crate::types::{ClassId, ReadBlock};

use super::lca::clamp_by_identity;

#[derive(Debug)]
pub(crate) struct GeneSegment {
    pub interval: (i64, i64),
    /// Match indices in descending score order.
    pub members: Vec<usize>,
}

fn overlap_length(a: (i64, i64), b: (i64, i64)) -> i64 {
    (a.1.min(b.1) - a.0.max(b.0) + 1).max(0)
}

/// Partition the filtered matches into gene segments.
///
/// Segment order follows founding order, so the first segment is anchored
/// by the highest-scoring match.
pub(crate) fn partition_segments(read: &ReadBlock, active: &ActiveMatches) -> Vec<GeneSegment> {
    let mut order: Vec<usize> = active.iter().collect();
    order.sort_by(|&a, &b| {
        read.matches[b]
            .bit_score
            .total_cmp(&read.matches[a].bit_score)
            .then(a.cmp(&b))
    });

    let mut segments: Vec<GeneSegment> = Vec::new();
    for i in order {
        let interval = read.matches[i].query_interval();
        let length = interval.1 - interval.0 + 1;
        let joined = segments.iter_mut().find(|seg| {
            let seg_length = seg.interval.1 - seg.interval.0 + 1;
            let shorter = length.min(seg_length) as f64;
            overlap_length(interval, seg.interval) as f64 > SEGMENT_OVERLAP_FRACTION * shorter
        });
        match joined {
            Some(seg) => seg.members.push(i),
            None => segments.push(GeneSegment {
                interval,
                members: vec![i],
            }),
        }
    }
    segments
}

fn fill_other_ids(
    other_ids: &[ClassId],
    class_idx: usize,
    num_classifications: usize,
    out: &mut Vec<Vec<ClassId>>,
) {
    out.clear();
    for &id in other_ids {
        let mut row = vec![UNASSIGNED_ID; num_classifications];
        row[class_idx] = id;
        out.push(row);
    }
}

/// Long-read taxonomy assignment: per-segment LCA, folded across
/// segments. The configured top-percent is applied within each segment
/// against that segment's best score.
pub struct MultiGeneLca {
    tree: Arc<ClassificationTree>,
    class_idx: usize,
    top_percent: f64,
    identity_filter: bool,
    other_ids: Vec<ClassId>,
    assigned_segments: usize,
}

impl MultiGeneLca {
    pub fn new(
        tree: Arc<ClassificationTree>,
        class_idx: usize,
        top_percent: f64,
        identity_filter: bool,
    ) -> Self {
        MultiGeneLca {
            tree,
            class_idx,
            top_percent,
            identity_filter,
            other_ids: Vec::new(),
            assigned_segments: 0,
        }
    }

    pub fn compute_id(&mut self, active: &ActiveMatches, read: &ReadBlock) -> ClassId {
        self.other_ids.clear();
        self.assigned_segments = 0;

        let segments = partition_segments(read, active);
        let mut read_lca = UNASSIGNED_ID;
        let mut primary_seen = false;

        for seg in &segments {
            let best = seg
                .members
                .iter()
                .map(|&i| read.matches[i].bit_score as f64)
                .fold(f64::MIN, f64::max);
            let cutoff = if self.top_percent < 100.0 {
                best * (1.0 - self.top_percent / 100.0)
            } else {
                f64::MIN
            };

            let mut seg_lca = UNASSIGNED_ID;
            for &i in &seg.members {
                let m = &read.matches[i];
                if (m.bit_score as f64) < cutoff {
                    continue;
                }
                let id = m.class_id(self.class_idx);
                if id > 0 {
                    seg_lca = self.tree.lca(seg_lca, id);
                }
            }

            if seg_lca > 0 {
                self.assigned_segments += 1;
                if primary_seen {
                    self.other_ids.push(seg_lca);
                } else {
                    primary_seen = true;
                }
                read_lca = self.tree.lca(read_lca, seg_lca);
            }
        }

        if read_lca > 0 && self.identity_filter {
            read_lca = clamp_by_identity(&self.tree, read_lca, active, read);
        }
        read_lca
    }

    pub fn other_class_ids(
        &self,
        class_idx: usize,
        num_classifications: usize,
        out: &mut Vec<Vec<ClassId>>,
    ) -> usize {
        fill_other_ids(&self.other_ids, class_idx, num_classifications, out);
        self.assigned_segments
    }

    pub fn lca(&self, a: ClassId, b: ClassId) -> ClassId {
        self.tree.lca(a, b)
    }
}

/// Long-read functional assignment: best hit per gene segment. The
/// primary id is the first segment's; the remaining segment ids are
/// exposed through `other_class_ids`.
pub struct MultiGeneBestHit {
    class_idx: usize,
    other_ids: Vec<ClassId>,
    assigned_segments: usize,
}

impl MultiGeneBestHit {
    pub fn new(class_idx: usize) -> Self {
        MultiGeneBestHit {
            class_idx,
            other_ids: Vec::new(),
            assigned_segments: 0,
        }
    }

    pub fn compute_id(&mut self, active: &ActiveMatches, read: &ReadBlock) -> ClassId {
        self.other_ids.clear();
        self.assigned_segments = 0;

        let segments = partition_segments(read, active);
        let mut primary = UNASSIGNED_ID;

        for seg in &segments {
            // members are score-ordered, so the founder is the best hit
            let id = seg
                .members
                .first()
                .map(|&i| read.matches[i].class_id(self.class_idx))
                .unwrap_or(UNASSIGNED_ID);
            if id > 0 {
                self.assigned_segments += 1;
                if primary == UNASSIGNED_ID {
                    primary = id;
                } else {
                    self.other_ids.push(id);
                }
            }
        }
        primary
    }

    pub fn other_class_ids(
        &self,
        class_idx: usize,
        num_classifications: usize,
        out: &mut Vec<Vec<ClassId>>,
    ) -> usize {
        fill_other_ids(&self.other_ids, class_idx, num_classifications, out);
        self.assigned_segments
    }
}

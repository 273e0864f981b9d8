//! Best-hit assignment: the class id of the highest-scoring filtered
//! match. Ties keep the first match in input order.

use crate::constants::UNASSIGNED_ID;
use crate::filter::ActiveMatches;
use crate::types::{ClassId, ReadBlock};

pub struct BestHit {
    class_idx: usize,
}

impl BestHit {
    pub fn new(class_idx: usize) -> Self {
        BestHit { class_idx }
    }

    pub fn compute_id(&self, active: &ActiveMatches, read: &ReadBlock) -> ClassId {
        let mut best_id = UNASSIGNED_ID;
        let mut best_score = f32::MIN;
        for i in active.iter() {
            let m = &read.matches[i];
            let id = m.class_id(self.class_idx);
            // strictly greater keeps the first match on ties
            if id > 0 && m.bit_score > best_score {
                best_score = m.bit_score;
                best_id = id;
            }
        }
        best_id
    }
}

//! Per-read assignment log, accumulated during streaming and committed to
//! the archive once.
//!
//! The log itself is append-only. Class rewrites requested after the
//! stream (min-support, disabled ids) are a separate layer composed with
//! the entries at commit time; nothing is mutated in place.

use std::collections::HashMap;

use crate::archive::ArchiveConnector;
use crate::error::Result;
use crate::types::ClassId;

/// One logged assignment: `class_ids[c]` is the read's class in
/// classification `c`. A read may log several entries in long-read
/// naive mode (one per additional gene segment).
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEntry {
    pub read_uid: u64,
    pub weight: f64,
    pub class_ids: Vec<ClassId>,
}

#[derive(Debug)]
pub struct UpdateLog {
    num_classifications: usize,
    entries: Vec<UpdateEntry>,
    rewrites: Vec<HashMap<ClassId, ClassId>>,
}

impl UpdateLog {
    pub fn new(num_classifications: usize) -> Self {
        UpdateLog {
            num_classifications,
            entries: Vec::new(),
            rewrites: vec![HashMap::new(); num_classifications],
        }
    }

    pub fn num_classifications(&self) -> usize {
        self.num_classifications
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one assignment row. `class_ids` must have one entry per
    /// classification and `weight` must be non-negative.
    pub fn add_item(&mut self, read_uid: u64, weight: f64, class_ids: &[ClassId]) {
        debug_assert_eq!(class_ids.len(), self.num_classifications);
        debug_assert!(weight >= 0.0);
        self.entries.push(UpdateEntry {
            read_uid,
            weight,
            class_ids: class_ids.to_vec(),
        });
    }

    /// Aggregate logged weight per class id in classification `c`,
    /// built on demand.
    pub fn class_id_to_weight_map(&self, c: usize) -> HashMap<ClassId, f64> {
        let mut map: HashMap<ClassId, f64> = HashMap::new();
        for entry in &self.entries {
            *map.entry(entry.class_ids[c]).or_insert(0.0) += entry.weight;
        }
        map
    }

    /// Record that entries assigned to `from` in classification `c` shall
    /// read as `to` at commit time.
    pub fn append_class(&mut self, c: usize, from: ClassId, to: ClassId) {
        if from != to {
            self.rewrites[c].insert(from, to);
        }
    }

    /// Resolve an id through the rewrite layer, following chains.
    pub fn resolved_id(&self, c: usize, id: ClassId) -> ClassId {
        let mut cur = id;
        // rewrite chains are acyclic; the bound guards corrupted input
        for _ in 0..self.rewrites[c].len() + 1 {
            match self.rewrites[c].get(&cur) {
                Some(&next) => cur = next,
                None => break,
            }
        }
        cur
    }

    /// Entries with the rewrite layer applied, in append order.
    pub fn resolved_entries(&self) -> Vec<UpdateEntry> {
        self.entries
            .iter()
            .map(|entry| {
                let class_ids = entry
                    .class_ids
                    .iter()
                    .enumerate()
                    .map(|(c, &id)| self.resolved_id(c, id))
                    .collect();
                UpdateEntry {
                    read_uid: entry.read_uid,
                    weight: entry.weight,
                    class_ids,
                }
            })
            .collect()
    }

    /// Apply the rewrite layer and transfer all entries to the archive.
    /// This is the only operation that performs I/O; the log is consumed.
    pub fn commit(
        self,
        connector: &mut dyn ArchiveConnector,
        classification_names: &[String],
    ) -> Result<u64> {
        let resolved = self.resolved_entries();
        let count = resolved.len() as u64;
        connector.update_classifications(classification_names, &resolved)?;
        Ok(count)
    }
}

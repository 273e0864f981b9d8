//! Flat-file archive backend.
//!
//! Reads a sample from two tab-separated tables (gzip-transparent): one
//! row per read and one row per match. Uids are 1-based row ordinals and
//! mate references resolve by read name at load time. Committed
//! classification tables are held in memory for the CLI to render.
//!
//! `reads.tsv` columns: `name length weight complexity mate` (`-` = no
//! mate). `matches.tsv` columns: `read_name bit_score expected
//! percent_identity query_start query_end assignments`, the last being
//! `;`-separated `Classification=id` pairs.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::archive::{ArchiveConnector, MateReader, ReadBlockIterator};
use crate::error::{ReclassError, Result};
use crate::types::{parse_magnitude, ClassId, MatchBlock, ReadBlock};
use crate::update_log::UpdateEntry;

/// Open a text file for buffered reading, decompressing `.gz` paths
/// transparently.
pub fn open_text_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| ReclassError::io(path, "open", e))?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// In-memory sample archive loaded from flat files.
#[derive(Debug)]
pub struct FlatArchive {
    classification_names: Vec<String>,
    reads: Vec<ReadBlock>,
    committed: Vec<UpdateEntry>,
    class_weights: HashMap<String, HashMap<ClassId, f64>>,
    class_counts: HashMap<String, HashMap<ClassId, u64>>,
    num_reads: u64,
}

impl FlatArchive {
    /// Load reads and matches. `classification_names` fixes the
    /// classification order; match assignments naming an unknown
    /// classification are dropped with a warning.
    pub fn load(
        reads_path: &Path,
        matches_path: &Path,
        classification_names: &[String],
    ) -> Result<FlatArchive> {
        let mut archive = FlatArchive {
            classification_names: classification_names.to_vec(),
            reads: Vec::new(),
            committed: Vec::new(),
            class_weights: HashMap::new(),
            class_counts: HashMap::new(),
            num_reads: 0,
        };

        let mut uid_by_name: HashMap<String, u64> = HashMap::new();
        let mut mate_names: Vec<Option<String>> = Vec::new();

        let reader = open_text_reader(reads_path)?;
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx as u64 + 1;
            let line = line.map_err(|e| ReclassError::io(reads_path, "read", e))?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                return Err(ReclassError::parse(
                    reads_path,
                    line_no,
                    format!("expected at least 4 fields, got {}", fields.len()),
                ));
            }
            let name = fields[0].trim().to_string();
            let length: u64 = fields[1].trim().parse().map_err(|_| {
                ReclassError::parse(reads_path, line_no, "invalid read length")
            })?;
            // negative weights clamp to 1 rather than failing the load
            let mut weight: u64 = fields[2].trim().parse().unwrap_or(1);
            let complexity: f32 = fields[3].trim().parse().unwrap_or(0.0);
            let mate = fields
                .get(4)
                .map(|f| f.trim())
                .filter(|f| !f.is_empty() && *f != "-")
                .map(str::to_string);

            if weight == 0 {
                weight = parse_magnitude(&name).unwrap_or(0);
            }

            let uid = archive.reads.len() as u64 + 1;
            if uid_by_name.insert(name.clone(), uid).is_some() {
                return Err(ReclassError::parse(
                    reads_path,
                    line_no,
                    format!("duplicate read name '{}'", name),
                ));
            }
            mate_names.push(mate);
            archive.reads.push(ReadBlock {
                uid,
                header: name.clone(),
                name,
                length,
                weight,
                complexity,
                mate_uid: 0,
                matches: Vec::new(),
            });
        }

        // resolve mates now that all uids are known
        for (i, mate) in mate_names.iter().enumerate() {
            if let Some(mate_name) = mate {
                match uid_by_name.get(mate_name) {
                    Some(&uid) => archive.reads[i].mate_uid = uid,
                    None => log::warn!(
                        "read '{}' names unknown mate '{}'",
                        archive.reads[i].name,
                        mate_name
                    ),
                }
            }
        }

        let class_index: HashMap<&str, usize> = classification_names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();

        let reader = open_text_reader(matches_path)?;
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx as u64 + 1;
            let line = line.map_err(|e| ReclassError::io(matches_path, "read", e))?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 7 {
                return Err(ReclassError::parse(
                    matches_path,
                    line_no,
                    format!("expected 7 fields, got {}", fields.len()),
                ));
            }
            let read_uid = match uid_by_name.get(fields[0].trim()) {
                Some(&uid) => uid,
                None => {
                    log::warn!(
                        "{}:{}: match for unknown read '{}' skipped",
                        matches_path.display(),
                        line_no,
                        fields[0].trim()
                    );
                    continue;
                }
            };
            let bit_score: f32 = fields[1].trim().parse().map_err(|_| {
                ReclassError::parse(matches_path, line_no, "invalid bit score")
            })?;
            let expected: f64 = fields[2].trim().parse().map_err(|_| {
                ReclassError::parse(matches_path, line_no, "invalid expected value")
            })?;
            let percent_identity: f32 = fields[3].trim().parse().unwrap_or(0.0);
            let start: i64 = fields[4].trim().parse().map_err(|_| {
                ReclassError::parse(matches_path, line_no, "invalid query start")
            })?;
            let end: i64 = fields[5].trim().parse().map_err(|_| {
                ReclassError::parse(matches_path, line_no, "invalid query end")
            })?;

            let mut class_ids = vec![0; classification_names.len()];
            for token in fields[6].split(';').filter(|t| !t.trim().is_empty()) {
                let (cname, id) = token.split_once('=').ok_or_else(|| {
                    ReclassError::parse(
                        matches_path,
                        line_no,
                        format!("malformed assignment '{}'", token),
                    )
                })?;
                let id: ClassId = id.trim().parse().map_err(|_| {
                    ReclassError::parse(
                        matches_path,
                        line_no,
                        format!("invalid class id in '{}'", token),
                    )
                })?;
                match class_index.get(cname.trim()) {
                    Some(&c) => class_ids[c] = id,
                    None => log::warn!(
                        "{}:{}: assignment to inactive classification '{}' dropped",
                        matches_path.display(),
                        line_no,
                        cname.trim()
                    ),
                }
            }

            archive.reads[read_uid as usize - 1].matches.push(MatchBlock {
                bit_score,
                expected,
                percent_identity,
                aligned_query_start: start,
                aligned_query_end: end,
                class_ids,
            });
        }

        Ok(archive)
    }

    /// Build an archive directly from read blocks; uids are rewritten to
    /// 1-based ordinals. Used by tests and embedders.
    pub fn from_reads(classification_names: &[String], mut reads: Vec<ReadBlock>) -> FlatArchive {
        for (i, read) in reads.iter_mut().enumerate() {
            read.uid = i as u64 + 1;
        }
        FlatArchive {
            classification_names: classification_names.to_vec(),
            reads,
            committed: Vec::new(),
            class_weights: HashMap::new(),
            class_counts: HashMap::new(),
            num_reads: 0,
        }
    }

    pub fn num_reads(&self) -> u64 {
        self.num_reads
    }

    /// The committed assignment table, in commit order.
    pub fn committed_entries(&self) -> &[UpdateEntry] {
        &self.committed
    }

    /// Committed weight per class id for one classification.
    pub fn class_weights(&self, name: &str) -> Option<&HashMap<ClassId, f64>> {
        self.class_weights.get(name)
    }

    /// Committed entry count per class id for one classification.
    pub fn class_counts(&self, name: &str) -> Option<&HashMap<ClassId, u64>> {
        self.class_counts.get(name)
    }

    pub fn read_name(&self, uid: u64) -> Option<&str> {
        let idx = (uid as usize).checked_sub(1)?;
        self.reads.get(idx).map(|r| r.name.as_str())
    }

    fn prefiltered(&self, uid: u64, min_score: f64, max_expected: f64, want_matches: bool) -> Option<ReadBlock> {
        let idx = (uid as usize).checked_sub(1)?;
        let mut read = self.reads.get(idx)?.clone();
        if want_matches {
            read.matches.retain(|m| {
                m.bit_score as f64 >= min_score && m.expected <= max_expected
            });
        } else {
            read.matches.clear();
        }
        Some(read)
    }
}

struct FlatIter<'a> {
    archive: &'a FlatArchive,
    next_uid: u64,
    min_score: f64,
    max_expected: f64,
    want_matches: bool,
}

impl ReadBlockIterator for FlatIter<'_> {
    fn next_read(&mut self) -> Option<Result<ReadBlock>> {
        let read = self.archive.prefiltered(
            self.next_uid,
            self.min_score,
            self.max_expected,
            self.want_matches,
        )?;
        self.next_uid += 1;
        Some(Ok(read))
    }

    fn progress(&self) -> u64 {
        self.next_uid - 1
    }

    fn max_progress(&self) -> u64 {
        self.archive.reads.len() as u64
    }
}

struct FlatMateReader<'a> {
    archive: &'a FlatArchive,
}

impl MateReader for FlatMateReader<'_> {
    fn read_mate(
        &mut self,
        uid: u64,
        min_score: f64,
        max_expected: f64,
    ) -> Result<Option<ReadBlock>> {
        Ok(self.archive.prefiltered(uid, min_score, max_expected, true))
    }
}

impl ArchiveConnector for FlatArchive {
    fn classification_names(&self) -> &[String] {
        &self.classification_names
    }

    fn all_reads_iterator(
        &self,
        min_score: f64,
        max_expected: f64,
        want_matches: bool,
    ) -> Result<Box<dyn ReadBlockIterator + '_>> {
        Ok(Box::new(FlatIter {
            archive: self,
            next_uid: 1,
            min_score,
            max_expected,
            want_matches,
        }))
    }

    fn supports_mate_lookup(&self) -> bool {
        true
    }

    fn mate_reader(&self) -> Result<Box<dyn MateReader + '_>> {
        Ok(Box::new(FlatMateReader { archive: self }))
    }

    fn update_classifications(
        &mut self,
        classification_names: &[String],
        entries: &[UpdateEntry],
    ) -> Result<()> {
        if classification_names.len() != self.classification_names.len() {
            return Err(ReclassError::archive(format!(
                "classification count mismatch: committed {}, archive has {}",
                classification_names.len(),
                self.classification_names.len()
            )));
        }
        self.committed = entries.to_vec();
        self.class_weights.clear();
        self.class_counts.clear();
        for (c, name) in classification_names.iter().enumerate() {
            let weights = self.class_weights.entry(name.clone()).or_default();
            let counts = self.class_counts.entry(name.clone()).or_default();
            for entry in entries {
                *weights.entry(entry.class_ids[c]).or_insert(0.0) += entry.weight;
                *counts.entry(entry.class_ids[c]).or_insert(0) += 1;
            }
        }
        Ok(())
    }

    fn set_number_of_reads(&mut self, n: u64) -> Result<()> {
        self.num_reads = n;
        Ok(())
    }

    fn classification_size(&self, name: &str) -> u64 {
        self.class_weights
            .get(name)
            .map(|weights| weights.keys().filter(|&&id| id > 0).count() as u64)
            .unwrap_or(0)
    }
}

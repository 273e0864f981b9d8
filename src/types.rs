//! Core types used throughout the reclass library.

/// Identifier of a class within one classification space. Positive values
/// are real class ids; zero and negatives are sentinels (see `constants`).
pub type ClassId = i32;

/// One local alignment of a read onto a reference.
///
/// Query coordinates are 1-based and inclusive; start may exceed end when
/// the alignment is on the reverse strand.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchBlock {
    pub bit_score: f32,
    pub expected: f64,
    /// Percent identity of the alignment; 0 means unknown.
    pub percent_identity: f32,
    pub aligned_query_start: i64,
    pub aligned_query_end: i64,
    /// Class id per classification, indexed in the archive's classification
    /// order. Missing entries count as unassigned.
    pub class_ids: Vec<ClassId>,
}

impl MatchBlock {
    /// Class id of this match in the given classification, 0 if none.
    pub fn class_id(&self, class_idx: usize) -> ClassId {
        self.class_ids.get(class_idx).copied().unwrap_or(0)
    }

    /// Number of query bases covered by this alignment.
    pub fn aligned_length(&self) -> i64 {
        (self.aligned_query_end - self.aligned_query_start).abs() + 1
    }

    /// Query interval as (low, high), both inclusive.
    pub fn query_interval(&self) -> (i64, i64) {
        if self.aligned_query_start <= self.aligned_query_end {
            (self.aligned_query_start, self.aligned_query_end)
        } else {
            (self.aligned_query_end, self.aligned_query_start)
        }
    }
}

/// One read with its precomputed matches, as handed out by the archive.
#[derive(Debug, Clone, Default)]
pub struct ReadBlock {
    /// Opaque archive handle; nonzero for persisted reads.
    pub uid: u64,
    pub name: String,
    pub header: String,
    /// Nucleotide length.
    pub length: u64,
    /// Raw stored weight; the driver normalizes 0 to 1.
    pub weight: u64,
    /// Complexity in [0,1]; 0 means unknown.
    pub complexity: f32,
    /// Archive handle of the mate read, 0 if none.
    pub mate_uid: u64,
    pub matches: Vec<MatchBlock>,
}

/// Recover a read magnitude from its header, if annotated.
///
/// Headers produced by upstream tools may carry `magnitude=N` (or the
/// legacy `weight=N`) as a whitespace- or `|`-delimited token. Returns
/// `None` when no annotation is present or the value does not parse.
pub fn parse_magnitude(header: &str) -> Option<u64> {
    header
        .split(|c: char| c.is_whitespace() || c == '|' || c == ';')
        .find_map(|token| {
            token
                .strip_prefix("magnitude=")
                .or_else(|| token.strip_prefix("weight="))
                .and_then(|value| value.parse().ok())
        })
}

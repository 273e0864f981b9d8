//! Interfaces to the sample archive.
//!
//! The pipeline consumes the archive through these traits: a sequential
//! read iterator, an optional random-access mate reader (a second,
//! independent handle over the same archive), and the connector that
//! receives the committed classification tables.

use crate::error::Result;
use crate::types::ReadBlock;
use crate::update_log::UpdateEntry;

/// Sequential iterator over all read blocks of a sample.
pub trait ReadBlockIterator {
    /// Next read block, `None` at end of stream. A per-read decode
    /// failure is reported as `Some(Err(..))`; the caller may skip it and
    /// continue.
    fn next_read(&mut self) -> Option<Result<ReadBlock>>;

    fn progress(&self) -> u64;

    fn max_progress(&self) -> u64;
}

/// Random-access reader used to fetch mate read blocks while the primary
/// iterator streams.
pub trait MateReader {
    /// Seek to `uid` and decode the read block there. Matches outside the
    /// given score/expected bounds are dropped at read time. `Ok(None)`
    /// when the uid does not resolve.
    fn read_mate(
        &mut self,
        uid: u64,
        min_score: f64,
        max_expected: f64,
    ) -> Result<Option<ReadBlock>>;
}

/// Connector to one sample archive.
pub trait ArchiveConnector {
    /// Classification names in the archive's match-block order.
    fn classification_names(&self) -> &[String];

    /// Stream all reads. `min_score`/`max_expected` form a coarse
    /// prefilter applied at decode time; `want_matches` may be false for
    /// match-free passes.
    fn all_reads_iterator(
        &self,
        min_score: f64,
        max_expected: f64,
        want_matches: bool,
    ) -> Result<Box<dyn ReadBlockIterator + '_>>;

    /// Whether this archive supports seeking to a read by uid. Mate-pair
    /// reconciliation requires it.
    fn supports_mate_lookup(&self) -> bool {
        false
    }

    /// Open a second, independent read position over the same archive.
    fn mate_reader(&self) -> Result<Box<dyn MateReader + '_>>;

    /// Persist the committed per-read classification tables. The only
    /// mutating operation of a run; a failure here may leave the archive
    /// inconsistent.
    fn update_classifications(
        &mut self,
        classification_names: &[String],
        entries: &[UpdateEntry],
    ) -> Result<()>;

    fn set_number_of_reads(&mut self, n: u64) -> Result<()>;

    /// Number of distinct classes holding at least one read in the
    /// committed table.
    fn classification_size(&self, name: &str) -> u64;
}

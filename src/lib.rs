//! reclass: a streaming read-classification pipeline.
//!
//! Consumes a sample's reads with their precomputed alignment matches,
//! assigns each read a class id in one or more classification spaces
//! (taxonomy plus any number of functional classifications) and commits a
//! per-read assignment table with per-class aggregate counts.
//!
//! The pipeline is a single batch transform: filter each read's matches,
//! compute an assignment per classification (four interchangeable LCA
//! algorithms for taxonomy, best-hit or LCA for the rest), optionally
//! reconcile mate pairs through a second archive handle, then rewrite
//! under-supported or disabled classes up the tree before committing.

pub mod archive;
pub mod assign;
pub mod classification;
pub mod config;
pub mod constants;
pub mod error;
pub mod filter;
pub mod flat;
pub mod intervals;
pub mod logging;
pub mod min_support;
pub mod pipeline;
pub mod types;
pub mod update_log;

pub use archive::{ArchiveConnector, MateReader, ReadBlockIterator};
pub use classification::{ClassificationTree, ClassificationView, Rank};
pub use config::{AnalysisConfig, BlastMode, LcaAlgorithm};
pub use constants::{LOW_COMPLEXITY_ID, NO_HITS_ID, ROOT_ID, TAXONOMY, UNASSIGNED_ID};
pub use error::{ReclassError, Result};
pub use flat::FlatArchive;
pub use pipeline::{
    process, AnalysisResult, AnalysisStats, CancelToken, ClassificationSetup, DataSummary,
};
pub use types::{ClassId, MatchBlock, ReadBlock};
pub use update_log::{UpdateEntry, UpdateLog};

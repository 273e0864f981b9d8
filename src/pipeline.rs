//! The read-classification pipeline driver.
//!
//! Streams all reads of a sample once, assigning each a class id per
//! active classification, then applies the min-support and disabled-id
//! correction and commits the assignment table to the archive. Runs on a
//! single worker; per-read scratch is reused across iterations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::archive::ArchiveConnector;
use crate::assign::Assigner;
use crate::classification::{ClassificationTree, ClassificationView};
use crate::config::{AnalysisConfig, BlastMode, LcaAlgorithm};
use crate::constants::{
    ITERATOR_MAX_EXPECTED, ITERATOR_MIN_SCORE, LOW_COMPLEXITY_ID, NO_HITS_ID, TAXONOMY,
    UNASSIGNED_ID,
};
use crate::error::{ReclassError, Result};
use crate::filter::{compute_active_matches, ensure_covered, ActiveMatches};
use crate::intervals::IntervalUnion;
use crate::min_support::apply_min_support;
use crate::types::ClassId;
use crate::update_log::UpdateLog;

/// Cooperative cancellation flag, polled at the top of every iteration.
/// Cancelling after the commit phase has started has no effect.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One active classification: its tree, the immutable known/disabled
/// snapshot, and whether assignment uses LCA (taxonomy always does).
pub struct ClassificationSetup {
    pub name: String,
    pub tree: Arc<ClassificationTree>,
    pub view: ClassificationView,
    pub use_lca: bool,
}

impl ClassificationSetup {
    pub fn new(tree: Arc<ClassificationTree>, disabled_ids: &[ClassId], use_lca: bool) -> Self {
        let view = ClassificationView::snapshot(&tree, disabled_ids);
        ClassificationSetup {
            name: tree.name().to_string(),
            tree,
            view,
            use_lca,
        }
    }
}

/// Counters collected while streaming. The four read classes partition
/// the input: low-complexity pre-empts everything, coverage rejection
/// pre-empts with-hits.
#[derive(Debug, Clone, Default)]
pub struct AnalysisStats {
    pub reads_found: u64,
    pub total_weight: f64,
    pub num_matches: u64,
    pub reads_with_hits: u64,
    pub reads_without_hits: u64,
    pub reads_low_complexity: u64,
    pub reads_coverage_rejected: u64,
    pub assigned_via_mate: u64,
    pub assigned: Vec<u64>,
    pub unassigned: Vec<u64>,
    pub min_support_changes: Vec<u64>,
    /// The min-support threshold actually applied (derived from the
    /// percent form when that was set).
    pub effective_min_support: f64,
}

impl AnalysisStats {
    fn new(num_classifications: usize) -> Self {
        AnalysisStats {
            assigned: vec![0; num_classifications],
            unassigned: vec![0; num_classifications],
            min_support_changes: vec![0; num_classifications],
            ..Default::default()
        }
    }
}

/// Summary record synchronized after commit.
#[derive(Debug, Clone)]
pub struct DataSummary {
    pub num_reads: u64,
    pub total_weight: f64,
    pub blast_mode: BlastMode,
    pub parameter_string: String,
    /// Whether per-class figures in the rendered summary should be
    /// weight sums rather than entry counts.
    pub weighted_read_counts: bool,
    pub classification_sizes: Vec<(String, u64)>,
}

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub stats: AnalysisStats,
    pub summary: DataSummary,
    pub committed_entries: u64,
}

// Per-read scratch, reused across iterations.
struct ReadScratch {
    active: ActiveMatches,
    mate_active: ActiveMatches,
    intervals: Option<IntervalUnion>,
    class_ids: Vec<ClassId>,
    more_class_ids: Vec<Vec<Vec<ClassId>>>,
    multi_gene_weights: Vec<f64>,
}

/// Analyze all reads of the sample behind `connector`.
///
/// Streams reads in archive order, classifies each, applies the
/// post-stream corrections and commits. Returns the collected statistics
/// and the synchronized summary. Fails with `ReclassError::Cancelled`
/// when `cancel` fires before the commit phase; the archive is untouched
/// in that case.
pub fn process(
    config: &AnalysisConfig,
    classifications: &[ClassificationSetup],
    connector: &mut dyn ArchiveConnector,
    cancel: &CancelToken,
) -> Result<AnalysisResult> {
    config
        .validate()
        .map_err(|e| ReclassError::validation(e.to_string()))?;
    if classifications.is_empty() {
        return Err(ReclassError::validation(
            "at least one classification is required",
        ));
    }

    let num = classifications.len();
    let taxonomy_idx = classifications.iter().position(|c| c.name == TAXONOMY);
    let using_naive_long_read = config.lca_algorithm == LcaAlgorithm::NaiveLongRead;

    log::info!("Analyzing reads and alignments");
    if config.use_identity_filter {
        log::info!("Using min percent-identity values for taxonomic assignment of 16S reads");
    }

    let mut top_percent = config.top_percent;
    if config.long_reads && top_percent > 0.0 && top_percent < 100.0 {
        log::warn!("Long reads: set top-percent threshold to 100 (off)");
        top_percent = 100.0;
    }
    // the multi-gene strategies apply top-percent per segment instead
    let filter_top_percent = if using_naive_long_read {
        100.0
    } else {
        top_percent
    };

    let do_mate_pairs = config.paired_reads && connector.supports_mate_lookup();
    if config.paired_reads && !connector.supports_mate_lookup() {
        log::warn!("Archive does not support mate lookup, will ignore paired read information");
    }
    if do_mate_pairs {
        log::info!("Using paired reads in taxonomic assignment");
    }
    if config.min_percent_read_to_cover > 0.0 {
        log::info!(
            "Minimum percentage of read to be covered: {:.1}%",
            config.min_percent_read_to_cover
        );
    }

    let mut assigners: Vec<Assigner> = classifications
        .iter()
        .enumerate()
        .map(|(c, setup)| {
            Assigner::for_classification(
                config,
                top_percent,
                setup.tree.clone(),
                c,
                Some(c) == taxonomy_idx,
                setup.use_lca,
            )
        })
        .collect();

    let mut update_log = UpdateLog::new(num);
    let mut stats = AnalysisStats::new(num);

    let mut scratch = ReadScratch {
        active: ActiveMatches::new(),
        mate_active: ActiveMatches::new(),
        intervals: if config.min_percent_read_to_cover > 0.0 && config.long_reads {
            Some(IntervalUnion::new())
        } else {
            None
        },
        class_ids: vec![UNASSIGNED_ID; num],
        more_class_ids: vec![Vec::new(); num],
        multi_gene_weights: vec![0.0; num],
    };

    // ---- streaming pass ------------------------------------------------
    {
        let mut it =
            connector.all_reads_iterator(ITERATOR_MIN_SCORE, ITERATOR_MAX_EXPECTED, true)?;
        let mut mate_reader = if do_mate_pairs {
            Some(connector.mate_reader()?)
        } else {
            None
        };

        while let Some(next) = it.next_read() {
            if cancel.is_cancelled() {
                return Err(ReclassError::Cancelled);
            }
            let mut read = match next {
                Ok(read) => read,
                Err(e) => {
                    log::warn!("skipping unreadable read block: {}", e);
                    continue;
                }
            };

            for c in 0..num {
                scratch.class_ids[c] = UNASSIGNED_ID;
                scratch.more_class_ids[c].clear();
                scratch.multi_gene_weights[c] = 0.0;
            }

            if read.weight == 0 {
                read.weight = 1;
            }
            let read_weight = if config.long_reads {
                read.weight as f64 * read.length as f64
            } else {
                read.weight as f64
            };

            stats.reads_found += 1;
            stats.total_weight += read_weight;
            stats.num_matches += read.matches.len() as u64;

            let has_low_complexity = read.complexity > 0.0
                && (read.complexity + 0.01) < config.min_complexity as f32;
            if has_low_complexity {
                stats.reads_low_complexity += 1;
                for c in 0..num {
                    scratch.class_ids[c] = LOW_COMPLEXITY_ID;
                }
                update_log.add_item(read.uid, read_weight, &scratch.class_ids);
                continue;
            }

            // taxonomy first: its assignment feeds mate reconciliation
            let mut tax_id = UNASSIGNED_ID;
            let mut tax_had_matches = false;
            let mut coverage_rejected = false;
            if let Some(t) = taxonomy_idx {
                compute_active_matches(
                    config.min_score,
                    filter_top_percent,
                    config.max_expected,
                    config.min_percent_identity,
                    &read,
                    t,
                    &mut scratch.active,
                );
                tax_had_matches = !scratch.active.is_empty();

                let covered = config.min_percent_read_to_cover == 0.0
                    || ensure_covered(
                        config.min_percent_read_to_cover,
                        &read,
                        &scratch.active,
                        scratch.intervals.as_mut(),
                    );
                if covered {
                    tax_id = assigners[t].compute_id(&scratch.active, &read);
                    if do_mate_pairs && read.mate_uid > 0 {
                        if let Some(reader) = mate_reader.as_mut() {
                            match reader.read_mate(
                                read.mate_uid,
                                config.min_score,
                                config.max_expected,
                            ) {
                                Ok(Some(mate)) => {
                                    compute_active_matches(
                                        config.min_score,
                                        filter_top_percent,
                                        config.max_expected,
                                        config.min_percent_identity,
                                        &mate,
                                        t,
                                        &mut scratch.mate_active,
                                    );
                                    let mate_tax_id =
                                        assigners[t].compute_id(&scratch.mate_active, &mate);
                                    if mate_tax_id > 0 {
                                        if tax_id <= 0 {
                                            tax_id = mate_tax_id;
                                            stats.assigned_via_mate += 1;
                                        } else {
                                            let both = assigners[t].lca(tax_id, mate_tax_id);
                                            if both == tax_id {
                                                tax_id = mate_tax_id;
                                            } else if both != mate_tax_id {
                                                tax_id = both;
                                            }
                                        }
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => {
                                    log::warn!(
                                        "mate lookup failed for read '{}': {}",
                                        read.name,
                                        e
                                    );
                                }
                            }
                        }
                    }
                } else {
                    coverage_rejected = true;
                    stats.reads_coverage_rejected += 1;
                }
                if !coverage_rejected {
                    if tax_had_matches {
                        stats.reads_with_hits += 1;
                    } else {
                        stats.reads_without_hits += 1;
                    }
                }
            } else if read.matches.is_empty() {
                stats.reads_without_hits += 1;
            } else {
                stats.reads_with_hits += 1;
            }

            for c in 0..num {
                let mut id = if Some(c) == taxonomy_idx {
                    if tax_id <= 0 && !coverage_rejected && !tax_had_matches {
                        NO_HITS_ID
                    } else {
                        tax_id.max(UNASSIGNED_ID)
                    }
                } else {
                    compute_active_matches(
                        config.min_score,
                        filter_top_percent,
                        config.max_expected,
                        config.min_percent_identity,
                        &read,
                        c,
                        &mut scratch.active,
                    );
                    let mut id = assigners[c].compute_id(&scratch.active, &read);
                    if id > 0 && using_naive_long_read {
                        let segments = assigners[c].other_class_ids(
                            c,
                            num,
                            &mut scratch.more_class_ids[c],
                        );
                        scratch.multi_gene_weights[c] = if segments > 0 {
                            read_weight / segments as f64
                        } else {
                            0.0
                        };
                    }
                    if id == UNASSIGNED_ID && scratch.active.is_empty() {
                        id = NO_HITS_ID;
                    }
                    id
                };
                if id > 0 && !classifications[c].view.is_known(id) {
                    id = UNASSIGNED_ID;
                }
                scratch.class_ids[c] = id;
                if id == UNASSIGNED_ID {
                    stats.unassigned[c] += 1;
                } else if id > 0 {
                    stats.assigned[c] += 1;
                }
            }
            update_log.add_item(read.uid, read_weight, &scratch.class_ids);

            if using_naive_long_read {
                for c in 0..num {
                    for extra in &scratch.more_class_ids[c] {
                        update_log.add_item(read.uid, scratch.multi_gene_weights[c], extra);
                    }
                }
            }

            if stats.reads_found % 100_000 == 0 {
                log::debug!(
                    "processed {} / {} reads",
                    it.progress(),
                    it.max_progress()
                );
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(ReclassError::Cancelled);
    }

    // ---- post-stream reporting ----------------------------------------
    log::info!("Total reads:   {:>12}", stats.reads_found);
    if stats.total_weight > stats.reads_found as f64 {
        log::info!("Total weight:  {:>12}", stats.total_weight as u64);
    }
    if stats.reads_low_complexity > 0 {
        log::info!("Low complexity:{:>12}", stats.reads_low_complexity);
    }
    if stats.reads_coverage_rejected > 0 {
        log::info!("Low covered:   {:>12}", stats.reads_coverage_rejected);
    }
    log::info!("With hits:     {:>12}", stats.reads_with_hits);
    log::info!("Alignments:    {:>12}", stats.num_matches);
    for (c, setup) in classifications.iter().enumerate() {
        log::info!("Assig. {}: {:>8}", setup.name, stats.assigned[c]);
    }
    if stats.assigned_via_mate > 0 {
        log::info!("Tax. ass. by mate: {:>8}", stats.assigned_via_mate);
    }

    // ---- min-support and disabled-id correction -----------------------
    let mut min_support = config.min_support as f64;
    if config.min_support_percent > 0.0 {
        min_support = (config.min_support_percent / 100.0
            * (stats.reads_with_hits + stats.assigned_via_mate) as f64)
            .ceil()
            .max(1.0);
        log::info!("MinSupport set to: {}", min_support);
    }
    stats.effective_min_support = min_support;

    for (c, setup) in classifications.iter().enumerate() {
        let lca_in_use = Some(c) == taxonomy_idx || setup.use_lca;
        if !lca_in_use || (min_support <= 0.0 && setup.view.num_disabled() == 0) {
            continue;
        }
        let weights = update_log.class_id_to_weight_map(c);
        let changes = apply_min_support(&setup.tree, &setup.view, &weights, min_support);
        stats.min_support_changes[c] = changes.len() as u64;

        let mut ordered: Vec<(ClassId, ClassId)> = changes.into_iter().collect();
        ordered.sort_unstable();
        for (from, to) in ordered {
            update_log.append_class(c, from, to);
        }
        log::info!(
            "Min-supp. changes ({}): {:>8}",
            setup.name,
            stats.min_support_changes[c]
        );
    }

    // ---- commit: cancellation is disabled from here on ----------------
    let names: Vec<String> = classifications.iter().map(|c| c.name.clone()).collect();
    let committed_entries = update_log
        .commit(connector, &names)
        .map_err(|e| ReclassError::inconsistent(e.to_string()))?;
    connector.set_number_of_reads(stats.reads_found)?;

    let classification_sizes: Vec<(String, u64)> = names
        .iter()
        .map(|name| (name.clone(), connector.classification_size(name)))
        .collect();
    for (name, size) in &classification_sizes {
        log::info!("Class. {}: {:>8}", name, size);
    }

    let summary = DataSummary {
        num_reads: stats.reads_found,
        total_weight: stats.total_weight,
        blast_mode: config.blast_mode,
        parameter_string: config.parameter_string(),
        weighted_read_counts: config.use_weighted_read_counts,
        classification_sizes,
    };

    Ok(AnalysisResult {
        stats,
        summary,
        committed_entries,
    })
}

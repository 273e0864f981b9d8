//! End-to-end pipeline tests against the in-memory flat archive.

use std::sync::Arc;

use reclass::archive::{ArchiveConnector, MateReader, ReadBlockIterator};
use reclass::classification::{ClassificationTree, Rank};
use reclass::config::{AnalysisConfig, LcaAlgorithm};
use reclass::pipeline::{process, AnalysisResult, CancelToken, ClassificationSetup};
use reclass::update_log::UpdateEntry;
use reclass::{
    ClassId, FlatArchive, MatchBlock, ReadBlock, Result, LOW_COMPLEXITY_ID, NO_HITS_ID,
    UNASSIGNED_ID,
};

fn taxonomy_tree() -> ClassificationTree {
    ClassificationTree::from_nodes(
        "Taxonomy",
        &[
            (2, 1, Some(Rank::Domain), "Bacteria"),
            (1224, 2, Some(Rank::Phylum), "Proteobacteria"),
            (561, 1224, Some(Rank::Genus), "Escherichia"),
            (562, 561, Some(Rank::Species), "Escherichia coli"),
            (620, 1224, Some(Rank::Genus), "Shigella"),
            (622, 620, Some(Rank::Species), "Shigella dysenteriae"),
            (9604, 1, Some(Rank::Family), "Hominidae"),
            (9605, 9604, Some(Rank::Genus), "Homo"),
            (9606, 9604, Some(Rank::Species), "Homo sapiens"),
        ],
    )
    .unwrap()
}

fn kegg_tree() -> ClassificationTree {
    ClassificationTree::from_nodes(
        "KEGG",
        &[
            (10, 1, None, "Metabolism"),
            (11, 10, None, "K00001"),
            (22, 10, None, "K00002"),
            (33, 10, None, "K00003"),
        ],
    )
    .unwrap()
}

fn taxonomy_setup() -> ClassificationSetup {
    ClassificationSetup::new(Arc::new(taxonomy_tree()), &[], true)
}

fn names(setups: &[ClassificationSetup]) -> Vec<String> {
    setups.iter().map(|s| s.name.clone()).collect()
}

fn tax_match(score: f32, identity: f32, start: i64, end: i64, tax_id: ClassId) -> MatchBlock {
    MatchBlock {
        bit_score: score,
        expected: 1e-20,
        percent_identity: identity,
        aligned_query_start: start,
        aligned_query_end: end,
        class_ids: vec![tax_id],
    }
}

fn simple_read(name: &str, matches: Vec<MatchBlock>) -> ReadBlock {
    ReadBlock {
        name: name.to_string(),
        header: name.to_string(),
        length: 150,
        weight: 1,
        complexity: 0.8,
        matches,
        ..Default::default()
    }
}

fn run(
    config: &AnalysisConfig,
    setups: &[ClassificationSetup],
    reads: Vec<ReadBlock>,
) -> (FlatArchive, AnalysisResult) {
    let mut archive = FlatArchive::from_reads(&names(setups), reads);
    let result = process(config, setups, &mut archive, &CancelToken::new()).unwrap();
    (archive, result)
}

fn tax_assignment(archive: &FlatArchive, entry_idx: usize) -> ClassId {
    archive.committed_entries()[entry_idx].class_ids[0]
}

#[test]
fn same_taxon_matches_assign_that_taxon() {
    let config = AnalysisConfig {
        top_percent: 10.0,
        min_score: 0.0,
        ..Default::default()
    };
    let reads = vec![simple_read(
        "r1",
        vec![
            tax_match(100.0, 99.0, 1, 150, 562),
            tax_match(95.0, 99.0, 1, 150, 562),
        ],
    )];
    let (archive, result) = run(&config, &[taxonomy_setup()], reads);

    assert_eq!(tax_assignment(&archive, 0), 562);
    assert_eq!(result.stats.reads_with_hits, 1);
    assert_eq!(result.stats.assigned[0], 1);
}

#[test]
fn cousin_matches_assign_common_ancestor() {
    let config = AnalysisConfig {
        top_percent: 10.0,
        min_score: 0.0,
        ..Default::default()
    };
    let reads = vec![simple_read(
        "r1",
        vec![
            tax_match(100.0, 99.0, 1, 150, 562),
            tax_match(99.0, 99.0, 1, 150, 622),
        ],
    )];
    let (archive, _) = run(&config, &[taxonomy_setup()], reads);
    assert_eq!(tax_assignment(&archive, 0), 1224);
}

#[test]
fn low_complexity_read_is_set_aside_but_logged() {
    let config = AnalysisConfig {
        min_complexity: 0.3,
        min_score: 0.0,
        ..Default::default()
    };
    let mut read = simple_read("r1", vec![tax_match(100.0, 99.0, 1, 150, 562)]);
    read.complexity = 0.1;
    read.weight = 3;
    let (archive, result) = run(&config, &[taxonomy_setup()], vec![read]);

    let entry = &archive.committed_entries()[0];
    assert_eq!(entry.class_ids, vec![LOW_COMPLEXITY_ID]);
    assert_eq!(entry.weight, 3.0);
    assert_eq!(result.stats.reads_low_complexity, 1);
    assert_eq!(result.stats.reads_with_hits, 0);
}

#[test]
fn coverage_gate_long_read_boundaries() {
    let config = AnalysisConfig {
        min_percent_read_to_cover: 50.0,
        long_reads: true,
        min_score: 0.0,
        top_percent: 100.0,
        ..Default::default()
    };

    let mk = |name: &str, second: (i64, i64)| -> ReadBlock {
        let mut read = simple_read(
            name,
            vec![
                tax_match(100.0, 99.0, 1, 300, 562),
                tax_match(90.0, 99.0, second.0, second.1, 562),
            ],
        );
        read.length = 1000;
        read
    };

    // union 701 >= 500 passes
    let (archive, result) = run(&config, &[taxonomy_setup()], vec![mk("r1", (600, 1000))]);
    assert_eq!(tax_assignment(&archive, 0), 562);
    assert_eq!(result.stats.reads_coverage_rejected, 0);

    // union 501 >= 500 still passes
    let (archive, result) = run(&config, &[taxonomy_setup()], vec![mk("r1", (600, 800))]);
    assert_eq!(tax_assignment(&archive, 0), 562);
    assert_eq!(result.stats.reads_coverage_rejected, 0);

    // union 401 < 500 rejects; the read logs unassigned
    let (archive, result) = run(&config, &[taxonomy_setup()], vec![mk("r1", (600, 700))]);
    assert_eq!(tax_assignment(&archive, 0), UNASSIGNED_ID);
    assert_eq!(result.stats.reads_coverage_rejected, 1);
    assert_eq!(result.stats.reads_with_hits, 0);
}

fn paired_reads(
    r1_tax: Option<ClassId>,
    r2_tax: ClassId,
) -> Vec<ReadBlock> {
    let r1_matches = match r1_tax {
        Some(id) => vec![tax_match(100.0, 99.0, 1, 150, id)],
        None => vec![],
    };
    let mut r1 = simple_read("r1", r1_matches);
    let mut r2 = simple_read("r2", vec![tax_match(100.0, 99.0, 1, 150, r2_tax)]);
    r1.mate_uid = 2;
    r2.mate_uid = 1;
    vec![r1, r2]
}

#[test]
fn mate_rescues_unassigned_read() {
    let config = AnalysisConfig {
        paired_reads: true,
        min_score: 0.0,
        ..Default::default()
    };
    let (archive, result) = run(&config, &[taxonomy_setup()], paired_reads(None, 9606));

    assert_eq!(tax_assignment(&archive, 0), 9606);
    assert_eq!(result.stats.assigned_via_mate, 1);
}

#[test]
fn mate_disjoint_taxa_take_their_lca() {
    let config = AnalysisConfig {
        paired_reads: true,
        min_score: 0.0,
        ..Default::default()
    };
    // 9605 and 9606 are cousins under 9604
    let (archive, result) = run(&config, &[taxonomy_setup()], paired_reads(Some(9605), 9606));
    assert_eq!(tax_assignment(&archive, 0), 9604);
    assert_eq!(result.stats.assigned_via_mate, 0);
}

// Reconciliation is asymmetric: when the read's own taxon is an ancestor
// of the mate's, the mate's deeper taxon wins, but in the mirrored case
// the read keeps its own.
#[test]
fn mate_deeper_than_read_takes_mate() {
    let config = AnalysisConfig {
        paired_reads: true,
        min_score: 0.0,
        ..Default::default()
    };
    let (archive, _) = run(&config, &[taxonomy_setup()], paired_reads(Some(9604), 9606));
    assert_eq!(tax_assignment(&archive, 0), 9606);
}

#[test]
fn read_deeper_than_mate_keeps_read() {
    let config = AnalysisConfig {
        paired_reads: true,
        min_score: 0.0,
        ..Default::default()
    };
    let (archive, _) = run(&config, &[taxonomy_setup()], paired_reads(Some(9606), 9604));
    assert_eq!(tax_assignment(&archive, 0), 9606);
}

#[test]
fn min_support_migrates_light_leaves_to_parent() {
    let tree = ClassificationTree::from_nodes(
        "Taxonomy",
        &[
            (10, 1, None, "P"),
            (11, 10, None, "a"),
            (12, 10, None, "b"),
            (13, 10, None, "c"),
        ],
    )
    .unwrap();
    let setup = ClassificationSetup::new(Arc::new(tree), &[], true);
    let config = AnalysisConfig {
        min_support: 5,
        min_score: 0.0,
        ..Default::default()
    };

    // weights: a=3, b=2, c=2 via read weights
    let mut reads = Vec::new();
    for (i, &(tax, weight)) in [(11, 3u64), (12, 2), (13, 2)].iter().enumerate() {
        let mut read = simple_read(
            &format!("r{}", i),
            vec![tax_match(100.0, 99.0, 1, 150, tax)],
        );
        read.weight = weight;
        reads.push(read);
    }
    let (archive, result) = run(&config, &[setup], reads);

    for entry in archive.committed_entries() {
        assert_eq!(entry.class_ids[0], 10, "all leaves redirect to P");
    }
    assert_eq!(result.stats.min_support_changes[0], 3);
    assert_eq!(archive.class_weights("Taxonomy").unwrap()[&10], 7.0);
}

#[test]
fn min_support_percent_derives_threshold() {
    let config = AnalysisConfig {
        min_support_percent: 60.0,
        min_score: 0.0,
        ..Default::default()
    };
    // three reads with hits; threshold = ceil(0.6 * 3) = 2
    let reads = vec![
        simple_read("r1", vec![tax_match(100.0, 99.0, 1, 150, 562)]),
        simple_read("r2", vec![tax_match(100.0, 99.0, 1, 150, 562)]),
        simple_read("r3", vec![tax_match(100.0, 99.0, 1, 150, 622)]),
    ];
    let (archive, result) = run(&config, &[taxonomy_setup()], reads);

    assert_eq!(result.stats.effective_min_support, 2.0);
    // 562 holds 2 >= 2 and stays; 622 holds 1 and climbs until support
    let weights = archive.class_weights("Taxonomy").unwrap();
    assert_eq!(weights[&562], 2.0);
    assert!(!weights.contains_key(&622));
}

#[test]
fn disabled_ids_are_absent_after_commit() {
    let setup = ClassificationSetup::new(Arc::new(taxonomy_tree()), &[562], true);
    let config = AnalysisConfig {
        min_score: 0.0,
        ..Default::default()
    };
    let reads = vec![simple_read("r1", vec![tax_match(100.0, 99.0, 1, 150, 562)])];
    let (archive, _) = run(&config, &[setup], reads);

    let weights = archive.class_weights("Taxonomy").unwrap();
    assert!(!weights.contains_key(&562));
    assert_eq!(weights[&561], 1.0, "reads land on the nearest enabled ancestor");
}

#[test]
fn unknown_ids_fold_to_unassigned() {
    let config = AnalysisConfig {
        min_score: 0.0,
        ..Default::default()
    };
    let reads = vec![simple_read(
        "r1",
        vec![tax_match(100.0, 99.0, 1, 150, 999_999)],
    )];
    let (archive, result) = run(&config, &[taxonomy_setup()], reads);

    assert_eq!(tax_assignment(&archive, 0), UNASSIGNED_ID);
    assert_eq!(result.stats.unassigned[0], 1);
}

#[test]
fn read_without_matches_logs_no_hits() {
    let config = AnalysisConfig {
        min_score: 0.0,
        ..Default::default()
    };
    let reads = vec![simple_read("r1", vec![])];
    let (archive, result) = run(&config, &[taxonomy_setup()], reads);

    assert_eq!(tax_assignment(&archive, 0), NO_HITS_ID);
    assert_eq!(result.stats.reads_without_hits, 1);
    assert_eq!(result.stats.reads_with_hits, 0);
}

#[test]
fn counters_partition_the_input() {
    let config = AnalysisConfig {
        min_complexity: 0.3,
        min_percent_read_to_cover: 50.0,
        min_score: 0.0,
        ..Default::default()
    };
    let mut low = simple_read("low", vec![tax_match(100.0, 99.0, 1, 150, 562)]);
    low.complexity = 0.1;
    let mut short_cover = simple_read("short", vec![tax_match(100.0, 99.0, 1, 30, 562)]);
    short_cover.length = 150;
    let good = simple_read("good", vec![tax_match(100.0, 99.0, 1, 150, 562)]);
    let empty = simple_read("empty", vec![]);

    let (_, result) = run(
        &config,
        &[taxonomy_setup()],
        vec![low, short_cover, good, empty],
    );

    let s = &result.stats;
    assert_eq!(s.reads_found, 4);
    assert_eq!(s.reads_low_complexity, 1);
    assert_eq!(s.reads_coverage_rejected, 2, "empty read also fails the gate");
    assert_eq!(s.reads_with_hits, 1);
    assert_eq!(s.reads_without_hits, 0);
    assert_eq!(
        s.reads_found,
        s.reads_with_hits + s.reads_without_hits + s.reads_low_complexity
            + s.reads_coverage_rejected
    );
}

#[test]
fn weight_is_conserved_short_read() {
    let config = AnalysisConfig {
        min_score: 0.0,
        ..Default::default()
    };
    let mut reads = Vec::new();
    let mut expected_total = 0.0;
    for (i, w) in [1u64, 5, 0, 3].iter().enumerate() {
        let mut read = simple_read(
            &format!("r{}", i),
            vec![tax_match(100.0, 99.0, 1, 150, 562)],
        );
        read.weight = *w;
        expected_total += (*w).max(1) as f64;
        reads.push(read);
    }
    let (archive, result) = run(&config, &[taxonomy_setup()], reads);

    let committed: f64 = archive.committed_entries().iter().map(|e| e.weight).sum();
    assert_eq!(committed, expected_total);
    assert_eq!(result.stats.total_weight, expected_total);
}

#[test]
fn long_read_weight_scales_by_length() {
    let config = AnalysisConfig {
        long_reads: true,
        min_score: 0.0,
        top_percent: 100.0,
        ..Default::default()
    };
    let mut read = simple_read("r1", vec![tax_match(100.0, 99.0, 1, 150, 562)]);
    read.length = 2000;
    read.weight = 2;
    let (archive, _) = run(&config, &[taxonomy_setup()], vec![read]);
    assert_eq!(archive.committed_entries()[0].weight, 4000.0);
}

#[test]
fn naive_long_read_emits_extra_segment_entries() {
    let tax = ClassificationSetup::new(Arc::new(taxonomy_tree()), &[], true);
    let kegg = ClassificationSetup::new(Arc::new(kegg_tree()), &[], false);
    let config = AnalysisConfig {
        lca_algorithm: LcaAlgorithm::NaiveLongRead,
        min_score: 0.0,
        ..Default::default()
    };

    // three disjoint gene segments with distinct KEGG ids
    let mk = |score: f32, start: i64, end: i64, tax_id: ClassId, kegg_id: ClassId| MatchBlock {
        bit_score: score,
        expected: 1e-20,
        percent_identity: 99.0,
        aligned_query_start: start,
        aligned_query_end: end,
        class_ids: vec![tax_id, kegg_id],
    };
    let mut read = simple_read("r1", vec![]);
    read.length = 5000;
    read.weight = 6;
    read.matches = vec![
        mk(100.0, 1, 1000, 562, 11),
        mk(90.0, 2000, 3000, 562, 22),
        mk(80.0, 4000, 5000, 622, 33),
    ];

    let (archive, _) = run(&config, &[tax, kegg], vec![read]);
    let entries = archive.committed_entries();

    // one primary entry plus one per additional KEGG segment
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].weight, 6.0);
    assert_eq!(entries[0].class_ids[1], 11);

    // extras carry weight / segmentCount and only the KEGG column
    for extra in &entries[1..] {
        assert_eq!(extra.read_uid, entries[0].read_uid);
        assert_eq!(extra.weight, 2.0);
        assert_eq!(extra.class_ids[0], UNASSIGNED_ID);
    }
    let extra_ids: Vec<ClassId> = entries[1..].iter().map(|e| e.class_ids[1]).collect();
    assert_eq!(extra_ids, vec![22, 33]);
}

// With long reads the driver turns top-percent off, and the per-segment
// cutoff inside the multi-gene LCA must follow suit: a weak cousin hit
// in the same segment still participates in the segment LCA.
#[test]
fn long_read_mode_disables_per_segment_top_percent() {
    let config = AnalysisConfig {
        lca_algorithm: LcaAlgorithm::NaiveLongRead,
        long_reads: true,
        top_percent: 10.0,
        min_score: 0.0,
        ..Default::default()
    };
    let mut read = simple_read(
        "r1",
        vec![
            tax_match(100.0, 99.0, 1, 500, 562),
            tax_match(50.0, 99.0, 1, 500, 622),
        ],
    );
    read.length = 1000;
    let (archive, _) = run(&config, &[taxonomy_setup()], vec![read]);
    assert_eq!(tax_assignment(&archive, 0), 1224);
}

#[test]
fn summary_figures_follow_weighted_read_counts() {
    let mk_reads = || {
        let mut read = simple_read("r1", vec![tax_match(100.0, 99.0, 1, 150, 562)]);
        read.weight = 5;
        vec![read]
    };

    let config = AnalysisConfig {
        min_score: 0.0,
        ..Default::default()
    };
    let (archive, result) = run(&config, &[taxonomy_setup()], mk_reads());
    assert!(!result.summary.weighted_read_counts);
    assert_eq!(archive.class_counts("Taxonomy").unwrap()[&562], 1);

    let config = AnalysisConfig {
        min_score: 0.0,
        use_weighted_read_counts: true,
        ..Default::default()
    };
    let (archive, result) = run(&config, &[taxonomy_setup()], mk_reads());
    assert!(result.summary.weighted_read_counts);
    assert_eq!(archive.class_weights("Taxonomy").unwrap()[&562], 5.0);
}

#[test]
fn functional_best_hit_and_lca_modes() {
    let tax = ClassificationSetup::new(Arc::new(taxonomy_tree()), &[], true);
    let kegg_best = ClassificationSetup::new(Arc::new(kegg_tree()), &[], false);
    let config = AnalysisConfig {
        min_score: 0.0,
        ..Default::default()
    };

    let mk = |score: f32, kegg_id: ClassId| MatchBlock {
        bit_score: score,
        expected: 1e-20,
        percent_identity: 99.0,
        aligned_query_start: 1,
        aligned_query_end: 150,
        class_ids: vec![562, kegg_id],
    };
    let read = simple_read("r1", vec![mk(90.0, 11), mk(100.0, 22)]);

    // best-hit picks the top-scoring match's id
    let (archive, _) = run(&config, &[tax, kegg_best], vec![read.clone()]);
    assert_eq!(archive.committed_entries()[0].class_ids[1], 22);

    // LCA mode folds both ids to their parent group
    let tax = ClassificationSetup::new(Arc::new(taxonomy_tree()), &[], true);
    let kegg_lca = ClassificationSetup::new(Arc::new(kegg_tree()), &[], true);
    let (archive, _) = run(&config, &[tax, kegg_lca], vec![read]);
    assert_eq!(archive.committed_entries()[0].class_ids[1], 10);
}

#[test]
fn identical_runs_commit_identical_tables() {
    let config = AnalysisConfig {
        min_support: 2,
        min_score: 0.0,
        ..Default::default()
    };
    let reads: Vec<ReadBlock> = (0..20)
        .map(|i| {
            let tax = if i % 3 == 0 { 562 } else if i % 3 == 1 { 622 } else { 9606 };
            simple_read(
                &format!("r{}", i),
                vec![tax_match(100.0 - i as f32, 99.0, 1, 150, tax)],
            )
        })
        .collect();

    let (archive_a, _) = run(&config, &[taxonomy_setup()], reads.clone());
    let (archive_b, _) = run(&config, &[taxonomy_setup()], reads);
    assert_eq!(archive_a.committed_entries(), archive_b.committed_entries());
}

#[test]
fn committed_ids_are_known_or_sentinels() {
    let config = AnalysisConfig {
        min_complexity: 0.3,
        min_score: 0.0,
        ..Default::default()
    };
    let tree = taxonomy_tree();
    let mut reads = vec![
        simple_read("r1", vec![tax_match(100.0, 99.0, 1, 150, 562)]),
        simple_read("r2", vec![tax_match(100.0, 99.0, 1, 150, 424242)]),
        simple_read("r3", vec![]),
    ];
    reads.push({
        let mut r = simple_read("r4", vec![tax_match(100.0, 99.0, 1, 150, 562)]);
        r.complexity = 0.05;
        r
    });

    let (archive, _) = run(&config, &[taxonomy_setup()], reads);
    for entry in archive.committed_entries() {
        let id = entry.class_ids[0];
        assert!(
            tree.contains(id)
                || id == UNASSIGNED_ID
                || id == NO_HITS_ID
                || id == LOW_COMPLEXITY_ID,
            "unexpected committed id {}",
            id
        );
    }
}

#[test]
fn cancellation_before_commit_leaves_archive_untouched() {
    let config = AnalysisConfig {
        min_score: 0.0,
        ..Default::default()
    };
    let setups = [taxonomy_setup()];
    let reads = vec![simple_read("r1", vec![tax_match(100.0, 99.0, 1, 150, 562)])];
    let mut archive = FlatArchive::from_reads(&names(&setups), reads);

    let token = CancelToken::new();
    token.cancel();
    let err = process(&config, &setups, &mut archive, &token).unwrap_err();
    assert!(err.is_cancelled());
    assert!(archive.committed_entries().is_empty());
    assert_eq!(archive.num_reads(), 0);
}

// A connector without random access: paired-read analysis downgrades
// with a warning instead of failing.
struct SequentialOnly(FlatArchive);

impl ArchiveConnector for SequentialOnly {
    fn classification_names(&self) -> &[String] {
        self.0.classification_names()
    }

    fn all_reads_iterator(
        &self,
        min_score: f64,
        max_expected: f64,
        want_matches: bool,
    ) -> Result<Box<dyn ReadBlockIterator + '_>> {
        self.0.all_reads_iterator(min_score, max_expected, want_matches)
    }

    fn supports_mate_lookup(&self) -> bool {
        false
    }

    fn mate_reader(&self) -> Result<Box<dyn MateReader + '_>> {
        unreachable!("mate reader must not be opened without mate support")
    }

    fn update_classifications(
        &mut self,
        classification_names: &[String],
        entries: &[UpdateEntry],
    ) -> Result<()> {
        self.0.update_classifications(classification_names, entries)
    }

    fn set_number_of_reads(&mut self, n: u64) -> Result<()> {
        self.0.set_number_of_reads(n)
    }

    fn classification_size(&self, name: &str) -> u64 {
        self.0.classification_size(name)
    }
}

#[test]
fn paired_reads_without_mate_support_downgrades() {
    let config = AnalysisConfig {
        paired_reads: true,
        min_score: 0.0,
        ..Default::default()
    };
    let setups = [taxonomy_setup()];
    let mut archive =
        SequentialOnly(FlatArchive::from_reads(&names(&setups), paired_reads(None, 9606)));

    let result = process(&config, &setups, &mut archive, &CancelToken::new()).unwrap();
    // without the mate, r1 stays unassigned and nothing is rescued
    assert_eq!(result.stats.assigned_via_mate, 0);
    assert_eq!(archive.0.committed_entries()[0].class_ids[0], NO_HITS_ID);
}

#[test]
fn update_log_length_matches_reads_seen() {
    let config = AnalysisConfig {
        min_score: 0.0,
        ..Default::default()
    };
    let reads: Vec<ReadBlock> = (0..7)
        .map(|i| simple_read(&format!("r{}", i), vec![tax_match(100.0, 99.0, 1, 150, 562)]))
        .collect();
    let (archive, result) = run(&config, &[taxonomy_setup()], reads);
    assert_eq!(archive.committed_entries().len(), 7);
    assert_eq!(result.committed_entries, 7);
    assert_eq!(result.summary.num_reads, 7);
    assert_eq!(archive.num_reads(), 7);
}

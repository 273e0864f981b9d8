//! Constants shared across the reclass library: sentinel class ids and
//! identity-based rank thresholds.

use crate::types::ClassId;

/// Id meaning "no assignment" in any classification.
pub const UNASSIGNED_ID: ClassId = 0;

/// Sentinel for reads that produced no usable matches in a classification.
pub const NO_HITS_ID: ClassId = -1;

/// Sentinel for reads rejected by the complexity filter.
pub const LOW_COMPLEXITY_ID: ClassId = -4;

/// Root of every classification tree.
pub const ROOT_ID: ClassId = 1;

/// Name of the taxonomy classification; the driver gives it special
/// treatment (LCA algorithm selection, mate-pair reconciliation).
pub const TAXONOMY: &str = "Taxonomy";

// Percent-identity thresholds for 16S-style rank ceilings, deepest first.
// An identity of at least the threshold permits assignment at that rank.
pub(crate) const IDENTITY_SPECIES: f32 = 97.0;
pub(crate) const IDENTITY_GENUS: f32 = 95.0;
pub(crate) const IDENTITY_FAMILY: f32 = 90.0;
pub(crate) const IDENTITY_ORDER: f32 = 85.0;
pub(crate) const IDENTITY_CLASS: f32 = 80.0;
pub(crate) const IDENTITY_PHYLUM: f32 = 75.0;

// Fraction of the shorter of two query intervals that may overlap before
// a match is folded into an existing gene segment.
pub(crate) const SEGMENT_OVERLAP_FRACTION: f64 = 0.5;

// Coarse prefilter bounds handed to the archive iterator; real filtering
// happens per classification in the match filter.
pub(crate) const ITERATOR_MIN_SCORE: f64 = 0.0;
pub(crate) const ITERATOR_MAX_EXPECTED: f64 = 10.0;

//! Stage 3: Fellegi-Sunter pairwise scoring
//!
//! Each candidate pair gets a comparator value per field, a quantized
//! agreement outcome, and a log-likelihood-ratio total. Fields are always
//! visited in [`FieldName::ALL`] order so the floating-point sum, and with
//! it the artifact bytes, are identical on every platform.

mod calibration;

pub use calibration::{shipped_calibration, Calibration, FieldWeights};

use std::collections::{BTreeMap, HashMap};

use strsim::jaro_winkler;

use crate::config::EngineConfig;
use crate::domain::{CandidatePair, CanonicalRecord, FieldName, ScoredPair};

/// Quantized agreement outcome per field, two bits in `agreement_pattern`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Outcome {
    Disagree = 0,
    Partial = 1,
    Agree = 2,
    /// No evidence: the field was null on at least one side.
    Null = 3,
}

impl Outcome {
    /// Quantize a comparator value: >= 0.85 agrees, [0.5, 0.85) is partial,
    /// the rest disagrees.
    fn from_value(value: f64) -> Self {
        if value >= 0.85 {
            Outcome::Agree
        } else if value >= 0.5 {
            Outcome::Partial
        } else {
            Outcome::Disagree
        }
    }
}

/// Read one field's outcome back out of an agreement pattern.
pub fn pattern_outcome(pattern: u32, field: FieldName) -> Outcome {
    match (pattern >> (2 * field.index())) & 0b11 {
        0 => Outcome::Disagree,
        1 => Outcome::Partial,
        2 => Outcome::Agree,
        _ => Outcome::Null,
    }
}

/// One field comparison: the raw comparator value plus whether it is
/// backed by evidence on both sides.
struct FieldComparison {
    value: f64,
    null_evidence: bool,
}

impl FieldComparison {
    fn evidence(value: f64) -> Self {
        Self {
            value,
            null_evidence: false,
        }
    }

    fn null(missing_weight: f64) -> Self {
        Self {
            value: missing_weight,
            null_evidence: true,
        }
    }
}

/// Jaro-Winkler floor below which titles count as fully different.
const TITLE_FLOOR: f64 = 0.6;

fn compare_field(
    field: FieldName,
    a: &CanonicalRecord,
    b: &CanonicalRecord,
    missing_weight: f64,
) -> FieldComparison {
    match field {
        FieldName::Doi => compare_identifier(a.doi.as_deref(), b.doi.as_deref(), missing_weight),
        FieldName::Pmid => {
            compare_identifier(a.pmid.as_deref(), b.pmid.as_deref(), missing_weight)
        }
        FieldName::Title => match (a.title.as_deref(), b.title.as_deref()) {
            (Some(ta), Some(tb)) => {
                let similarity = jaro_winkler(ta, tb);
                FieldComparison::evidence(if similarity < TITLE_FLOOR {
                    0.0
                } else {
                    similarity
                })
            }
            _ => FieldComparison::null(missing_weight),
        },
        FieldName::Authors => {
            let keys_a = a.author_keys();
            let keys_b = b.author_keys();
            if keys_a.is_empty() || keys_b.is_empty() {
                return FieldComparison::null(missing_weight);
            }
            FieldComparison::evidence(overlap_coefficient(&keys_a, &keys_b))
        }
        FieldName::Year => match (a.year, b.year) {
            (Some(ya), Some(yb)) => {
                let delta = (ya - yb).abs();
                FieldComparison::evidence(match delta {
                    0 => 1.0,
                    1 => 0.5,
                    _ => 0.0,
                })
            }
            _ => FieldComparison::null(missing_weight),
        },
        FieldName::Venue => match (a.venue.as_deref(), b.venue.as_deref()) {
            (Some(va), Some(vb)) => FieldComparison::evidence(jaro_winkler(va, vb)),
            _ => FieldComparison::null(missing_weight),
        },
        FieldName::Volume => {
            compare_exact(a.volume.as_deref(), b.volume.as_deref(), missing_weight)
        }
        FieldName::Issue => compare_exact(a.issue.as_deref(), b.issue.as_deref(), missing_weight),
        FieldName::Pages => {
            match (a.pages_start.as_deref(), b.pages_start.as_deref()) {
                (Some(start_a), Some(start_b)) => {
                    let equal = start_a == start_b && a.pages_end == b.pages_end;
                    FieldComparison::evidence(if equal { 1.0 } else { 0.0 })
                }
                _ => FieldComparison::null(missing_weight),
            }
        }
    }
}

fn compare_identifier(a: Option<&str>, b: Option<&str>, missing_weight: f64) -> FieldComparison {
    match (a, b) {
        (Some(ia), Some(ib)) => FieldComparison::evidence(if ia == ib { 1.0 } else { 0.0 }),
        _ => FieldComparison::null(missing_weight),
    }
}

fn compare_exact(a: Option<&str>, b: Option<&str>, missing_weight: f64) -> FieldComparison {
    match (a, b) {
        (Some(va), Some(vb)) => FieldComparison::evidence(if va == vb { 1.0 } else { 0.0 }),
        _ => FieldComparison::null(missing_weight),
    }
}

/// Overlap coefficient: |A ∩ B| / min(|A|, |B|).
fn overlap_coefficient(a: &[(String, String)], b: &[(String, String)]) -> f64 {
    let set_a: std::collections::BTreeSet<_> = a.iter().collect();
    let set_b: std::collections::BTreeSet<_> = b.iter().collect();
    let intersection = set_a.intersection(&set_b).count();
    let min_len = set_a.len().min(set_b.len());
    if min_len == 0 {
        0.0
    } else {
        intersection as f64 / min_len as f64
    }
}

/// Score one candidate pair.
pub fn score_pair(
    pair: &CandidatePair,
    a: &CanonicalRecord,
    b: &CanonicalRecord,
    config: &EngineConfig,
    calibration: &Calibration,
) -> ScoredPair {
    let mut field_scores: BTreeMap<String, f64> = BTreeMap::new();
    let mut pattern: u32 = 0;
    let mut total = 0.0;

    for field in FieldName::ALL {
        let comparison = compare_field(field, a, b, config.missing_weight);
        field_scores.insert(
            field.label().to_string(),
            calibration.round(comparison.value),
        );

        let outcome = if comparison.null_evidence {
            Outcome::Null
        } else {
            Outcome::from_value(comparison.value)
        };
        pattern |= (outcome as u32) << (2 * field.index());

        let weights = calibration.weights(field);
        total += match outcome {
            Outcome::Agree => weights.agree_weight(),
            Outcome::Partial => 0.5 * weights.agree_weight() + 0.5 * weights.disagree_weight(),
            Outcome::Disagree => weights.disagree_weight(),
            Outcome::Null => 0.0,
        };
    }

    ScoredPair {
        a_id: pair.a_id.clone(),
        b_id: pair.b_id.clone(),
        blockers: pair.blockers.clone(),
        field_scores,
        total_score: calibration.round(total),
        agreement_pattern: pattern,
    }
}

/// Run stage 3 over all candidate pairs. Input order (sorted by pair key)
/// is preserved.
pub fn score_pairs(
    records: &[CanonicalRecord],
    pairs: &[CandidatePair],
    config: &EngineConfig,
    calibration: &Calibration,
) -> Vec<ScoredPair> {
    let by_id: HashMap<&str, &CanonicalRecord> =
        records.iter().map(|r| (r.id.as_str(), r)).collect();

    pairs
        .iter()
        .filter_map(|pair| {
            let a = by_id.get(pair.a_id.as_str())?;
            let b = by_id.get(pair.b_id.as_str())?;
            Some(score_pair(pair, a, b, config, calibration))
        })
        .collect()
}

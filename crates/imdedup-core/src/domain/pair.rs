//! Candidate pairs, scores, and decisions

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Blockers that can nominate a candidate pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerTag {
    Doi,
    Pmid,
    YearTitle,
    Lsh,
}

impl BlockerTag {
    /// All blockers in evaluation order.
    pub const ALL: [BlockerTag; 4] = [
        BlockerTag::Doi,
        BlockerTag::Pmid,
        BlockerTag::YearTitle,
        BlockerTag::Lsh,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BlockerTag::Doi => "doi",
            BlockerTag::Pmid => "pmid",
            BlockerTag::YearTitle => "year_title",
            BlockerTag::Lsh => "lsh",
        }
    }
}

impl FromStr for BlockerTag {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doi" => Ok(BlockerTag::Doi),
            "pmid" => Ok(BlockerTag::Pmid),
            "year_title" => Ok(BlockerTag::YearTitle),
            "lsh" => Ok(BlockerTag::Lsh),
            other => Err(EngineError::Configuration(format!(
                "unknown blocker name: {other}"
            ))),
        }
    }
}

/// A candidate pair emitted by the blocking stage.
///
/// Invariant: `a_id < b_id` lexicographically; a pair is emitted once with
/// the union of the blocker tags that fired for it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CandidatePair {
    pub a_id: String,
    pub b_id: String,
    pub blockers: BTreeSet<BlockerTag>,
}

impl CandidatePair {
    /// Build a pair with ids in canonical order.
    pub fn new(x: &str, y: &str, blocker: BlockerTag) -> Self {
        let (a_id, b_id) = if x < y {
            (x.to_string(), y.to_string())
        } else {
            (y.to_string(), x.to_string())
        };
        let mut blockers = BTreeSet::new();
        blockers.insert(blocker);
        Self { a_id, b_id, blockers }
    }

    pub fn key(&self) -> (String, String) {
        (self.a_id.clone(), self.b_id.clone())
    }
}

/// Fields compared by the scoring stage, in the fixed enumeration order
/// that makes score summation and the agreement bitmask deterministic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldName {
    Doi,
    Pmid,
    Title,
    Authors,
    Year,
    Venue,
    Volume,
    Issue,
    Pages,
}

impl FieldName {
    /// Fixed comparison order. Bit positions in `agreement_pattern` follow
    /// this order, two bits per field.
    pub const ALL: [FieldName; 9] = [
        FieldName::Doi,
        FieldName::Pmid,
        FieldName::Title,
        FieldName::Authors,
        FieldName::Year,
        FieldName::Venue,
        FieldName::Volume,
        FieldName::Issue,
        FieldName::Pages,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FieldName::Doi => "doi",
            FieldName::Pmid => "pmid",
            FieldName::Title => "title",
            FieldName::Authors => "authors",
            FieldName::Year => "year",
            FieldName::Venue => "venue",
            FieldName::Volume => "volume",
            FieldName::Issue => "issue",
            FieldName::Pages => "pages",
        }
    }

    /// Position in the fixed order.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|f| f == self).unwrap_or(0)
    }
}

/// A candidate pair extended with per-field and aggregate scores.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredPair {
    pub a_id: String,
    pub b_id: String,
    pub blockers: BTreeSet<BlockerTag>,
    /// Raw comparator value per field, keyed by field label.
    pub field_scores: BTreeMap<String, f64>,
    /// Fellegi-Sunter log-likelihood ratio.
    pub total_score: f64,
    /// Quantized outcome per field, two bits each in `FieldName::ALL` order:
    /// 0 = disagree, 1 = partial, 2 = agree, 3 = null.
    pub agreement_pattern: u32,
}

/// Three-way decision outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "AUTO_DUP")]
    AutoDup,
    #[serde(rename = "REVIEW")]
    Review,
    #[serde(rename = "AUTO_KEEP")]
    AutoKeep,
}

/// Decision for a scored pair, carrying the thresholds that controlled it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PairDecision {
    pub a_id: String,
    pub b_id: String,
    pub decision: Decision,
    pub threshold_low: f64,
    pub threshold_high: f64,
    pub score: f64,
    /// Names the controlling threshold or override, e.g.
    /// `doi_exact_short_circuit` or `score_ge_t_high`.
    pub reason: String,
}

//! Audit trail types
//!
//! Per-record anomalies never abort the pipeline; they are counted here and
//! surfaced in the audit artifact together with blocker coverage and the
//! threshold derivation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-run anomaly counters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AnomalyCounters {
    /// Raw records lacking both an id and a source identifier.
    pub records_missing_source: u64,
    /// Records dropped because their id collided with an earlier record.
    pub duplicate_record_ids: u64,
    /// DOI values present in the source but failing the syntactic pattern.
    pub rejected_dois: u64,
    /// PMID values with no digits.
    pub rejected_pmids: u64,
    /// Year values with no 4-digit group in range.
    pub rejected_years: u64,
    /// Candidate pairs dropped by the per-record cap.
    pub pairs_dropped_by_cap: u64,
}

impl AnomalyCounters {
    pub fn total(&self) -> u64 {
        self.records_missing_source
            + self.duplicate_record_ids
            + self.rejected_dois
            + self.rejected_pmids
            + self.rejected_years
            + self.pairs_dropped_by_cap
    }
}

/// Counters collected while running a single blocker.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlockerStats {
    pub records_seen: u64,
    /// Records that produced at least one blocking key.
    pub records_keyed: u64,
    pub unique_keys: u64,
    /// Largest block size encountered.
    pub max_block: u64,
    /// Pairs emitted by this blocker before cross-blocker union.
    pub pairs_emitted: u64,
}

/// How the upper threshold was obtained.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThresholdInfo {
    pub t_low: f64,
    pub t_high: f64,
    /// "explicit" or "neyman_pearson".
    pub t_high_source: String,
    pub fpr_alpha: f64,
}

/// The single-document audit artifact written alongside the JSONL outputs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditSummary {
    pub config: serde_json::Value,
    pub thresholds: ThresholdInfo,
    /// Stats per blocker label; blockers that could not run are absent.
    pub blocker_stats: BTreeMap<String, BlockerStats>,
    pub anomalies: AnomalyCounters,
    /// Record/pair/cluster counts per stage name.
    pub stage_counts: BTreeMap<String, u64>,
}

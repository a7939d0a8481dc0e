//! Pipeline runner
//!
//! Control flow is strictly linear: each stage runs to completion and
//! materializes its artifact before the next begins. Configuration errors
//! abort before any artifact is written; per-record anomalies never abort.
//! No error escapes [`run_pipeline`]; failures come back in the summary.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifacts;
use crate::audit::{AnomalyCounters, AuditSummary, ThresholdInfo};
use crate::block::generate_candidates;
use crate::cluster::build_clusters;
use crate::config::EngineConfig;
use crate::decide::{decide_pairs, resolve_thresholds};
use crate::domain::{Decision, RawRecord};
use crate::error::EngineError;
use crate::merge::merge_clusters;
use crate::normalize::normalize_all;
use crate::score::{score_pairs, shipped_calibration};

/// Result summary returned to callers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub success: bool,
    pub total_records: u64,
    pub total_candidates: u64,
    pub total_duplicates_auto: u64,
    pub total_review_pairs: u64,
    pub output_files: BTreeMap<String, PathBuf>,
    pub anomalies: AnomalyCounters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RunSummary {
    fn failed(message: String) -> Self {
        Self {
            success: false,
            total_records: 0,
            total_candidates: 0,
            total_duplicates_auto: 0,
            total_review_pairs: 0,
            output_files: BTreeMap::new(),
            anomalies: AnomalyCounters::default(),
            error_message: Some(message),
        }
    }
}

/// Run the six-stage pipeline over a raw record stream.
///
/// Deterministic: identical input and configuration produce byte-identical
/// artifacts on every platform.
pub fn run_pipeline(raws: &[RawRecord], config: &EngineConfig) -> RunSummary {
    let never_cancel = AtomicBool::new(false);
    run_pipeline_with_cancel(raws, config, &never_cancel)
}

/// [`run_pipeline`] with cooperative cancellation, checked at stage
/// boundaries only. A cancelled run discards the stage it never started
/// and reports failure.
pub fn run_pipeline_with_cancel(
    raws: &[RawRecord],
    config: &EngineConfig,
    cancel: &AtomicBool,
) -> RunSummary {
    match run_stages(raws, config, cancel) {
        Ok(summary) => summary,
        Err(e) => RunSummary::failed(e.to_string()),
    }
}

fn cancelled(cancel: &AtomicBool, stage: &str) -> Option<RunSummary> {
    if cancel.load(Ordering::Relaxed) {
        Some(RunSummary::failed(format!("run cancelled before {stage}")))
    } else {
        None
    }
}

fn run_stages(
    raws: &[RawRecord],
    config: &EngineConfig,
    cancel: &AtomicBool,
) -> Result<RunSummary, EngineError> {
    config.validate()?;
    let calibration = shipped_calibration()?;
    // Threshold resolution is pure; a crossed threshold aborts here,
    // before any artifact exists.
    let (t_low, t_high) = resolve_thresholds(config, calibration)?;

    let mut counters = AnomalyCounters::default();
    let mut output_files: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut stage_counts: BTreeMap<String, u64> = BTreeMap::new();
    let output_dir = config.output_dir.as_path();

    if let Some(summary) = cancelled(cancel, "stage 1 (normalize)") {
        return Ok(summary);
    }
    let records = normalize_all(raws, &mut counters);
    info!(records = records.len(), "stage 1 complete");
    stage_counts.insert("stage1_records".to_string(), records.len() as u64);
    output_files.insert(
        "canonical_records".to_string(),
        artifacts::write_jsonl(output_dir, artifacts::CANONICAL_RECORDS, &records)?,
    );

    if let Some(summary) = cancelled(cancel, "stage 2 (block)") {
        return Ok(summary);
    }
    let (pairs, blocker_stats) = generate_candidates(&records, config, &mut counters);
    info!(pairs = pairs.len(), "stage 2 complete");
    stage_counts.insert("stage2_pairs".to_string(), pairs.len() as u64);
    output_files.insert(
        "candidate_pairs".to_string(),
        artifacts::write_jsonl(output_dir, artifacts::CANDIDATE_PAIRS, &pairs)?,
    );

    if let Some(summary) = cancelled(cancel, "stage 3 (score)") {
        return Ok(summary);
    }
    let scored = score_pairs(&records, &pairs, config, calibration);
    info!(scored = scored.len(), "stage 3 complete");
    stage_counts.insert("stage3_scored".to_string(), scored.len() as u64);
    output_files.insert(
        "scored_pairs".to_string(),
        artifacts::write_jsonl(output_dir, artifacts::SCORED_PAIRS, &scored)?,
    );

    if let Some(summary) = cancelled(cancel, "stage 4 (decide)") {
        return Ok(summary);
    }
    let decisions = decide_pairs(&scored, config, calibration)?;
    let auto_dup = decisions
        .iter()
        .filter(|d| d.decision == Decision::AutoDup)
        .count() as u64;
    let review = decisions
        .iter()
        .filter(|d| d.decision == Decision::Review)
        .count() as u64;
    info!(auto_dup, review, "stage 4 complete");
    stage_counts.insert("stage4_decisions".to_string(), decisions.len() as u64);
    output_files.insert(
        "pair_decisions".to_string(),
        artifacts::write_jsonl(output_dir, artifacts::PAIR_DECISIONS, &decisions)?,
    );

    if let Some(summary) = cancelled(cancel, "stage 5 (cluster)") {
        return Ok(summary);
    }
    let clusters = build_clusters(&records, &scored, &decisions, t_low);
    info!(clusters = clusters.len(), "stage 5 complete");
    stage_counts.insert("stage5_clusters".to_string(), clusters.len() as u64);
    output_files.insert(
        "clusters".to_string(),
        artifacts::write_jsonl(output_dir, artifacts::CLUSTERS, &clusters)?,
    );

    if let Some(summary) = cancelled(cancel, "stage 6 (merge)") {
        return Ok(summary);
    }
    let merged = merge_clusters(&clusters, &records);
    info!(merged = merged.len(), "stage 6 complete");
    stage_counts.insert("stage6_merged".to_string(), merged.len() as u64);
    output_files.insert(
        "merged_records".to_string(),
        artifacts::write_jsonl(output_dir, artifacts::MERGED_RECORDS, &merged)?,
    );

    let enriched: Vec<artifacts::EnrichedCluster> = clusters
        .iter()
        .zip(merged.iter())
        .map(|(cluster, merged_record)| artifacts::EnrichedCluster {
            cluster: cluster.clone(),
            merged: merged_record.clone(),
            decisions: decisions
                .iter()
                .filter(|d| {
                    cluster.members.contains(&d.a_id) && cluster.members.contains(&d.b_id)
                })
                .cloned()
                .collect(),
        })
        .collect();
    output_files.insert(
        "clusters_enriched".to_string(),
        artifacts::write_jsonl(output_dir, artifacts::CLUSTERS_ENRICHED, &enriched)?,
    );

    let audit = AuditSummary {
        config: serde_json::to_value(config)
            .map_err(|e| EngineError::Io(std::io::Error::other(e)))?,
        thresholds: ThresholdInfo {
            t_low,
            t_high,
            t_high_source: if config.t_high.is_some() {
                "explicit".to_string()
            } else {
                "neyman_pearson".to_string()
            },
            fpr_alpha: config.fpr_alpha,
        },
        blocker_stats,
        anomalies: counters.clone(),
        stage_counts,
    };
    output_files.insert(
        "audit_summary".to_string(),
        artifacts::write_json(output_dir, artifacts::AUDIT_SUMMARY, &audit)?,
    );

    Ok(RunSummary {
        success: true,
        total_records: records.len() as u64,
        total_candidates: pairs.len() as u64,
        total_duplicates_auto: auto_dup,
        total_review_pairs: review,
        output_files,
        anomalies: counters,
        error_message: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceFormat;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> EngineConfig {
        EngineConfig {
            output_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_empty_input_succeeds() {
        let dir = TempDir::new().unwrap();
        let summary = run_pipeline(&[], &config_in(&dir));
        assert!(summary.success);
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.total_candidates, 0);
        assert_eq!(summary.total_duplicates_auto, 0);
        assert_eq!(summary.total_review_pairs, 0);
        assert!(dir.path().join(artifacts::CANONICAL_RECORDS).exists());
        assert!(dir.path().join(artifacts::MERGED_RECORDS).exists());
    }

    #[test]
    fn test_invalid_config_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.fpr_alpha = 2.0;
        let summary = run_pipeline(&[], &config);
        assert!(!summary.success);
        assert!(summary.error_message.unwrap().contains("fpr_alpha"));
        assert!(!dir.path().join("stage1").exists());
    }

    #[test]
    fn test_cancelled_run_fails() {
        let dir = TempDir::new().unwrap();
        let cancel = AtomicBool::new(true);
        let summary = run_pipeline_with_cancel(&[], &config_in(&dir), &cancel);
        assert!(!summary.success);
        assert!(summary.error_message.unwrap().contains("cancelled"));
    }

    #[test]
    fn test_single_record_run() {
        let dir = TempDir::new().unwrap();
        let raw = RawRecord {
            id: Some("r1".to_string()),
            file_path: None,
            byte_offset: None,
            format: SourceFormat::Ris,
            tags: vec![("TI".to_string(), "A lonely record".to_string())],
        };
        let summary = run_pipeline(&[raw], &config_in(&dir));
        assert!(summary.success);
        assert_eq!(summary.total_records, 1);
        assert_eq!(summary.total_candidates, 0);

        let merged = std::fs::read_to_string(dir.path().join(artifacts::MERGED_RECORDS)).unwrap();
        assert_eq!(merged.lines().count(), 1);
    }
}

//! Stage artifact writing
//!
//! Every stage materializes its output as newline-delimited JSON: one
//! record per line, keys in sorted order, UTF-8, LF line endings. The
//! artifacts are the testability contract between stages and enable
//! stage-resumable runs; re-runs overwrite them idempotently.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::{Cluster, MergedRecord, PairDecision};
use crate::error::EngineError;

/// Relative artifact locations under the output directory.
pub const CANONICAL_RECORDS: &str = "stage1/canonical_records.jsonl";
pub const CANDIDATE_PAIRS: &str = "stage2/candidate_pairs.jsonl";
pub const SCORED_PAIRS: &str = "stage3/scored_pairs.jsonl";
pub const PAIR_DECISIONS: &str = "stage4/pair_decisions.jsonl";
pub const CLUSTERS: &str = "stage5/clusters.jsonl";
pub const MERGED_RECORDS: &str = "artifacts/merged_records.jsonl";
pub const CLUSTERS_ENRICHED: &str = "artifacts/clusters_enriched.jsonl";
pub const AUDIT_SUMMARY: &str = "artifacts/audit_summary.json";

/// A cluster with its merged record and decisions embedded, for review
/// tooling that wants the whole story on one line.
#[derive(Clone, Debug, Serialize)]
pub struct EnrichedCluster {
    pub cluster: Cluster,
    pub merged: MergedRecord,
    /// Every decision among cluster members, REVIEW edges included.
    pub decisions: Vec<PairDecision>,
}

/// Serialize one value with sorted keys.
///
/// Round-tripping through `serde_json::Value` sorts object keys: the
/// default `Map` is a BTreeMap.
fn to_sorted_json<T: Serialize>(value: &T) -> Result<String, EngineError> {
    let value = serde_json::to_value(value)
        .map_err(|e| EngineError::Io(std::io::Error::other(e)))?;
    serde_json::to_string(&value).map_err(|e| EngineError::Io(std::io::Error::other(e)))
}

/// Write one artifact: one JSON document per line, LF endings.
pub fn write_jsonl<T: Serialize>(
    output_dir: &Path,
    relative: &str,
    items: &[T],
) -> Result<PathBuf, EngineError> {
    let path = output_dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut buffer = Vec::new();
    for item in items {
        buffer.extend_from_slice(to_sorted_json(item)?.as_bytes());
        buffer.push(b'\n');
    }

    let mut file = fs::File::create(&path)?;
    file.write_all(&buffer)?;
    Ok(path)
}

/// Write a single JSON document artifact (the audit summary).
pub fn write_json<T: Serialize>(
    output_dir: &Path,
    relative: &str,
    value: &T,
) -> Result<PathBuf, EngineError> {
    let path = output_dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let sorted: serde_json::Value =
        serde_json::to_value(value).map_err(|e| EngineError::Io(std::io::Error::other(e)))?;
    let mut text = serde_json::to_string_pretty(&sorted)
        .map_err(|e| EngineError::Io(std::io::Error::other(e)))?;
    text.push('\n');
    fs::write(&path, text)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use tempfile::TempDir;

    #[derive(Serialize)]
    struct Sample {
        zebra: u32,
        apple: u32,
    }

    #[test]
    fn test_jsonl_sorted_keys_and_lf() {
        let dir = TempDir::new().unwrap();
        let items = vec![Sample { zebra: 1, apple: 2 }, Sample { zebra: 3, apple: 4 }];
        let path = write_jsonl(dir.path(), "stage1/test.jsonl", &items).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "{\"apple\":2,\"zebra\":1}\n{\"apple\":4,\"zebra\":3}\n"
        );
        assert!(!content.contains('\r'));
    }

    #[test]
    fn test_empty_artifact_is_empty_file() {
        let dir = TempDir::new().unwrap();
        let items: Vec<Sample> = vec![];
        let path = write_jsonl(dir.path(), "stage1/empty.jsonl", &items).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let items = vec![Sample { zebra: 1, apple: 2 }];
        let path = write_jsonl(dir.path(), "stage1/test.jsonl", &items).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        write_jsonl(dir.path(), "stage1/test.jsonl", &items).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }
}

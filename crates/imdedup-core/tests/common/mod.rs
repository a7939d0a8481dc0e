//! Shared helpers for integration tests
#![allow(dead_code)]

use std::path::Path;

use imdedup_core::{EngineConfig, RawRecord, SourceFormat};
use tempfile::TempDir;

/// Build a RIS-style raw record from tag/value pairs.
pub fn ris(id: &str, tags: &[(&str, &str)]) -> RawRecord {
    RawRecord {
        id: Some(id.to_string()),
        file_path: None,
        byte_offset: None,
        format: SourceFormat::Ris,
        tags: tags
            .iter()
            .map(|(tag, value)| (tag.to_string(), value.to_string()))
            .collect(),
    }
}

/// Default configuration writing into a fresh temp directory.
pub fn config_in(dir: &TempDir) -> EngineConfig {
    EngineConfig {
        output_dir: dir.path().to_path_buf(),
        ..EngineConfig::default()
    }
}

/// Parse a JSONL artifact into values.
pub fn read_jsonl(path: &Path) -> Vec<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    content
        .lines()
        .map(|line| serde_json::from_str(line).expect("artifact line must be valid JSON"))
        .collect()
}

//! imdedup-core: deduplication engine for bibliographic references
//!
//! This library takes reference records parsed from citation exports
//! (RIS, PubMed NBIB, BibTeX, Web of Science CIW, EndNote ENW), finds the
//! records that describe the same underlying work, and emits a merged,
//! deduplicated set with an auditable decision trail.
//!
//! The engine is a six-stage pipeline, each stage materializing its output
//! as a sorted JSONL artifact:
//! 1. Normalize raw tag/value records into canonical form
//! 2. Generate candidate pairs with high-recall blockers
//! 3. Score pairs with a Fellegi-Sunter log-likelihood model
//! 4. Decide AUTO_DUP / REVIEW / AUTO_KEEP under an FPR budget
//! 5. Cluster AUTO_DUP edges with an anti-transitivity guard
//! 6. Merge each cluster into a survivor with field provenance
//!
//! Format tokenizers and output serializers live outside this crate; the
//! engine consumes [`domain::RawRecord`] values and never opens input
//! files itself.

pub mod artifacts;
pub mod audit;
pub mod block;
pub mod cluster;
pub mod config;
pub mod decide;
pub mod domain;
pub mod engine;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod score;

// Re-export the public surface for convenience.
pub use config::{EngineConfig, LshParams};
pub use domain::{
    Author, BlockerTag, CandidatePair, CanonicalRecord, Cluster, Decision, FieldName,
    MergedRecord, PairDecision, RawRecord, RecordType, ScoredPair, SourceFormat,
};
pub use engine::{run_pipeline, run_pipeline_with_cancel, RunSummary};
pub use error::EngineError;

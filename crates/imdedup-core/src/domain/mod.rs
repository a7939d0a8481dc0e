//! Core data model for the deduplication pipeline
//!
//! Records are created by the normalize stage and immutable thereafter.
//! Pairs are created by blocking and enriched (never mutated) by scoring
//! and decisioning. Clusters and merged records are created by the final
//! two stages.

mod cluster;
mod pair;
mod record;

pub use cluster::{Cluster, MergedRecord};
pub use pair::{
    BlockerTag, CandidatePair, Decision, FieldName, PairDecision, ScoredPair,
};
pub use record::{Author, CanonicalRecord, RawRecord, RecordType, SourceFormat};

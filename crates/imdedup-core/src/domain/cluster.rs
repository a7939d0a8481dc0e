//! Clusters and merged output records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::pair::PairDecision;
use super::record::CanonicalRecord;

/// A connected component of AUTO_DUP edges that survived the
/// anti-transitivity guard.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cluster {
    /// Derived from the smallest member id; stable across runs.
    pub cluster_id: String,
    /// Member record ids, sorted.
    pub members: Vec<String>,
    /// The AUTO_DUP decisions holding this cluster together.
    pub edges: Vec<PairDecision>,
    pub survivor_id: String,
    /// True when the guard removed at least one edge from the component
    /// this cluster came from.
    pub anti_transitivity_split: bool,
}

impl Cluster {
    /// Sort key for artifact ordering.
    pub fn min_member(&self) -> &str {
        self.members.first().map(String::as_str).unwrap_or("")
    }
}

/// A cluster survivor with field-level merge provenance.
///
/// `provenance[field]` names the member record whose value was adopted for
/// each non-null field of `record`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergedRecord {
    pub cluster_id: String,
    pub record: CanonicalRecord,
    pub member_ids: Vec<String>,
    pub provenance: BTreeMap<String, String>,
}

//! Stage 5: clustering with anti-transitivity safeguards
//!
//! Clusters form from AUTO_DUP edges only; REVIEW edges are reported but
//! never fused. Blocking recall is imperfect, so transitive chaining can
//! pull unrelated records together through a hub. The guard requires every
//! within-cluster pair to be internally evidenced (an AUTO_DUP edge, or at
//! least a candidate score reaching `t_low`) and removes the weakest edge
//! until that holds.

mod union_find;

pub use union_find::UnionFind;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::domain::{CanonicalRecord, Cluster, Decision, PairDecision, ScoredPair};
use crate::merge::survivor_scan_order;

/// Run stage 5. Every record lands in exactly one cluster; records without
/// AUTO_DUP edges become singleton clusters. Output is sorted by smallest
/// member id.
pub fn build_clusters(
    records: &[CanonicalRecord],
    scored: &[ScoredPair],
    decisions: &[PairDecision],
    t_low: f64,
) -> Vec<Cluster> {
    let index_of: HashMap<&str, usize> = records
        .iter()
        .enumerate()
        .map(|(index, record)| (record.id.as_str(), index))
        .collect();

    // Scores for every candidate pair, for the evidence check.
    let score_of: BTreeMap<(usize, usize), f64> = scored
        .iter()
        .filter_map(|pair| {
            let a = *index_of.get(pair.a_id.as_str())?;
            let b = *index_of.get(pair.b_id.as_str())?;
            Some(((a.min(b), a.max(b)), pair.total_score))
        })
        .collect();

    // AUTO_DUP edges in deterministic (a_id, b_id) order.
    let mut edges: Vec<(usize, usize, &PairDecision)> = decisions
        .iter()
        .filter(|decision| decision.decision == Decision::AutoDup)
        .filter_map(|decision| {
            let a = *index_of.get(decision.a_id.as_str())?;
            let b = *index_of.get(decision.b_id.as_str())?;
            Some((a.min(b), a.max(b), decision))
        })
        .collect();
    edges.sort_by(|x, y| {
        let key_x = (&x.2.a_id, &x.2.b_id);
        let key_y = (&y.2.a_id, &y.2.b_id);
        key_x.cmp(&key_y)
    });

    // Iteratively drop the weakest edge of any under-evidenced component.
    let mut split_members: BTreeSet<usize> = BTreeSet::new();
    loop {
        let mut uf = UnionFind::new(records.len());
        for (a, b, _) in &edges {
            uf.union(*a, *b);
        }
        let components = uf.components();

        let Some(offender) = components.iter().find(|members| {
            members.len() >= 3 && !component_evidenced(members, &edges, &score_of, t_low)
        }) else {
            break;
        };

        let member_set: BTreeSet<usize> = offender.iter().copied().collect();
        let weakest = edges
            .iter()
            .enumerate()
            .filter(|(_, (a, b, _))| member_set.contains(a) && member_set.contains(b))
            .min_by(|(_, (_, _, dx)), (_, (_, _, dy))| {
                dx.score
                    .partial_cmp(&dy.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| (&dx.a_id, &dx.b_id).cmp(&(&dy.a_id, &dy.b_id)))
            })
            .map(|(index, _)| index);

        let Some(weakest) = weakest else {
            break;
        };
        let removed = edges.remove(weakest);
        debug!(
            a = removed.2.a_id.as_str(),
            b = removed.2.b_id.as_str(),
            score = removed.2.score,
            "anti-transitivity guard removed edge"
        );
        split_members.extend(member_set);
    }

    // Final components with the surviving edge set.
    let mut uf = UnionFind::new(records.len());
    for (a, b, _) in &edges {
        uf.union(*a, *b);
    }

    let mut clusters: Vec<Cluster> = uf
        .components()
        .into_iter()
        .map(|indices| {
            let members: Vec<String> = {
                let mut ids: Vec<String> =
                    indices.iter().map(|&i| records[i].id.clone()).collect();
                ids.sort();
                ids
            };
            let member_set: BTreeSet<usize> = indices.iter().copied().collect();
            let cluster_edges: Vec<PairDecision> = edges
                .iter()
                .filter(|(a, b, _)| member_set.contains(a) && member_set.contains(b))
                .map(|(_, _, decision)| (*decision).clone())
                .collect();

            let member_records: Vec<&CanonicalRecord> =
                indices.iter().map(|&i| &records[i]).collect();
            let survivor_id = survivor_scan_order(&member_records)[0].id.clone();

            Cluster {
                cluster_id: format!("cl_{}", members[0]),
                members,
                edges: cluster_edges,
                survivor_id,
                anti_transitivity_split: indices.iter().any(|i| split_members.contains(i)),
            }
        })
        .collect();

    clusters.sort_by(|x, y| x.min_member().cmp(y.min_member()));
    clusters
}

/// True when every unordered pair inside the component has an AUTO_DUP
/// edge or a candidate score of at least `t_low`.
fn component_evidenced(
    members: &[usize],
    edges: &[(usize, usize, &PairDecision)],
    score_of: &BTreeMap<(usize, usize), f64>,
    t_low: f64,
) -> bool {
    let edge_set: BTreeSet<(usize, usize)> = edges.iter().map(|(a, b, _)| (*a, *b)).collect();

    for (i, &a) in members.iter().enumerate() {
        for &b in &members[i + 1..] {
            let key = (a.min(b), a.max(b));
            if edge_set.contains(&key) {
                continue;
            }
            match score_of.get(&key) {
                Some(score) if *score >= t_low => continue,
                _ => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RawRecord, SourceFormat};
    use crate::normalize::normalize_record;
    use std::collections::BTreeSet as Set;

    fn record(id: &str) -> CanonicalRecord {
        normalize_record(&RawRecord {
            id: Some(id.to_string()),
            file_path: None,
            byte_offset: None,
            format: SourceFormat::Ris,
            tags: vec![("TI".to_string(), format!("record {id}"))],
        })
        .unwrap()
    }

    fn dup(a: &str, b: &str, score: f64) -> PairDecision {
        PairDecision {
            a_id: a.to_string(),
            b_id: b.to_string(),
            decision: Decision::AutoDup,
            threshold_low: 0.3,
            threshold_high: 4.0,
            score,
            reason: "score_ge_t_high".to_string(),
        }
    }

    fn scored_pair(a: &str, b: &str, score: f64) -> ScoredPair {
        ScoredPair {
            a_id: a.to_string(),
            b_id: b.to_string(),
            blockers: Set::new(),
            field_scores: BTreeMap::new(),
            total_score: score,
            agreement_pattern: 0,
        }
    }

    #[test]
    fn test_singletons_become_clusters() {
        let records = vec![record("a"), record("b")];
        let clusters = build_clusters(&records, &[], &[], 0.3);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec!["a"]);
        assert_eq!(clusters[0].survivor_id, "a");
        assert!(!clusters[0].anti_transitivity_split);
    }

    #[test]
    fn test_pairwise_cluster() {
        let records = vec![record("a"), record("b"), record("c")];
        let scored = vec![scored_pair("a", "b", 6.0)];
        let decisions = vec![dup("a", "b", 6.0)];
        let clusters = build_clusters(&records, &scored, &decisions, 0.3);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec!["a", "b"]);
        assert_eq!(clusters[0].edges.len(), 1);
        assert_eq!(clusters[1].members, vec!["c"]);
    }

    #[test]
    fn test_evidenced_triangle_stays_whole() {
        let records = vec![record("a"), record("b"), record("c")];
        // a-b and b-c are AUTO_DUP; a-c was a candidate scoring above t_low.
        let scored = vec![
            scored_pair("a", "b", 6.0),
            scored_pair("b", "c", 5.0),
            scored_pair("a", "c", 1.0),
        ];
        let decisions = vec![dup("a", "b", 6.0), dup("b", "c", 5.0)];
        let clusters = build_clusters(&records, &scored, &decisions, 0.3);

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec!["a", "b", "c"]);
        assert!(!clusters[0].anti_transitivity_split);
    }

    #[test]
    fn test_unevidenced_chain_is_split() {
        let records = vec![record("a"), record("b"), record("c")];
        // a-c was never a candidate: the hub b chains a and c together.
        let scored = vec![scored_pair("a", "b", 6.0), scored_pair("b", "c", 5.0)];
        let decisions = vec![dup("a", "b", 6.0), dup("b", "c", 5.0)];
        let clusters = build_clusters(&records, &scored, &decisions, 0.3);

        // The weakest edge (b-c, score 5.0) is removed.
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec!["a", "b"]);
        assert!(clusters[0].anti_transitivity_split);
        assert_eq!(clusters[1].members, vec!["c"]);
        assert!(clusters[1].anti_transitivity_split);
    }

    #[test]
    fn test_below_t_low_score_is_not_evidence() {
        let records = vec![record("a"), record("b"), record("c")];
        let scored = vec![
            scored_pair("a", "b", 6.0),
            scored_pair("b", "c", 5.0),
            scored_pair("a", "c", 0.1),
        ];
        let decisions = vec![dup("a", "b", 6.0), dup("b", "c", 5.0)];
        let clusters = build_clusters(&records, &scored, &decisions, 0.3);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_review_edges_never_fuse() {
        let records = vec![record("a"), record("b")];
        let scored = vec![scored_pair("a", "b", 1.0)];
        let decisions = vec![PairDecision {
            decision: Decision::Review,
            reason: "score_in_review_band".to_string(),
            ..dup("a", "b", 1.0)
        }];
        let clusters = build_clusters(&records, &scored, &decisions, 0.3);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_clusters_sorted_by_min_member() {
        let records = vec![record("z"), record("m"), record("a")];
        let clusters = build_clusters(&records, &[], &[], 0.3);
        let mins: Vec<&str> = clusters.iter().map(|c| c.min_member()).collect();
        assert_eq!(mins, vec!["a", "m", "z"]);
    }
}

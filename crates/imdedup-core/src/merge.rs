//! Stage 6: canonical merge
//!
//! Each cluster collapses into its survivor, with missing fields filled
//! from the other members. Every adopted non-null field records which
//! member supplied it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::{Author, CanonicalRecord, Cluster, MergedRecord};

/// Cluster members in survivor-selection order, best candidate first.
///
/// Ranking, in order: non-null DOI, then PMID, then most non-null fields,
/// then longest abstract, then most recent year, then smallest id.
pub fn survivor_scan_order<'a>(members: &[&'a CanonicalRecord]) -> Vec<&'a CanonicalRecord> {
    let mut ordered: Vec<&CanonicalRecord> = members.to_vec();
    ordered.sort_by(|x, y| {
        y.doi
            .is_some()
            .cmp(&x.doi.is_some())
            .then_with(|| y.pmid.is_some().cmp(&x.pmid.is_some()))
            .then_with(|| y.non_null_field_count().cmp(&x.non_null_field_count()))
            .then_with(|| {
                let len_x = x.abstract_text.as_deref().map(str::len).unwrap_or(0);
                let len_y = y.abstract_text.as_deref().map(str::len).unwrap_or(0);
                len_y.cmp(&len_x)
            })
            .then_with(|| {
                let year_x = x.year.unwrap_or(i32::MIN);
                let year_y = y.year.unwrap_or(i32::MIN);
                year_y.cmp(&year_x)
            })
            .then_with(|| x.id.cmp(&y.id))
    });
    ordered
}

/// Merge one cluster into a [`MergedRecord`].
pub fn merge_cluster(cluster: &Cluster, records_by_id: &HashMap<&str, &CanonicalRecord>) -> MergedRecord {
    let members: Vec<&CanonicalRecord> = cluster
        .members
        .iter()
        .filter_map(|id| records_by_id.get(id.as_str()).copied())
        .collect();
    let scan = survivor_scan_order(&members);
    let survivor = scan[0];

    let mut provenance: BTreeMap<String, String> = BTreeMap::new();

    // Scalar fields: survivor's value when present, else the first non-null
    // value in scan order.
    let title = adopt(&scan, &mut provenance, "title", |r| r.title.clone());
    let venue = adopt(&scan, &mut provenance, "venue", |r| r.venue.clone());
    let year = adopt(&scan, &mut provenance, "year", |r| r.year);
    let volume = adopt(&scan, &mut provenance, "volume", |r| r.volume.clone());
    let issue = adopt(&scan, &mut provenance, "issue", |r| r.issue.clone());
    let pages_start = adopt(&scan, &mut provenance, "pages_start", |r| {
        r.pages_start.clone()
    });
    let pages_end = adopt(&scan, &mut provenance, "pages_end", |r| r.pages_end.clone());
    let doi = adopt(&scan, &mut provenance, "doi", |r| r.doi.clone());
    let pmid = adopt(&scan, &mut provenance, "pmid", |r| r.pmid.clone());

    // Record type is never null; the survivor's value anchors it.
    provenance.insert("type".to_string(), survivor.id.clone());

    let authors = merge_authors(&scan, &mut provenance);
    let abstract_text = merge_abstract(&scan, &mut provenance);

    let record = CanonicalRecord {
        id: survivor.id.clone(),
        title,
        authors,
        year,
        venue,
        volume,
        issue,
        pages_start,
        pages_end,
        doi,
        pmid,
        abstract_text,
        record_type: survivor.record_type,
        raw_ref: survivor.raw_ref.clone(),
    };

    MergedRecord {
        cluster_id: cluster.cluster_id.clone(),
        record,
        member_ids: cluster.members.clone(),
        provenance,
    }
}

/// Run stage 6 over all clusters, preserving cluster order.
pub fn merge_clusters(
    clusters: &[Cluster],
    records: &[CanonicalRecord],
) -> Vec<MergedRecord> {
    let by_id: HashMap<&str, &CanonicalRecord> =
        records.iter().map(|r| (r.id.as_str(), r)).collect();
    clusters
        .iter()
        .map(|cluster| merge_cluster(cluster, &by_id))
        .collect()
}

/// First non-null value in scan order; records the donor in `provenance`.
fn adopt<T>(
    scan: &[&CanonicalRecord],
    provenance: &mut BTreeMap<String, String>,
    field: &str,
    get: impl Fn(&CanonicalRecord) -> Option<T>,
) -> Option<T> {
    for &record in scan {
        if let Some(value) = get(record) {
            provenance.insert(field.to_string(), record.id.clone());
            return Some(value);
        }
    }
    None
}

/// Union of all member author lists, deduplicated by `(family, first
/// initial)`. The survivor's ordering anchors overlapping entries; novel
/// authors append in member-scan order.
fn merge_authors(
    scan: &[&CanonicalRecord],
    provenance: &mut BTreeMap<String, String>,
) -> Vec<Author> {
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut merged: Vec<Author> = Vec::new();
    let mut anchor: Option<String> = None;

    for record in scan {
        for author in &record.authors {
            if seen.insert(author.match_key()) {
                merged.push(author.clone());
            }
        }
        if anchor.is_none() && !record.authors.is_empty() {
            anchor = Some(record.id.clone());
        }
    }

    if let Some(anchor) = anchor {
        provenance.insert("authors".to_string(), anchor);
    }
    merged
}

/// Longest non-null abstract across members; ties go to scan order.
fn merge_abstract(
    scan: &[&CanonicalRecord],
    provenance: &mut BTreeMap<String, String>,
) -> Option<String> {
    let mut best: Option<(&str, &str)> = None;
    for record in scan {
        if let Some(text) = record.abstract_text.as_deref() {
            let longer = match best {
                Some((_, current)) => text.len() > current.len(),
                None => true,
            };
            if longer {
                best = Some((record.id.as_str(), text));
            }
        }
    }

    best.map(|(donor, text)| {
        provenance.insert("abstract".to_string(), donor.to_string());
        text.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RawRecord, SourceFormat};
    use crate::normalize::normalize_record;

    fn record(id: &str, tags: &[(&str, &str)]) -> CanonicalRecord {
        normalize_record(&RawRecord {
            id: Some(id.to_string()),
            file_path: None,
            byte_offset: None,
            format: SourceFormat::Ris,
            tags: tags
                .iter()
                .map(|(t, v)| (t.to_string(), v.to_string()))
                .collect(),
        })
        .unwrap()
    }

    fn cluster_of(records: &[&CanonicalRecord]) -> Cluster {
        let mut members: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        members.sort();
        let scan = survivor_scan_order(records);
        Cluster {
            cluster_id: format!("cl_{}", members[0]),
            members,
            edges: vec![],
            survivor_id: scan[0].id.clone(),
            anti_transitivity_split: false,
        }
    }

    fn merge(records: Vec<CanonicalRecord>) -> MergedRecord {
        let refs: Vec<&CanonicalRecord> = records.iter().collect();
        let cluster = cluster_of(&refs);
        let by_id: HashMap<&str, &CanonicalRecord> =
            records.iter().map(|r| (r.id.as_str(), r)).collect();
        merge_cluster(&cluster, &by_id)
    }

    #[test]
    fn test_survivor_prefers_doi() {
        let with_doi = record("b", &[("DO", "10.1/x")]);
        let without = record("a", &[("TI", "Full title"), ("PY", "2001"), ("VL", "3")]);
        let scan = survivor_scan_order(&[&without, &with_doi]);
        assert_eq!(scan[0].id, "b");
    }

    #[test]
    fn test_survivor_tie_breaks_to_smallest_id() {
        let x = record("x", &[("TI", "Same")]);
        let y = record("y", &[("TI", "Same")]);
        let scan = survivor_scan_order(&[&y, &x]);
        assert_eq!(scan[0].id, "x");
    }

    #[test]
    fn test_scalar_fill_from_members() {
        let survivor = record("a", &[("DO", "10.1/x"), ("TI", "A title")]);
        let donor = record("b", &[("TI", "A title"), ("PY", "1998"), ("VL", "7")]);
        let merged = merge(vec![survivor, donor]);

        assert_eq!(merged.record.id, "a");
        assert_eq!(merged.record.year, Some(1998));
        assert_eq!(merged.record.volume.as_deref(), Some("7"));
        assert_eq!(merged.provenance["title"], "a");
        assert_eq!(merged.provenance["year"], "b");
        assert_eq!(merged.provenance["volume"], "b");
        assert_eq!(merged.provenance["doi"], "a");
    }

    #[test]
    fn test_author_union_preserves_survivor_order() {
        let survivor = record("a", &[("DO", "10.1/x"), ("AU", "Smith, J."), ("AU", "Doe, A.")]);
        let other = record("b", &[("AU", "Smith, John"), ("AU", "Roe, B.")]);
        let merged = merge(vec![survivor, other]);

        let families: Vec<&str> = merged
            .record
            .authors
            .iter()
            .map(|a| a.family.as_str())
            .collect();
        assert_eq!(families, vec!["smith", "doe", "roe"]);
        assert_eq!(merged.provenance["authors"], "a");
    }

    #[test]
    fn test_longest_abstract_wins() {
        let survivor = record("a", &[("DO", "10.1/x"), ("AB", "Short.")]);
        let other = record("b", &[("AB", "A much longer abstract with detail.")]);
        let merged = merge(vec![survivor, other]);

        assert_eq!(
            merged.record.abstract_text.as_deref(),
            Some("A much longer abstract with detail.")
        );
        assert_eq!(merged.provenance["abstract"], "b");
    }

    #[test]
    fn test_provenance_points_at_members_only() {
        let a = record("a", &[("DO", "10.1/x"), ("TI", "Title"), ("PY", "2000")]);
        let b = record("b", &[("AB", "Abstract text here.")]);
        let merged = merge(vec![a, b]);

        for donor in merged.provenance.values() {
            assert!(merged.member_ids.contains(donor));
        }
        // Every non-null field has a provenance entry.
        assert!(merged.provenance.contains_key("title"));
        assert!(merged.provenance.contains_key("abstract"));
        assert!(!merged.provenance.contains_key("pmid"));
    }

    #[test]
    fn test_singleton_merge_is_identity() {
        let solo = record("a", &[("TI", "Only one"), ("PY", "2010")]);
        let merged = merge(vec![solo.clone()]);
        assert_eq!(merged.record.id, "a");
        assert_eq!(merged.record.title, solo.title);
        assert_eq!(merged.provenance["title"], "a");
    }
}

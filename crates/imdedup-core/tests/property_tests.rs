//! Property-based checks for the stage invariants

mod common;

use std::collections::BTreeSet;

use common::ris;
use imdedup_core::audit::AnomalyCounters;
use imdedup_core::block::generate_candidates;
use imdedup_core::decide::{decide_pair, derive_t_high};
use imdedup_core::domain::Decision;
use imdedup_core::normalize::{normalize_all, normalize_record, normalize_text};
use imdedup_core::score::shipped_calibration;
use imdedup_core::EngineConfig;
use proptest::prelude::*;

/// Printable text with diacritics, braces, and LaTeX-ish backslashes.
fn text_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[ -~àâçéèêëîïôöùûüñÀÉÈÖÜß{}]{0,60}").unwrap()
}

proptest! {
    #[test]
    fn prop_normalize_text_idempotent(input in text_strategy()) {
        if let Some(once) = normalize_text(&input) {
            prop_assert_eq!(normalize_text(&once), Some(once.clone()));
        }
    }

    #[test]
    fn prop_normalize_record_idempotent_fields(
        title in text_strategy(),
        venue in text_strategy(),
    ) {
        let raw = ris("r", &[("TI", &title), ("JO", &venue)]);
        let record = normalize_record(&raw).unwrap();
        if let Some(t) = &record.title {
            let normalized = normalize_text(t);
            prop_assert_eq!(normalized.as_deref(), Some(t.as_str()));
        }
        if let Some(v) = &record.venue {
            let normalized = normalize_text(v);
            prop_assert_eq!(normalized.as_deref(), Some(v.as_str()));
        }
    }

    #[test]
    fn prop_candidate_pairs_symmetric_and_unique(
        seed_dois in proptest::collection::vec(0u8..4, 0..16),
        seed_years in proptest::collection::vec(0u8..3, 0..16),
    ) {
        // Small pools force collisions so blocking actually fires.
        let titles = [
            "systematic review of treatment effects",
            "machine learning in clinical practice",
            "randomized evaluation of outcomes",
            "deep networks for image analysis",
        ];
        let count = seed_dois.len().max(seed_years.len());
        let raws: Vec<_> = (0..count)
            .map(|i| {
                let doi_pick = seed_dois.get(i).copied().unwrap_or(0);
                let year_pick = seed_years.get(i).copied().unwrap_or(0);
                let doi = format!("10.77/{}", doi_pick % 3);
                let year = format!("{}", 2000 + year_pick as i32);
                let id = format!("r{i:03}");
                ris(&id, &[
                    ("TI", titles[i % titles.len()]),
                    ("PY", &year),
                    ("DO", &doi),
                ])
            })
            .collect();

        let mut counters = AnomalyCounters::default();
        let records = normalize_all(&raws, &mut counters);
        let (pairs, _) = generate_candidates(&records, &EngineConfig::default(), &mut counters);

        let mut seen = BTreeSet::new();
        let mut previous: Option<(String, String)> = None;
        for pair in &pairs {
            prop_assert!(pair.a_id < pair.b_id, "unordered pair {:?}", pair.key());
            prop_assert!(seen.insert(pair.key()), "duplicate pair {:?}", pair.key());
            if let Some(prev) = &previous {
                prop_assert!(*prev < pair.key(), "pairs not sorted");
            }
            previous = Some(pair.key());
        }
    }
}

#[test]
fn test_t_high_monotone_over_alpha_grid() {
    let calibration = shipped_calibration().unwrap();
    let alphas = [0.001, 0.005, 0.01, 0.02, 0.05, 0.1, 0.25, 0.5];
    let thresholds: Vec<f64> = alphas
        .iter()
        .map(|&alpha| derive_t_high(calibration, alpha))
        .collect();
    for window in thresholds.windows(2) {
        assert!(
            window[0] >= window[1],
            "t_high must not increase as alpha loosens: {thresholds:?}"
        );
    }
}

#[test]
fn test_auto_dup_nested_under_stricter_alpha() {
    let calibration = shipped_calibration().unwrap();
    let t_strict = derive_t_high(calibration, 0.002);
    let t_loose = derive_t_high(calibration, 0.05);

    let scores: Vec<f64> = (-40..60).map(|i| i as f64 * 0.25).collect();
    let dup_ids = |t_high: f64| -> BTreeSet<usize> {
        scores
            .iter()
            .enumerate()
            .filter(|(_, &score)| {
                let pair = imdedup_core::ScoredPair {
                    a_id: "a".to_string(),
                    b_id: "b".to_string(),
                    blockers: BTreeSet::new(),
                    field_scores: Default::default(),
                    total_score: score,
                    agreement_pattern: 0,
                };
                decide_pair(&pair, 0.3, t_high).decision == Decision::AutoDup
            })
            .map(|(index, _)| index)
            .collect()
    };

    let strict_set = dup_ids(t_strict);
    let loose_set = dup_ids(t_loose);
    assert!(strict_set.is_subset(&loose_set));
}

#[test]
fn test_cluster_closure_invariant() {
    use imdedup_core::cluster::build_clusters;
    use imdedup_core::decide::decide_pairs;
    use imdedup_core::score::score_pairs;

    // A mix of identifier duplicates, near-duplicates, and unrelated
    // records; after clustering, every within-cluster pair must be
    // evidenced by an edge or a candidate score above t_low.
    let raws = vec![
        ris("a1", &[("DO", "10.3/x"), ("TI", "Shared identifier paper"), ("PY", "2004")]),
        ris("a2", &[("DO", "10.3/x"), ("TI", "Shared identifier paper"), ("PY", "2004")]),
        ris("a3", &[("DO", "10.3/x"), ("TI", "Shared identifier papers"), ("PY", "2005")]),
        ris("b1", &[("TI", "Standalone work on graphs"), ("PY", "1999"), ("AU", "Kim, S.")]),
        ris("b2", &[("TI", "Standalone work on graphs"), ("PY", "1999"), ("AU", "Kim, S.")]),
        ris("c1", &[("TI", "Entirely different topic"), ("PY", "2020")]),
    ];

    let config = EngineConfig::default();
    let calibration = shipped_calibration().unwrap();
    let mut counters = AnomalyCounters::default();
    let records = normalize_all(&raws, &mut counters);
    let (pairs, _) = generate_candidates(&records, &config, &mut counters);
    let scored = score_pairs(&records, &pairs, &config, calibration);
    let decisions = decide_pairs(&scored, &config, calibration).unwrap();
    let clusters = build_clusters(&records, &scored, &decisions, config.t_low);

    let score_of: std::collections::BTreeMap<(String, String), f64> = scored
        .iter()
        .map(|p| ((p.a_id.clone(), p.b_id.clone()), p.total_score))
        .collect();
    let edges: BTreeSet<(String, String)> = clusters
        .iter()
        .flat_map(|c| c.edges.iter().map(|e| (e.a_id.clone(), e.b_id.clone())))
        .collect();

    for cluster in &clusters {
        for (i, a) in cluster.members.iter().enumerate() {
            for b in &cluster.members[i + 1..] {
                let key = (a.clone(), b.clone());
                let evidenced = edges.contains(&key)
                    || score_of.get(&key).is_some_and(|s| *s >= config.t_low);
                assert!(evidenced, "pair {key:?} in cluster without evidence");
            }
        }
    }
}

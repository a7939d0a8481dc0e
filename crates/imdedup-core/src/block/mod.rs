//! Stage 2: candidate generation
//!
//! Each active blocker maps records to blocking keys; records sharing a key
//! become candidate pairs. Blockers chase recall, the scoring stage supplies
//! precision. A blocker that cannot key a record skips it silently; coverage
//! shows up in the audit artifact instead.

mod minhash;

pub use minhash::{shingles, MinHasher};

use std::collections::{BTreeMap, BTreeSet, HashSet};

use lazy_static::lazy_static;
use tracing::{debug, warn};

use crate::audit::{AnomalyCounters, BlockerStats};
use crate::config::EngineConfig;
use crate::domain::{BlockerTag, CandidatePair, CanonicalRecord};

lazy_static! {
    /// Stopwords removed before building the year_title key.
    static ref STOP_WORDS: HashSet<&'static str> = {
        let words = [
            "a", "an", "the", "of", "in", "on", "at", "to", "for", "and", "or",
            "but", "with", "by", "from", "as", "is", "are", "was", "were", "be",
            "been", "being", "have", "has", "had", "do", "does", "did", "will",
            "would", "could", "should", "may", "might", "can", "this", "that",
        ];
        words.iter().copied().collect()
    };
}

/// Number of leading title tokens in the year_title key.
const YEAR_TITLE_TOKENS: usize = 5;
/// Minimum non-stopword title tokens for the year_title blocker to fire.
const YEAR_TITLE_MIN_TOKENS: usize = 3;

/// Blocking keys for one record under one blocker. Empty when the blocker
/// cannot run for this record.
fn block_keys(
    tag: BlockerTag,
    record: &CanonicalRecord,
    hasher: &MinHasher,
) -> Vec<String> {
    match tag {
        BlockerTag::Doi => record.doi.iter().cloned().collect(),
        BlockerTag::Pmid => record.pmid.iter().cloned().collect(),
        BlockerTag::YearTitle => {
            let (Some(year), Some(title)) = (record.year, record.title.as_deref()) else {
                return Vec::new();
            };
            let tokens: Vec<&str> = title
                .split_whitespace()
                .filter(|t| !STOP_WORDS.contains(t))
                .collect();
            if tokens.len() < YEAR_TITLE_MIN_TOKENS {
                return Vec::new();
            }
            let prefix = tokens
                .iter()
                .take(YEAR_TITLE_TOKENS)
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            vec![format!("{year}:{prefix}")]
        }
        BlockerTag::Lsh => {
            let text = match (record.title.as_deref(), record.venue.as_deref()) {
                (Some(title), Some(venue)) => format!("{title} {venue}"),
                (Some(title), None) => title.to_string(),
                (None, Some(venue)) => venue.to_string(),
                (None, None) => return Vec::new(),
            };
            hasher.band_keys(&text)
        }
    }
}

/// Run stage 2: evaluate every active blocker, union the pairs, and apply
/// the per-record cap. Pairs come out sorted by `(a_id, b_id)` with
/// `a_id < b_id` and the union of blocker tags.
pub fn generate_candidates(
    records: &[CanonicalRecord],
    config: &EngineConfig,
    counters: &mut AnomalyCounters,
) -> (Vec<CandidatePair>, BTreeMap<String, BlockerStats>) {
    let hasher = MinHasher::new(&config.lsh_params);
    let mut pair_tags: BTreeMap<(String, String), BTreeSet<BlockerTag>> = BTreeMap::new();
    let mut stats: BTreeMap<String, BlockerStats> = BTreeMap::new();

    for tag in BlockerTag::ALL {
        if !config.blocker_enabled(tag) {
            continue;
        }

        let mut blocker_stats = BlockerStats::default();
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();

        for (index, record) in records.iter().enumerate() {
            blocker_stats.records_seen += 1;
            let keys = block_keys(tag, record, &hasher);
            if keys.is_empty() {
                continue;
            }
            blocker_stats.records_keyed += 1;
            for key in keys {
                groups.entry(key).or_default().push(index);
            }
        }

        blocker_stats.unique_keys = groups.len() as u64;

        for members in groups.values() {
            blocker_stats.max_block = blocker_stats.max_block.max(members.len() as u64);
            for (i, &a) in members.iter().enumerate() {
                for &b in &members[i + 1..] {
                    let pair = CandidatePair::new(&records[a].id, &records[b].id, tag);
                    blocker_stats.pairs_emitted += 1;
                    pair_tags.entry(pair.key()).or_default().insert(tag);
                }
            }
        }

        debug!(
            blocker = tag.label(),
            keyed = blocker_stats.records_keyed,
            pairs = blocker_stats.pairs_emitted,
            "blocker pass complete"
        );
        stats.insert(tag.label().to_string(), blocker_stats);
    }

    let pairs: Vec<CandidatePair> = pair_tags
        .into_iter()
        .map(|((a_id, b_id), blockers)| CandidatePair { a_id, b_id, blockers })
        .collect();

    let capped = apply_pair_cap(pairs, config.max_pairs_per_record, counters);
    (capped, stats)
}

/// Deterministic per-record candidate cap.
///
/// Each record keeps its `max_pairs` best pairs (largest blocker-tag set,
/// then smallest partner id); a pair survives only if both endpoints keep
/// it. Safety valve for pathological inputs, not a tuning knob.
fn apply_pair_cap(
    pairs: Vec<CandidatePair>,
    max_pairs: usize,
    counters: &mut AnomalyCounters,
) -> Vec<CandidatePair> {
    let mut per_record: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, pair) in pairs.iter().enumerate() {
        per_record.entry(&pair.a_id).or_default().push(index);
        per_record.entry(&pair.b_id).or_default().push(index);
    }

    if per_record.values().all(|indices| indices.len() <= max_pairs) {
        return pairs;
    }

    let mut dropped: BTreeSet<usize> = BTreeSet::new();
    for (&record_id, indices) in &per_record {
        if indices.len() <= max_pairs {
            continue;
        }
        warn!(
            record = record_id,
            pairs = indices.len(),
            cap = max_pairs,
            "record exceeds candidate cap"
        );
        let mut ranked: Vec<usize> = indices.clone();
        ranked.sort_by(|&x, &y| {
            let pair_x = &pairs[x];
            let pair_y = &pairs[y];
            let other_x = other_id(pair_x, record_id);
            let other_y = other_id(pair_y, record_id);
            pair_y
                .blockers
                .len()
                .cmp(&pair_x.blockers.len())
                .then_with(|| other_x.cmp(other_y))
        });
        for &index in &ranked[max_pairs..] {
            dropped.insert(index);
        }
    }

    counters.pairs_dropped_by_cap += dropped.len() as u64;

    pairs
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !dropped.contains(index))
        .map(|(_, pair)| pair)
        .collect()
}

fn other_id<'a>(pair: &'a CandidatePair, record_id: &str) -> &'a str {
    if pair.a_id == record_id {
        &pair.b_id
    } else {
        &pair.a_id
    }
}

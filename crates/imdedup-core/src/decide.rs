//! Stage 4: three-way decisioning under an FPR budget
//!
//! When no explicit upper threshold is configured, it is derived from the
//! shipped non-match score sample by the Neyman-Pearson rule: the smallest
//! score whose exceedance probability under the non-match distribution is
//! at most `fpr_alpha`. The derivation is pure and platform-independent.

use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::{Decision, FieldName, PairDecision, ScoredPair};
use crate::error::EngineError;
use crate::score::{pattern_outcome, Calibration, Outcome};

/// Derive `t_high` from the non-match sample at the given FPR target.
///
/// Computes the empirical `1 - alpha` quantile with linear interpolation
/// between order statistics, matching the shipped calibration file's
/// declared convention. Monotone: a smaller `alpha` never lowers the
/// threshold.
pub fn derive_t_high(calibration: &Calibration, fpr_alpha: f64) -> f64 {
    let sample = &calibration.nonmatch_scores;
    let n = sample.len();
    if n == 1 {
        return sample[0];
    }

    let q = 1.0 - fpr_alpha;
    let position = q * (n - 1) as f64;
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(n - 1);
    let fraction = position - lower as f64;

    let value = sample[lower] + fraction * (sample[upper] - sample[lower]);
    calibration.round(value)
}

/// Resolve the effective `(t_low, t_high)` for a run.
pub fn resolve_thresholds(
    config: &EngineConfig,
    calibration: &Calibration,
) -> Result<(f64, f64), EngineError> {
    let t_high = match config.t_high {
        Some(explicit) => explicit,
        None => {
            let derived = derive_t_high(calibration, config.fpr_alpha);
            debug!(
                fpr_alpha = config.fpr_alpha,
                t_high = derived,
                "derived upper threshold"
            );
            derived
        }
    };

    if config.t_low > t_high {
        return Err(EngineError::Configuration(format!(
            "t_low ({}) exceeds t_high ({})",
            config.t_low, t_high
        )));
    }
    Ok((config.t_low, t_high))
}

/// Decide one scored pair against resolved thresholds.
///
/// Pairs agreeing on a non-null DOI or PMID are forced to `AUTO_DUP`
/// regardless of total score; the override is named in `reason`.
pub fn decide_pair(pair: &ScoredPair, t_low: f64, t_high: f64) -> PairDecision {
    let (decision, reason) =
        if pattern_outcome(pair.agreement_pattern, FieldName::Doi) == Outcome::Agree {
            (Decision::AutoDup, "doi_exact_short_circuit")
        } else if pattern_outcome(pair.agreement_pattern, FieldName::Pmid) == Outcome::Agree {
            (Decision::AutoDup, "pmid_exact_short_circuit")
        } else if pair.total_score >= t_high {
            (Decision::AutoDup, "score_ge_t_high")
        } else if pair.total_score >= t_low {
            (Decision::Review, "score_in_review_band")
        } else {
            (Decision::AutoKeep, "score_lt_t_low")
        };

    PairDecision {
        a_id: pair.a_id.clone(),
        b_id: pair.b_id.clone(),
        decision,
        threshold_low: t_low,
        threshold_high: t_high,
        score: pair.total_score,
        reason: reason.to_string(),
    }
}

/// Run stage 4 over all scored pairs, preserving their order.
pub fn decide_pairs(
    pairs: &[ScoredPair],
    config: &EngineConfig,
    calibration: &Calibration,
) -> Result<Vec<PairDecision>, EngineError> {
    let (t_low, t_high) = resolve_thresholds(config, calibration)?;
    Ok(pairs
        .iter()
        .map(|pair| decide_pair(pair, t_low, t_high))
        .collect())
}

//! Engine configuration
//!
//! One immutable value threaded through the stage entry points. There is no
//! process-wide configuration state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::BlockerTag;
use crate::error::EngineError;

/// MinHash/LSH parameters. Invariant: `bands * rows == num_perm`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LshParams {
    /// Character shingle size.
    pub k: usize,
    /// Number of MinHash permutations.
    pub num_perm: usize,
    /// Number of LSH bands.
    pub bands: usize,
    /// Rows per band.
    pub rows: usize,
    /// Permutation seed.
    pub seed: u64,
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            k: 5,
            num_perm: 128,
            bands: 16,
            rows: 8,
            seed: 0x5EED,
        }
    }
}

/// Configuration for a pipeline run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Target false-positive rate used to derive `t_high` when it is not
    /// given explicitly. Must lie in (0, 0.5].
    pub fpr_alpha: f64,
    /// Lower decision threshold.
    pub t_low: f64,
    /// Upper decision threshold; derived from `fpr_alpha` when `None`.
    pub t_high: Option<f64>,
    /// Active blockers for candidate generation.
    pub candidate_blockers: Vec<BlockerTag>,
    pub lsh_params: LshParams,
    /// Per-record candidate cap, a safety valve for pathological inputs.
    pub max_pairs_per_record: usize,
    /// Comparator value when a field is null on either side.
    pub missing_weight: f64,
    /// Directory stage artifacts are written under.
    pub output_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fpr_alpha: 0.01,
            t_low: 0.3,
            t_high: None,
            candidate_blockers: BlockerTag::ALL.to_vec(),
            lsh_params: LshParams::default(),
            max_pairs_per_record: 200,
            missing_weight: 0.5,
            output_dir: PathBuf::from("dedupe_out"),
        }
    }
}

impl EngineConfig {
    /// Validate option ranges and cross-field invariants.
    ///
    /// Called before any artifact is written; a failure here aborts the run.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.fpr_alpha > 0.0 && self.fpr_alpha <= 0.5) {
            return Err(EngineError::Configuration(format!(
                "fpr_alpha must be in (0, 0.5], got {}",
                self.fpr_alpha
            )));
        }
        if !self.t_low.is_finite() || self.t_low < 0.0 {
            return Err(EngineError::Configuration(format!(
                "t_low must be a finite value >= 0, got {}",
                self.t_low
            )));
        }
        if let Some(t_high) = self.t_high {
            if !t_high.is_finite() {
                return Err(EngineError::Configuration(format!(
                    "t_high must be finite, got {t_high}"
                )));
            }
            if self.t_low > t_high {
                return Err(EngineError::Configuration(format!(
                    "t_low ({}) must not exceed t_high ({})",
                    self.t_low, t_high
                )));
            }
        }
        if self.candidate_blockers.is_empty() {
            return Err(EngineError::Configuration(
                "candidate_blockers must not be empty".to_string(),
            ));
        }
        let lsh = &self.lsh_params;
        if lsh.bands * lsh.rows != lsh.num_perm {
            return Err(EngineError::Configuration(format!(
                "lsh_params invariant violated: bands ({}) * rows ({}) != num_perm ({})",
                lsh.bands, lsh.rows, lsh.num_perm
            )));
        }
        if lsh.k == 0 {
            return Err(EngineError::Configuration(
                "lsh_params.k must be >= 1".to_string(),
            ));
        }
        if self.max_pairs_per_record == 0 {
            return Err(EngineError::Configuration(
                "max_pairs_per_record must be >= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.missing_weight) {
            return Err(EngineError::Configuration(format!(
                "missing_weight must be in [0, 1], got {}",
                self.missing_weight
            )));
        }
        Ok(())
    }

    /// Whether a blocker is active for this run.
    pub fn blocker_enabled(&self, tag: BlockerTag) -> bool {
        self.candidate_blockers.contains(&tag)
    }
}

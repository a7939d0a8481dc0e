//! Shipped calibration tables
//!
//! The Fellegi-Sunter `m`/`u` probabilities and the held-out non-match
//! score sample are embedded in the crate and loaded exactly once. All
//! stages share the parsed tables read-only.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use serde::Deserialize;

use crate::domain::FieldName;
use crate::error::EngineError;

/// Embedded calibration document.
const CALIBRATION_JSON: &str = include_str!("../../data/calibration.json");

/// Per-field match/non-match probabilities.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct FieldWeights {
    /// P(agreement | true match).
    pub m: f64,
    /// P(agreement | true non-match).
    pub u: f64,
}

impl FieldWeights {
    /// log(m / u), the weight of a full agreement.
    pub fn agree_weight(&self) -> f64 {
        (self.m / self.u).ln()
    }

    /// log((1 - m) / (1 - u)), the weight of a full disagreement.
    pub fn disagree_weight(&self) -> f64 {
        ((1.0 - self.m) / (1.0 - self.u)).ln()
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ModelInfo {
    name: String,
    version: String,
}

/// Parsed calibration document.
#[derive(Clone, Debug, Deserialize)]
pub struct Calibration {
    model: ModelInfo,
    /// Empirical-quantile convention for threshold derivation.
    pub quantile_method: String,
    /// Decimal places scores are rounded to at artifact boundaries.
    pub round_decimals: u32,
    fields: BTreeMap<String, FieldWeights>,
    /// Sorted scores from the held-out labeled non-match sample.
    pub nonmatch_scores: Vec<f64>,
}

impl Calibration {
    fn parse_and_validate(json: &str) -> Result<Self, EngineError> {
        let calibration: Calibration = serde_json::from_str(json)
            .map_err(|e| EngineError::Calibration(format!("unparseable calibration: {e}")))?;

        for field in FieldName::ALL {
            let Some(weights) = calibration.fields.get(field.label()) else {
                return Err(EngineError::Calibration(format!(
                    "missing field weights for {}",
                    field.label()
                )));
            };
            if !(weights.m > 0.0 && weights.m < 1.0 && weights.u > 0.0 && weights.u < 1.0) {
                return Err(EngineError::Calibration(format!(
                    "m/u for {} must lie strictly inside (0, 1)",
                    field.label()
                )));
            }
            if weights.m <= weights.u {
                return Err(EngineError::Calibration(format!(
                    "m must exceed u for {}",
                    field.label()
                )));
            }
        }

        if calibration.nonmatch_scores.is_empty() {
            return Err(EngineError::Calibration(
                "non-match score sample is empty".to_string(),
            ));
        }
        if calibration
            .nonmatch_scores
            .windows(2)
            .any(|w| w[0] > w[1] || !w[0].is_finite() || !w[1].is_finite())
        {
            return Err(EngineError::Calibration(
                "non-match score sample must be finite and sorted ascending".to_string(),
            ));
        }
        if calibration.quantile_method != "linear_interpolation" {
            return Err(EngineError::Calibration(format!(
                "unknown quantile method: {}",
                calibration.quantile_method
            )));
        }

        Ok(calibration)
    }

    /// Weights for one comparison field.
    pub fn weights(&self, field: FieldName) -> FieldWeights {
        // Validated at load time; every field is present.
        self.fields[field.label()]
    }

    pub fn model_id(&self) -> String {
        format!("{}@{}", self.model.name, self.model.version)
    }

    /// Round a score to the model's output precision.
    pub fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.round_decimals as i32);
        (value * factor).round() / factor
    }
}

lazy_static! {
    static ref SHIPPED: Result<Calibration, EngineError> =
        Calibration::parse_and_validate(CALIBRATION_JSON);
}

/// The shipped calibration tables, parsed once per process.
pub fn shipped_calibration() -> Result<&'static Calibration, EngineError> {
    match &*SHIPPED {
        Ok(calibration) => Ok(calibration),
        Err(e) => Err(EngineError::Calibration(e.to_string())),
    }
}

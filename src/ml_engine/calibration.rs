//! Baseline score calibration
//!
//! Raw isolation scores for normal operation sit around 0.4–0.5, not 0. Fed
//! straight into the health mapping that would put a perfectly healthy
//! machine near 55 health. The calibration rescales scores so the baseline
//! median maps to 0 and `ceiling` maps to 1.

use serde::{Deserialize, Serialize};

use super::{IsolationEnsemble, ScorerError};
use crate::config::defaults::MIN_CALIBRATION_SPAN;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCalibration {
    pub floor: f64,
    pub ceiling: f64,
}

impl ScoreCalibration {
    /// Raw scores pass through unchanged.
    pub fn identity() -> Self {
        Self {
            floor: 0.0,
            ceiling: 1.0,
        }
    }

    /// Floor is the median of the baseline's own scores; ceiling is kept at
    /// least `MIN_CALIBRATION_SPAN` above it.
    pub fn from_scores(scores: &[f64], ceiling: f64) -> Self {
        let mut sorted: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
        if sorted.is_empty() {
            return Self::identity();
        }
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let floor = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        Self {
            floor,
            ceiling: ceiling.max(floor + MIN_CALIBRATION_SPAN),
        }
    }

    /// Score the baseline with the fitted ensemble and derive the calibration.
    pub fn from_baseline(
        ensemble: &IsolationEnsemble,
        baseline: &[Vec<f64>],
        ceiling: f64,
    ) -> Result<Self, ScorerError> {
        let scores = baseline
            .iter()
            .map(|v| ensemble.score(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_scores(&scores, ceiling))
    }

    /// Map a raw score; the result is not clamped (the health mapping clamps).
    pub fn apply(&self, raw: f64) -> f64 {
        (raw - self.floor) / (self.ceiling - self.floor)
    }
}

impl Default for ScoreCalibration {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_a_no_op() {
        let c = ScoreCalibration::identity();
        assert_eq!(c.apply(0.37), 0.37);
    }

    #[test]
    fn median_maps_to_zero_and_ceiling_to_one() {
        let c = ScoreCalibration::from_scores(&[0.40, 0.44, 0.46, 0.50, 0.42], 0.75);
        assert!((c.floor - 0.44).abs() < 1e-12);
        assert!(c.apply(0.44).abs() < 1e-12);
        assert!((c.apply(0.75) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ceiling_is_pushed_above_floor() {
        let c = ScoreCalibration::from_scores(&[0.8, 0.8], 0.75);
        assert!((c.ceiling - 0.85).abs() < 1e-12);
    }
}

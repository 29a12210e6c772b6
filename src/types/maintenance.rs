//! Maintenance prediction outputs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recommended maintenance window for one equipment.
///
/// Recomputed every tick; each value supersedes the previous one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceRecommendation {
    pub equipment_id: String,
    pub generated_at: DateTime<Utc>,
    /// When the extrapolated health trend reaches the failed threshold
    pub estimated_failure_at: Option<DateTime<Utc>>,
    pub recommended_window_start: DateTime<Utc>,
    pub recommended_window_end: DateTime<Utc>,
    /// Preventive-vs-reactive cost avoidance, never negative
    pub estimated_savings: f64,
    pub remaining_useful_life_hours: f64,
    pub trend_per_hour: f64,
}

impl MaintenanceRecommendation {
    /// Whether `other` differs enough from `self` to be worth re-publishing.
    ///
    /// Window starts within `tolerance` of each other count as unchanged.
    pub fn materially_differs(&self, other: &Self, tolerance: chrono::Duration) -> bool {
        let drift = (self.recommended_window_start - other.recommended_window_start).abs();
        drift > tolerance || self.estimated_failure_at.is_some() != other.estimated_failure_at.is_some()
    }
}

/// Outcome of a prediction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Recommendation(MaintenanceRecommendation),
    NoPrediction,
}

impl Prediction {
    pub fn recommendation(&self) -> Option<&MaintenanceRecommendation> {
        match self {
            Prediction::Recommendation(r) => Some(r),
            Prediction::NoPrediction => None,
        }
    }
}

//! Maintenance Predictor
//!
//! Extrapolates the recent health trend to the Failed threshold and proposes
//! a maintenance window ahead of it:
//!
//! ```text
//! margin       = safety_margin / (1 + |trend| / reference_decline)
//! window_start = max(now, failure − margin)
//! window_end   = window_start + margin / 2
//! ```
//!
//! Steeper declines shrink the margin, pulling the window closer to failure
//! but also closer to now.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::config::{CostProfile, MaintenanceConfig};
use crate::types::{HealthRecord, MaintenanceRecommendation, Prediction};

#[derive(Debug, Clone)]
pub struct MaintenancePredictor {
    equipment_id: String,
    config: MaintenanceConfig,
    cost: CostProfile,
    failed_threshold: f64,
    min_records: usize,
    last: Option<MaintenanceRecommendation>,
}

/// Change in the published recommendation after a `refresh`.
#[derive(Debug, Clone, PartialEq)]
pub enum RecommendationChange {
    Unchanged,
    Updated(MaintenanceRecommendation),
    Cleared,
}

fn hours(h: f64) -> Duration {
    Duration::milliseconds((h * 3_600_000.0).round() as i64)
}

impl MaintenancePredictor {
    /// `failed_threshold` and `min_records` come from the health settings
    /// (Failed threshold and trend window K).
    pub fn new(
        equipment_id: impl Into<String>,
        config: MaintenanceConfig,
        cost: CostProfile,
        failed_threshold: f64,
        min_records: usize,
    ) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            config,
            cost,
            failed_threshold,
            min_records: min_records.max(2),
            last: None,
        }
    }

    /// Predict from the most recent records, oldest first. The last record's
    /// trend and timestamp are authoritative.
    pub fn predict(&self, records: &[HealthRecord]) -> Prediction {
        if records.len() < self.min_records {
            return Prediction::NoPrediction;
        }
        let Some(latest) = records.last() else {
            return Prediction::NoPrediction;
        };
        let trend = latest.trend;
        if !trend.is_finite() || trend >= 0.0 {
            return Prediction::NoPrediction;
        }

        let now = latest.timestamp;
        let remaining_hours = ((latest.health - self.failed_threshold) / -trend).max(0.0);
        if remaining_hours > self.config.horizon_days * 24.0 {
            debug!(
                equipment_id = %self.equipment_id,
                remaining_hours,
                "Failure beyond prediction horizon"
            );
            return Prediction::NoPrediction;
        }

        let failure_at = now + hours(remaining_hours);
        let margin_hours = self.config.safety_margin_hours
            / (1.0 + trend.abs() / self.config.reference_decline_per_hour);
        let window_start = (failure_at - hours(margin_hours)).max(now);
        let window_end = window_start + hours(margin_hours / 2.0);

        Prediction::Recommendation(MaintenanceRecommendation {
            equipment_id: self.equipment_id.clone(),
            generated_at: now,
            estimated_failure_at: Some(failure_at),
            recommended_window_start: window_start,
            recommended_window_end: window_end,
            estimated_savings: self.cost.avoided_cost(),
            remaining_useful_life_hours: remaining_hours,
            trend_per_hour: trend,
        })
    }

    /// Predict and compare against the last published recommendation.
    pub fn refresh(&mut self, records: &[HealthRecord]) -> RecommendationChange {
        let tolerance = Duration::seconds(self.config.change_tolerance_secs);
        match self.predict(records) {
            Prediction::NoPrediction => {
                if self.last.take().is_some() {
                    RecommendationChange::Cleared
                } else {
                    RecommendationChange::Unchanged
                }
            }
            Prediction::Recommendation(next) => {
                if let Some(prev) = &self.last {
                    if !next.materially_differs(prev, tolerance) {
                        return RecommendationChange::Unchanged;
                    }
                }
                self.last = Some(next.clone());
                RecommendationChange::Updated(next)
            }
        }
    }

    /// Most recently published recommendation.
    pub fn latest(&self) -> Option<&MaintenanceRecommendation> {
        self.last.as_ref()
    }

    /// Forget the published recommendation (after a reset).
    pub fn clear(&mut self) -> bool {
        self.last.take().is_some()
    }
}

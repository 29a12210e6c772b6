//! Health Evaluator
//!
//! Per-equipment state machine fed one (calibrated) anomaly score per tick.
//!
//! ```text
//! smoothed = α·score + (1 − α)·smoothed      (first score initializes)
//! health   = 100 · (1 − clamp(smoothed, 0, 1))
//! ```
//!
//! | from     | to       | condition                                           |
//! |----------|----------|-----------------------------------------------------|
//! | Healthy  | Warning  | health < warning_enter                              |
//! | Warning  | Critical | health < critical_enter                             |
//! | Critical | Failed   | health < failed_threshold for N consecutive ticks   |
//! | any      | Failed   | `report_stoppage`                                   |
//! | Critical | Warning  | auto_recovery and health ≥ critical_exit            |
//! | Warning  | Healthy  | auto_recovery and health ≥ warning_exit             |
//! | any      | Healthy  | `reset`                                             |
//!
//! Escalation moves one state per tick. Failed latches until reset.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::{debug, info};

use super::trend::slope_per_hour;
use crate::config::HealthConfig;
use crate::types::{HealthRecord, HealthState, StateTransition, TransitionReason};

/// Output of one `update`.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthUpdate {
    pub record: HealthRecord,
    pub transition: Option<StateTransition>,
}

#[derive(Debug, Clone)]
pub struct HealthEvaluator {
    equipment_id: String,
    config: HealthConfig,
    smoothed: Option<f64>,
    state: HealthState,
    failed_streak: u32,
    history: VecDeque<HealthRecord>,
}

impl HealthEvaluator {
    pub fn new(equipment_id: impl Into<String>, config: HealthConfig) -> Self {
        let capacity = config.history_capacity.max(config.trend_window).max(1);
        Self {
            equipment_id: equipment_id.into(),
            config,
            smoothed: None,
            state: HealthState::Healthy,
            failed_streak: 0,
            history: VecDeque::with_capacity(capacity.min(4_096)),
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn latest(&self) -> Option<&HealthRecord> {
        self.history.back()
    }

    /// Retained records, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &HealthRecord> {
        self.history.iter()
    }

    /// The last `trend_window` records, oldest first.
    pub fn recent(&self) -> Vec<HealthRecord> {
        let skip = self.history.len().saturating_sub(self.config.trend_window);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Fold one uncalibrated score into the health metric.
    pub fn update(&mut self, raw_score: f64, timestamp: DateTime<Utc>) -> HealthUpdate {
        self.update_calibrated(raw_score, raw_score, timestamp)
    }

    /// Smooth `calibrated` into health; `raw_score` is kept on the record as is.
    pub fn update_calibrated(
        &mut self,
        raw_score: f64,
        calibrated: f64,
        timestamp: DateTime<Utc>,
    ) -> HealthUpdate {
        let cfg = &self.config;

        // Everything below is computed into locals; state is committed at the end
        let input = if calibrated.is_finite() {
            calibrated
        } else {
            self.smoothed.unwrap_or(0.0)
        };
        let smoothed = match self.smoothed {
            None => input,
            Some(prev) => cfg.smoothing * input + (1.0 - cfg.smoothing) * prev,
        };
        let health = 100.0 * (1.0 - smoothed.clamp(0.0, 1.0));

        let failed_streak = if health < cfg.failed_threshold {
            self.failed_streak.saturating_add(1)
        } else {
            0
        };

        let next = self.next_state(health, failed_streak);

        // Trend over the previous K−1 records plus this one
        let skip = self.history.len().saturating_sub(cfg.trend_window.saturating_sub(1));
        let mut points: Vec<(DateTime<Utc>, f64)> = self
            .history
            .iter()
            .skip(skip)
            .map(|r| (r.timestamp, r.health))
            .collect();
        points.push((timestamp, health));
        let trend = slope_per_hour(&points);

        let record = HealthRecord {
            equipment_id: self.equipment_id.clone(),
            timestamp,
            raw_score,
            health,
            state: next.map(|(s, _)| s).unwrap_or(self.state),
            trend,
        };
        let transition = next.map(|(to, reason)| StateTransition {
            equipment_id: self.equipment_id.clone(),
            from: self.state,
            to,
            at: timestamp,
            reason,
        });

        // Commit
        self.smoothed = Some(smoothed);
        self.failed_streak = failed_streak;
        if let Some(t) = &transition {
            info!(
                equipment_id = %self.equipment_id,
                from = %t.from,
                to = %t.to,
                health,
                "Health state transition"
            );
            self.state = t.to;
        } else {
            debug!(equipment_id = %self.equipment_id, health, trend, "Health updated");
        }
        self.push_record(record.clone());

        HealthUpdate { record, transition }
    }

    fn next_state(&self, health: f64, failed_streak: u32) -> Option<(HealthState, TransitionReason)> {
        let cfg = &self.config;
        match self.state {
            HealthState::Failed => None,
            HealthState::Critical if failed_streak >= cfg.failed_sustain_ticks => {
                Some((HealthState::Failed, TransitionReason::SustainedFailure))
            }
            current => {
                let target = if health < cfg.critical_enter {
                    HealthState::Critical
                } else if health < cfg.warning_enter {
                    HealthState::Warning
                } else {
                    HealthState::Healthy
                };
                if target > current {
                    return Some((current.escalated(), TransitionReason::Degraded));
                }
                if !cfg.auto_recovery {
                    return None;
                }
                match current {
                    HealthState::Critical if health >= cfg.critical_exit => {
                        Some((HealthState::Warning, TransitionReason::Recovered))
                    }
                    HealthState::Warning if health >= cfg.warning_exit => {
                        Some((HealthState::Healthy, TransitionReason::Recovered))
                    }
                    _ => None,
                }
            }
        }
    }

    fn push_record(&mut self, record: HealthRecord) {
        if self.history.len() >= self.config.history_capacity.max(self.config.trend_window) {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    /// External stoppage signal: straight to Failed.
    pub fn report_stoppage(&mut self, at: DateTime<Utc>) -> Option<StateTransition> {
        if self.state == HealthState::Failed {
            return None;
        }
        let transition = StateTransition {
            equipment_id: self.equipment_id.clone(),
            from: self.state,
            to: HealthState::Failed,
            at,
            reason: TransitionReason::Stoppage,
        };
        info!(equipment_id = %self.equipment_id, from = %self.state, "Stoppage reported");
        self.state = HealthState::Failed;
        Some(transition)
    }

    /// Return to Healthy after maintenance. Smoothing and the in-memory
    /// history restart so the old decline does not bleed into new trends.
    pub fn reset(&mut self, at: DateTime<Utc>) -> Option<StateTransition> {
        let from = self.state;
        self.state = HealthState::Healthy;
        self.smoothed = None;
        self.failed_streak = 0;
        self.history.clear();
        info!(equipment_id = %self.equipment_id, from = %from, "Health evaluator reset");
        (from != HealthState::Healthy).then(|| StateTransition {
            equipment_id: self.equipment_id.clone(),
            from,
            to: HealthState::Healthy,
            at,
            reason: TransitionReason::Reset,
        })
    }
}

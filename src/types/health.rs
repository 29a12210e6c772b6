//! Health evaluation outputs: HealthState, HealthRecord, StateTransition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operational health state of one equipment asset.
///
/// Ordered by severity so escalation checks can compare states directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum HealthState {
    #[default]
    Healthy,
    Warning,
    Critical,
    Failed,
}

impl HealthState {
    /// Next state up the escalation ladder (Failed stays Failed).
    pub fn escalated(self) -> Self {
        match self {
            HealthState::Healthy => HealthState::Warning,
            HealthState::Warning => HealthState::Critical,
            HealthState::Critical | HealthState::Failed => HealthState::Failed,
        }
    }

    pub fn is_healthy(self) -> bool {
        self == HealthState::Healthy
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "Healthy"),
            HealthState::Warning => write!(f, "Warning"),
            HealthState::Critical => write!(f, "Critical"),
            HealthState::Failed => write!(f, "Failed"),
        }
    }
}

/// One health evaluation for one equipment at one tick.
///
/// Append-only per equipment; the Health Evaluator is the only writer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthRecord {
    pub equipment_id: String,
    pub timestamp: DateTime<Utc>,
    /// Uncalibrated isolation score in [0, 1]
    pub raw_score: f64,
    /// Bounded health in [0, 100]
    pub health: f64,
    pub state: HealthState,
    /// Least-squares slope of health over the trend window (points per hour)
    pub trend: f64,
}

/// Why a state transition happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransitionReason {
    /// Health crossed an enter threshold
    Degraded,
    /// Health crossed a leave threshold (auto-recovery only)
    Recovered,
    /// Health stayed under the failed threshold for the sustain window
    SustainedFailure,
    /// Explicit stoppage signal from the plant
    Stoppage,
    /// Explicit equipment reset (after repair)
    Reset,
}

/// A committed change of HealthState.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub equipment_id: String,
    pub from: HealthState,
    pub to: HealthState,
    pub at: DateTime<Utc>,
    pub reason: TransitionReason,
}

impl StateTransition {
    pub fn is_escalation(&self) -> bool {
        self.to > self.from
    }
}

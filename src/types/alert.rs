//! Alert lifecycle types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::HealthState;

/// Alert severity, ordered low → high.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl AlertSeverity {
    /// Severity of an alert raised for entering `state`. Healthy raises nothing.
    pub fn for_state(state: HealthState) -> Option<Self> {
        match state {
            HealthState::Healthy => None,
            HealthState::Warning => Some(AlertSeverity::Warning),
            HealthState::Critical => Some(AlertSeverity::Critical),
            HealthState::Failed => Some(AlertSeverity::Emergency),
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "INFO"),
            AlertSeverity::Warning => write!(f, "WARNING"),
            AlertSeverity::Critical => write!(f, "CRITICAL"),
            AlertSeverity::Emergency => write!(f, "EMERGENCY"),
        }
    }
}

/// Category used for deduplication: one open alert per (equipment, cause).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AlertCause {
    StateTransition,
    ThresholdCross,
}

impl std::fmt::Display for AlertCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCause::StateTransition => write!(f, "state-transition"),
            AlertCause::ThresholdCross => write!(f, "threshold-cross"),
        }
    }
}

/// How an alert came to be resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResolutionReason {
    /// Replaced by a higher-severity alert of the same cause
    Superseded,
    /// Closed because the state moved down the ladder (auto-recovery)
    Deescalated,
    /// Equipment returned to Healthy
    ReturnedToHealthy,
    /// Operator resolved it
    Manual,
    /// Equipment was unregistered
    EquipmentRemoved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: String,
    pub equipment_id: String,
    pub severity: AlertSeverity,
    pub cause: AlertCause,
    pub message: String,
    pub raised_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<ResolutionReason>,
    pub acknowledged: bool,
}

impl Alert {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

//! Output events pushed to subscribers after each tick

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Alert, HealthRecord, MaintenanceRecommendation, StateTransition};

/// Everything the engine publishes to the dashboard/alerting collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Emitted for every evaluated tick of every equipment
    Health(HealthRecord),
    Transition(StateTransition),
    AlertOpened(Alert),
    AlertResolved(Alert),
    /// Emitted only when the recommendation materially changes
    Maintenance(MaintenanceRecommendation),
    MaintenanceCleared {
        equipment_id: String,
        at: DateTime<Utc>,
    },
    ModelReady {
        equipment_id: String,
        baseline_size: usize,
    },
    EquipmentRemoved {
        equipment_id: String,
    },
}

impl EngineEvent {
    pub fn equipment_id(&self) -> &str {
        match self {
            EngineEvent::Health(r) => &r.equipment_id,
            EngineEvent::Transition(t) => &t.equipment_id,
            EngineEvent::AlertOpened(a) | EngineEvent::AlertResolved(a) => &a.equipment_id,
            EngineEvent::Maintenance(m) => &m.equipment_id,
            EngineEvent::MaintenanceCleared { equipment_id, .. }
            | EngineEvent::ModelReady { equipment_id, .. }
            | EngineEvent::EquipmentRemoved { equipment_id } => equipment_id,
        }
    }
}

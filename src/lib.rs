//! IronWatch: Equipment Health Monitoring
//!
//! Predictive maintenance and anomaly detection for industrial equipment
//! telemetry (vibration, temperature, pressure, current).
//!
//! ## Architecture
//!
//! - **Feature Extractor**: Per-channel ring buffers and window statistics
//! - **Isolation Ensemble**: Unsupervised anomaly scoring fitted on a healthy baseline
//! - **Health Evaluator**: EWMA smoothing, hysteretic state machine, trend
//! - **Maintenance Predictor**: Time-to-failure and maintenance window estimation
//! - **Alert Manager**: Deduplicated, rate-limited alert lifecycle
//! - **Equipment Registry**: Fan-in of telemetry, parallel ticks, event fan-out

pub mod config;
pub mod types;
pub mod processing;
pub mod ml_engine;
pub mod health;
pub mod maintenance;
pub mod alerts;
pub mod pipeline;
pub mod storage;

// Re-export configuration
pub use config::{EngineConfig, EngineSettings, EquipmentProfile};

// Re-export commonly used types
pub use types::{
    Alert, AlertCause, AlertSeverity, Channel, EngineEvent, HealthRecord, HealthState,
    MaintenanceRecommendation, Prediction, SensorSample, StateTransition,
};

// Re-export the engine surface
pub use pipeline::{
    EquipmentRegistry, FleetSummary, MonitoringStats, ProcessingLoop, RegistryError, TickReport,
};

// Re-export ML engine types
pub use ml_engine::{IsolationEnsemble, ModelStatus, ScoreCalibration, ScorerError};

// Re-export storage
pub use storage::{HistoryLog, StorageError};

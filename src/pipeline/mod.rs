//! Equipment pipelines and the registry that drives them
//!
//! ```text
//! SensorSample ─ingest─▶ FeatureExtractor ─tick─▶ IsolationEnsemble ─▶ HealthEvaluator
//!                                                                      │
//!                                          ┌───────────────────────────┤
//!                                          ▼                           ▼
//!                                MaintenancePredictor             AlertManager
//!                                          │                           │
//!                                          └──────▶ EngineEvent ◀──────┘
//! ```
//!
//! - `equipment`: one asset's pipeline and its core lock
//! - `registry`: registration, fan-in, parallel tick, pull endpoints
//! - `source`: async telemetry sources (JSON lines, replay)
//! - `processing_loop`: daemon loop tying a source to the registry

mod equipment;
mod registry;
pub mod source;
pub mod processing_loop;

pub use equipment::{EquipmentInfo, EquipmentPipeline, PendingReason, PipelineTick, TickOutcome};
pub use processing_loop::{LoopStats, ProcessingLoop};
pub use registry::{
    BatchReport, EquipmentRegistry, EquipmentSummary, FleetSummary, MonitoringStats, RegistryError,
    TickReport,
};
pub use source::{JsonLinesSource, ReplaySource, SampleEvent, SampleSource, StdinSource};

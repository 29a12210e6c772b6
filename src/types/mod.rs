//! Shared data structures for the equipment health pipeline
//!
//! - SensorSample / Channel: raw telemetry entering the Feature Extractor
//! - HealthRecord / StateTransition: Health Evaluator outputs
//! - Alert: Alert Manager lifecycle records
//! - MaintenanceRecommendation: Maintenance Predictor output
//! - EngineEvent: the push-stream envelope for all of the above

mod sensor;
mod health;
mod alert;
mod maintenance;
mod events;

pub use sensor::*;
pub use health::*;
pub use alert::*;
pub use maintenance::*;
pub use events::*;

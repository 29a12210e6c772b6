//! Health evaluation: anomaly score → bounded health → state machine

mod evaluator;
pub mod trend;

pub use evaluator::{HealthEvaluator, HealthUpdate};
pub use trend::slope_per_hour;

//! Alert lifecycle: deduplication, supersession and storm limiting

mod manager;
mod rate_limiter;

pub use manager::{AlertManager, Resolution};
pub use rate_limiter::AlertRateLimiter;

/// Threshold policy name for the raw isolation score.
pub const ANOMALY_SCORE_METRIC: &str = "anomaly_score";

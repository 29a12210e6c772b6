//! System-wide default constants.
//!
//! Every tunable in `EngineConfig` falls back to one of these. Grouped by
//! pipeline stage for easy discovery.

// ============================================================================
// Engine
// ============================================================================

/// Interval between evaluation ticks (seconds).
///
/// Matches the 2-second refresh cadence of the plant dashboard.
pub const TICK_INTERVAL_SECS: u64 = 2;

/// Equipment with no sample for this long counts as stale (seconds).
pub const STALE_AFTER_SECS: u64 = 30;

/// Capacity of the broadcast event channel.
pub const EVENT_BUFFER: usize = 4_096;

/// Default sled path for the append-only history log.
pub const HISTORY_DB_PATH: &str = "./data/ironwatch_history.db";

// ============================================================================
// Feature Extractor
// ============================================================================

/// Ring-buffer capacity per (equipment, channel).
pub const WINDOW_CAPACITY: usize = 100;

/// Samples required in every channel before a feature vector is produced.
pub const WINDOW_MIN_FILL: usize = 20;

/// Upper bound on ring-buffer capacity accepted by validation.
pub const WINDOW_CAPACITY_MAX: usize = 10_000;

// ============================================================================
// Isolation Ensemble
// ============================================================================

/// Number of isolation trees.
pub const ENSEMBLE_TREES: usize = 100;

/// Per-tree subsample size (capped by baseline size).
pub const ENSEMBLE_SUBSAMPLE: usize = 256;

/// Smallest baseline corpus accepted by `fit`.
pub const ENSEMBLE_MIN_BASELINE: usize = 32;

/// Feature vectors collected during warm-up before fitting.
pub const ENSEMBLE_BASELINE_TICKS: usize = 64;

/// Calibrated score at which health reaches zero.
///
/// Isolation scores rarely exceed ~0.8 even for gross outliers because of the
/// depth limit, so 0.75 is treated as "fully anomalous".
pub const SCORE_CEILING: f64 = 0.75;

/// Minimum gap between calibration floor and ceiling.
pub const MIN_CALIBRATION_SPAN: f64 = 0.05;

// ============================================================================
// Health Evaluator
// ============================================================================

/// EWMA smoothing factor applied to anomaly scores.
pub const EWMA_SMOOTHING: f64 = 0.3;

pub const WARNING_ENTER: f64 = 70.0;
pub const WARNING_EXIT: f64 = 75.0;
pub const CRITICAL_ENTER: f64 = 40.0;
pub const CRITICAL_EXIT: f64 = 45.0;

/// Health below this for `FAILED_SUSTAIN_TICKS` consecutive ticks means Failed.
pub const FAILED_THRESHOLD: f64 = 10.0;
pub const FAILED_SUSTAIN_TICKS: u32 = 5;

/// Records in the trend regression window (K).
pub const TREND_WINDOW: usize = 10;

/// In-memory HealthRecords retained per equipment.
pub const HISTORY_CAPACITY: usize = 1_000;

// ============================================================================
// Maintenance Predictor
// ============================================================================

/// Safety margin ahead of predicted failure at a gentle decline (hours).
pub const SAFETY_MARGIN_HOURS: f64 = 72.0;

/// Decline rate (health points / hour) at which the margin halves.
pub const REFERENCE_DECLINE_PER_HOUR: f64 = 1.0;

/// Predictions further out than this are not reported (days).
pub const PREDICTION_HORIZON_DAYS: f64 = 365.0;

/// Window-start drift below which a recommendation counts as unchanged (seconds).
pub const RECOMMENDATION_CHANGE_TOLERANCE_SECS: i64 = 3_600;

// ============================================================================
// Alert Manager
// ============================================================================

/// Maximum new alerts per equipment per rate window.
pub const MAX_ALERTS_PER_WINDOW: usize = 20;

/// Rate window length (seconds of event time).
pub const ALERT_WINDOW_SECS: i64 = 3_600;

/// Anomaly-score threshold alert levels.
pub const ANOMALY_SCORE_WARNING: f64 = 0.7;
pub const ANOMALY_SCORE_CRITICAL: f64 = 0.85;

// ============================================================================
// Cost profile
// ============================================================================

/// Each prevented failure is valued at roughly $10k of avoided repair.
pub const REACTIVE_REPAIR_COST: f64 = 10_000.0;
pub const REACTIVE_DOWNTIME_HOURS: f64 = 24.0;
pub const PREVENTIVE_MAINTENANCE_COST: f64 = 2_500.0;
pub const PREVENTIVE_DOWNTIME_HOURS: f64 = 4.0;
pub const DOWNTIME_COST_PER_HOUR: f64 = 500.0;

// ============================================================================
// Simulation
// ============================================================================

/// Base delay between simulated sample bursts at `--speed 1` (milliseconds).
pub const SIMULATION_BASE_DELAY_MS: u64 = 2_000;

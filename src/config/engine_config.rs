//! Engine Configuration - per-equipment-class tunables as TOML values
//!
//! Every threshold the pipeline uses is a field in this module. Each struct
//! implements `Default` with the values in `config::defaults`, so an empty
//! config file yields a working engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::types::Channel;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one engine deployment.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$IRONWATCH_CONFIG` env var
/// 2. `./ironwatch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    /// Equipment classes keyed by class name (e.g. "pump", "cnc")
    #[serde(default)]
    pub classes: BTreeMap<String, EquipmentProfile>,

    /// Equipment registered at startup
    #[serde(default)]
    pub equipment: Vec<EquipmentEntry>,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$IRONWATCH_CONFIG` environment variable
    /// 2. `./ironwatch.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("IRONWATCH_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), classes = config.classes.len(), "Loaded engine config from IRONWATCH_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from IRONWATCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "IRONWATCH_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("ironwatch.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(classes = config.classes.len(), "Loaded engine config from ./ironwatch.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./ironwatch.toml, using defaults");
                }
            }
        }

        info!("No ironwatch.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys only warn; range violations fail.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Profile for a class name, or the built-in default profile when the
    /// class is not configured.
    pub fn profile_for(&self, class: &str) -> EquipmentProfile {
        self.classes.get(class).cloned().unwrap_or_else(|| {
            warn!(class = %class, "Equipment class not configured, using default profile");
            EquipmentProfile::default()
        })
    }

    /// Validate engine settings, every class profile, and equipment entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.engine.tick_interval_secs == 0 {
            errors.push("engine.tick_interval_secs must be > 0".to_string());
        }
        if self.engine.event_buffer == 0 {
            errors.push("engine.event_buffer must be > 0".to_string());
        }

        for (name, profile) in &self.classes {
            errors.extend(
                profile
                    .validation_errors()
                    .into_iter()
                    .map(|e| format!("classes.{name}: {e}")),
            );
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &self.equipment {
            if entry.id.trim().is_empty() {
                errors.push("equipment.id must not be empty".to_string());
            }
            if !seen.insert(entry.id.as_str()) {
                errors.push(format!("equipment '{}' is listed more than once", entry.id));
            }
            if !self.classes.contains_key(&entry.class) {
                warn!(equipment_id = %entry.id, class = %entry.class, "Equipment references an unconfigured class; default profile applies");
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Engine / Storage Settings
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Seconds between ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Tick worker threads (0 = one per available core)
    #[serde(default)]
    pub workers: usize,

    /// Seconds without samples before an equipment counts as stale
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// Broadcast channel capacity for engine events
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_tick_interval() -> u64 {
    defaults::TICK_INTERVAL_SECS
}
fn default_stale_after() -> u64 {
    defaults::STALE_AFTER_SECS
}
fn default_event_buffer() -> usize {
    defaults::EVENT_BUFFER
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            workers: 0,
            stale_after_secs: default_stale_after(),
            event_buffer: default_event_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Persist HealthRecords and alert events to the sled history log
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_history_path")]
    pub path: String,
}

fn default_history_path() -> String {
    defaults::HISTORY_DB_PATH.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_history_path(),
        }
    }
}

// ============================================================================
// Equipment Entries
// ============================================================================

/// One monitored asset listed in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentEntry {
    pub id: String,

    /// Key into `classes`
    pub class: String,

    /// Free-form type label, e.g. "CNC Machine", "Pump"
    #[serde(default)]
    pub equipment_type: Option<String>,

    #[serde(default)]
    pub location: Option<String>,
}

// ============================================================================
// Equipment Profile (per class)
// ============================================================================

/// Everything a pipeline needs at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentProfile {
    /// Monitored channels; evaluated in canonical channel order
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub ensemble: EnsembleConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    #[serde(default)]
    pub alerts: AlertConfig,

    #[serde(default)]
    pub cost: CostProfile,

    /// Seconds between evaluations of this class; unset means every engine tick
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval_secs: Option<u64>,
}

fn default_channels() -> Vec<Channel> {
    Channel::ALL.to_vec()
}

impl Default for EquipmentProfile {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            window: WindowConfig::default(),
            ensemble: EnsembleConfig::default(),
            health: HealthConfig::default(),
            maintenance: MaintenanceConfig::default(),
            alerts: AlertConfig::default(),
            cost: CostProfile::default(),
            tick_interval_secs: None,
        }
    }
}

impl EquipmentProfile {
    /// Channels deduplicated and sorted into canonical order.
    pub fn ordered_channels(&self) -> Vec<Channel> {
        let mut channels = self.channels.clone();
        channels.sort();
        channels.dedup();
        channels
    }

    /// Collect every range violation in this profile.
    ///
    /// Empty means the profile is safe to register.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.channels.is_empty() {
            errors.push("channels must list at least one channel".to_string());
        }
        if self.tick_interval_secs == Some(0) {
            errors.push("tick_interval_secs must be at least 1".to_string());
        }

        let w = &self.window;
        if w.capacity < 2 || w.capacity > defaults::WINDOW_CAPACITY_MAX {
            errors.push(format!(
                "window.capacity = {} is outside 2..={}",
                w.capacity,
                defaults::WINDOW_CAPACITY_MAX
            ));
        }
        if w.min_fill < 2 || w.min_fill > w.capacity {
            errors.push(format!(
                "window.min_fill ({}) must be in 2..=capacity ({})",
                w.min_fill, w.capacity
            ));
        }

        let e = &self.ensemble;
        if e.trees == 0 {
            errors.push("ensemble.trees must be > 0".to_string());
        }
        if e.subsample_size < 2 {
            errors.push("ensemble.subsample_size must be >= 2".to_string());
        }
        if e.min_baseline < 2 {
            errors.push("ensemble.min_baseline must be >= 2".to_string());
        }
        if e.baseline_ticks < e.min_baseline {
            errors.push(format!(
                "ensemble.baseline_ticks ({}) must be >= min_baseline ({})",
                e.baseline_ticks, e.min_baseline
            ));
        }
        if !e.score_ceiling.is_finite() || e.score_ceiling <= 0.0 || e.score_ceiling > 1.0 {
            errors.push(format!("ensemble.score_ceiling = {} must be in (0, 1]", e.score_ceiling));
        }

        let h = &self.health;
        if !(h.smoothing > 0.0 && h.smoothing <= 1.0) {
            errors.push(format!("health.smoothing = {} must be in (0, 1]", h.smoothing));
        }
        Self::check_band(h.warning_enter, h.warning_exit, "health.warning", &mut errors);
        Self::check_band(h.critical_enter, h.critical_exit, "health.critical", &mut errors);
        if h.critical_enter >= h.warning_enter {
            errors.push(format!(
                "health.critical_enter ({:.1}) must be below warning_enter ({:.1})",
                h.critical_enter, h.warning_enter
            ));
        }
        if h.critical_exit > h.warning_enter {
            errors.push(format!(
                "health.critical_exit ({:.1}) must not exceed warning_enter ({:.1})",
                h.critical_exit, h.warning_enter
            ));
        }
        if !(h.failed_threshold >= 0.0 && h.failed_threshold < h.critical_enter) {
            errors.push(format!(
                "health.failed_threshold ({:.1}) must be in [0, critical_enter)",
                h.failed_threshold
            ));
        }
        if h.failed_sustain_ticks == 0 {
            errors.push("health.failed_sustain_ticks must be > 0".to_string());
        }
        if h.trend_window < 2 {
            errors.push("health.trend_window must be >= 2".to_string());
        }
        if h.history_capacity < h.trend_window {
            errors.push(format!(
                "health.history_capacity ({}) must be >= trend_window ({})",
                h.history_capacity, h.trend_window
            ));
        }

        let m = &self.maintenance;
        if !(m.safety_margin_hours.is_finite() && m.safety_margin_hours > 0.0) {
            errors.push("maintenance.safety_margin_hours must be > 0".to_string());
        }
        if !(m.reference_decline_per_hour.is_finite() && m.reference_decline_per_hour > 0.0) {
            errors.push("maintenance.reference_decline_per_hour must be > 0".to_string());
        }
        if !(m.horizon_days.is_finite() && m.horizon_days > 0.0) {
            errors.push("maintenance.horizon_days must be > 0".to_string());
        }
        if m.change_tolerance_secs < 0 {
            errors.push("maintenance.change_tolerance_secs must be >= 0".to_string());
        }

        let a = &self.alerts;
        if a.max_alerts_per_window == 0 {
            errors.push("alerts.max_alerts_per_window must be > 0".to_string());
        }
        if a.window_secs <= 0 {
            errors.push("alerts.window_secs must be > 0".to_string());
        }
        for t in &a.thresholds {
            if !t.warning.is_finite() || !t.critical.is_finite() || t.critical < t.warning {
                errors.push(format!(
                    "alerts.thresholds[{}]: critical ({}) must be finite and >= warning ({})",
                    t.metric, t.critical, t.warning
                ));
            }
        }

        let c = &self.cost;
        for (name, value) in [
            ("preventive_maintenance_cost", c.preventive_maintenance_cost),
            ("preventive_downtime_hours", c.preventive_downtime_hours),
            ("reactive_repair_cost", c.reactive_repair_cost),
            ("reactive_downtime_hours", c.reactive_downtime_hours),
            ("downtime_cost_per_hour", c.downtime_cost_per_hour),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!("cost.{name} = {value} must be a finite non-negative number"));
            }
        }

        errors
    }

    /// An enter/exit pair must leave a real band that does not span the
    /// whole 0-100 health range.
    fn check_band(enter: f64, exit: f64, name: &str, errors: &mut Vec<String>) {
        if !enter.is_finite() || !exit.is_finite() {
            errors.push(format!("{name}: thresholds must be finite (enter={enter}, exit={exit})"));
            return;
        }
        if !(0.0..=100.0).contains(&enter) || !(0.0..=100.0).contains(&exit) {
            errors.push(format!("{name}: thresholds must lie in 0..=100 (enter={enter}, exit={exit})"));
            return;
        }
        if exit <= enter {
            errors.push(format!("{name}: exit ({exit:.1}) must be above enter ({enter:.1})"));
        }
        if exit - enter >= 100.0 {
            errors.push(format!("{name}: hysteresis band ({:.1}) covers the full range", exit - enter));
        }
    }
}

// ============================================================================
// Stage Configs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Ring-buffer capacity per channel
    #[serde(default = "default_window_capacity")]
    pub capacity: usize,

    /// Samples required in every channel before evaluation
    #[serde(default = "default_window_min_fill")]
    pub min_fill: usize,
}

fn default_window_capacity() -> usize {
    defaults::WINDOW_CAPACITY
}
fn default_window_min_fill() -> usize {
    defaults::WINDOW_MIN_FILL
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            capacity: default_window_capacity(),
            min_fill: default_window_min_fill(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default = "default_trees")]
    pub trees: usize,

    #[serde(default = "default_subsample")]
    pub subsample_size: usize,

    /// Smallest baseline corpus `fit` accepts
    #[serde(default = "default_min_baseline")]
    pub min_baseline: usize,

    /// Feature vectors collected during warm-up before fitting
    #[serde(default = "default_baseline_ticks")]
    pub baseline_ticks: usize,

    /// Fixed seed for reproducible trees; random when absent
    #[serde(default)]
    pub seed: Option<u64>,

    /// Derive the score floor from the baseline's own scores
    #[serde(default = "default_true")]
    pub calibrate: bool,

    /// Calibrated score mapped to zero health
    #[serde(default = "default_score_ceiling")]
    pub score_ceiling: f64,
}

fn default_trees() -> usize {
    defaults::ENSEMBLE_TREES
}
fn default_subsample() -> usize {
    defaults::ENSEMBLE_SUBSAMPLE
}
fn default_min_baseline() -> usize {
    defaults::ENSEMBLE_MIN_BASELINE
}
fn default_baseline_ticks() -> usize {
    defaults::ENSEMBLE_BASELINE_TICKS
}
fn default_true() -> bool {
    true
}
fn default_score_ceiling() -> f64 {
    defaults::SCORE_CEILING
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            trees: default_trees(),
            subsample_size: default_subsample(),
            min_baseline: default_min_baseline(),
            baseline_ticks: default_baseline_ticks(),
            seed: None,
            calibrate: true,
            score_ceiling: default_score_ceiling(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// EWMA smoothing factor in (0, 1]
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,

    #[serde(default = "default_warning_enter")]
    pub warning_enter: f64,
    #[serde(default = "default_warning_exit")]
    pub warning_exit: f64,
    #[serde(default = "default_critical_enter")]
    pub critical_enter: f64,
    #[serde(default = "default_critical_exit")]
    pub critical_exit: f64,

    #[serde(default = "default_failed_threshold")]
    pub failed_threshold: f64,
    #[serde(default = "default_failed_sustain")]
    pub failed_sustain_ticks: u32,

    /// Records in the trend regression (K)
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    /// Let health recover through the exit thresholds without a reset
    #[serde(default)]
    pub auto_recovery: bool,

    /// HealthRecords kept in memory for pull queries
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_smoothing() -> f64 {
    defaults::EWMA_SMOOTHING
}
fn default_warning_enter() -> f64 {
    defaults::WARNING_ENTER
}
fn default_warning_exit() -> f64 {
    defaults::WARNING_EXIT
}
fn default_critical_enter() -> f64 {
    defaults::CRITICAL_ENTER
}
fn default_critical_exit() -> f64 {
    defaults::CRITICAL_EXIT
}
fn default_failed_threshold() -> f64 {
    defaults::FAILED_THRESHOLD
}
fn default_failed_sustain() -> u32 {
    defaults::FAILED_SUSTAIN_TICKS
}
fn default_trend_window() -> usize {
    defaults::TREND_WINDOW
}
fn default_history_capacity() -> usize {
    defaults::HISTORY_CAPACITY
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            smoothing: default_smoothing(),
            warning_enter: default_warning_enter(),
            warning_exit: default_warning_exit(),
            critical_enter: default_critical_enter(),
            critical_exit: default_critical_exit(),
            failed_threshold: default_failed_threshold(),
            failed_sustain_ticks: default_failed_sustain(),
            trend_window: default_trend_window(),
            auto_recovery: false,
            history_capacity: default_history_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_safety_margin")]
    pub safety_margin_hours: f64,

    #[serde(default = "default_reference_decline")]
    pub reference_decline_per_hour: f64,

    #[serde(default = "default_horizon_days")]
    pub horizon_days: f64,

    #[serde(default = "default_change_tolerance")]
    pub change_tolerance_secs: i64,
}

fn default_safety_margin() -> f64 {
    defaults::SAFETY_MARGIN_HOURS
}
fn default_reference_decline() -> f64 {
    defaults::REFERENCE_DECLINE_PER_HOUR
}
fn default_horizon_days() -> f64 {
    defaults::PREDICTION_HORIZON_DAYS
}
fn default_change_tolerance() -> i64 {
    defaults::RECOMMENDATION_CHANGE_TOLERANCE_SECS
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            safety_margin_hours: default_safety_margin(),
            reference_decline_per_hour: default_reference_decline(),
            horizon_days: default_horizon_days(),
            change_tolerance_secs: default_change_tolerance(),
        }
    }
}

/// Warning/critical limits for one monitored metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricThreshold {
    pub metric: String,
    pub warning: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_max_alerts")]
    pub max_alerts_per_window: usize,

    #[serde(default = "default_alert_window")]
    pub window_secs: i64,

    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<MetricThreshold>,
}

fn default_max_alerts() -> usize {
    defaults::MAX_ALERTS_PER_WINDOW
}
fn default_alert_window() -> i64 {
    defaults::ALERT_WINDOW_SECS
}
fn default_thresholds() -> Vec<MetricThreshold> {
    vec![MetricThreshold {
        metric: "anomaly_score".to_string(),
        warning: defaults::ANOMALY_SCORE_WARNING,
        critical: defaults::ANOMALY_SCORE_CRITICAL,
    }]
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            max_alerts_per_window: default_max_alerts(),
            window_secs: default_alert_window(),
            thresholds: default_thresholds(),
        }
    }
}

/// Static maintenance economics for one equipment class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostProfile {
    #[serde(default = "default_preventive_cost")]
    pub preventive_maintenance_cost: f64,
    #[serde(default = "default_preventive_downtime")]
    pub preventive_downtime_hours: f64,
    #[serde(default = "default_reactive_cost")]
    pub reactive_repair_cost: f64,
    #[serde(default = "default_reactive_downtime")]
    pub reactive_downtime_hours: f64,
    #[serde(default = "default_downtime_rate")]
    pub downtime_cost_per_hour: f64,
}

fn default_preventive_cost() -> f64 {
    defaults::PREVENTIVE_MAINTENANCE_COST
}
fn default_preventive_downtime() -> f64 {
    defaults::PREVENTIVE_DOWNTIME_HOURS
}
fn default_reactive_cost() -> f64 {
    defaults::REACTIVE_REPAIR_COST
}
fn default_reactive_downtime() -> f64 {
    defaults::REACTIVE_DOWNTIME_HOURS
}
fn default_downtime_rate() -> f64 {
    defaults::DOWNTIME_COST_PER_HOUR
}

impl Default for CostProfile {
    fn default() -> Self {
        Self {
            preventive_maintenance_cost: default_preventive_cost(),
            preventive_downtime_hours: default_preventive_downtime(),
            reactive_repair_cost: default_reactive_cost(),
            reactive_downtime_hours: default_reactive_downtime(),
            downtime_cost_per_hour: default_downtime_rate(),
        }
    }
}

impl CostProfile {
    /// Reactive cost minus preventive cost, floored at zero.
    pub fn avoided_cost(&self) -> f64 {
        let reactive = self.reactive_repair_cost + self.reactive_downtime_hours * self.downtime_cost_per_hour;
        let preventive =
            self.preventive_maintenance_cost + self.preventive_downtime_hours * self.downtime_cost_per_hour;
        (reactive - preventive).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_valid() {
        assert!(EquipmentProfile::default().validation_errors().is_empty());
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_hysteresis_band_is_rejected() {
        let mut profile = EquipmentProfile::default();
        profile.health.warning_exit = 65.0;
        let errors = profile.validation_errors();
        assert!(errors.iter().any(|e| e.contains("health.warning")), "{errors:?}");
    }

    #[test]
    fn band_covering_full_range_is_rejected() {
        let mut profile = EquipmentProfile::default();
        profile.health.warning_enter = 0.0;
        profile.health.warning_exit = 100.0;
        let errors = profile.validation_errors();
        assert!(errors.iter().any(|e| e.contains("full range")), "{errors:?}");
    }

    #[test]
    fn min_fill_above_capacity_is_rejected() {
        let mut profile = EquipmentProfile::default();
        profile.window.capacity = 10;
        profile.window.min_fill = 20;
        assert!(!profile.validation_errors().is_empty());
    }

    #[test]
    fn avoided_cost_floors_at_zero() {
        let cost = CostProfile {
            preventive_maintenance_cost: 50_000.0,
            preventive_downtime_hours: 10.0,
            reactive_repair_cost: 1_000.0,
            reactive_downtime_hours: 1.0,
            downtime_cost_per_hour: 100.0,
        };
        assert_eq!(cost.avoided_cost(), 0.0);
    }

    #[test]
    fn default_avoided_cost_matches_profile_arithmetic() {
        // (10_000 + 24*500) - (2_500 + 4*500) = 22_000 - 4_500
        assert!((CostProfile::default().avoided_cost() - 17_500.0).abs() < 1e-9);
    }

    #[test]
    fn ordered_channels_sorts_and_dedups() {
        let profile = EquipmentProfile {
            channels: vec![Channel::Current, Channel::Vibration, Channel::Current],
            ..EquipmentProfile::default()
        };
        assert_eq!(profile.ordered_channels(), vec![Channel::Vibration, Channel::Current]);
    }
}

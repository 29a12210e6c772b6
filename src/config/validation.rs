//! Config validation: unknown-key detection with Levenshtein suggestions.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization and range validation. Warnings never break a config.
//!
//! Class names under `[classes.<name>]` are user-chosen, so that path segment
//! is normalized to `*` before lookup.

use std::collections::HashSet;

/// A non-fatal config warning (typo, misplaced key).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ": did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `EngineConfig`.
///
/// Maintained by hand to match the struct hierarchy in `engine_config.rs`.
/// Any new field added there must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [engine]
        "engine",
        "engine.tick_interval_secs",
        "engine.workers",
        "engine.stale_after_secs",
        "engine.event_buffer",
        // [storage]
        "storage",
        "storage.enabled",
        "storage.path",
        // [classes.<name>]
        "classes",
        "classes.*",
        "classes.*.channels",
        "classes.*.tick_interval_secs",
        "classes.*.window",
        "classes.*.window.capacity",
        "classes.*.window.min_fill",
        "classes.*.ensemble",
        "classes.*.ensemble.trees",
        "classes.*.ensemble.subsample_size",
        "classes.*.ensemble.min_baseline",
        "classes.*.ensemble.baseline_ticks",
        "classes.*.ensemble.seed",
        "classes.*.ensemble.calibrate",
        "classes.*.ensemble.score_ceiling",
        "classes.*.health",
        "classes.*.health.smoothing",
        "classes.*.health.warning_enter",
        "classes.*.health.warning_exit",
        "classes.*.health.critical_enter",
        "classes.*.health.critical_exit",
        "classes.*.health.failed_threshold",
        "classes.*.health.failed_sustain_ticks",
        "classes.*.health.trend_window",
        "classes.*.health.auto_recovery",
        "classes.*.health.history_capacity",
        "classes.*.maintenance",
        "classes.*.maintenance.safety_margin_hours",
        "classes.*.maintenance.reference_decline_per_hour",
        "classes.*.maintenance.horizon_days",
        "classes.*.maintenance.change_tolerance_secs",
        "classes.*.alerts",
        "classes.*.alerts.max_alerts_per_window",
        "classes.*.alerts.window_secs",
        "classes.*.alerts.thresholds",
        "classes.*.alerts.thresholds.metric",
        "classes.*.alerts.thresholds.warning",
        "classes.*.alerts.thresholds.critical",
        "classes.*.cost",
        "classes.*.cost.preventive_maintenance_cost",
        "classes.*.cost.preventive_downtime_hours",
        "classes.*.cost.reactive_repair_cost",
        "classes.*.cost.reactive_downtime_hours",
        "classes.*.cost.downtime_cost_per_hour",
        // [[equipment]]
        "equipment",
        "equipment.id",
        "equipment.class",
        "equipment.equipment_type",
        "equipment.location",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// Arrays of tables contribute their element keys under the array's own path,
/// so `[[equipment]] id = ".."` yields `equipment` and `equipment.id`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            match v {
                toml::Value::Table(_) => keys.extend(walk_toml_keys(v, &path)),
                toml::Value::Array(items) => {
                    for item in items.iter().filter(|i| i.is_table()) {
                        keys.extend(walk_toml_keys(item, &path));
                    }
                }
                _ => {}
            }
        }
    }
    keys.sort();
    keys.dedup();
    keys
}

/// Replace the user-chosen class name in `classes.<name>.…` with `*`.
fn normalize_key(key: &str) -> String {
    let mut parts: Vec<&str> = key.split('.').collect();
    if parts.len() >= 2 && parts[0] == "classes" {
        parts[1] = "*";
    }
    parts.join(".")
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smallest key so suggestions are stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut candidates: Vec<(usize, &str)> = known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .collect();
    candidates.sort();
    candidates.first().map(|(_, k)| (*k).to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors surface from serde later
    };

    let known = known_config_keys();
    let mut warnings = Vec::new();

    for key in walk_toml_keys(&value, "") {
        let normalized = normalize_key(&key);
        if !known.contains(normalized.as_str()) {
            let suggestion = suggest_correction(&normalized, &known);
            warnings.push(ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("smoothing", "smoothing"), 0);
        assert_eq!(levenshtein("smothing", "smoothing"), 1);
    }

    #[test]
    fn class_names_are_wildcarded() {
        assert_eq!(normalize_key("classes.pump.health.smoothing"), "classes.*.health.smoothing");
        assert_eq!(normalize_key("engine.workers"), "engine.workers");
    }

    #[test]
    fn walk_includes_array_of_tables() {
        let value: toml::Value = r#"
[[equipment]]
id = "PUMP_002"
class = "pump"
"#
        .parse()
        .expect("valid toml");
        let keys = walk_toml_keys(&value, "");
        assert_eq!(keys, vec!["equipment", "equipment.class", "equipment.id"]);
    }
}

//! Alert Manager
//!
//! Turns state transitions and threshold crossings of one equipment into
//! discrete alerts. At most one alert per cause is open at a time:
//!
//! - higher severity than the open alert: the open one is resolved as
//!   `Superseded` and a new one opens (never rate limited)
//! - same or lower severity: deduplicated
//! - de-escalation (auto-recovery): resolved as `Deescalated`, reopened lower
//! - back to Healthy: everything open is resolved
//!
//! New alerts that are not escalations count against the storm limiter.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::rate_limiter::AlertRateLimiter;
use crate::config::AlertConfig;
use crate::types::{
    Alert, AlertCause, AlertSeverity, EngineEvent, HealthState, ResolutionReason,
};

/// Result of resolving one alert by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub alert: Alert,
    /// False when the alert was already resolved.
    pub changed: bool,
}

pub struct AlertManager {
    equipment_id: String,
    config: AlertConfig,
    limiter: AlertRateLimiter,
    alerts: Vec<Alert>,
    open: HashMap<AlertCause, usize>,
    next_seq: u64,
    suppressed: u64,
}

impl AlertManager {
    pub fn new(equipment_id: impl Into<String>, config: AlertConfig) -> Self {
        let limiter = AlertRateLimiter::new(config.max_alerts_per_window, config.window_secs);
        Self {
            equipment_id: equipment_id.into(),
            config,
            limiter,
            alerts: Vec::new(),
            open: HashMap::new(),
            next_seq: 1,
            suppressed: 0,
        }
    }

    /// Alert lifecycle for a health state change.
    pub fn on_transition(
        &mut self,
        from: HealthState,
        to: HealthState,
        at: DateTime<Utc>,
    ) -> Vec<EngineEvent> {
        let Some(severity) = AlertSeverity::for_state(to) else {
            return self.resolve_all(ResolutionReason::ReturnedToHealthy, at);
        };
        let message = format!("{} state {} -> {}", self.equipment_id, from, to);
        self.raise(AlertCause::StateTransition, severity, message, at)
    }

    /// Alert lifecycle for a metric reading checked against its configured
    /// limits. Metrics without a policy and values under the warning limit
    /// never alert.
    pub fn on_threshold_cross(&mut self, metric: &str, value: f64, at: DateTime<Utc>) -> Vec<EngineEvent> {
        let Some(policy) = self.config.thresholds.iter().find(|t| t.metric == metric) else {
            return Vec::new();
        };
        let (severity, limit) = if value >= policy.critical {
            (AlertSeverity::Critical, policy.critical)
        } else if value >= policy.warning {
            (AlertSeverity::Warning, policy.warning)
        } else {
            return Vec::new();
        };
        let message = format!("{metric} = {value:.3} at or above {severity} limit {limit}");
        self.raise(AlertCause::ThresholdCross, severity, message, at)
    }

    fn raise(
        &mut self,
        cause: AlertCause,
        severity: AlertSeverity,
        message: String,
        at: DateTime<Utc>,
    ) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let current = self.open.get(&cause).map(|&i| self.alerts[i].severity);

        let resolution = match current {
            Some(open) if open == severity => {
                debug!(equipment_id = %self.equipment_id, %cause, %severity, "Duplicate alert suppressed");
                return events;
            }
            // Threshold alerts only ever escalate; a lower reading is a duplicate
            Some(open) if open > severity && cause == AlertCause::ThresholdCross => return events,
            Some(open) if open > severity => Some(ResolutionReason::Deescalated),
            Some(_) => Some(ResolutionReason::Superseded),
            None => None,
        };

        let escalation = resolution == Some(ResolutionReason::Superseded);
        if !escalation && !self.limiter.can_issue(at) {
            self.suppressed += 1;
            warn!(
                equipment_id = %self.equipment_id,
                %cause,
                %severity,
                suppressed = self.suppressed,
                "Alert storm limit reached, alert suppressed"
            );
            return events;
        }

        if let Some(reason) = resolution {
            if let Some(index) = self.open.remove(&cause) {
                events.push(EngineEvent::AlertResolved(self.close(index, at, reason)));
            }
        }

        let alert = Alert {
            id: format!("{}#{}", self.equipment_id, self.next_seq),
            equipment_id: self.equipment_id.clone(),
            severity,
            cause,
            message,
            raised_at: at,
            resolved_at: None,
            resolution: None,
            acknowledged: false,
        };
        self.next_seq += 1;
        self.limiter.record(at);
        info!(
            equipment_id = %self.equipment_id,
            alert_id = %alert.id,
            %severity,
            %cause,
            "Alert opened"
        );
        self.open.insert(cause, self.alerts.len());
        self.alerts.push(alert.clone());
        events.push(EngineEvent::AlertOpened(alert));
        events
    }

    fn close(&mut self, index: usize, at: DateTime<Utc>, reason: ResolutionReason) -> Alert {
        let alert = &mut self.alerts[index];
        alert.resolved_at = Some(at);
        alert.resolution = Some(reason);
        debug!(alert_id = %alert.id, ?reason, "Alert resolved");
        alert.clone()
    }

    /// Mark an alert acknowledged. Idempotent; `None` for an unknown id.
    pub fn acknowledge(&mut self, alert_id: &str) -> Option<Alert> {
        let alert = self.alerts.iter_mut().find(|a| a.id == alert_id)?;
        alert.acknowledged = true;
        Some(alert.clone())
    }

    /// Resolve one alert. Resolving twice leaves the first resolution intact.
    pub fn resolve(&mut self, alert_id: &str, at: DateTime<Utc>, reason: ResolutionReason) -> Option<Resolution> {
        let index = self.alerts.iter().position(|a| a.id == alert_id)?;
        if !self.alerts[index].is_open() {
            return Some(Resolution {
                alert: self.alerts[index].clone(),
                changed: false,
            });
        }
        let cause = self.alerts[index].cause;
        self.open.remove(&cause);
        Some(Resolution {
            alert: self.close(index, at, reason),
            changed: true,
        })
    }

    /// Resolve every open alert with the same reason.
    pub fn resolve_all(&mut self, reason: ResolutionReason, at: DateTime<Utc>) -> Vec<EngineEvent> {
        let mut indices: Vec<usize> = self.open.drain().map(|(_, i)| i).collect();
        indices.sort_unstable();
        indices
            .into_iter()
            .map(|i| EngineEvent::AlertResolved(self.close(i, at, reason)))
            .collect()
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn open_alerts(&self) -> Vec<Alert> {
        self.alerts.iter().filter(|a| a.is_open()).cloned().collect()
    }

    pub fn contains(&self, alert_id: &str) -> bool {
        self.alerts.iter().any(|a| a.id == alert_id)
    }

    /// Alerts dropped by the storm limiter.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::types::HealthState::*;

    fn manager() -> AlertManager {
        AlertManager::new("CNC_001", AlertConfig::default())
    }

    fn opened(events: &[EngineEvent]) -> Vec<&Alert> {
        events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::AlertOpened(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    fn resolved(events: &[EngineEvent]) -> Vec<&Alert> {
        events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::AlertResolved(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn escalation_supersedes_instead_of_stacking() {
        let mut m = manager();
        let t0 = Utc::now();
        m.on_transition(Healthy, Warning, t0);
        let events = m.on_transition(Warning, Critical, t0 + Duration::seconds(2));

        assert_eq!(resolved(&events)[0].resolution, Some(ResolutionReason::Superseded));
        assert_eq!(opened(&events)[0].severity, AlertSeverity::Critical);
        assert_eq!(m.open_alerts().len(), 1);
        assert_eq!(m.alerts().len(), 2);
    }

    #[test]
    fn failed_maps_to_emergency() {
        let mut m = manager();
        let events = m.on_transition(Critical, Failed, Utc::now());
        assert_eq!(opened(&events)[0].severity, AlertSeverity::Emergency);
    }

    #[test]
    fn equal_or_lower_threshold_severity_is_deduplicated() {
        let mut m = manager();
        let t0 = Utc::now();
        assert_eq!(opened(&m.on_threshold_cross("anomaly_score", 0.9, t0)).len(), 1);
        assert!(m.on_threshold_cross("anomaly_score", 0.95, t0).is_empty());
        assert!(m.on_threshold_cross("anomaly_score", 0.75, t0).is_empty());
        assert!(m.on_threshold_cross("anomaly_score", 0.2, t0).is_empty());
        assert!(m.on_threshold_cross("bearing_temp", 99.0, t0).is_empty());
        assert_eq!(m.open_alerts().len(), 1);
    }

    #[test]
    fn causes_are_tracked_independently() {
        let mut m = manager();
        let t0 = Utc::now();
        m.on_transition(Healthy, Warning, t0);
        m.on_threshold_cross("anomaly_score", 0.72, t0);
        assert_eq!(m.open_alerts().len(), 2);
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut m = manager();
        let t0 = Utc::now();
        let events = m.on_transition(Healthy, Warning, t0);
        let id = opened(&events)[0].id.clone();

        let first = m.resolve(&id, t0 + Duration::seconds(5), ResolutionReason::Manual).unwrap();
        let second = m.resolve(&id, t0 + Duration::seconds(9), ResolutionReason::Manual).unwrap();
        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(first.alert, second.alert);
        assert!(m.resolve("CNC_001#99", t0, ResolutionReason::Manual).is_none());
    }

    #[test]
    fn new_event_after_resolve_opens_exactly_one() {
        let mut m = manager();
        let t0 = Utc::now();
        let id = opened(&m.on_threshold_cross("anomaly_score", 0.8, t0))[0].id.clone();
        m.resolve(&id, t0, ResolutionReason::Manual);
        let events = m.on_threshold_cross("anomaly_score", 0.8, t0 + Duration::seconds(2));
        assert_eq!(opened(&events).len(), 1);
        assert!(resolved(&events).is_empty());
        assert_eq!(m.open_alerts().len(), 1);
    }

    #[test]
    fn acknowledge_is_idempotent_and_keeps_alert_open() {
        let mut m = manager();
        let id = opened(&m.on_transition(Healthy, Warning, Utc::now()))[0].id.clone();
        assert!(m.acknowledge(&id).unwrap().acknowledged);
        assert!(m.acknowledge(&id).unwrap().acknowledged);
        assert_eq!(m.open_alerts().len(), 1);
        assert!(m.acknowledge("nope").is_none());
    }

    #[test]
    fn return_to_healthy_resolves_everything() {
        let mut m = manager();
        let t0 = Utc::now();
        m.on_transition(Healthy, Warning, t0);
        m.on_threshold_cross("anomaly_score", 0.9, t0);
        let events = m.on_transition(Warning, Healthy, t0 + Duration::seconds(1));
        assert_eq!(resolved(&events).len(), 2);
        assert!(resolved(&events)
            .iter()
            .all(|a| a.resolution == Some(ResolutionReason::ReturnedToHealthy)));
        assert!(m.open_alerts().is_empty());
    }

    #[test]
    fn deescalation_reopens_at_lower_severity() {
        let mut m = manager();
        let t0 = Utc::now();
        m.on_transition(Warning, Critical, t0);
        let events = m.on_transition(Critical, Warning, t0 + Duration::seconds(2));
        assert_eq!(resolved(&events)[0].resolution, Some(ResolutionReason::Deescalated));
        assert_eq!(opened(&events)[0].severity, AlertSeverity::Warning);
    }

    #[test]
    fn storm_limit_caps_new_alerts_but_not_escalations() {
        let config = AlertConfig {
            max_alerts_per_window: 2,
            ..AlertConfig::default()
        };
        let mut m = AlertManager::new("PUMP_002", config);
        let t0 = Utc::now();
        for i in 0..4 {
            let at = t0 + Duration::seconds(i);
            let id = m
                .on_threshold_cross("anomaly_score", 0.72, at)
                .iter()
                .find_map(|e| match e {
                    EngineEvent::AlertOpened(a) => Some(a.id.clone()),
                    _ => None,
                });
            if let Some(id) = id {
                m.resolve(&id, at, ResolutionReason::Manual);
            }
        }
        assert_eq!(m.alerts().len(), 2);
        assert_eq!(m.suppressed(), 2);

        // A fresh transition alert is not an escalation, so it is limited too
        m.on_transition(Healthy, Warning, t0);
        assert_eq!(m.suppressed(), 3);

        // Superseding an open Warning with Critical bypasses the limit
        let m2_events = {
            let mut m2 = AlertManager::new(
                "PUMP_002",
                AlertConfig {
                    max_alerts_per_window: 1,
                    ..AlertConfig::default()
                },
            );
            m2.on_transition(Healthy, Warning, t0);
            m2.on_transition(Warning, Critical, t0 + Duration::seconds(1))
        };
        assert_eq!(opened(&m2_events)[0].severity, AlertSeverity::Critical);

        // Once the window has passed, alerts flow again
        let later = t0 + Duration::hours(2);
        assert_eq!(opened(&m.on_transition(Healthy, Warning, later)).len(), 1);
    }
}

//! History log integration tests
//!
//! The sled log on a real directory: append, replay, range scans, reopen,
//! and the recorder task fed from a live registry.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use ironwatch::config::{EngineSettings, EquipmentProfile};
use ironwatch::pipeline::EquipmentRegistry;
use ironwatch::storage::{spawn_recorder, AlertLogKind, HistoryLog};
use ironwatch::types::{
    Alert, AlertCause, AlertSeverity, EngineEvent, HealthRecord, HealthState, ResolutionReason,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}

fn record(equipment_id: &str, minutes: i64, health: f64) -> HealthRecord {
    HealthRecord {
        equipment_id: equipment_id.to_string(),
        timestamp: t0() + Duration::minutes(minutes),
        raw_score: 0.5,
        health,
        state: HealthState::Healthy,
        trend: 0.0,
    }
}

fn alert(equipment_id: &str, seq: u32) -> Alert {
    Alert {
        id: format!("{equipment_id}#{seq}"),
        equipment_id: equipment_id.to_string(),
        severity: AlertSeverity::Warning,
        cause: AlertCause::StateTransition,
        message: format!("{equipment_id} state Healthy -> Warning"),
        raised_at: t0(),
        resolved_at: None,
        resolution: None,
        acknowledged: false,
    }
}

#[test]
fn health_replays_in_time_order_per_equipment() {
    let dir = TempDir::new().unwrap();
    let log = HistoryLog::open(dir.path().join("history.db")).unwrap();

    // Out of order on purpose, and interleaved with a second asset
    log.append_health(&record("PUMP_002", 10, 80.0)).unwrap();
    log.append_health(&record("PUMP_002", 0, 95.0)).unwrap();
    log.append_health(&record("PUMP_0020", 5, 50.0)).unwrap();
    log.append_health(&record("PUMP_002", 5, 90.0)).unwrap();

    let replayed = log.replay_health("PUMP_002").unwrap();
    let health: Vec<f64> = replayed.iter().map(|r| r.health).collect();
    assert_eq!(health, vec![95.0, 90.0, 80.0]);
    assert_eq!(log.replay_health("PUMP_0020").unwrap().len(), 1);
    assert!(log.replay_health("MOTOR_003").unwrap().is_empty());
}

#[test]
fn range_scan_is_half_open() {
    let log = HistoryLog::temporary().unwrap();
    for minutes in 0..6 {
        log.append_health(&record("CNC_001", minutes, 100.0 - minutes as f64)).unwrap();
    }
    let window = log
        .health_between("CNC_001", t0() + Duration::minutes(1), t0() + Duration::minutes(4))
        .unwrap();
    let minutes: Vec<i64> = window.iter().map(|r| (r.timestamp - t0()).num_minutes()).collect();
    assert_eq!(minutes, vec![1, 2, 3]);
}

#[test]
fn records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.db");
    {
        let log = HistoryLog::open(&path).unwrap();
        log.append_health(&record("COMP_004", 0, 99.0)).unwrap();
        log.flush().unwrap();
    }
    let log = HistoryLog::open(&path).unwrap();
    assert_eq!(log.replay_health("COMP_004").unwrap(), vec![record("COMP_004", 0, 99.0)]);
    assert_eq!(log.stats().health_records, 1);
}

#[test]
fn alert_lifecycle_is_logged_as_separate_entries() {
    let log = HistoryLog::temporary().unwrap();
    let opened = alert("MOTOR_003", 1);
    let mut resolved = opened.clone();
    resolved.resolved_at = Some(t0() + Duration::minutes(30));
    resolved.resolution = Some(ResolutionReason::Manual);

    assert!(log.record(&EngineEvent::AlertOpened(opened.clone())).unwrap());
    assert!(log.record(&EngineEvent::AlertResolved(resolved.clone())).unwrap());
    // Events without a history representation are skipped
    assert!(!log
        .record(&EngineEvent::EquipmentRemoved {
            equipment_id: "MOTOR_003".to_string()
        })
        .unwrap());

    let entries = log.alert_events("MOTOR_003").unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind, AlertLogKind::Opened);
    assert_eq!(entries[0].at, opened.raised_at);
    assert_eq!(entries[1].kind, AlertLogKind::Resolved);
    assert_eq!(entries[1].at, t0() + Duration::minutes(30));
    assert_eq!(entries[1].alert, resolved);
    assert_eq!(log.stats().alert_events, 2);
}

#[tokio::test]
async fn recorder_persists_registry_events() {
    let registry = EquipmentRegistry::new(EngineSettings::default()).unwrap();
    registry.register("PUMP_002", EquipmentProfile::default()).unwrap();

    let log = HistoryLog::temporary().unwrap();
    let cancel = CancellationToken::new();
    let handle = spawn_recorder(log.clone(), registry.subscribe(), cancel.clone());

    registry.report_stoppage("PUMP_002", t0()).unwrap();
    registry.reset_equipment("PUMP_002", t0() + Duration::hours(2)).unwrap();

    // Cancellation drains whatever is still queued
    cancel.cancel();
    let stats = handle.await.unwrap();
    assert_eq!(stats.written, 2);
    assert_eq!(stats.failed, 0);

    let entries = log.alert_events("PUMP_002").unwrap();
    let kinds: Vec<AlertLogKind> = entries.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![AlertLogKind::Opened, AlertLogKind::Resolved]);
    assert_eq!(entries[1].alert.resolution, Some(ResolutionReason::ReturnedToHealthy));
}

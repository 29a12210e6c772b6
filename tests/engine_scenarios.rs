//! Engine scenario tests
//!
//! Drive the registry end to end the way the daemon does: register, ingest,
//! tick, and observe the broadcast event stream and pull endpoints.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::time::Duration as StdDuration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use ironwatch::config::{EngineSettings, EnsembleConfig, EquipmentProfile, MetricThreshold, WindowConfig};
use ironwatch::ml_engine::ModelStatus;
use ironwatch::pipeline::{EquipmentInfo, EquipmentRegistry, RegistryError};
use ironwatch::processing::{FeatureVector, IngestOutcome, FEATURES_PER_CHANNEL};
use ironwatch::types::{Channel, EngineEvent, HealthState, ResolutionReason, SensorSample};

// ============================================================================
// Helpers
// ============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}

fn registry() -> EquipmentRegistry {
    EquipmentRegistry::new(EngineSettings {
        workers: 2,
        ..EngineSettings::default()
    })
    .unwrap()
}

/// Two channels, small windows and a short seeded warm-up.
fn fast_profile() -> EquipmentProfile {
    EquipmentProfile {
        channels: vec![Channel::Vibration, Channel::Current],
        window: WindowConfig {
            capacity: 20,
            min_fill: 5,
        },
        ensemble: EnsembleConfig {
            trees: 50,
            subsample_size: 64,
            min_baseline: 16,
            baseline_ticks: 16,
            seed: Some(42),
            ..EnsembleConfig::default()
        },
        ..EquipmentProfile::default()
    }
}

/// Deterministic jitter in [0, 1).
fn jitter(step: i64, salt: i64) -> f64 {
    ((step * 7_919 + salt * 104_729) % 97) as f64 / 97.0
}

/// One reading per channel at `t0 + step` seconds, scaled by `scale`.
fn feed(registry: &EquipmentRegistry, equipment_id: &str, step: i64, scale: f64) {
    let at = t0() + Duration::seconds(step);
    let vibration = (0.2 + 0.02 * jitter(step, 1)) * scale;
    let current = (10.0 + 0.5 * jitter(step, 2)) * scale;
    registry.ingest(equipment_id, Channel::Vibration, at, vibration).unwrap();
    registry.ingest(equipment_id, Channel::Current, at, current).unwrap();
}

fn baseline_vectors(count: usize, dimension: usize) -> Vec<FeatureVector> {
    (0..count)
        .map(|i| {
            let values = (0..dimension).map(|d| 1.0 + jitter(i as i64, d as i64)).collect();
            FeatureVector::new(t0() + Duration::seconds(i as i64), values)
        })
        .collect()
}

fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Warm up `equipment_id` until its model is fitted.
async fn warm_up(registry: &EquipmentRegistry, rx: &mut broadcast::Receiver<EngineEvent>, equipment_id: &str) -> i64 {
    let cancel = CancellationToken::new();
    let mut step = 0;
    let mut fits_started = 0;
    while fits_started == 0 {
        feed(registry, equipment_id, step, 1.0);
        let report = registry.tick(t0() + Duration::seconds(step), &cancel);
        assert_eq!(report.scored, 0, "nothing scores before the model is ready");
        fits_started += report.fits_started;
        step += 1;
        assert!(step < 200, "warm-up never requested a fit");
    }

    let ready = tokio::time::timeout(StdDuration::from_secs(30), async {
        loop {
            match rx.recv().await {
                Ok(EngineEvent::ModelReady { equipment_id: id, baseline_size }) if id == equipment_id => {
                    return baseline_size;
                }
                Ok(_) => {}
                Err(e) => panic!("event stream broke: {e}"),
            }
        }
    })
    .await
    .expect("model fit timed out");
    assert_eq!(ready, 16);
    step
}

// ============================================================================
// Warm-up and scoring
// ============================================================================

#[tokio::test]
async fn warm_up_fits_model_then_every_tick_publishes_health() {
    let registry = registry();
    registry.register("CNC_001", fast_profile()).unwrap();
    let mut rx = registry.subscribe();
    assert_eq!(registry.model_status("CNC_001").unwrap(), ModelStatus::Untrained);

    let mut step = warm_up(&registry, &mut rx, "CNC_001").await;
    assert!(matches!(
        registry.model_status("CNC_001").unwrap(),
        ModelStatus::Ready { baseline_size: 16, .. }
    ));

    let cancel = CancellationToken::new();
    for _ in 0..10 {
        feed(&registry, "CNC_001", step, 1.0);
        let report = registry.tick(t0() + Duration::seconds(step), &cancel);
        assert_eq!(report.scored, 1);
        step += 1;
    }

    let health_events: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::Health(record) => Some(record),
            _ => None,
        })
        .collect();
    assert_eq!(health_events.len(), 10);
    for record in &health_events {
        assert!((0.0..=100.0).contains(&record.health), "health out of range: {}", record.health);
        assert!(record.raw_score.is_finite());
    }
    assert_eq!(registry.health_history("CNC_001", 100).unwrap().len(), 10);
    assert_eq!(registry.latest_health("CNC_001").unwrap(), health_events.last().cloned());
    assert_eq!(registry.monitoring().models_ready, 1);
}

#[tokio::test]
async fn drifting_equipment_escalates_one_step_at_a_time() {
    let registry = registry();
    registry.register("MOTOR_003", fast_profile()).unwrap();
    let mut rx = registry.subscribe();
    let mut step = warm_up(&registry, &mut rx, "MOTOR_003").await;
    drain(&mut rx);

    let cancel = CancellationToken::new();
    for _ in 0..40 {
        feed(&registry, "MOTOR_003", step, 8.0);
        registry.tick(t0() + Duration::seconds(step), &cancel);
        step += 1;
    }

    let events = drain(&mut rx);
    let transitions: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Transition(t) => Some(t),
            _ => None,
        })
        .collect();
    assert!(!transitions.is_empty(), "a grossly drifted asset must leave Healthy");
    for t in &transitions {
        assert_eq!(t.to, t.from.escalated(), "skipped a state: {} -> {}", t.from, t.to);
    }
    assert_ne!(registry.state("MOTOR_003").unwrap(), HealthState::Healthy);
    assert!(events.iter().any(|e| matches!(e, EngineEvent::AlertOpened(_))));
    // One state-transition alert stays open no matter how many escalations
    let open = registry.open_alerts("MOTOR_003").unwrap();
    assert!(open.len() <= 2, "at most one open alert per cause: {open:?}");
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn registration_with_supplied_baseline_is_ready_immediately() {
    let registry = registry();
    let profile = fast_profile();
    let dimension = profile.channels.len() * FEATURES_PER_CHANNEL;
    registry
        .register_with_baseline("PUMP_002", profile, &baseline_vectors(40, dimension))
        .unwrap();
    assert!(matches!(
        registry.model_status("PUMP_002").unwrap(),
        ModelStatus::Ready { baseline_size: 40, .. }
    ));
}

#[test]
fn small_baseline_is_rejected_at_registration() {
    let registry = registry();
    let profile = fast_profile();
    let dimension = profile.channels.len() * FEATURES_PER_CHANNEL;
    let result = registry.register_with_baseline("PUMP_002", profile, &baseline_vectors(10, dimension));
    assert!(matches!(
        result,
        Err(RegistryError::InsufficientBaseline { have: 10, need: 16, .. })
    ));
    assert!(registry.is_empty());
}

#[test]
fn baseline_of_wrong_dimension_is_rejected() {
    let registry = registry();
    let result = registry.register_with_baseline("PUMP_002", fast_profile(), &baseline_vectors(40, 3));
    assert!(matches!(result, Err(RegistryError::Scorer { .. })));
    assert!(registry.is_empty());
}

// ============================================================================
// Ingestion
// ============================================================================

#[test]
fn bad_samples_are_counted_not_fatal() {
    let registry = registry();
    registry.register("CNC_001", fast_profile()).unwrap();
    let at = t0();

    assert!(matches!(
        registry.ingest("CNC_999", Channel::Vibration, at, 0.2),
        Err(RegistryError::UnknownEquipment(_))
    ));
    assert_eq!(
        registry.ingest("CNC_001", Channel::Vibration, at, f64::NAN).unwrap(),
        IngestOutcome::NonFinite
    );
    assert_eq!(
        registry.ingest("CNC_001", Channel::Temperature, at, 71.0).unwrap(),
        IngestOutcome::UnmonitoredChannel
    );
    assert_eq!(
        registry.ingest("CNC_001", Channel::Current, at, 10.2).unwrap(),
        IngestOutcome::Accepted
    );

    let stats = registry.monitoring_at(at);
    assert_eq!(stats.samples_accepted, 1);
    assert_eq!(stats.rejected_unknown_equipment, 1);
    assert_eq!(stats.rejected_non_finite, 1);
    assert_eq!(stats.rejected_unmonitored_channel, 1);
    assert!((stats.ingest_error_rate - 0.75).abs() < 1e-12);
    assert_eq!(stats.stale_equipment, 0);
    assert_eq!(registry.monitoring_at(at + Duration::minutes(5)).stale_equipment, 1);
}

#[test]
fn batch_ingest_keeps_order_and_counts_rejections() {
    let registry = registry();
    registry.register("CNC_001", fast_profile()).unwrap();
    let at = t0();
    let batch = vec![
        SensorSample::new("CNC_001", Channel::Vibration, at, 0.21),
        SensorSample::new("CNC_001", Channel::Vibration, at, f64::INFINITY),
        SensorSample::new("GHOST", Channel::Vibration, at, 0.21),
        SensorSample::new("CNC_001", Channel::Current, at, 10.0),
    ];
    let report = registry.ingest_batch(&batch);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejected, 2);
}

// ============================================================================
// Removal and fleet view
// ============================================================================

#[test]
fn unregister_resolves_every_open_alert() {
    let registry = registry();
    let mut profile = fast_profile();
    // Any scored tick crosses this threshold
    profile.alerts.thresholds = vec![MetricThreshold {
        metric: "anomaly_score".to_string(),
        warning: 0.0,
        critical: 2.0,
    }];
    let dimension = profile.channels.len() * FEATURES_PER_CHANNEL;
    registry
        .register_with_baseline("COMP_004", profile, &baseline_vectors(40, dimension))
        .unwrap();
    let mut rx = registry.subscribe();

    for step in 0..5 {
        feed(&registry, "COMP_004", step, 1.0);
    }
    let report = registry.tick(t0() + Duration::seconds(5), &CancellationToken::new());
    assert_eq!(report.scored, 1);
    registry.report_stoppage("COMP_004", t0() + Duration::seconds(6)).unwrap();
    assert_eq!(registry.state("COMP_004").unwrap(), HealthState::Failed);
    assert_eq!(registry.open_alerts("COMP_004").unwrap().len(), 2);

    registry.unregister("COMP_004").unwrap();
    assert!(matches!(
        registry.open_alerts("COMP_004"),
        Err(RegistryError::UnknownEquipment(_))
    ));

    let events = drain(&mut rx);
    let removed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::AlertResolved(a) if a.resolution == Some(ResolutionReason::EquipmentRemoved) => Some(a),
            _ => None,
        })
        .collect();
    assert_eq!(removed.len(), 2);
    assert!(removed.iter().all(|a| !a.is_open()));
    assert!(matches!(
        events.last(),
        Some(EngineEvent::EquipmentRemoved { equipment_id }) if equipment_id == "COMP_004"
    ));
    assert!(matches!(registry.unregister("COMP_004"), Err(RegistryError::UnknownEquipment(_))));
}

#[test]
fn reset_after_maintenance_returns_to_healthy() {
    let registry = registry();
    registry.register("PUMP_002", fast_profile()).unwrap();
    registry.report_stoppage("PUMP_002", t0()).unwrap();
    assert_eq!(registry.open_alerts("PUMP_002").unwrap().len(), 1);

    registry.reset_equipment("PUMP_002", t0() + Duration::hours(4)).unwrap();
    assert_eq!(registry.state("PUMP_002").unwrap(), HealthState::Healthy);
    assert!(registry.open_alerts("PUMP_002").unwrap().is_empty());
    let closed = registry.alerts("PUMP_002").unwrap();
    assert_eq!(closed[0].resolution, Some(ResolutionReason::ReturnedToHealthy));
}

#[test]
fn fleet_summary_counts_by_state() {
    let registry = registry();
    registry
        .register_with_info(
            "CNC_001",
            fast_profile(),
            EquipmentInfo {
                equipment_type: Some("CNC Machine".to_string()),
                location: Some("Production Line A".to_string()),
            },
        )
        .unwrap();
    registry.register("PUMP_002", fast_profile()).unwrap();
    registry.report_stoppage("PUMP_002", t0()).unwrap();

    let summary = registry.fleet_summary();
    assert_eq!(summary.total_equipment, 2);
    assert_eq!(summary.healthy, 1);
    assert_eq!(summary.needing_maintenance, 1);
    assert_eq!(summary.total_estimated_savings, 0.0);

    let cnc = &summary.equipment[0];
    assert_eq!(cnc.equipment_id, "CNC_001");
    assert_eq!(cnc.location.as_deref(), Some("Production Line A"));
    assert_eq!(cnc.health, None);
    assert_eq!(cnc.model, ModelStatus::Untrained);
    let pump = &summary.equipment[1];
    assert_eq!(pump.state, HealthState::Failed);
    assert_eq!(pump.open_alerts, 1);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn ingest_runs_alongside_ticks_and_background_fit() {
    const STEPS: i64 = 3_000;

    let registry = std::sync::Arc::new(registry());
    let mut profile = fast_profile();
    profile.health.history_capacity = 100_000;
    registry.register("COMP_004", profile).unwrap();

    let ingest = {
        let registry = std::sync::Arc::clone(&registry);
        std::thread::spawn(move || {
            for step in 0..STEPS {
                feed(&registry, "COMP_004", step, 1.0);
                if step % 64 == 0 {
                    std::thread::sleep(StdDuration::from_millis(1));
                }
            }
        })
    };

    let cancel = CancellationToken::new();
    let deadline = std::time::Instant::now() + StdDuration::from_secs(60);
    let mut scored = 0;
    let mut fits_started = 0;
    let mut tick = 0;
    loop {
        let report = registry.tick(t0() + Duration::seconds(tick), &cancel);
        scored += report.scored;
        fits_started += report.fits_started;
        assert_eq!(report.faulted, 0);
        tick += 1;

        let ready = matches!(registry.model_status("COMP_004").unwrap(), ModelStatus::Ready { .. });
        if ingest.is_finished() && ready && scored >= 5 {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "fit never completed under load");
        std::thread::sleep(StdDuration::from_millis(1));
    }
    ingest.join().unwrap();

    assert_eq!(fits_started, 1);
    let stats = registry.monitoring_at(t0() + Duration::seconds(STEPS));
    assert_eq!(stats.samples_accepted, 2 * STEPS as u64);
    assert_eq!(stats.ingest_error_rate, 0.0);
    assert_eq!(registry.health_history("COMP_004", usize::MAX).unwrap().len(), scored);
}

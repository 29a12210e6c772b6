//! Equipment Registry
//!
//! Owns one `EquipmentPipeline` per asset and is the only component that
//! knows about more than one. Telemetry fans in through `ingest`, engine
//! events fan out through a broadcast channel, and `tick` evaluates every
//! pipeline in parallel on a dedicated rayon pool.
//!
//! ```ignore
//! let registry = EquipmentRegistry::new(config.engine.clone())?;
//! registry.register("PUMP_002", config.profile_for("pump"))?;
//! let mut events = registry.subscribe();
//! registry.ingest("PUMP_002", Channel::Pressure, Utc::now(), 151.2)?;
//! let report = registry.tick(Utc::now(), &CancellationToken::new());
//! ```

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::equipment::{EquipmentInfo, EquipmentPipeline, PipelineTick, TickOutcome};
use crate::config::{EngineSettings, EquipmentProfile};
use crate::ml_engine::{ModelStatus, ScorerError};
use crate::processing::{FeatureVector, IngestOutcome};
use crate::types::{
    Alert, Channel, EngineEvent, HealthRecord, HealthState, MaintenanceRecommendation, SensorSample,
};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown equipment: {0}")]
    UnknownEquipment(String),

    #[error("Equipment already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Baseline for {equipment_id} too small: {have} vectors, need at least {need}")]
    InsufficientBaseline {
        equipment_id: String,
        have: usize,
        need: usize,
    },

    #[error("Invalid configuration for {equipment_id}: {}", .errors.join("; "))]
    InvalidConfiguration {
        equipment_id: String,
        errors: Vec<String>,
    },

    #[error("Unknown alert: {0}")]
    UnknownAlert(String),

    #[error("Model fit for {equipment_id} failed: {source}")]
    Scorer {
        equipment_id: String,
        #[source]
        source: ScorerError,
    },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}

// ============================================================================
// Reports
// ============================================================================

/// Summary of one `tick` across the fleet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub at: Option<DateTime<Utc>>,
    pub scored: usize,
    pub pending: usize,
    pub faulted: usize,
    /// Pipelines not started because cancellation was requested
    pub skipped: usize,
    /// Pipelines whose class tick interval had not elapsed
    pub not_due: usize,
    pub fits_started: usize,
    pub events: usize,
}

/// Ingestion counters and operational health of the engine itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoringStats {
    pub equipment: usize,
    pub models_ready: usize,
    pub samples_accepted: u64,
    pub rejected_unknown_equipment: u64,
    pub rejected_non_finite: u64,
    pub rejected_unmonitored_channel: u64,
    /// Rejected / (accepted + rejected)
    pub ingest_error_rate: f64,
    pub stale_equipment: usize,
    pub ticks: u64,
    pub alerts_suppressed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSummary {
    pub equipment_id: String,
    pub equipment_type: Option<String>,
    pub location: Option<String>,
    pub state: HealthState,
    pub health: Option<f64>,
    pub open_alerts: usize,
    pub model: ModelStatus,
}

/// Dashboard-level view of the whole fleet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub total_equipment: usize,
    pub healthy: usize,
    /// Non-Healthy, or carrying a maintenance recommendation
    pub needing_maintenance: usize,
    pub anomalies_detected: u64,
    pub total_estimated_savings: f64,
    pub equipment: Vec<EquipmentSummary>,
}

/// Result of `ingest_batch`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Default)]
struct IngestCounters {
    accepted: AtomicU64,
    unknown: AtomicU64,
    non_finite: AtomicU64,
    unmonitored: AtomicU64,
}

// ============================================================================
// Registry
// ============================================================================

pub struct EquipmentRegistry {
    settings: EngineSettings,
    pipelines: RwLock<HashMap<String, Arc<EquipmentPipeline>>>,
    pool: Arc<rayon::ThreadPool>,
    events: broadcast::Sender<EngineEvent>,
    counters: IngestCounters,
    ticks: AtomicU64,
}

impl EquipmentRegistry {
    pub fn new(settings: EngineSettings) -> Result<Self, RegistryError> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("ironwatch-worker-{i}"));
        if settings.workers > 0 {
            builder = builder.num_threads(settings.workers);
        }
        let pool = builder
            .build()
            .map_err(|e| RegistryError::WorkerPool(e.to_string()))?;
        let (events, _) = broadcast::channel(settings.event_buffer.max(1));
        info!(
            workers = pool.current_num_threads(),
            event_buffer = settings.event_buffer,
            "Equipment registry started"
        );
        Ok(Self {
            settings,
            pipelines: RwLock::new(HashMap::new()),
            pool: Arc::new(pool),
            events,
            counters: IngestCounters::default(),
            ticks: AtomicU64::new(0),
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Push stream of every engine event. Slow receivers lag rather than
    /// block the engine.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn publish(&self, events: Vec<EngineEvent>) -> usize {
        let count = events.len();
        for event in events {
            // No subscribers is not an error
            let _ = self.events.send(event);
        }
        count
    }

    fn get(&self, equipment_id: &str) -> Result<Arc<EquipmentPipeline>, RegistryError> {
        self.pipelines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(equipment_id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownEquipment(equipment_id.to_string()))
    }

    fn snapshot(&self) -> Vec<Arc<EquipmentPipeline>> {
        let mut pipelines: Vec<_> = self
            .pipelines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        pipelines.sort_by(|a, b| a.id().cmp(b.id()));
        pipelines
    }

    pub fn equipment_ids(&self) -> Vec<String> {
        self.snapshot().iter().map(|p| p.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.pipelines.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register an asset; its model trains from warm-up telemetry.
    pub fn register(&self, equipment_id: &str, profile: EquipmentProfile) -> Result<(), RegistryError> {
        self.register_with_info(equipment_id, profile, EquipmentInfo::default())
    }

    pub fn register_with_info(
        &self,
        equipment_id: &str,
        profile: EquipmentProfile,
        info: EquipmentInfo,
    ) -> Result<(), RegistryError> {
        let pipeline = self.build_pipeline(equipment_id, profile, info)?;
        self.insert(pipeline)
    }

    /// Register an asset and fit its model from a supplied baseline corpus
    /// before it accepts telemetry.
    pub fn register_with_baseline(
        &self,
        equipment_id: &str,
        profile: EquipmentProfile,
        baseline: &[FeatureVector],
    ) -> Result<(), RegistryError> {
        let need = profile.ensemble.min_baseline;
        if baseline.len() < need {
            return Err(RegistryError::InsufficientBaseline {
                equipment_id: equipment_id.to_string(),
                have: baseline.len(),
                need,
            });
        }
        let pipeline = self.build_pipeline(equipment_id, profile, EquipmentInfo::default())?;
        if self.get(equipment_id).is_ok() {
            return Err(RegistryError::AlreadyRegistered(equipment_id.to_string()));
        }

        let vectors: Vec<Vec<f64>> = baseline.iter().map(|v| v.values.clone()).collect();
        pipeline.mark_training();
        let size = self
            .pool
            .install(|| pipeline.fit_model(vectors))
            .map_err(|source| match source {
                ScorerError::InsufficientBaseline { have, need } => RegistryError::InsufficientBaseline {
                    equipment_id: equipment_id.to_string(),
                    have,
                    need,
                },
                source => RegistryError::Scorer {
                    equipment_id: equipment_id.to_string(),
                    source,
                },
            })?;

        self.insert(pipeline)?;
        self.publish(vec![EngineEvent::ModelReady {
            equipment_id: equipment_id.to_string(),
            baseline_size: size,
        }]);
        Ok(())
    }

    fn build_pipeline(
        &self,
        equipment_id: &str,
        profile: EquipmentProfile,
        info: EquipmentInfo,
    ) -> Result<Arc<EquipmentPipeline>, RegistryError> {
        let errors = profile.validation_errors();
        if !errors.is_empty() {
            return Err(RegistryError::InvalidConfiguration {
                equipment_id: equipment_id.to_string(),
                errors,
            });
        }
        Ok(Arc::new(EquipmentPipeline::new(equipment_id, profile, info)))
    }

    fn insert(&self, pipeline: Arc<EquipmentPipeline>) -> Result<(), RegistryError> {
        let mut pipelines = self.pipelines.write().unwrap_or_else(PoisonError::into_inner);
        if pipelines.contains_key(pipeline.id()) {
            return Err(RegistryError::AlreadyRegistered(pipeline.id().to_string()));
        }
        info!(
            equipment_id = %pipeline.id(),
            channels = pipeline.profile().channels.len(),
            dimension = pipeline.dimension(),
            "Equipment registered"
        );
        pipelines.insert(pipeline.id().to_string(), pipeline);
        Ok(())
    }

    /// Tear down a pipeline; its open alerts are resolved as removed.
    pub fn unregister(&self, equipment_id: &str) -> Result<(), RegistryError> {
        let pipeline = self
            .pipelines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(equipment_id)
            .ok_or_else(|| RegistryError::UnknownEquipment(equipment_id.to_string()))?;
        let events = pipeline.shutdown(Utc::now());
        info!(equipment_id, resolved = events.len().saturating_sub(1), "Equipment unregistered");
        self.publish(events);
        Ok(())
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Route one reading to its pipeline. Unknown equipment is counted and
    /// reported, never fatal.
    pub fn ingest(
        &self,
        equipment_id: &str,
        channel: Channel,
        timestamp: DateTime<Utc>,
        value: f64,
    ) -> Result<IngestOutcome, RegistryError> {
        let pipeline = match self.get(equipment_id) {
            Ok(p) => p,
            Err(e) => {
                self.counters.unknown.fetch_add(1, Ordering::Relaxed);
                debug!(equipment_id, "Sample for unknown equipment dropped");
                return Err(e);
            }
        };
        let outcome = pipeline.ingest(channel, timestamp, value);
        match outcome {
            IngestOutcome::Accepted => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
            }
            IngestOutcome::NonFinite => {
                self.counters.non_finite.fetch_add(1, Ordering::Relaxed);
                warn!(equipment_id, %channel, value, "Non-finite sample rejected");
            }
            IngestOutcome::UnmonitoredChannel => {
                self.counters.unmonitored.fetch_add(1, Ordering::Relaxed);
                debug!(equipment_id, %channel, "Sample for unmonitored channel dropped");
            }
        }
        Ok(outcome)
    }

    pub fn ingest_sample(&self, sample: &SensorSample) -> Result<IngestOutcome, RegistryError> {
        self.ingest(&sample.equipment_id, sample.channel, sample.timestamp, sample.value)
    }

    /// Ingest in order; rejections are counted, not returned.
    pub fn ingest_batch(&self, samples: &[SensorSample]) -> BatchReport {
        let mut report = BatchReport::default();
        for sample in samples {
            match self.ingest_sample(sample) {
                Ok(IngestOutcome::Accepted) => report.accepted += 1,
                _ => report.rejected += 1,
            }
        }
        report
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Evaluate every pipeline once.
    ///
    /// Cancellation is checked before each pipeline starts; a started
    /// pipeline always finishes its tick. A panic inside one pipeline is
    /// contained and reported as faulted.
    pub fn tick(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> TickReport {
        let pipelines = self.snapshot();
        let results: Vec<_> = self.pool.install(|| {
            pipelines
                .par_iter()
                .map(|pipeline| {
                    if cancel.is_cancelled() {
                        return TickSlot::Cancelled;
                    }
                    if !pipeline.claim_tick(now) {
                        return TickSlot::NotDue;
                    }
                    TickSlot::Ran(Arc::clone(pipeline), contained(|| pipeline.tick(now)))
                })
                .collect()
        });

        let mut report = TickReport {
            at: Some(now),
            ..TickReport::default()
        };
        for result in results {
            let (pipeline, result) = match result {
                TickSlot::Cancelled => {
                    report.skipped += 1;
                    continue;
                }
                TickSlot::NotDue => {
                    report.not_due += 1;
                    continue;
                }
                TickSlot::Ran(pipeline, result) => (pipeline, result),
            };
            let tick = match result {
                Ok(tick) => tick,
                Err(_) => {
                    warn!(equipment_id = %pipeline.id(), "Pipeline tick panicked");
                    report.faulted += 1;
                    continue;
                }
            };
            match tick.outcome {
                TickOutcome::Scored { .. } => report.scored += 1,
                TickOutcome::Pending(_) => report.pending += 1,
                TickOutcome::Faulted(_) => report.faulted += 1,
            }
            report.events += self.publish(tick.events);
            if let Some(baseline) = tick.fit_request {
                self.spawn_fit(pipeline, baseline);
                report.fits_started += 1;
            }
        }

        self.ticks.fetch_add(1, Ordering::Relaxed);
        if report.skipped > 0 {
            info!(skipped = report.skipped, "Tick cancelled before all equipment ran");
        }
        debug!(
            scored = report.scored,
            pending = report.pending,
            faulted = report.faulted,
            events = report.events,
            "Tick complete"
        );
        report
    }

    fn spawn_fit(&self, pipeline: Arc<EquipmentPipeline>, baseline: Vec<Vec<f64>>) {
        let events = self.events.clone();
        self.pool.spawn(move || {
            if let Ok(baseline_size) = pipeline.fit_model(baseline) {
                let _ = events.send(EngineEvent::ModelReady {
                    equipment_id: pipeline.id().to_string(),
                    baseline_size,
                });
            }
        });
    }

    // ========================================================================
    // Control
    // ========================================================================

    pub fn report_stoppage(&self, equipment_id: &str, at: DateTime<Utc>) -> Result<(), RegistryError> {
        let events = self.get(equipment_id)?.report_stoppage(at);
        self.publish(events);
        Ok(())
    }

    pub fn reset_equipment(&self, equipment_id: &str, at: DateTime<Utc>) -> Result<(), RegistryError> {
        let events = self.get(equipment_id)?.reset(at);
        self.publish(events);
        Ok(())
    }

    fn pipeline_for_alert(&self, alert_id: &str) -> Result<Arc<EquipmentPipeline>, RegistryError> {
        // Alert ids are "<equipment_id>#<seq>"
        alert_id
            .rsplit_once('#')
            .and_then(|(equipment_id, _)| self.get(equipment_id).ok())
            .ok_or_else(|| RegistryError::UnknownAlert(alert_id.to_string()))
    }

    pub fn acknowledge_alert(&self, alert_id: &str) -> Result<Alert, RegistryError> {
        self.pipeline_for_alert(alert_id)?
            .acknowledge_alert(alert_id)
            .ok_or_else(|| RegistryError::UnknownAlert(alert_id.to_string()))
    }

    /// Resolve by id. Resolving an already resolved alert returns it unchanged.
    pub fn resolve_alert(&self, alert_id: &str, at: DateTime<Utc>) -> Result<Alert, RegistryError> {
        let resolution = self
            .pipeline_for_alert(alert_id)?
            .resolve_alert(alert_id, at)
            .ok_or_else(|| RegistryError::UnknownAlert(alert_id.to_string()))?;
        if resolution.changed {
            self.publish(vec![EngineEvent::AlertResolved(resolution.alert.clone())]);
        }
        Ok(resolution.alert)
    }

    // ========================================================================
    // Pull endpoints
    // ========================================================================

    pub fn latest_health(&self, equipment_id: &str) -> Result<Option<HealthRecord>, RegistryError> {
        Ok(self.get(equipment_id)?.latest_health())
    }

    pub fn health_history(&self, equipment_id: &str, limit: usize) -> Result<Vec<HealthRecord>, RegistryError> {
        Ok(self.get(equipment_id)?.health_history(limit))
    }

    pub fn state(&self, equipment_id: &str) -> Result<HealthState, RegistryError> {
        Ok(self.get(equipment_id)?.state())
    }

    pub fn alerts(&self, equipment_id: &str) -> Result<Vec<Alert>, RegistryError> {
        Ok(self.get(equipment_id)?.alerts())
    }

    pub fn open_alerts(&self, equipment_id: &str) -> Result<Vec<Alert>, RegistryError> {
        Ok(self.get(equipment_id)?.open_alerts())
    }

    pub fn latest_recommendation(
        &self,
        equipment_id: &str,
    ) -> Result<Option<MaintenanceRecommendation>, RegistryError> {
        Ok(self.get(equipment_id)?.latest_recommendation())
    }

    pub fn model_status(&self, equipment_id: &str) -> Result<ModelStatus, RegistryError> {
        Ok(self.get(equipment_id)?.model_status())
    }

    pub fn monitoring(&self) -> MonitoringStats {
        self.monitoring_at(Utc::now())
    }

    /// Stats with staleness judged against `now`.
    pub fn monitoring_at(&self, now: DateTime<Utc>) -> MonitoringStats {
        let pipelines = self.snapshot();
        let accepted = self.counters.accepted.load(Ordering::Relaxed);
        let unknown = self.counters.unknown.load(Ordering::Relaxed);
        let non_finite = self.counters.non_finite.load(Ordering::Relaxed);
        let unmonitored = self.counters.unmonitored.load(Ordering::Relaxed);
        let rejected = unknown + non_finite + unmonitored;
        let total = accepted + rejected;

        MonitoringStats {
            equipment: pipelines.len(),
            models_ready: pipelines
                .iter()
                .filter(|p| matches!(p.model_status(), ModelStatus::Ready { .. }))
                .count(),
            samples_accepted: accepted,
            rejected_unknown_equipment: unknown,
            rejected_non_finite: non_finite,
            rejected_unmonitored_channel: unmonitored,
            ingest_error_rate: if total == 0 {
                0.0
            } else {
                rejected as f64 / total as f64
            },
            stale_equipment: pipelines
                .iter()
                .filter(|p| p.is_stale(now, self.settings.stale_after_secs))
                .count(),
            ticks: self.ticks.load(Ordering::Relaxed),
            alerts_suppressed: pipelines.iter().map(|p| p.alerts_suppressed()).sum(),
        }
    }

    pub fn fleet_summary(&self) -> FleetSummary {
        let pipelines = self.snapshot();
        let mut summary = FleetSummary {
            total_equipment: pipelines.len(),
            ..FleetSummary::default()
        };
        for pipeline in &pipelines {
            let state = pipeline.state();
            let recommendation = pipeline.latest_recommendation();
            if state.is_healthy() {
                summary.healthy += 1;
            }
            if !state.is_healthy() || recommendation.is_some() {
                summary.needing_maintenance += 1;
            }
            summary.anomalies_detected += pipeline.anomalies_detected();
            summary.total_estimated_savings += recommendation.map_or(0.0, |r| r.estimated_savings);
            summary.equipment.push(EquipmentSummary {
                equipment_id: pipeline.id().to_string(),
                equipment_type: pipeline.info().equipment_type.clone(),
                location: pipeline.info().location.clone(),
                state,
                health: pipeline.latest_health().map(|r| r.health),
                open_alerts: pipeline.open_alerts().len(),
                model: pipeline.model_status(),
            });
        }
        summary
    }
}

enum TickSlot {
    Cancelled,
    NotDue,
    Ran(Arc<EquipmentPipeline>, std::thread::Result<PipelineTick>),
}

/// Run `f`, turning a panic into `Err` instead of unwinding into the pool.
fn contained<T>(f: impl FnOnce() -> T) -> std::thread::Result<T> {
    catch_unwind(AssertUnwindSafe(f))
}

//! Per-equipment pipeline
//!
//! Feature Extractor → Scorer → Health Evaluator → {Maintenance Predictor,
//! Alert Manager}, owned by exactly one asset.
//!
//! Locking: `ingest` only touches the extractor's per-channel mutex. `tick`
//! and the control operations (stoppage, reset, alert lifecycle) run under
//! the single core mutex, so the stages of one tick never interleave with
//! each other or with a control operation. The model slot is swapped
//! atomically by the background fit.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::alerts::{AlertManager, Resolution, ANOMALY_SCORE_METRIC};
use crate::config::EquipmentProfile;
use crate::health::HealthEvaluator;
use crate::maintenance::{MaintenancePredictor, RecommendationChange};
use crate::ml_engine::{
    IsolationEnsemble, ModelSlot, ModelStatus, ReadyModel, ScoreCalibration, ScorerError,
};
use crate::processing::{Evaluation, FeatureExtractor, IngestOutcome};
use crate::types::{
    Alert, Channel, EngineEvent, HealthRecord, HealthState, MaintenanceRecommendation,
    ResolutionReason,
};

/// Descriptive labels carried alongside an equipment registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentInfo {
    pub equipment_type: Option<String>,
    pub location: Option<String>,
}

/// Why a tick did not produce a HealthRecord.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingReason {
    /// A channel window is below its minimum fill
    WindowFilling { channel: Channel, have: usize, need: usize },
    /// Warm-up: feature vectors are being collected for the baseline
    CollectingBaseline { have: usize, need: usize },
    /// The background fit has not finished
    Training,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Pending(PendingReason),
    Scored { health: f64, state: HealthState },
    Faulted(String),
}

/// Everything one tick produced.
#[derive(Debug)]
pub struct PipelineTick {
    pub outcome: TickOutcome,
    pub events: Vec<EngineEvent>,
    /// Baseline to fit on a background worker, when warm-up just completed
    pub fit_request: Option<Vec<Vec<f64>>>,
}

impl PipelineTick {
    fn pending(reason: PendingReason) -> Self {
        Self {
            outcome: TickOutcome::Pending(reason),
            events: Vec::new(),
            fit_request: None,
        }
    }
}

struct PipelineCore {
    health: HealthEvaluator,
    predictor: MaintenancePredictor,
    alerts: AlertManager,
    baseline: Vec<Vec<f64>>,
    anomalies_detected: u64,
    ticks_scored: u64,
}

const NEVER: i64 = i64::MIN;

pub struct EquipmentPipeline {
    id: String,
    info: EquipmentInfo,
    profile: EquipmentProfile,
    extractor: FeatureExtractor,
    model: ModelSlot,
    core: Mutex<PipelineCore>,
    last_sample_ms: AtomicI64,
    last_tick_ms: AtomicI64,
    samples_accepted: AtomicU64,
}

impl EquipmentPipeline {
    /// Build a pipeline from an already validated profile.
    pub fn new(id: impl Into<String>, profile: EquipmentProfile, info: EquipmentInfo) -> Self {
        let id = id.into();
        let extractor = FeatureExtractor::new(&profile.ordered_channels(), &profile.window);
        let core = PipelineCore {
            health: HealthEvaluator::new(id.clone(), profile.health.clone()),
            predictor: MaintenancePredictor::new(
                id.clone(),
                profile.maintenance.clone(),
                profile.cost.clone(),
                profile.health.failed_threshold,
                profile.health.trend_window,
            ),
            alerts: AlertManager::new(id.clone(), profile.alerts.clone()),
            baseline: Vec::with_capacity(profile.ensemble.baseline_ticks),
            anomalies_detected: 0,
            ticks_scored: 0,
        };
        Self {
            id,
            info,
            profile,
            extractor,
            model: ModelSlot::new(),
            core: Mutex::new(core),
            last_sample_ms: AtomicI64::new(NEVER),
            last_tick_ms: AtomicI64::new(NEVER),
            samples_accepted: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn info(&self) -> &EquipmentInfo {
        &self.info
    }

    pub fn profile(&self) -> &EquipmentProfile {
        &self.profile
    }

    /// Length of the feature vectors this pipeline scores.
    pub fn dimension(&self) -> usize {
        self.extractor.dimension()
    }

    fn core(&self) -> MutexGuard<'_, PipelineCore> {
        // Core state is only mutated after every value of a step is computed
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    pub fn ingest(&self, channel: Channel, timestamp: DateTime<Utc>, value: f64) -> IngestOutcome {
        let outcome = self.extractor.ingest(channel, timestamp, value);
        if outcome == IngestOutcome::Accepted {
            self.samples_accepted.fetch_add(1, Ordering::Relaxed);
            self.last_sample_ms
                .fetch_max(timestamp.timestamp_millis(), Ordering::Relaxed);
        }
        outcome
    }

    pub fn samples_accepted(&self) -> u64 {
        self.samples_accepted.load(Ordering::Relaxed)
    }

    pub fn last_sample_at(&self) -> Option<DateTime<Utc>> {
        match self.last_sample_ms.load(Ordering::Relaxed) {
            NEVER => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    /// No sample within `stale_after_secs` of `now` (or none ever).
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after_secs: u64) -> bool {
        match self.last_sample_at() {
            None => true,
            Some(last) => (now - last).num_seconds() > stale_after_secs as i64,
        }
    }

    // ========================================================================
    // Model
    // ========================================================================

    /// Fit the ensemble and install it with its calibration.
    ///
    /// Runs on a worker thread; on failure the slot records the reason and
    /// warm-up starts over.
    pub fn fit_model(&self, baseline: Vec<Vec<f64>>) -> Result<usize, ScorerError> {
        let size = baseline.len();
        let result = self.build_model(&baseline);
        match result {
            Ok(model) => {
                info!(
                    equipment_id = %self.id,
                    baseline_size = size,
                    floor = model.calibration.floor,
                    ceiling = model.calibration.ceiling,
                    "Model ready"
                );
                self.model.install(model);
                Ok(size)
            }
            Err(e) => {
                warn!(equipment_id = %self.id, error = %e, "Model fit failed");
                self.model.mark_failed(e.to_string());
                Err(e)
            }
        }
    }

    fn build_model(&self, baseline: &[Vec<f64>]) -> Result<ReadyModel, ScorerError> {
        let expected = self.dimension();
        if let Some(bad) = baseline.iter().find(|v| v.len() != expected) {
            return Err(ScorerError::DimensionMismatch {
                expected,
                got: bad.len(),
            });
        }
        let config = &self.profile.ensemble;
        let ensemble = IsolationEnsemble::fit(baseline, config)?;
        let calibration = if config.calibrate {
            ScoreCalibration::from_baseline(&ensemble, baseline, config.score_ceiling)?
        } else {
            ScoreCalibration::identity()
        };
        Ok(ReadyModel {
            ensemble,
            calibration,
            baseline_size: baseline.len(),
            trained_at: Utc::now(),
        })
    }

    pub fn mark_training(&self) {
        self.model.mark_training();
    }

    pub fn model_status(&self) -> ModelStatus {
        self.model.status()
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Reserve the evaluation slot at `now` if the class tick interval has
    /// elapsed since the last claimed one. Always true without an interval.
    pub fn claim_tick(&self, now: DateTime<Utc>) -> bool {
        let Some(interval) = self.profile.tick_interval_secs else {
            return true;
        };
        let now_ms = now.timestamp_millis();
        let interval_ms = i64::try_from(interval.saturating_mul(1000)).unwrap_or(i64::MAX);
        let mut last = self.last_tick_ms.load(Ordering::Acquire);
        loop {
            if last != NEVER && now_ms.saturating_sub(last) < interval_ms {
                return false;
            }
            match self
                .last_tick_ms
                .compare_exchange_weak(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(current) => last = current,
            }
        }
    }

    /// One evaluation cycle.
    pub fn tick(&self, now: DateTime<Utc>) -> PipelineTick {
        let vector = match self.extractor.evaluate(now) {
            Evaluation::Ready(v) => v,
            Evaluation::Pending { channel, have, need } => {
                return PipelineTick::pending(PendingReason::WindowFilling { channel, have, need });
            }
        };

        let mut core = self.core();

        let scored = match self.model.score(&vector.values) {
            Ok(scored) => scored,
            Err(ScorerError::NotFitted) => return self.collect_baseline(&mut core, vector.values),
            Err(e) => {
                warn!(equipment_id = %self.id, error = %e, "Scoring failed");
                return PipelineTick {
                    outcome: TickOutcome::Faulted(e.to_string()),
                    events: Vec::new(),
                    fit_request: None,
                };
            }
        };

        let mut events = Vec::new();
        let update = core.health.update_calibrated(scored.raw, scored.calibrated, now);
        let outcome = TickOutcome::Scored {
            health: update.record.health,
            state: update.record.state,
        };
        events.push(EngineEvent::Health(update.record));
        if let Some(transition) = update.transition {
            events.extend(core.alerts.on_transition(transition.from, transition.to, now));
            events.push(EngineEvent::Transition(transition));
        }

        events.extend(core.alerts.on_threshold_cross(ANOMALY_SCORE_METRIC, scored.raw, now));
        let anomalous = self
            .profile
            .alerts
            .thresholds
            .iter()
            .find(|t| t.metric == ANOMALY_SCORE_METRIC)
            .map_or(scored.calibrated >= 1.0, |t| scored.raw >= t.warning);
        if anomalous {
            core.anomalies_detected += 1;
        }
        core.ticks_scored += 1;

        let recent = core.health.recent();
        match core.predictor.refresh(&recent) {
            RecommendationChange::Updated(rec) => events.push(EngineEvent::Maintenance(rec)),
            RecommendationChange::Cleared => events.push(EngineEvent::MaintenanceCleared {
                equipment_id: self.id.clone(),
                at: now,
            }),
            RecommendationChange::Unchanged => {}
        }

        PipelineTick {
            outcome,
            events,
            fit_request: None,
        }
    }

    fn collect_baseline(&self, core: &mut PipelineCore, values: Vec<f64>) -> PipelineTick {
        if !self.model.can_train() {
            return PipelineTick::pending(PendingReason::Training);
        }
        let need = self.profile.ensemble.baseline_ticks;
        core.baseline.push(values);
        if core.baseline.len() < need {
            debug!(equipment_id = %self.id, have = core.baseline.len(), need, "Collecting baseline");
            return PipelineTick::pending(PendingReason::CollectingBaseline {
                have: core.baseline.len(),
                need,
            });
        }

        self.model.mark_training();
        let baseline = std::mem::take(&mut core.baseline);
        info!(equipment_id = %self.id, baseline_size = baseline.len(), "Baseline collected, fitting model");
        PipelineTick {
            outcome: TickOutcome::Pending(PendingReason::Training),
            events: Vec::new(),
            fit_request: Some(baseline),
        }
    }

    // ========================================================================
    // Control
    // ========================================================================

    pub fn report_stoppage(&self, at: DateTime<Utc>) -> Vec<EngineEvent> {
        let mut core = self.core();
        let Some(transition) = core.health.report_stoppage(at) else {
            return Vec::new();
        };
        let mut events = core.alerts.on_transition(transition.from, transition.to, at);
        events.push(EngineEvent::Transition(transition));
        events
    }

    /// Back to Healthy after maintenance: clears open alerts and the
    /// published recommendation. The fitted model is kept.
    pub fn reset(&self, at: DateTime<Utc>) -> Vec<EngineEvent> {
        let mut core = self.core();
        let mut events = core.alerts.resolve_all(ResolutionReason::ReturnedToHealthy, at);
        if let Some(transition) = core.health.reset(at) {
            events.push(EngineEvent::Transition(transition));
        }
        if core.predictor.clear() {
            events.push(EngineEvent::MaintenanceCleared {
                equipment_id: self.id.clone(),
                at,
            });
        }
        events
    }

    pub fn acknowledge_alert(&self, alert_id: &str) -> Option<Alert> {
        self.core().alerts.acknowledge(alert_id)
    }

    pub fn resolve_alert(&self, alert_id: &str, at: DateTime<Utc>) -> Option<Resolution> {
        self.core().alerts.resolve(alert_id, at, ResolutionReason::Manual)
    }

    /// Close out the pipeline before it is dropped.
    pub fn shutdown(&self, at: DateTime<Utc>) -> Vec<EngineEvent> {
        let mut events = self
            .core()
            .alerts
            .resolve_all(ResolutionReason::EquipmentRemoved, at);
        events.push(EngineEvent::EquipmentRemoved {
            equipment_id: self.id.clone(),
        });
        events
    }

    // ========================================================================
    // Pull endpoints
    // ========================================================================

    pub fn state(&self) -> HealthState {
        self.core().health.state()
    }

    pub fn latest_health(&self) -> Option<HealthRecord> {
        self.core().health.latest().cloned()
    }

    /// Up to `limit` most recent records, oldest first.
    pub fn health_history(&self, limit: usize) -> Vec<HealthRecord> {
        let core = self.core();
        let records: Vec<&HealthRecord> = core.health.history().collect();
        let skip = records.len().saturating_sub(limit);
        records.into_iter().skip(skip).cloned().collect()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.core().alerts.alerts().to_vec()
    }

    pub fn open_alerts(&self) -> Vec<Alert> {
        self.core().alerts.open_alerts()
    }

    pub fn alerts_suppressed(&self) -> u64 {
        self.core().alerts.suppressed()
    }

    pub fn latest_recommendation(&self) -> Option<MaintenanceRecommendation> {
        self.core().predictor.latest().cloned()
    }

    pub fn anomalies_detected(&self) -> u64 {
        self.core().anomalies_detected
    }

    pub fn ticks_scored(&self) -> u64 {
        self.core().ticks_scored
    }
}

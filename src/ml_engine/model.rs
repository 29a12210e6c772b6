//! Model lifecycle slot
//!
//! One per equipment. The slot holds a tagged state swapped atomically, so
//! the tick path either sees a complete `ReadyModel` or none at all.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{IsolationEnsemble, ScoreCalibration, ScorerError};

/// A fitted ensemble with the calibration derived from its baseline.
#[derive(Debug)]
pub struct ReadyModel {
    pub ensemble: IsolationEnsemble,
    pub calibration: ScoreCalibration,
    pub baseline_size: usize,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ModelState {
    Untrained,
    Training,
    Ready(Arc<ReadyModel>),
    Failed(String),
}

/// Serializable summary of a `ModelState` for pull endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelStatus {
    Untrained,
    Training,
    Ready {
        baseline_size: usize,
        trained_at: DateTime<Utc>,
        floor: f64,
        ceiling: f64,
    },
    Failed {
        reason: String,
    },
}

/// Raw and calibrated score of one vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored {
    pub raw: f64,
    pub calibrated: f64,
}

pub struct ModelSlot {
    state: ArcSwap<ModelState>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(ModelState::Untrained),
        }
    }

    pub fn state(&self) -> ModelState {
        self.state.load().as_ref().clone()
    }

    pub fn status(&self) -> ModelStatus {
        match self.state.load().as_ref() {
            ModelState::Untrained => ModelStatus::Untrained,
            ModelState::Training => ModelStatus::Training,
            ModelState::Ready(model) => ModelStatus::Ready {
                baseline_size: model.baseline_size,
                trained_at: model.trained_at,
                floor: model.calibration.floor,
                ceiling: model.calibration.ceiling,
            },
            ModelState::Failed(reason) => ModelStatus::Failed {
                reason: reason.clone(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state.load().as_ref(), ModelState::Ready(_))
    }

    /// Whether a fit may be started: only from Untrained or Failed.
    pub fn can_train(&self) -> bool {
        matches!(
            self.state.load().as_ref(),
            ModelState::Untrained | ModelState::Failed(_)
        )
    }

    pub fn mark_training(&self) {
        self.state.store(Arc::new(ModelState::Training));
    }

    pub fn install(&self, model: ReadyModel) {
        self.state.store(Arc::new(ModelState::Ready(Arc::new(model))));
    }

    pub fn mark_failed(&self, reason: impl Into<String>) {
        self.state.store(Arc::new(ModelState::Failed(reason.into())));
    }

    /// Score against the installed model; `NotFitted` in any other state.
    pub fn score(&self, vector: &[f64]) -> Result<Scored, ScorerError> {
        match self.state.load().as_ref() {
            ModelState::Ready(model) => {
                let raw = model.ensemble.score(vector)?;
                Ok(Scored {
                    raw,
                    calibrated: model.calibration.apply(raw),
                })
            }
            _ => Err(ScorerError::NotFitted),
        }
    }
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::new()
    }
}

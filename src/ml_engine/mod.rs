//! Isolation-based anomaly scoring
//!
//! ## Architecture
//! - `isolation_tree`: one randomized partition tree (bounded depth)
//! - `ensemble`: T trees over baseline subsamples, path-length scoring
//! - `calibration`: rescales raw scores against the baseline median
//! - `model`: per-equipment lifecycle slot (Untrained → Training → Ready | Failed)

pub mod isolation_tree;
pub mod ensemble;
pub mod calibration;
pub mod model;

pub use calibration::ScoreCalibration;
pub use ensemble::IsolationEnsemble;
pub use isolation_tree::{average_path_length, IsolationTree};
pub use model::{ModelSlot, ModelState, ModelStatus, ReadyModel, Scored};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScorerError {
    #[error("Ensemble has not been fitted")]
    NotFitted,

    #[error("Baseline too small: {have} vectors, need at least {need}")]
    InsufficientBaseline { have: usize, need: usize },

    #[error("Dimension mismatch: expected {expected} features, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Feature {index} is not finite")]
    NonFiniteFeature { index: usize },

    #[error("Feature vectors are empty")]
    EmptyVector,
}

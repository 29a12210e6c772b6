//! Remaining-useful-life extrapolation and maintenance windows

mod predictor;

pub use predictor::{MaintenancePredictor, RecommendationChange};

//! Signal processing module - sliding windows and feature extraction

mod window;
mod features;

pub use window::{FeatureWindow, Reading};
pub use features::{
    feature_names, Evaluation, FeatureExtractor, FeatureVector, IngestOutcome, CHANNEL_STATS,
    FEATURES_PER_CHANNEL,
};

//! Feature Extractor
//!
//! Turns the per-channel sliding windows of one equipment into a fixed-length
//! feature vector. Five statistics per channel, channels in canonical order:
//!
//! | index | statistic      | definition                                  |
//! |-------|----------------|---------------------------------------------|
//! | 0     | mean           | arithmetic mean                             |
//! | 1     | std_dev        | population standard deviation               |
//! | 2     | range          | max − min (peak-to-peak)                    |
//! | 3     | rate_of_change | (last − first) / elapsed seconds, 0 if none |
//! | 4     | rms            | root mean square                            |
//!
//! Each channel window sits behind its own mutex. `ingest` holds only the
//! target channel's lock for one push; `evaluate` holds each lock only long
//! enough to copy the window.

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

use super::window::{FeatureWindow, Reading};
use crate::config::WindowConfig;
use crate::types::Channel;

/// Statistics computed per channel, in vector order.
pub const CHANNEL_STATS: [&str; 5] = ["mean", "std_dev", "range", "rate_of_change", "rms"];

/// Number of features contributed by each channel.
pub const FEATURES_PER_CHANNEL: usize = CHANNEL_STATS.len();

/// Fixed-length feature vector for one equipment at one tick.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureVector {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(timestamp: DateTime<Utc>, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of a single evaluation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Ready(FeatureVector),
    /// At least one channel is below the minimum fill level
    Pending {
        channel: Channel,
        have: usize,
        need: usize,
    },
}

/// What happened to an ingested reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    /// NaN or infinite value; not stored
    NonFinite,
    /// Equipment does not monitor this channel; not stored
    UnmonitoredChannel,
}

/// Names like `vibration.mean`, in vector order, for the given channels.
pub fn feature_names(channels: &[Channel]) -> Vec<String> {
    channels
        .iter()
        .flat_map(|c| CHANNEL_STATS.iter().map(move |s| format!("{}.{s}", c.as_str())))
        .collect()
}

/// Per-equipment feature extractor.
pub struct FeatureExtractor {
    windows: BTreeMap<Channel, Mutex<FeatureWindow>>,
    min_fill: usize,
}

impl FeatureExtractor {
    /// `channels` may be in any order; the BTreeMap keeps them canonical.
    pub fn new(channels: &[Channel], config: &WindowConfig) -> Self {
        let windows = channels
            .iter()
            .map(|&c| (c, Mutex::new(FeatureWindow::new(config.capacity))))
            .collect();
        Self {
            windows,
            min_fill: config.min_fill,
        }
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.windows.keys().copied().collect()
    }

    /// Length of the vectors `evaluate` produces.
    pub fn dimension(&self) -> usize {
        self.windows.len() * FEATURES_PER_CHANNEL
    }

    /// Append one reading to its channel window.
    pub fn ingest(&self, channel: Channel, timestamp: DateTime<Utc>, value: f64) -> IngestOutcome {
        if !value.is_finite() {
            return IngestOutcome::NonFinite;
        }
        let Some(window) = self.windows.get(&channel) else {
            return IngestOutcome::UnmonitoredChannel;
        };
        window
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(timestamp, value);
        IngestOutcome::Accepted
    }

    /// Fill level of every channel window.
    pub fn fill_levels(&self) -> Vec<(Channel, usize)> {
        self.windows
            .iter()
            .map(|(c, w)| (*c, w.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()))
            .collect()
    }

    /// Compute the feature vector from a snapshot of every window.
    ///
    /// `now` stamps the vector; statistics only use the stored readings.
    pub fn evaluate(&self, now: DateTime<Utc>) -> Evaluation {
        let mut values = Vec::with_capacity(self.dimension());
        for (&channel, window) in &self.windows {
            let snapshot = window
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .snapshot();
            if snapshot.len() < self.min_fill {
                debug!(channel = %channel, have = snapshot.len(), need = self.min_fill, "Window below minimum fill");
                return Evaluation::Pending {
                    channel,
                    have: snapshot.len(),
                    need: self.min_fill,
                };
            }
            values.extend(channel_statistics(&snapshot));
        }
        Evaluation::Ready(FeatureVector::new(now, values))
    }
}

/// The five channel statistics for a non-empty window snapshot.
fn channel_statistics(readings: &[Reading]) -> [f64; FEATURES_PER_CHANNEL] {
    let values: Vec<f64> = readings.iter().map(|r| r.value).collect();

    let mean = values.iter().mean();
    let std_dev = if values.len() > 1 {
        values.iter().population_std_dev()
    } else {
        0.0
    };
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let rms = values.iter().quadratic_mean();

    let rate_of_change = match (readings.first(), readings.last()) {
        (Some(first), Some(last)) => {
            let elapsed = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0;
            if elapsed > 0.0 {
                (last.value - first.value) / elapsed
            } else {
                0.0
            }
        }
        _ => 0.0,
    };

    // Rounding in the variance can go slightly negative for constant input
    let std_dev = if std_dev.is_finite() { std_dev.max(0.0) } else { 0.0 };

    [mean, std_dev, hi - lo, rate_of_change, rms]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config(capacity: usize, min_fill: usize) -> WindowConfig {
        WindowConfig { capacity, min_fill }
    }

    #[test]
    fn pending_until_every_channel_filled() {
        let ex = FeatureExtractor::new(&[Channel::Vibration, Channel::Current], &config(10, 3));
        let t0 = Utc::now();
        for i in 0..5 {
            ex.ingest(Channel::Vibration, t0 + Duration::seconds(i), 1.0);
        }
        ex.ingest(Channel::Current, t0, 10.0);
        match ex.evaluate(t0) {
            Evaluation::Pending { channel, have, need } => {
                assert_eq!(channel, Channel::Current);
                assert_eq!(have, 1);
                assert_eq!(need, 3);
            }
            other => panic!("expected pending, got {other:?}"),
        }
    }

    #[test]
    fn statistics_match_hand_computation() {
        let ex = FeatureExtractor::new(&[Channel::Temperature], &config(10, 2));
        let t0 = Utc::now();
        // 2, 4, 4, 4, 5, 5, 7, 9 over 7 seconds: mean 5, population std 2
        for (i, v) in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].iter().enumerate() {
            ex.ingest(Channel::Temperature, t0 + Duration::seconds(i as i64), *v);
        }
        let Evaluation::Ready(fv) = ex.evaluate(t0) else {
            panic!("expected ready");
        };
        assert_eq!(fv.len(), FEATURES_PER_CHANNEL);
        assert!((fv.values[0] - 5.0).abs() < 1e-12);
        assert!((fv.values[1] - 2.0).abs() < 1e-12);
        assert!((fv.values[2] - 7.0).abs() < 1e-12);
        assert!((fv.values[3] - 1.0).abs() < 1e-12);
        let rms = ((4.0 + 16.0 * 3.0 + 25.0 * 2.0 + 49.0 + 81.0) / 8.0_f64).sqrt();
        assert!((fv.values[4] - rms).abs() < 1e-12);
    }

    #[test]
    fn zero_variance_channel_is_valid() {
        let ex = FeatureExtractor::new(&[Channel::Pressure], &config(5, 2));
        let t0 = Utc::now();
        for i in 0..5 {
            ex.ingest(Channel::Pressure, t0 + Duration::seconds(i), 50.0);
        }
        let Evaluation::Ready(fv) = ex.evaluate(t0) else {
            panic!("expected ready");
        };
        assert!(fv.values.iter().all(|v| v.is_finite()));
        assert_eq!(fv.values[1], 0.0);
        assert_eq!(fv.values[2], 0.0);
        assert_eq!(fv.values[3], 0.0);
    }

    #[test]
    fn identical_timestamps_give_zero_rate() {
        let ex = FeatureExtractor::new(&[Channel::Current], &config(5, 2));
        let t0 = Utc::now();
        ex.ingest(Channel::Current, t0, 1.0);
        ex.ingest(Channel::Current, t0, 3.0);
        let Evaluation::Ready(fv) = ex.evaluate(t0) else {
            panic!("expected ready");
        };
        assert_eq!(fv.values[3], 0.0);
    }

    #[test]
    fn non_finite_and_unmonitored_are_rejected() {
        let ex = FeatureExtractor::new(&[Channel::Vibration], &config(5, 2));
        let t0 = Utc::now();
        assert_eq!(ex.ingest(Channel::Vibration, t0, f64::NAN), IngestOutcome::NonFinite);
        assert_eq!(ex.ingest(Channel::Vibration, t0, f64::INFINITY), IngestOutcome::NonFinite);
        assert_eq!(ex.ingest(Channel::Current, t0, 1.0), IngestOutcome::UnmonitoredChannel);
        assert_eq!(ex.fill_levels(), vec![(Channel::Vibration, 0)]);
    }

    #[test]
    fn vector_follows_canonical_channel_order() {
        let channels = [Channel::Current, Channel::Vibration];
        let ex = FeatureExtractor::new(&channels, &config(5, 2));
        assert_eq!(ex.channels(), vec![Channel::Vibration, Channel::Current]);
        let t0 = Utc::now();
        for i in 0..2 {
            ex.ingest(Channel::Vibration, t0 + Duration::seconds(i), 0.2);
            ex.ingest(Channel::Current, t0 + Duration::seconds(i), 10.0);
        }
        let Evaluation::Ready(fv) = ex.evaluate(t0) else {
            panic!("expected ready");
        };
        assert!((fv.values[0] - 0.2).abs() < 1e-12);
        assert!((fv.values[FEATURES_PER_CHANNEL] - 10.0).abs() < 1e-12);
        assert_eq!(feature_names(&ex.channels())[FEATURES_PER_CHANNEL], "current.mean");
    }
}

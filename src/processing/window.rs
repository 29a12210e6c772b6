//! Fixed-capacity ring buffer of readings for one (equipment, channel)

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// One stored reading. The owning window already knows equipment and channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Sliding window over the most recent `capacity` readings, oldest evicted
/// first. Readings are kept in arrival order.
#[derive(Debug, Clone)]
pub struct FeatureWindow {
    readings: VecDeque<Reading>,
    capacity: usize,
    evicted: u64,
}

impl FeatureWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Append a reading, evicting the oldest when full.
    pub fn push(&mut self, timestamp: DateTime<Utc>, value: f64) {
        if self.readings.len() >= self.capacity {
            self.readings.pop_front();
            self.evicted += 1;
        }
        self.readings.push_back(Reading { timestamp, value });
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total readings dropped by eviction since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn latest(&self) -> Option<Reading> {
        self.readings.back().copied()
    }

    /// Copy of the current contents, oldest first.
    ///
    /// Evaluation works on this copy so the caller's lock is held only for
    /// the duration of the copy.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.iter().copied().collect()
    }
}

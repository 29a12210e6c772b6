//! Telemetry input types: Channel, SensorSample

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Channels
// ============================================================================

/// Physical measurement channel reported by an equipment asset.
///
/// Declaration order is the canonical feature order: every feature vector lays
/// channels out vibration → temperature → pressure → current, skipping any
/// channel the equipment does not monitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Vibration,
    Temperature,
    Pressure,
    Current,
}

impl Channel {
    /// All channels in canonical order.
    pub const ALL: [Channel; 4] = [
        Channel::Vibration,
        Channel::Temperature,
        Channel::Pressure,
        Channel::Current,
    ];

    /// Lowercase name used in feature names and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Vibration => "vibration",
            Channel::Temperature => "temperature",
            Channel::Pressure => "pressure",
            Channel::Current => "current",
        }
    }

    /// Engineering unit of the channel, for display only.
    pub fn unit(&self) -> &'static str {
        match self {
            Channel::Vibration => "mm/s",
            Channel::Temperature => "°C",
            Channel::Pressure => "psi",
            Channel::Current => "A",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vibration" => Ok(Channel::Vibration),
            "temperature" => Ok(Channel::Temperature),
            "pressure" => Ok(Channel::Pressure),
            "current" => Ok(Channel::Current),
            other => Err(format!("unknown channel '{other}'")),
        }
    }
}

// ============================================================================
// Samples
// ============================================================================

/// A single raw reading from the telemetry source.
///
/// Immutable once produced; consumed once by the owning equipment's window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorSample {
    pub equipment_id: String,
    pub channel: Channel,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl SensorSample {
    pub fn new(
        equipment_id: impl Into<String>,
        channel: Channel,
        timestamp: DateTime<Utc>,
        value: f64,
    ) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            channel,
            timestamp,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_order_is_canonical() {
        let mut shuffled = vec![Channel::Current, Channel::Vibration, Channel::Pressure, Channel::Temperature];
        shuffled.sort();
        assert_eq!(shuffled, Channel::ALL.to_vec());
    }

    #[test]
    fn channel_parses_case_insensitively() {
        assert_eq!("Vibration".parse::<Channel>(), Ok(Channel::Vibration));
        assert_eq!(" current ".parse::<Channel>(), Ok(Channel::Current));
        assert!("humidity".parse::<Channel>().is_err());
    }

    #[test]
    fn sample_round_trips_through_json() {
        let sample = SensorSample::new("PUMP_002", Channel::Pressure, Utc::now(), 51.2);
        let json = serde_json::to_string(&sample).expect("serialize");
        assert!(json.contains("\"pressure\""));
        let back: SensorSample = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, sample);
    }
}

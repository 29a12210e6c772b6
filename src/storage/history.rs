//! Append-only history log
//!
//! Persists HealthRecords and alert lifecycle events to sled for replay and
//! audit. Two trees:
//!
//! - `health`: JSON `HealthRecord`
//! - `alert_events`: JSON `AlertLogEntry`
//!
//! Key layout (sorts by equipment, then time, then arrival):
//!
//! ```text
//! equipment_id bytes | 0x00 | timestamp millis (i64 BE, sign bit flipped) | seq (u32 BE)
//! ```
//!
//! Writes are not flushed individually; sled flushes in the background and
//! `flush()` is called on shutdown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::types::{Alert, EngineEvent, HealthRecord};

const HEALTH_TREE: &str = "health";
const ALERT_TREE: &str = "alert_events";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLogKind {
    Opened,
    Resolved,
}

/// One alert lifecycle step as stored in `alert_events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertLogEntry {
    pub kind: AlertLogKind,
    pub at: DateTime<Utc>,
    pub alert: Alert,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageStats {
    pub health_records: usize,
    pub alert_events: usize,
    pub size_bytes: u64,
}

impl StorageStats {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Sled-backed history log. Cheap to clone; clones share the database.
#[derive(Clone)]
pub struct HistoryLog {
    db: sled::Db,
    health: sled::Tree,
    alerts: sled::Tree,
}

fn equipment_prefix(equipment_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(equipment_id.len() + 1);
    prefix.extend_from_slice(equipment_id.as_bytes());
    prefix.push(0);
    prefix
}

fn time_bytes(at: DateTime<Utc>) -> [u8; 8] {
    // Flipping the sign bit makes negative timestamps sort before positive ones
    ((at.timestamp_millis() as u64) ^ (1 << 63)).to_be_bytes()
}

fn entry_key(equipment_id: &str, at: DateTime<Utc>, seq: u32) -> Vec<u8> {
    let mut key = equipment_prefix(equipment_id);
    key.extend_from_slice(&time_bytes(at));
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

impl HistoryLog {
    /// Open or create the log at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory log that is discarded on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let health = db.open_tree(HEALTH_TREE)?;
        let alerts = db.open_tree(ALERT_TREE)?;
        Ok(Self { db, health, alerts })
    }

    fn next_seq(&self) -> Result<u32, StorageError> {
        Ok((self.db.generate_id()? & u64::from(u32::MAX)) as u32)
    }

    pub fn append_health(&self, record: &HealthRecord) -> Result<(), StorageError> {
        let key = entry_key(&record.equipment_id, record.timestamp, self.next_seq()?);
        self.health.insert(key, serde_json::to_vec(record)?)?;
        Ok(())
    }

    pub fn append_alert_event(&self, kind: AlertLogKind, alert: &Alert) -> Result<(), StorageError> {
        let at = match kind {
            AlertLogKind::Opened => alert.raised_at,
            AlertLogKind::Resolved => alert.resolved_at.unwrap_or(alert.raised_at),
        };
        let entry = AlertLogEntry {
            kind,
            at,
            alert: alert.clone(),
        };
        let key = entry_key(&alert.equipment_id, at, self.next_seq()?);
        self.alerts.insert(key, serde_json::to_vec(&entry)?)?;
        Ok(())
    }

    /// Persist the parts of an engine event that belong in the log.
    /// Returns whether anything was written.
    pub fn record(&self, event: &EngineEvent) -> Result<bool, StorageError> {
        match event {
            EngineEvent::Health(record) => self.append_health(record)?,
            EngineEvent::AlertOpened(alert) => self.append_alert_event(AlertLogKind::Opened, alert)?,
            EngineEvent::AlertResolved(alert) => self.append_alert_event(AlertLogKind::Resolved, alert)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Every stored HealthRecord of one equipment, oldest first.
    pub fn replay_health(&self, equipment_id: &str) -> Result<Vec<HealthRecord>, StorageError> {
        self.health
            .scan_prefix(equipment_prefix(equipment_id))
            .map(|item| {
                let (_, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    /// HealthRecords with `from <= timestamp < to`.
    pub fn health_between(
        &self,
        equipment_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HealthRecord>, StorageError> {
        let mut start = equipment_prefix(equipment_id);
        start.extend_from_slice(&time_bytes(from));
        let mut end = equipment_prefix(equipment_id);
        end.extend_from_slice(&time_bytes(to));
        self.health
            .range(start..end)
            .map(|item| {
                let (_, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    /// Alert lifecycle entries of one equipment, oldest first.
    pub fn alert_events(&self, equipment_id: &str) -> Result<Vec<AlertLogEntry>, StorageError> {
        self.alerts
            .scan_prefix(equipment_prefix(equipment_id))
            .map(|item| {
                let (_, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            health_records: self.health.len(),
            alert_events: self.alerts.len(),
            size_bytes: self.db.size_on_disk().unwrap_or(0),
        }
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn keys_sort_chronologically_across_epoch() {
        let before = Utc.timestamp_millis_opt(-5_000).unwrap();
        let after = Utc.timestamp_millis_opt(5_000).unwrap();
        assert!(entry_key("A", before, 0) < entry_key("A", after, 0));
        assert!(entry_key("A", after, 1) < entry_key("A", after, 2));
    }

    #[test]
    fn prefixes_do_not_bleed_between_ids() {
        // "PUMP_1" must not match records of "PUMP_10"
        let key = entry_key("PUMP_10", Utc::now(), 0);
        assert!(!key.starts_with(&equipment_prefix("PUMP_1")));
    }
}

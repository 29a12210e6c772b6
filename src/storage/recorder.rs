//! Event recorder task
//!
//! Subscribes to the registry's event stream and appends to the history log
//! off the scoring path. A lagging recorder loses events (counted) instead
//! of slowing the engine down.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::HistoryLog;
use crate::types::EngineEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub written: u64,
    pub failed: u64,
    pub lagged: u64,
}

/// Spawn the recorder. It stops on cancellation or when the sender side
/// closes, flushing the log before returning its stats.
pub fn spawn_recorder(
    log: HistoryLog,
    mut events: broadcast::Receiver<EngineEvent>,
    cancel: CancellationToken,
) -> JoinHandle<RecorderStats> {
    tokio::spawn(async move {
        let mut stats = RecorderStats::default();
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => received,
            };
            match event {
                Ok(event) => match log.record(&event) {
                    Ok(true) => stats.written += 1,
                    Ok(false) => {}
                    Err(e) => {
                        stats.failed += 1;
                        warn!(equipment_id = %event.equipment_id(), error = %e, "Failed to record event");
                    }
                },
                Err(RecvError::Lagged(missed)) => {
                    stats.lagged += missed;
                    warn!(missed, "History recorder lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        // Drain what is already queued so a clean shutdown loses nothing
        while let Ok(event) = events.try_recv() {
            match log.record(&event) {
                Ok(true) => stats.written += 1,
                Ok(false) => {}
                Err(_) => stats.failed += 1,
            }
        }
        if let Err(e) = log.flush() {
            warn!(error = %e, "Failed to flush history log");
        }
        info!(written = stats.written, failed = stats.failed, lagged = stats.lagged, "History recorder stopped");
        stats
    })
}

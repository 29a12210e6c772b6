//! Async daemon loop: ingest from a source, tick on a fixed interval.
//!
//! The source runs in its own reader task and forwards samples over a
//! bounded channel, so interval ticks never interrupt a partially read line.
//! Ticks run on the blocking pool (the registry fans out onto rayon).

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::registry::{EquipmentRegistry, TickReport};
use super::source::{SampleEvent, SampleSource};
use crate::types::SensorSample;

/// Samples buffered between the reader task and the loop.
const INGEST_QUEUE: usize = 1_024;

/// Totals for one run of the loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopStats {
    pub samples_received: u64,
    pub samples_rejected: u64,
    pub ticks: u64,
    pub last_tick: Option<TickReport>,
}

pub struct ProcessingLoop {
    registry: Arc<EquipmentRegistry>,
    cancel_token: CancellationToken,
    tick_interval: Duration,
    final_tick_on_eof: bool,
}

impl ProcessingLoop {
    pub fn new(registry: Arc<EquipmentRegistry>, cancel_token: CancellationToken) -> Self {
        let tick_interval = Duration::from_secs(registry.settings().tick_interval_secs.max(1));
        Self {
            registry,
            cancel_token,
            tick_interval,
            final_tick_on_eof: true,
        }
    }

    /// Override the tick interval (tests, fast replay).
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Run until the source is exhausted or cancellation is requested.
    pub async fn run<S: SampleSource>(self, mut source: S) -> LoopStats {
        let name = source.source_name().to_string();
        info!(source = %name, interval_ms = self.tick_interval.as_millis() as u64, "Processing loop started");

        let (tx, mut rx) = mpsc::channel::<SensorSample>(INGEST_QUEUE);
        let reader_cancel = self.cancel_token.child_token();
        let reader = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    result = source.next_sample() => result,
                };
                match event {
                    Ok(SampleEvent::Sample(sample)) => {
                        if tx.send(sample).await.is_err() {
                            break;
                        }
                    }
                    Ok(SampleEvent::Eof) => break,
                    Err(e) => {
                        warn!(source = %source.source_name(), error = %e, "Source error");
                        break;
                    }
                }
            }
        });

        let mut stats = LoopStats::default();
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so windows can fill
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = interval.tick() => {
                    self.tick(&mut stats).await;
                }
                received = rx.recv() => {
                    match received {
                        Some(sample) => {
                            stats.samples_received += 1;
                            if self.registry.ingest_sample(&sample).is_err() {
                                stats.samples_rejected += 1;
                            }
                        }
                        None => {
                            info!(source = %name, samples = stats.samples_received, "Source reached end");
                            if self.final_tick_on_eof {
                                self.tick(&mut stats).await;
                            }
                            break;
                        }
                    }
                }
            }
        }

        reader.abort();
        let monitoring = self.registry.monitoring();
        info!(
            samples = stats.samples_received,
            rejected = monitoring.rejected_unknown_equipment
                + monitoring.rejected_non_finite
                + monitoring.rejected_unmonitored_channel,
            ticks = stats.ticks,
            models_ready = monitoring.models_ready,
            "Processing loop stopped"
        );
        stats
    }

    async fn tick(&self, stats: &mut LoopStats) {
        let registry = Arc::clone(&self.registry);
        let cancel = self.cancel_token.clone();
        let now = chrono::Utc::now();
        match tokio::task::spawn_blocking(move || registry.tick(now, &cancel)).await {
            Ok(report) => {
                stats.ticks += 1;
                stats.last_tick = Some(report);
            }
            Err(e) => warn!(error = %e, "Tick task failed"),
        }
    }
}

//! IronWatch - Equipment Health Monitoring daemon
//!
//! Reads sensor telemetry, scores every registered asset on a fixed tick,
//! and publishes health, alert and maintenance events.
//!
//! # Usage
//!
//! ```bash
//! # Pipe the simulator into the daemon
//! cargo run --bin simulation | cargo run --release -- --stdin
//!
//! # Replay a recorded JSON-lines capture at 10x
//! cargo run --release -- --replay capture.jsonl --speed 10
//!
//! # Print the built-in configuration as a starting point
//! cargo run --release -- --print-default-config > ironwatch.toml
//! ```
//!
//! # Environment Variables
//!
//! - `IRONWATCH_CONFIG`: Path to the TOML config (default: ./ironwatch.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ironwatch::config::{defaults, EngineConfig, EquipmentEntry};
use ironwatch::pipeline::{EquipmentInfo, ProcessingLoop, ReplaySource, StdinSource};
use ironwatch::storage::{spawn_recorder, HistoryLog};
use ironwatch::types::{EngineEvent, SensorSample};
use ironwatch::EquipmentRegistry;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "ironwatch")]
#[command(about = "IronWatch equipment health monitoring and predictive maintenance")]
#[command(version)]
struct CliArgs {
    /// Path to the engine config (TOML). Falls back to ./ironwatch.toml, then defaults
    #[arg(long, env = "IRONWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Read JSON-lines samples from stdin
    /// Use with simulator: cargo run --bin simulation | ironwatch --stdin
    #[arg(long, conflicts_with = "replay")]
    stdin: bool,

    /// Replay a JSON-lines capture file
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Replay speed multiplier (1 = one sample per base delay, 0 = no delay)
    #[arg(long, default_value = "0")]
    speed: u64,

    /// Write health and alert history to this sled directory
    #[arg(long, value_name = "PATH", conflicts_with = "no_history")]
    history: Option<PathBuf>,

    /// Disable the history log even if the config enables it
    #[arg(long)]
    no_history: bool,

    /// Override the tick interval (seconds)
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Override the worker pool size (0 = one per core)
    #[arg(long)]
    workers: Option<usize>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_default_config: bool,
}

// ============================================================================
// Default fleet
// ============================================================================

/// Assets registered when the config lists none.
fn default_fleet() -> Vec<EquipmentEntry> {
    [
        ("CNC_001", "cnc", "CNC Machine", "Production Line A"),
        ("PUMP_002", "pump", "Pump", "Water System"),
        ("MOTOR_003", "motor", "Motor", "Conveyor Belt"),
        ("COMP_004", "compressor", "Compressor", "Air System"),
    ]
    .into_iter()
    .map(|(id, class, equipment_type, location)| EquipmentEntry {
        id: id.to_string(),
        class: class.to_string(),
        equipment_type: Some(equipment_type.to_string()),
        location: Some(location.to_string()),
    })
    .collect()
}

fn load_config(args: &CliArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::load(),
    };
    if let Some(secs) = args.tick_secs {
        config.engine.tick_interval_secs = secs.max(1);
    }
    if let Some(workers) = args.workers {
        config.engine.workers = workers;
    }
    if config.equipment.is_empty() {
        config.equipment = default_fleet();
    }
    Ok(config)
}

fn register_fleet(registry: &EquipmentRegistry, config: &EngineConfig) -> Result<()> {
    for entry in &config.equipment {
        let profile = config.classes.get(&entry.class).cloned().unwrap_or_default();
        let info = EquipmentInfo {
            equipment_type: entry.equipment_type.clone(),
            location: entry.location.clone(),
        };
        registry
            .register_with_info(&entry.id, profile, info)
            .with_context(|| format!("Failed to register {}", entry.id))?;
    }
    Ok(())
}

async fn load_capture(path: &Path) -> Result<Vec<SensorSample>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open replay file {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut samples = Vec::new();
    let mut malformed = 0usize;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<SensorSample>(line) {
            Ok(sample) => samples.push(sample),
            Err(_) => malformed += 1,
        }
    }
    if malformed > 0 {
        warn!(malformed, "Skipped malformed lines in replay file");
    }
    Ok(samples)
}

/// Log lifecycle events as they happen; health records stay at debug.
fn spawn_event_logger(mut events: broadcast::Receiver<EngineEvent>, cancel: CancellationToken) {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => received,
            };
            match event {
                Ok(EngineEvent::Transition(t)) => {
                    info!(equipment_id = %t.equipment_id, from = %t.from, to = %t.to, reason = ?t.reason, "State transition");
                }
                Ok(EngineEvent::AlertOpened(alert)) => {
                    warn!(alert_id = %alert.id, severity = %alert.severity, "{}", alert.message);
                }
                Ok(EngineEvent::Maintenance(rec)) => {
                    info!(
                        equipment_id = %rec.equipment_id,
                        window_start = %rec.recommended_window_start,
                        window_end = %rec.recommended_window_end,
                        savings = rec.estimated_savings,
                        "Maintenance recommended"
                    );
                }
                Ok(EngineEvent::ModelReady { equipment_id, baseline_size }) => {
                    info!(equipment_id = %equipment_id, baseline_size, "Model ready");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => warn!(missed, "Event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    if args.print_default_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  IronWatch - Equipment Health Monitoring");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let registry = Arc::new(
        EquipmentRegistry::new(config.engine.clone()).context("Failed to create equipment registry")?,
    );
    register_fleet(&registry, &config)?;
    info!(
        equipment = registry.len(),
        tick_secs = config.engine.tick_interval_secs,
        "Fleet registered"
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    spawn_event_logger(registry.subscribe(), cancel_token.child_token());

    // History recorder gets its own token so it can drain after the loop stops
    let history_path = match (&args.history, args.no_history) {
        (_, true) => None,
        (Some(path), false) => Some(path.clone()),
        (None, false) if config.storage.enabled => Some(PathBuf::from(&config.storage.path)),
        (None, false) => None,
    };
    let recorder_token = CancellationToken::new();
    let recorder = match history_path {
        Some(path) => {
            let log = HistoryLog::open(&path)
                .with_context(|| format!("Failed to open history log at {}", path.display()))?;
            info!(path = %path.display(), "History log enabled");
            Some((log.clone(), spawn_recorder(log, registry.subscribe(), recorder_token.clone())))
        }
        None => None,
    };

    let processing = ProcessingLoop::new(Arc::clone(&registry), cancel_token.clone());
    let stats = if let Some(path) = &args.replay {
        let samples = load_capture(path).await?;
        let delay_ms = if args.speed == 0 {
            0
        } else {
            defaults::SIMULATION_BASE_DELAY_MS / args.speed
        };
        info!(samples = samples.len(), delay_ms, "Input: replay {}", path.display());
        let processing = if delay_ms == 0 {
            // A flat-out replay would otherwise see a single tick
            processing.with_tick_interval(Duration::from_millis(50))
        } else {
            processing
        };
        processing.run(ReplaySource::new(samples, delay_ms)).await
    } else {
        if !args.stdin {
            info!("No input selected, reading JSON-lines samples from stdin");
        }
        processing.run(StdinSource::stdin()).await
    };

    cancel_token.cancel();
    if let Some((log, handle)) = recorder {
        // The recorder drains queued events before flushing
        recorder_token.cancel();
        match handle.await {
            Ok(written) => info!(written = written.written, failed = written.failed, "History recorder finished"),
            Err(e) => warn!(error = %e, "History recorder task failed"),
        }
        let storage = log.stats();
        info!(
            health_records = storage.health_records,
            alert_events = storage.alert_events,
            size_mb = storage.size_mb(),
            "History log"
        );
    }

    let summary = registry.fleet_summary();
    info!("");
    info!(
        total = summary.total_equipment,
        healthy = summary.healthy,
        needing_maintenance = summary.needing_maintenance,
        anomalies = summary.anomalies_detected,
        savings = summary.total_estimated_savings,
        ticks = stats.ticks,
        "Fleet summary"
    );
    for equipment in &summary.equipment {
        info!(
            equipment_id = %equipment.equipment_id,
            state = %equipment.state,
            health = ?equipment.health,
            open_alerts = equipment.open_alerts,
            "Equipment"
        );
    }
    info!("IronWatch shutdown complete");
    Ok(())
}

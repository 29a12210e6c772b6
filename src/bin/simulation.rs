//! Equipment Telemetry Simulation
//!
//! Generates synthetic sensor telemetry for a small plant fleet and writes it
//! to stdout as JSON-lines `SensorSample`s. Each asset runs healthy for a
//! warm-up period (so the engine can learn its baseline) and then wears:
//! - Vibration and current scale with the degradation factor
//! - Temperature rises and pressure drops as the asset wears
//! - Occasional spikes (5% of steps) on vibration and temperature
//! - Type-specific coupling (CNC cycles, pump pressure/current, motor temperature/current)
//!
//! # Usage
//! ```bash
//! ./simulation --minutes 30 --speed 10 | ./ironwatch --stdin
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::io::{self, Write};
use std::time::{Duration, Instant};

use ironwatch::config::defaults::SIMULATION_BASE_DELAY_MS;
use ironwatch::types::{Channel, SensorSample};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "ironwatch-simulation")]
#[command(about = "Synthetic degrading-equipment telemetry for IronWatch testing")]
#[command(version = "1.0")]
struct Args {
    /// Simulated duration in minutes
    #[arg(short, long, default_value = "30", value_parser = clap::value_parser!(u32).range(1..=10_080))]
    minutes: u32,

    /// Healthy warm-up before wear starts, in minutes
    #[arg(long, default_value = "5")]
    warmup_minutes: u32,

    /// Simulated seconds between sample bursts
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u32).range(1..=3_600))]
    step_secs: u32,

    /// Time compression factor (1 = real-time, 0 = no delay)
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u64).range(0..=1000))]
    speed: u64,

    /// Multiplier on every asset's wear rate
    #[arg(long, default_value = "1.0")]
    wear: f64,

    /// Only simulate these equipment ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    equipment: Vec<String>,

    /// Suppress the mission log on stderr (only output samples)
    #[arg(short, long)]
    quiet: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

// ============================================================================
// Equipment Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum EquipmentKind {
    Cnc,
    Pump,
    Motor,
    Compressor,
}

impl EquipmentKind {
    fn name(&self) -> &'static str {
        match self {
            EquipmentKind::Cnc => "CNC Machine",
            EquipmentKind::Pump => "Pump",
            EquipmentKind::Motor => "Motor",
            EquipmentKind::Compressor => "Compressor",
        }
    }
}

/// Noise distributions shared by every asset.
struct Noise {
    vibration: Normal<f64>,
    temperature: Normal<f64>,
    pressure: Normal<f64>,
    current: Normal<f64>,
}

impl Noise {
    fn new() -> Result<Self, rand_distr::NormalError> {
        Ok(Self {
            vibration: Normal::new(0.0, 0.02)?,
            temperature: Normal::new(0.0, 1.0)?,
            pressure: Normal::new(0.0, 0.5)?,
            current: Normal::new(0.0, 0.3)?,
        })
    }
}

struct SimulatedEquipment {
    id: &'static str,
    kind: EquipmentKind,
    location: &'static str,

    // Healthy operating point
    baseline_vibration: f64,
    baseline_temperature: f64,
    baseline_pressure: f64,
    baseline_current: f64,

    /// 1.0 when new; grows by `wear_rate` per step once wear starts
    degradation: f64,
    wear_rate: f64,

    spikes: u64,
}

impl SimulatedEquipment {
    fn new(
        id: &'static str,
        kind: EquipmentKind,
        location: &'static str,
        wear_multiplier: f64,
        rng: &mut StdRng,
    ) -> Self {
        Self {
            id,
            kind,
            location,
            baseline_vibration: rng.gen_range(0.1..0.3),
            baseline_temperature: rng.gen_range(65.0..85.0),
            baseline_pressure: rng.gen_range(45.0..55.0),
            baseline_current: rng.gen_range(8.0..12.0),
            degradation: 1.0,
            wear_rate: rng.gen_range(0.001..0.005) * wear_multiplier,
            spikes: 0,
        }
    }

    /// One reading per channel at `timestamp`; `elapsed_secs` drives the CNC cycle.
    fn step(
        &mut self,
        timestamp: DateTime<Utc>,
        elapsed_secs: f64,
        wearing: bool,
        noise: &Noise,
        rng: &mut StdRng,
    ) -> [SensorSample; 4] {
        if wearing {
            self.degradation += self.wear_rate * rng.gen_range(0.5..2.0);
        }
        let wear = self.degradation - 1.0;

        let mut vibration = self.baseline_vibration * self.degradation + noise.vibration.sample(rng);
        let mut temperature = self.baseline_temperature + wear * 20.0 + noise.temperature.sample(rng);
        let mut pressure = self.baseline_pressure - wear * 5.0 + noise.pressure.sample(rng);
        let current = self.baseline_current * self.degradation + noise.current.sample(rng);

        if rng.gen_bool(0.05) {
            vibration *= rng.gen_range(1.5..3.0);
            temperature += rng.gen_range(10.0..25.0);
            self.spikes += 1;
        }

        match self.kind {
            EquipmentKind::Cnc => {
                // 30-second machining cycle
                let phase = (elapsed_secs % 30.0) / 30.0;
                vibration += 0.1 * (phase * std::f64::consts::TAU).sin();
            }
            EquipmentKind::Pump => {
                pressure = self.baseline_pressure + (current - self.baseline_current) * 2.0;
            }
            EquipmentKind::Motor => {
                temperature = self.baseline_temperature + (current - self.baseline_current) * 5.0;
            }
            EquipmentKind::Compressor => {}
        }

        [
            SensorSample::new(self.id, Channel::Vibration, timestamp, vibration.max(0.0)),
            SensorSample::new(self.id, Channel::Temperature, timestamp, temperature.max(0.0)),
            SensorSample::new(self.id, Channel::Pressure, timestamp, pressure.max(0.0)),
            SensorSample::new(self.id, Channel::Current, timestamp, current.max(0.0)),
        ]
    }
}

fn build_fleet(args: &Args, rng: &mut StdRng) -> Vec<SimulatedEquipment> {
    [
        ("CNC_001", EquipmentKind::Cnc, "Production Line A"),
        ("PUMP_002", EquipmentKind::Pump, "Water System"),
        ("MOTOR_003", EquipmentKind::Motor, "Conveyor Belt"),
        ("COMP_004", EquipmentKind::Compressor, "Air System"),
    ]
    .into_iter()
    .filter(|(id, _, _)| args.equipment.is_empty() || args.equipment.iter().any(|e| e == id))
    .map(|(id, kind, location)| SimulatedEquipment::new(id, kind, location, args.wear, rng))
    .collect()
}

// ============================================================================
// Mission Log
// ============================================================================

fn format_time(seconds: f64) -> String {
    let hours = (seconds / 3600.0) as u32;
    let minutes = ((seconds % 3600.0) / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

fn log_mission(time: f64, message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[{}] {}", format_time(time), message);
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut rng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let noise = Noise::new()?;
    let mut fleet = build_fleet(&args, &mut rng);
    if fleet.is_empty() {
        return Err(format!("no simulated equipment matches {:?}", args.equipment).into());
    }

    let total_secs = f64::from(args.minutes) * 60.0;
    let warmup_secs = f64::from(args.warmup_minutes) * 60.0;
    let step_secs = f64::from(args.step_secs);
    let total_steps = (total_secs / step_secs) as u64;
    let step_delay = if args.speed == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(SIMULATION_BASE_DELAY_MS * u64::from(args.step_secs) / 2 / args.speed)
    };

    log_mission(0.0, &"=".repeat(70), args.quiet);
    log_mission(0.0, "EQUIPMENT TELEMETRY SIMULATION v1.0", args.quiet);
    log_mission(0.0, &"=".repeat(70), args.quiet);
    for equipment in &fleet {
        log_mission(0.0, &format!(
            "  {:<10} {:<12} {:<18} wear {:.4}/step",
            equipment.id, equipment.kind.name(), equipment.location, equipment.wear_rate
        ), args.quiet);
    }
    log_mission(0.0, "", args.quiet);
    log_mission(0.0, &format!("  Duration: {} min ({} steps of {}s)", args.minutes, total_steps, args.step_secs), args.quiet);
    log_mission(0.0, &format!("  Warm-up: {} min healthy", args.warmup_minutes), args.quiet);
    log_mission(0.0, &format!("  Delay: {}ms per step", step_delay.as_millis()), args.quiet);
    if let Some(seed) = args.seed {
        log_mission(0.0, &format!("  Random seed: {}", seed), args.quiet);
    }
    log_mission(0.0, &"=".repeat(70), args.quiet);

    let start_time = Instant::now();
    let start = Utc::now();
    let stdout = io::stdout();
    let mut stdout_lock = stdout.lock();
    let mut samples_written = 0u64;
    let mut wear_announced = false;
    let mut last_log_percent = 0;

    for step in 0..total_steps {
        let loop_start = Instant::now();
        let elapsed = step as f64 * step_secs;
        let wearing = elapsed >= warmup_secs;
        if wearing && !wear_announced {
            log_mission(elapsed, ">>> Warm-up complete, equipment wear starts", args.quiet);
            wear_announced = true;
        }

        let timestamp = start + ChronoDuration::milliseconds((elapsed * 1000.0) as i64);
        for equipment in &mut fleet {
            for sample in equipment.step(timestamp, elapsed, wearing, &noise, &mut rng) {
                writeln!(stdout_lock, "{}", serde_json::to_string(&sample)?)?;
                samples_written += 1;
            }
        }
        stdout_lock.flush()?;

        let current_percent = (step * 100 / total_steps.max(1)) as u32 / 10 * 10;
        if current_percent > last_log_percent {
            let status: Vec<String> = fleet
                .iter()
                .map(|e| format!("{} x{:.2}", e.id, e.degradation))
                .collect();
            log_mission(elapsed, &format!("Progress: {}% | {}", current_percent, status.join(" | ")), args.quiet);
            last_log_percent = current_percent;
        }

        if !step_delay.is_zero() {
            let spent = loop_start.elapsed();
            if spent < step_delay {
                std::thread::sleep(step_delay - spent);
            }
        }
    }

    stdout_lock.flush()?;
    drop(stdout_lock);

    log_mission(total_secs, &"=".repeat(70), args.quiet);
    log_mission(total_secs, "SIMULATION COMPLETE", args.quiet);
    log_mission(total_secs, &format!("Samples written: {}", samples_written), args.quiet);
    for equipment in &fleet {
        log_mission(total_secs, &format!(
            "  {:<10} degradation x{:.3}, {} spikes",
            equipment.id, equipment.degradation, equipment.spikes
        ), args.quiet);
    }
    log_mission(total_secs, &format!("Real time: {:.1}s", start_time.elapsed().as_secs_f64()), args.quiet);
    log_mission(total_secs, &"=".repeat(70), args.quiet);

    Ok(())
}

//! Sample source abstraction for telemetry ingestion.
//!
//! Provides a unified trait for reading `SensorSample`s from different feeds:
//! JSON lines (stdin, files, any async reader) and in-memory replay.

use crate::types::SensorSample;
use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Events produced by a sample source.
#[derive(Debug)]
pub enum SampleEvent {
    Sample(SensorSample),
    /// No more data (EOF for readers, end of a replay)
    Eof,
}

/// Where telemetry comes from.
///
/// The processing loop drives [`next_sample`] from a dedicated reader task,
/// so implementations do not need to be cancellation safe.
#[async_trait]
pub trait SampleSource: Send + 'static {
    /// Read the next sample. `Err` is unrecoverable.
    async fn next_sample(&mut self) -> Result<SampleEvent>;

    /// Human-readable name for logging (e.g. "stdin", "replay").
    fn source_name(&self) -> &str;
}

// ============================================================================
// JSON-lines Source
// ============================================================================

/// Reads one JSON `SensorSample` per line. Blank and malformed lines are
/// skipped.
///
/// `cargo run --bin simulation | ironwatch --stdin`
pub struct JsonLinesSource<R> {
    reader: R,
    name: String,
    line_buffer: String,
    malformed: u64,
}

impl<R: AsyncBufRead + Unpin + Send + 'static> JsonLinesSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line_buffer: String::with_capacity(256),
            malformed: 0,
        }
    }

    /// Lines skipped because they did not parse.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }
}

/// JSON lines on standard input.
pub type StdinSource = JsonLinesSource<BufReader<tokio::io::Stdin>>;

impl StdinSource {
    pub fn stdin() -> Self {
        JsonLinesSource::new(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send + 'static> SampleSource for JsonLinesSource<R> {
    async fn next_sample(&mut self) -> Result<SampleEvent> {
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(SampleEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SensorSample>(line) {
                Ok(sample) => return Ok(SampleEvent::Sample(sample)),
                Err(e) => {
                    self.malformed += 1;
                    tracing::warn!(source = %self.name, error = %e, "Skipping malformed sample line");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Replay Source
// ============================================================================

/// Replays pre-loaded samples with an optional delay between them.
pub struct ReplaySource {
    samples: std::vec::IntoIter<SensorSample>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(samples: Vec<SensorSample>, delay_ms: u64) -> Self {
        Self {
            samples: samples.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    async fn next_sample(&mut self) -> Result<SampleEvent> {
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.samples.next() {
            Some(sample) => {
                self.yielded_first = true;
                Ok(SampleEvent::Sample(sample))
            }
            None => Ok(SampleEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Channel;

    #[tokio::test]
    async fn json_lines_skip_blank_and_malformed() {
        let input: &'static [u8] = b"\n{\"equipment_id\":\"PUMP_002\",\"channel\":\"pressure\",\"timestamp\":\"2024-05-01T10:00:00Z\",\"value\":151.5}\nnot json\n{\"equipment_id\":\"PUMP_002\",\"channel\":\"current\",\"timestamp\":\"2024-05-01T10:00:02Z\",\"value\":12.0}\n";
        let mut source = JsonLinesSource::new(BufReader::new(input), "test");

        let SampleEvent::Sample(first) = source.next_sample().await.unwrap() else {
            panic!("expected a sample");
        };
        assert_eq!(first.channel, Channel::Pressure);
        assert_eq!(first.value, 151.5);

        let SampleEvent::Sample(second) = source.next_sample().await.unwrap() else {
            panic!("expected a sample");
        };
        assert_eq!(second.channel, Channel::Current);
        assert_eq!(source.malformed(), 1);
        assert!(matches!(source.next_sample().await.unwrap(), SampleEvent::Eof));
    }

    #[tokio::test]
    async fn line_split_across_reads_is_reassembled() {
        let reader = tokio_test::io::Builder::new()
            .read(b"{\"equipment_id\":\"MOTOR_003\",\"channel\":\"temp")
            .read(b"erature\",\"timestamp\":\"2024-05-01T10:00:00Z\",\"value\":81.25}\n")
            .build();
        let mut source = JsonLinesSource::new(BufReader::new(reader), "mock");

        let SampleEvent::Sample(sample) = source.next_sample().await.unwrap() else {
            panic!("expected a sample");
        };
        assert_eq!(sample.equipment_id, "MOTOR_003");
        assert_eq!(sample.channel, Channel::Temperature);
        assert_eq!(source.malformed(), 0);
        assert!(matches!(source.next_sample().await.unwrap(), SampleEvent::Eof));
    }

    #[tokio::test]
    async fn replay_yields_in_order_then_eof() {
        let t0 = chrono::Utc::now();
        let samples = vec![
            SensorSample::new("CNC_001", Channel::Vibration, t0, 0.4),
            SensorSample::new("CNC_001", Channel::Vibration, t0, 0.5),
        ];
        let mut source = ReplaySource::new(samples, 0);
        for expected in [0.4, 0.5] {
            match source.next_sample().await.unwrap() {
                SampleEvent::Sample(s) => assert_eq!(s.value, expected),
                SampleEvent::Eof => panic!("early eof"),
            }
        }
        assert!(matches!(source.next_sample().await.unwrap(), SampleEvent::Eof));
    }
}

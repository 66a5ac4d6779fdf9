//! Periodic reporting: drain the counter bank, convert totals to rates, and
//! write them to the terminal or to per-subnet files.
//!
//! Sink failures are logged and never stop the reporting loop; counters keep
//! accumulating for the next interval.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::config::{OutputFormat, RateUnit, KILO};
use crate::core::{Bucket, CounterBank, DirectionTotals};
use crate::error::{MonitorError, Result};

/// Per-second rates for one bucket over one interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateReport {
    #[serde(serialize_with = "serialize_bucket")]
    pub bucket: Bucket,
    /// Inbound rate in `unit` per second.
    pub received: f64,
    /// Outbound rate in `unit` per second.
    pub sent: f64,
    pub unit: RateUnit,
    pub interval_secs: u64,
}

fn serialize_bucket<S: serde::Serializer>(bucket: &Bucket, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(bucket)
}

impl RateReport {
    pub fn from_totals(bucket: Bucket, totals: DirectionTotals, interval: Duration, unit: RateUnit) -> Self {
        let secs = interval.as_secs().max(1);
        Self {
            bucket,
            received: totals.inbound as f64 / secs as f64,
            sent: totals.outbound as f64 / secs as f64,
            unit,
            interval_secs: secs,
        }
    }
}

/// Destination for per-interval reports.
pub trait ReportSink: Send {
    fn emit(&mut self, reports: &[RateReport]) -> Result<()>;

    /// Called once after the last report.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Direction-only terminal line: `\rReceived:12.34kb/s \t Sent:5.67kb/s`.
pub fn format_terminal_line(report: &RateReport) -> String {
    let suffix = report.unit.kilo_suffix();
    format!(
        "\rReceived:{:.2}{suffix} \t Sent:{:.2}{suffix}",
        report.received / KILO,
        report.sent / KILO
    )
}

/// Subnet file body: `10.0.0.0/24: Received:800.00 b/s Sent:0.00 b/s`.
pub fn format_subnet_line(report: &RateReport) -> String {
    let suffix = report.unit.suffix();
    format!(
        "{}: Received:{:.2} {suffix} Sent:{:.2} {suffix}",
        report.bucket, report.received, report.sent
    )
}

/// Writes reports to a terminal-like writer, refreshing one line in place
/// (text) or printing one JSON object per line (json).
pub struct TerminalSink<W: Write + Send> {
    out: W,
    format: OutputFormat,
    wrote_line: bool,
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            wrote_line: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(std::io::stdout(), format)
    }
}

impl<W: Write + Send> ReportSink for TerminalSink<W> {
    fn emit(&mut self, reports: &[RateReport]) -> Result<()> {
        for report in reports {
            match self.format {
                OutputFormat::Text => {
                    self.out.write_all(format_terminal_line(report).as_bytes())?;
                    self.wrote_line = true;
                }
                OutputFormat::Json => {
                    serde_json::to_writer(&mut self.out, report)?;
                    self.out.write_all(b"\n")?;
                }
            }
        }
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.wrote_line {
            self.out.write_all(b"\n")?;
            self.wrote_line = false;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Overwrites `<dir>/<network>_<prefix>.txt` for every subnet bucket.
pub struct SubnetFileSink {
    dir: PathBuf,
    dir_ready: bool,
}

impl SubnetFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            dir_ready: false,
        }
    }

    /// Create the log directory. Retried on every emit until it succeeds.
    pub fn prepare(&mut self) -> Result<()> {
        if !self.dir_ready {
            std::fs::create_dir_all(&self.dir).map_err(|e| {
                MonitorError::Sink(format!(
                    "Failed to create log directory {}: {e}",
                    self.dir.display()
                ))
            })?;
            self.dir_ready = true;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, bucket: &Bucket) -> Option<PathBuf> {
        match bucket {
            Bucket::Subnet(cidr) => Some(self.dir.join(format!("{}.txt", cidr.file_stem()))),
            Bucket::Interface => None,
        }
    }
}

impl ReportSink for SubnetFileSink {
    fn emit(&mut self, reports: &[RateReport]) -> Result<()> {
        self.prepare()?;

        let mut first_error = None;
        for report in reports {
            let Some(path) = self.path_for(&report.bucket) else {
                continue;
            };
            if let Err(e) = std::fs::write(&path, format_subnet_line(report)) {
                // A vanished directory is recreated on the next interval.
                if e.kind() == std::io::ErrorKind::NotFound {
                    self.dir_ready = false;
                }
                first_error.get_or_insert_with(|| {
                    MonitorError::Sink(format!("Failed to write {}: {e}", path.display()))
                });
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Drains the counter bank on a fixed interval and emits rates.
pub struct Reporter {
    bank: Arc<CounterBank>,
    interval: Duration,
    unit: RateUnit,
    sink: Box<dyn ReportSink>,
}

impl Reporter {
    pub fn new(bank: Arc<CounterBank>, interval: Duration, unit: RateUnit, sink: Box<dyn ReportSink>) -> Self {
        Self {
            bank,
            interval,
            unit,
            sink,
        }
    }

    /// Drain once, emit, and return what was emitted. Sink errors are logged.
    pub fn tick(&mut self) -> Vec<RateReport> {
        let reports: Vec<RateReport> = self
            .bank
            .drain_all()
            .into_iter()
            .map(|(bucket, totals)| RateReport::from_totals(bucket, totals, self.interval, self.unit))
            .collect();

        match self.sink.emit(&reports) {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => tracing::warn!(kind = e.kind(), "Failed to emit report: {e}"),
            Err(e) => tracing::error!(kind = e.kind(), "Failed to emit report: {e}"),
        }
        reports
    }

    /// Spawn the reporting task. It ticks every `interval` until `shutdown`
    /// flips to true or its sender is dropped, then finishes the sink.
    pub fn spawn(mut self, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so every report
            // covers a full interval.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            if let Err(e) = self.sink.finish() {
                tracing::warn!(kind = e.kind(), "Failed to finish report sink: {e}");
            }
            tracing::debug!("Reporter stopped");
        })
    }
}

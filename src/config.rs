//! Centralized runtime constants and the immutable monitor configuration.
//!
//! Tunable defaults live here so they can be found and adjusted in a single
//! place. [`MonitorConfig`] is built once from the command line, validated
//! eagerly, and then handed to the capture and reporting services.

use std::path::PathBuf;
use std::time::Duration;

use pnet_datalink::MacAddr;
use serde::Serialize;

use crate::core::cidr::Cidr;
use crate::core::counters::Bucket;
use crate::error::{MonitorError, Result};

/// Reporting interval used when none is given (seconds).
pub const DEFAULT_INTERVAL_SECS: u64 = 1;

/// Interface captured when none is given.
pub const DEFAULT_INTERFACE: &str = "eth0";

/// BPF filter applied when none is given.
pub const DEFAULT_FILTER: &str = "tcp";

/// Maximum bytes captured per frame. Accounting uses the wire length, so
/// truncation here does not affect the reported rates.
pub const SNAPSHOT_LEN: i32 = 1024;

/// pcap read timeout (milliseconds). Bounds how long the capture thread
/// takes to observe a shutdown request.
pub const READ_TIMEOUT_MS: i32 = 1000;

/// Directory name, beside the executable, for per-subnet report files.
pub const LOG_DIR_NAME: &str = "log";

/// Divisor for the terminal's kilo-rate display.
pub const KILO: f64 = 1024.0;

/// Unit accumulated by the counter bank and shown in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RateUnit {
    Bits,
    Bytes,
}

impl RateUnit {
    /// Amount to account for a frame of `frame_len` bytes.
    pub fn amount(self, frame_len: u64) -> u64 {
        match self {
            RateUnit::Bits => frame_len * 8,
            RateUnit::Bytes => frame_len,
        }
    }

    /// Suffix for raw per-second rates (`b/s`, `B/s`).
    pub fn suffix(self) -> &'static str {
        match self {
            RateUnit::Bits => "b/s",
            RateUnit::Bytes => "B/s",
        }
    }

    /// Suffix for rates divided by [`KILO`].
    pub fn kilo_suffix(self) -> &'static str {
        match self {
            RateUnit::Bits => "kb/s",
            RateUnit::Bytes => "kB/s",
        }
    }
}

/// Terminal rendering for direction-only mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Single line refreshed in place.
    Text,
    /// One JSON object per interval.
    Json,
}

/// Which buckets traffic is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountingMode {
    /// A single bucket for the whole interface.
    Direction,
    /// One bucket per configured subnet, reported to files under `log_dir`.
    Subnets { subnets: Vec<Cidr>, log_dir: PathBuf },
}

/// Immutable process-wide configuration, constructed before any task starts.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interface: String,
    pub filter: String,
    pub interval: Duration,
    pub unit: RateUnit,
    pub format: OutputFormat,
    pub promiscuous: bool,
    /// Overrides the hardware address discovered for `interface`.
    pub local_mac: Option<MacAddr>,
    pub mode: AccountingMode,
}

impl MonitorConfig {
    /// Direction-only configuration with defaults for everything else.
    pub fn new(interface: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            filter: filter.into(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            unit: RateUnit::Bits,
            format: OutputFormat::Text,
            promiscuous: false,
            local_mac: None,
            mode: AccountingMode::Direction,
        }
    }

    /// Set the reporting interval. Zero seconds is rejected.
    pub fn with_interval_secs(mut self, secs: u64) -> Result<Self> {
        if secs == 0 {
            return Err(MonitorError::Config(
                "reporting interval must be at least 1 second".into(),
            ));
        }
        self.interval = Duration::from_secs(secs);
        Ok(self)
    }

    /// Switch to subnet mode. Every specifier is parsed here so a malformed
    /// one fails before capture starts.
    pub fn with_subnets<S: AsRef<str>>(mut self, specs: &[S], log_dir: PathBuf) -> Result<Self> {
        let subnets = specs
            .iter()
            .flat_map(|s| s.as_ref().split_whitespace())
            .map(str::parse::<Cidr>)
            .collect::<Result<Vec<_>>>()?;
        if subnets.is_empty() {
            return Err(MonitorError::Config("subnet list is empty".into()));
        }
        self.mode = AccountingMode::Subnets { subnets, log_dir };
        Ok(self)
    }

    /// Buckets the counter bank tracks, in report order.
    pub fn buckets(&self) -> Vec<Bucket> {
        match &self.mode {
            AccountingMode::Direction => vec![Bucket::Interface],
            AccountingMode::Subnets { subnets, .. } => {
                let mut buckets: Vec<Bucket> = Vec::with_capacity(subnets.len());
                for cidr in subnets {
                    let bucket = Bucket::Subnet(*cidr);
                    if !buckets.contains(&bucket) {
                        buckets.push(bucket);
                    }
                }
                buckets
            }
        }
    }
}

/// Default subnet log directory: `log` beside the running executable,
/// falling back to the working directory.
pub fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(LOG_DIR_NAME)))
        .unwrap_or_else(|| PathBuf::from(LOG_DIR_NAME))
}

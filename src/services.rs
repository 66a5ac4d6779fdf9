//! Monitor lifecycle: start capture and reporting in dependency order, wait
//! for Ctrl-C or capture exit, then shut both down.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use crate::capture::{CaptureEngine, CaptureSummary, FrameAccountant, FrameSource, PcapSource};
use crate::config::{AccountingMode, MonitorConfig};
use crate::core::CounterBank;
use crate::error::{MonitorError, Result};
use crate::interface::LocalIdentity;
use crate::report::{ReportSink, Reporter, SubnetFileSink, TerminalSink};

/// Owns the running capture thread and reporter task.
///
/// Started in dependency order:
/// 1. Local identity (interface IPv4 + MAC)
/// 2. pcap session (device + BPF filter); failures here are fatal
/// 3. Counter bank sized to the configured buckets
/// 4. Reporter task draining the bank every interval
/// 5. Capture thread feeding the bank
pub struct MonitorServices {
    capture: CaptureEngine,
    reporter: tokio::task::JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl MonitorServices {
    /// Resolve the host, open the live capture and start both loops.
    pub fn start(config: &MonitorConfig) -> anyhow::Result<Self> {
        let identity = LocalIdentity::resolve(&config.interface, config.local_mac)
            .with_context(|| format!("cannot resolve local identity for {}", config.interface))?;
        tracing::info!("Chosen device's IPv4: {}", identity.ipv4);
        tracing::info!("Chosen device's MAC: {}", identity.mac);
        tracing::info!("Filter: {}", config.filter);

        let source = PcapSource::open(config).context("cannot start packet capture")?;
        Self::start_with_source(config, identity, source)
    }

    /// Start with an already-open frame source.
    pub fn start_with_source<S>(config: &MonitorConfig, identity: LocalIdentity, source: S) -> anyhow::Result<Self>
    where
        S: FrameSource + Send + 'static,
    {
        let bank = Arc::new(CounterBank::new(config.buckets()));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reporter = Reporter::new(Arc::clone(&bank), config.interval, config.unit, build_sink(config))
            .spawn(shutdown_rx);

        let accountant = FrameAccountant::new(identity.mac, config.unit, bank);
        let capture = CaptureEngine::start(source, accountant).context("cannot spawn capture thread")?;

        tracing::info!(
            "Monitoring {} every {}s ({} bucket(s))",
            config.interface,
            config.interval.as_secs(),
            config.buckets().len()
        );
        Ok(Self {
            capture,
            reporter,
            shutdown_tx,
        })
    }

    /// Run until Ctrl-C or until the capture loop ends on its own.
    ///
    /// A capture failure is returned as an error so the process exits
    /// non-zero.
    pub async fn run_until_shutdown(mut self) -> anyhow::Result<()> {
        let capture_exited = tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for Ctrl-C")?;
                tracing::info!("Interrupt received, shutting down");
                false
            }
            _ = self.capture.exited() => {
                tracing::warn!("Capture stopped, shutting down");
                true
            }
        };
        let result = self.shutdown().await;
        if capture_exited {
            result.context("capture stopped")?;
        } else {
            result.context("capture failed during shutdown")?;
        }
        Ok(())
    }

    /// Stop the capture thread and the reporter, releasing the pcap handle
    /// and flushing the sink. Returns the capture loop's outcome once the
    /// reporter has stopped.
    pub async fn shutdown(self) -> Result<CaptureSummary> {
        let _ = self.shutdown_tx.send(true);
        let capture = self.capture;
        let result = match tokio::task::spawn_blocking(move || capture.join()).await {
            Ok(result) => result,
            Err(e) => Err(MonitorError::Capture(format!("Failed to join capture thread: {e}"))),
        };
        if let Err(e) = self.reporter.await {
            tracing::error!("Reporter task failed: {e}");
        }
        if let Ok(summary) = &result {
            tracing::info!(
                "Captured {} frames ({} accounted, {} without required layers)",
                summary.frames,
                summary.accounted,
                summary.dropped
            );
        }
        result
    }
}

fn build_sink(config: &MonitorConfig) -> Box<dyn ReportSink> {
    match &config.mode {
        AccountingMode::Direction => Box::new(TerminalSink::stdout(config.format)),
        AccountingMode::Subnets { log_dir, .. } => {
            let mut sink = SubnetFileSink::new(log_dir.clone());
            match sink.prepare() {
                Ok(()) => tracing::info!("Writing subnet reports to {}", sink.dir().display()),
                Err(e) => tracing::warn!(kind = e.kind(), "{e}; will retry every interval"),
            }
            Box::new(sink)
        }
    }
}

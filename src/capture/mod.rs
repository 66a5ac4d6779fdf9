//! Capture pipeline: frame sources, per-frame accounting, and the capture thread.
//!
//! - `frame`: decoded Ethernet/IPv4 view of a captured frame
//! - `pcap_source`: live libpcap backend

pub mod frame;
pub mod pcap_source;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pnet_datalink::MacAddr;
use tokio::sync::oneshot;

use crate::config::RateUnit;
use crate::core::{classify, Bucket, CounterBank, Direction};
use crate::error::{MonitorError, Result};

pub use frame::CapturedFrame;
pub use pcap_source::PcapSource;

/// Outcome of one read from a frame source.
#[derive(Debug)]
pub enum SourceEvent {
    Frame(CapturedFrame),
    /// Read timeout expired with no frame; try again.
    Idle,
    /// The source is exhausted.
    Closed,
}

/// A blocking producer of captured frames.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<SourceEvent>;

    /// Called once when the capture loop ends, before the source is dropped.
    fn close(&mut self) {}
}

/// Frames seen by the capture loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub frames: u64,
    pub accounted: u64,
    pub dropped: u64,
}

/// Resolves direction and buckets for a frame and adds it to the counter bank.
pub struct FrameAccountant {
    local_mac: MacAddr,
    unit: RateUnit,
    bank: Arc<CounterBank>,
    subnet_mode: bool,
}

impl FrameAccountant {
    pub fn new(local_mac: MacAddr, unit: RateUnit, bank: Arc<CounterBank>) -> Self {
        let subnet_mode = bank
            .buckets()
            .iter()
            .any(|b| matches!(b, Bucket::Subnet(_)));
        Self {
            local_mac,
            unit,
            bank,
            subnet_mode,
        }
    }

    /// Account one frame. Returns false if it was dropped from accounting
    /// (missing Ethernet layer, or missing IPv4 layer in subnet mode).
    pub fn account(&self, frame: &CapturedFrame) -> bool {
        let Some(eth) = frame.ethernet else {
            return false;
        };
        let direction = classify(eth.destination, self.local_mac);
        let amount = self.unit.amount(frame.len);

        if !self.subnet_mode {
            return self.bank.add(&Bucket::Interface, direction, amount);
        }

        let Some(ip) = frame.ipv4 else {
            return false;
        };
        let remote = match direction {
            Direction::Inbound => ip.source,
            Direction::Outbound => ip.destination,
        };
        for bucket in self.bank.buckets() {
            if let Bucket::Subnet(cidr) = bucket {
                if cidr.contains(remote) {
                    self.bank.add(bucket, direction, amount);
                }
            }
        }
        true
    }
}

/// Read frames until the source closes, errors, or `shutdown` is set.
pub fn run_capture_loop<S: FrameSource + ?Sized>(
    source: &mut S,
    accountant: &FrameAccountant,
    shutdown: &AtomicBool,
) -> Result<CaptureSummary> {
    let mut summary = CaptureSummary::default();

    let result = loop {
        if shutdown.load(Ordering::Relaxed) {
            break Ok(());
        }
        match source.next_frame() {
            Ok(SourceEvent::Frame(frame)) => {
                summary.frames += 1;
                if accountant.account(&frame) {
                    summary.accounted += 1;
                } else {
                    summary.dropped += 1;
                }
            }
            Ok(SourceEvent::Idle) => continue,
            Ok(SourceEvent::Closed) => {
                tracing::info!("Frame source closed");
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };

    source.close();
    tracing::debug!(
        "Capture loop finished: frames={} accounted={} dropped={}",
        summary.frames,
        summary.accounted,
        summary.dropped
    );
    result.map(|()| summary)
}

/// Manages the background capture thread.
/// Implements Drop so the thread is told to stop on every exit path.
pub struct CaptureEngine {
    shutdown: Arc<AtomicBool>,
    capture_thread: Option<std::thread::JoinHandle<Result<CaptureSummary>>>,
    exited: Option<oneshot::Receiver<()>>,
}

impl CaptureEngine {
    /// Move `source` onto a dedicated OS thread and start accounting frames.
    pub fn start<S>(mut source: S, accountant: FrameAccountant) -> anyhow::Result<Self>
    where
        S: FrameSource + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let (exited_tx, exited_rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name("capture".into())
            .spawn(move || {
                let result = run_capture_loop(&mut source, &accountant, &shutdown_clone);
                if let Err(e) = &result {
                    tracing::error!(kind = e.kind(), "Capture loop exited: {e}");
                }
                drop(source);
                let _ = exited_tx.send(());
                result
            })?;

        tracing::info!("CaptureEngine started");
        Ok(Self {
            shutdown,
            capture_thread: Some(thread),
            exited: Some(exited_rx),
        })
    }

    /// Resolves when the capture thread has ended on its own.
    /// Pending forever once it has already been awaited.
    pub async fn exited(&mut self) {
        match self.exited.take() {
            Some(rx) => {
                let _ = rx.await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Stop the thread and wait for it. Blocks for at most one read timeout.
    pub fn join(mut self) -> Result<CaptureSummary> {
        self.stop();
        let handle = self
            .capture_thread
            .take()
            .ok_or_else(|| MonitorError::Capture("capture thread already joined".into()))?;
        match handle.join() {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("Capture thread panicked");
                Err(MonitorError::Capture("capture thread panicked".into()))
            }
        }
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        if self.capture_thread.is_some() {
            tracing::warn!("CaptureEngine dropped — releasing capture resources");
        }
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

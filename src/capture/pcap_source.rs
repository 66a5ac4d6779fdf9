//! Live capture backend using libpcap.
//!
//! Opens the device with a fixed snapshot length and read timeout, compiles
//! the BPF filter, and yields decoded frames. Read timeouts surface as
//! [`SourceEvent::Idle`] so the capture loop can check for shutdown.

use pcap::{Active, Capture, Device, Linktype};

use crate::capture::frame::CapturedFrame;
use crate::capture::{FrameSource, SourceEvent};
use crate::config::{MonitorConfig, READ_TIMEOUT_MS, SNAPSHOT_LEN};
use crate::error::{MonitorError, Result};

/// Counters reported by libpcap for this session.
#[derive(Debug, Clone, Copy, Default)]
pub struct PcapStats {
    pub received: u32,
    pub dropped: u32,
    pub if_dropped: u32,
}

pub struct PcapSource {
    capture: Capture<Active>,
    ethernet: bool,
}

impl PcapSource {
    /// Open a live capture on `config.interface` and apply `config.filter`.
    ///
    /// Both device and filter failures are returned as
    /// [`MonitorError::Capture`]; callers treat them as fatal.
    pub fn open(config: &MonitorConfig) -> Result<Self> {
        let interface = config.interface.as_str();
        tracing::debug!(
            "Opening pcap on {interface} (snaplen={SNAPSHOT_LEN}, timeout={READ_TIMEOUT_MS}ms, promisc={})",
            config.promiscuous
        );

        let mut capture = Capture::from_device(Device::from(interface))
            .map_err(|e| MonitorError::Capture(format!("Failed to create capture on {interface}: {e}")))?
            .promisc(config.promiscuous)
            .snaplen(SNAPSHOT_LEN)
            .timeout(READ_TIMEOUT_MS)
            .open()
            .map_err(|e| {
                MonitorError::Capture(format!(
                    "Failed to open capture on {interface}: {e}. \
                     Capturing usually requires root or CAP_NET_RAW."
                ))
            })?;

        capture
            .filter(&config.filter, true)
            .map_err(|e| MonitorError::Capture(format!("Invalid BPF filter '{}': {e}", config.filter)))?;

        let linktype = capture.get_datalink();
        let ethernet = linktype == Linktype::ETHERNET;
        if !ethernet {
            tracing::warn!(
                "Interface {interface} uses link type {:?}; frames without an Ethernet header are not counted",
                linktype
            );
        }

        tracing::info!("pcap capture opened on {interface} with filter: {}", config.filter);
        Ok(Self { capture, ethernet })
    }

    /// Session statistics from libpcap.
    pub fn stats(&mut self) -> Result<PcapStats> {
        let stat = self.capture.stats()?;
        Ok(PcapStats {
            received: stat.received,
            dropped: stat.dropped,
            if_dropped: stat.if_dropped,
        })
    }
}

impl FrameSource for PcapSource {
    fn next_frame(&mut self) -> Result<SourceEvent> {
        match self.capture.next_packet() {
            Ok(packet) => {
                let wire_len = u64::from(packet.header.len);
                let frame = if self.ethernet {
                    CapturedFrame::decode_ethernet(packet.data, wire_len)
                } else {
                    CapturedFrame::opaque(wire_len)
                };
                Ok(SourceEvent::Frame(frame))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(SourceEvent::Idle),
            Err(pcap::Error::NoMorePackets) => Ok(SourceEvent::Closed),
            Err(e) => Err(MonitorError::Capture(format!("pcap read failed: {e}"))),
        }
    }

    fn close(&mut self) {
        match self.stats() {
            Ok(stats) => tracing::info!(
                "pcap session closed: received={} dropped={} if_dropped={}",
                stats.received,
                stats.dropped,
                stats.if_dropped
            ),
            Err(e) => tracing::debug!("pcap stats unavailable: {e}"),
        }
    }
}

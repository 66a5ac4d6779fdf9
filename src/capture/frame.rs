//! Decoded view of one captured link-layer frame.
//!
//! Only the Ethernet and IPv4 headers are inspected. A single 802.1Q tag
//! between them is stepped over.

use std::net::Ipv4Addr;

use pnet_datalink::MacAddr;
use pnet_packet::ethernet::{EtherTypes, EthernetPacket};
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::vlan::VlanPacket;
use pnet_packet::Packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub source: MacAddr,
    pub destination: MacAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

/// Immutable view of a captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Length on the wire in bytes, independent of the snapshot length.
    pub len: u64,
    pub ethernet: Option<EthernetHeader>,
    pub ipv4: Option<Ipv4Header>,
}

impl CapturedFrame {
    /// Decode a frame captured on an Ethernet link.
    pub fn decode_ethernet(data: &[u8], wire_len: u64) -> Self {
        let Some(eth) = EthernetPacket::new(data) else {
            return Self::opaque(wire_len);
        };

        let ethernet = EthernetHeader {
            source: eth.get_source(),
            destination: eth.get_destination(),
        };

        let ipv4 = match eth.get_ethertype() {
            EtherTypes::Ipv4 => parse_ipv4(eth.payload()),
            EtherTypes::Vlan => VlanPacket::new(eth.payload()).and_then(|vlan| {
                if vlan.get_ethertype() == EtherTypes::Ipv4 {
                    parse_ipv4(vlan.payload())
                } else {
                    None
                }
            }),
            _ => None,
        };

        Self {
            len: wire_len,
            ethernet: Some(ethernet),
            ipv4,
        }
    }

    /// A frame with no decodable layers (non-Ethernet link, runt frame).
    pub fn opaque(wire_len: u64) -> Self {
        Self {
            len: wire_len,
            ethernet: None,
            ipv4: None,
        }
    }
}

fn parse_ipv4(data: &[u8]) -> Option<Ipv4Header> {
    let ip = Ipv4Packet::new(data)?;
    if ip.get_version() != 4 {
        return None;
    }
    Some(Ipv4Header {
        source: ip.get_source(),
        destination: ip.get_destination(),
    })
}

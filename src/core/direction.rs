//! Inbound/outbound classification from the link-layer destination.

use pnet_datalink::MacAddr;
use serde::Serialize;

/// Direction of a frame relative to the local host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Classify a frame by its Ethernet destination.
///
/// Inbound iff the destination is exactly the local hardware address.
/// Broadcast and multicast destinations never equal a unicast local address
/// and are therefore counted as outbound.
pub fn classify(destination: MacAddr, local: MacAddr) -> Direction {
    if destination == local {
        Direction::Inbound
    } else {
        Direction::Outbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: MacAddr = MacAddr(0x02, 0x42, 0xac, 0x11, 0x00, 0x02);

    #[test]
    fn test_local_destination_is_inbound() {
        assert_eq!(classify(LOCAL, LOCAL), Direction::Inbound);
    }

    #[test]
    fn test_other_destination_is_outbound() {
        let gateway = MacAddr(0x00, 0x1b, 0x21, 0x3c, 0x4d, 0x5e);
        assert_eq!(classify(gateway, LOCAL), Direction::Outbound);
    }

    #[test]
    fn test_broadcast_and_multicast_are_outbound() {
        assert_eq!(classify(MacAddr::broadcast(), LOCAL), Direction::Outbound);
        let mdns = MacAddr(0x01, 0x00, 0x5e, 0x00, 0x00, 0xfb);
        assert_eq!(classify(mdns, LOCAL), Direction::Outbound);
    }

    #[test]
    fn test_parsed_address_case_insensitive() {
        let upper: MacAddr = "02:42:AC:11:00:02".parse().unwrap();
        let lower: MacAddr = "02:42:ac:11:00:02".parse().unwrap();
        assert_eq!(classify(upper, lower), Direction::Inbound);
    }
}

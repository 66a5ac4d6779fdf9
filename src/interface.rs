//! Network interface enumeration and local identity resolution.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use pnet_datalink::{MacAddr, NetworkInterface};

use crate::error::{MonitorError, Result};

/// Information about a network interface, for `--list-interfaces`.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub mac: Option<MacAddr>,
    pub ips: Vec<IpAddr>,
    pub is_up: bool,
    pub is_loopback: bool,
}

impl From<&NetworkInterface> for InterfaceInfo {
    fn from(iface: &NetworkInterface) -> Self {
        InterfaceInfo {
            name: iface.name.clone(),
            mac: iface.mac,
            ips: iface.ips.iter().map(|network| network.ip()).collect(),
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
        }
    }
}

impl InterfaceInfo {
    /// First IPv4 address assigned to the interface.
    pub fn primary_ipv4(&self) -> Option<Ipv4Addr> {
        self.ips.iter().find_map(|ip| match ip {
            IpAddr::V4(v4) => Some(*v4),
            IpAddr::V6(_) => None,
        })
    }
}

impl fmt::Display for InterfaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mac = self
            .mac
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".into());
        let ipv4 = self
            .primary_ipv4()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".into());
        let state = if self.is_up { "up" } else { "down" };
        write!(f, "{:<16} {:<17} {:<15} {state}", self.name, mac, ipv4)?;
        if self.is_loopback {
            f.write_str(" loopback")?;
        }
        Ok(())
    }
}

/// List all network interfaces known to the OS.
pub fn list_interfaces() -> Vec<InterfaceInfo> {
    pnet_datalink::interfaces()
        .iter()
        .map(InterfaceInfo::from)
        .collect()
}

/// The capturing host's addresses on the chosen interface.
/// Resolved once at startup and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIdentity {
    pub ipv4: Ipv4Addr,
    pub mac: MacAddr,
}

impl LocalIdentity {
    /// Resolve the identity of `name` from the OS interface table.
    /// `mac_override` replaces the discovered hardware address.
    pub fn resolve(name: &str, mac_override: Option<MacAddr>) -> Result<Self> {
        let interfaces = list_interfaces();
        Self::from_interfaces(&interfaces, name, mac_override)
    }

    fn from_interfaces(
        interfaces: &[InterfaceInfo],
        name: &str,
        mac_override: Option<MacAddr>,
    ) -> Result<Self> {
        let iface = interfaces
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| MonitorError::Interface(format!("Interface '{name}' not found")))?;

        let ipv4 = iface.primary_ipv4().ok_or_else(|| {
            MonitorError::Interface(format!("Interface '{name}' has no IPv4 address"))
        })?;

        let mac = match (mac_override, iface.mac) {
            (Some(mac), _) => mac,
            (None, Some(mac)) if mac != MacAddr::zero() => mac,
            _ => {
                return Err(MonitorError::Interface(format!(
                    "Interface '{name}' has no hardware address; pass --local-mac"
                )))
            }
        };

        Ok(Self { ipv4, mac })
    }
}

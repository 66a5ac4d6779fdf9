//! IPv4 subnet specifiers and prefix-driven membership tests.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::MonitorError;

/// An IPv4 network in CIDR notation (`a.b.c.d/prefix`).
///
/// The stored network address is always masked to `prefix`, so host bits
/// given on the command line (`10.0.0.5/24`) never cause silent misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Cidr {
    /// Build a subnet, masking host bits out of `network`.
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self, MonitorError> {
        if prefix > 32 {
            return Err(MonitorError::Config(format!(
                "prefix length {prefix} is out of range 0-32"
            )));
        }
        let masked = Ipv4Addr::from(u32::from(network) & mask(prefix));
        Ok(Self {
            network: masked,
            prefix,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Netmask for this prefix as an address (`/24` -> `255.255.255.0`).
    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask(self.prefix))
    }

    /// Whether `addr` falls inside this subnet.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask(self.prefix) == u32::from(self.network)
    }

    /// File stem used for per-subnet report files: `10.0.0.0_24`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.network, self.prefix)
    }
}

/// Leading-ones mask for `prefix` bits. `/0` matches everything.
fn mask(prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        p => u32::MAX << (32 - u32::from(p.min(32))),
    }
}

impl FromStr for Cidr {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        let (addr, prefix) = spec.split_once('/').ok_or_else(|| {
            MonitorError::Config(format!("subnet '{spec}' is missing a /prefix"))
        })?;

        let octets: Vec<&str> = addr.split('.').collect();
        if octets.len() != 4 {
            return Err(MonitorError::Config(format!(
                "subnet '{spec}' must have four dotted octets, found {}",
                octets.len()
            )));
        }
        let mut bytes = [0u8; 4];
        for (slot, octet) in bytes.iter_mut().zip(&octets) {
            *slot = parse_decimal(octet).ok_or_else(|| {
                MonitorError::Config(format!("subnet '{spec}' has invalid octet '{octet}'"))
            })?;
        }

        let prefix = parse_decimal(prefix).ok_or_else(|| {
            MonitorError::Config(format!("subnet '{spec}' has non-numeric prefix '{prefix}'"))
        })?;

        let network = Ipv4Addr::from(bytes);
        let cidr = Cidr::new(network, prefix)?;
        if cidr.network != network {
            tracing::warn!("Subnet {spec} has host bits set; using {cidr}");
        }
        Ok(cidr)
    }
}

/// Plain ASCII decimal only; `u8::from_str` would also take a leading `+`.
fn parse_decimal(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

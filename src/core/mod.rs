//! Core logic: subnet matching, direction classification, counter bank.
//!
//! - [`Cidr`] — prefix-driven IPv4 subnet membership
//! - [`classify`] / [`Direction`] — inbound vs outbound from the Ethernet destination
//! - [`CounterBank`] / [`Bucket`] — concurrent per-bucket accumulators with drain

pub mod cidr;
pub mod counters;
pub mod direction;

pub use cidr::Cidr;
pub use counters::{Bucket, CounterBank, DirectionTotals};
pub use direction::{classify, Direction};

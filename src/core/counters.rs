//! Per-bucket traffic accounting using DashMap for concurrent access.
//!
//! The capture thread adds frame sizes; the reporter drains every bucket
//! once per interval. Each add and each per-bucket read-and-reset runs under
//! that bucket's shard lock, so an increment lands in exactly one drain.

use std::fmt;

use dashmap::DashMap;
use serde::Serialize;

use crate::core::cidr::Cidr;
use crate::core::direction::Direction;

/// A traffic-accounting unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Everything seen on the interface (direction-only mode).
    Interface,
    /// Traffic whose remote endpoint falls inside a subnet.
    Subnet(Cidr),
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Interface => f.write_str("interface"),
            Bucket::Subnet(cidr) => cidr.fmt(f),
        }
    }
}

/// Inbound/outbound totals accumulated during one interval.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DirectionTotals {
    pub inbound: u64,
    pub outbound: u64,
}

impl DirectionTotals {
    fn add(&mut self, direction: Direction, amount: u64) {
        match direction {
            Direction::Inbound => self.inbound = self.inbound.wrapping_add(amount),
            Direction::Outbound => self.outbound = self.outbound.wrapping_add(amount),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.inbound == 0 && self.outbound == 0
    }
}

/// Thread-safe counter bank with a fixed set of buckets.
pub struct CounterBank {
    order: Vec<Bucket>,
    counters: DashMap<Bucket, DirectionTotals>,
}

impl CounterBank {
    pub fn new(buckets: Vec<Bucket>) -> Self {
        let counters = DashMap::with_capacity(buckets.len());
        for bucket in &buckets {
            counters.insert(*bucket, DirectionTotals::default());
        }
        Self {
            order: buckets,
            counters,
        }
    }

    /// Buckets in report order.
    pub fn buckets(&self) -> &[Bucket] {
        &self.order
    }

    /// Add `amount` to one accumulator. Called from the capture loop.
    ///
    /// Returns false if `bucket` is not tracked by this bank.
    pub fn add(&self, bucket: &Bucket, direction: Direction, amount: u64) -> bool {
        match self.counters.get_mut(bucket) {
            Some(mut totals) => {
                totals.add(direction, amount);
                true
            }
            None => {
                tracing::trace!("Dropping {amount} for untracked bucket {bucket}");
                false
            }
        }
    }

    /// Read and reset every accumulator, returning pre-reset values in
    /// bucket order.
    pub fn drain_all(&self) -> Vec<(Bucket, DirectionTotals)> {
        self.order
            .iter()
            .map(|bucket| {
                let totals = self
                    .counters
                    .get_mut(bucket)
                    .map(|mut entry| std::mem::take(entry.value_mut()))
                    .unwrap_or_default();
                (*bucket, totals)
            })
            .collect()
    }

    /// Current values without resetting them.
    pub fn peek(&self, bucket: &Bucket) -> DirectionTotals {
        self.counters
            .get(bucket)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use rand::Rng;

    use super::*;

    fn subnet(s: &str) -> Bucket {
        Bucket::Subnet(s.parse().unwrap())
    }

    #[test]
    fn test_inbound_frames_accumulate_bits() {
        let bank = CounterBank::new(vec![Bucket::Interface]);
        for (n, size) in [(1u64, 60u64), (17, 1514), (250, 64)] {
            for _ in 0..n {
                bank.add(&Bucket::Interface, Direction::Inbound, size * 8);
            }
            let totals = bank.peek(&Bucket::Interface);
            assert_eq!(totals.inbound, n * size * 8);
            assert_eq!(totals.outbound, 0);
            bank.drain_all();
        }
    }

    #[test]
    fn test_drain_returns_and_resets() {
        let bank = CounterBank::new(vec![Bucket::Interface]);
        bank.add(&Bucket::Interface, Direction::Inbound, 800);
        bank.add(&Bucket::Interface, Direction::Outbound, 1600);

        let drained = bank.drain_all();
        assert_eq!(
            drained,
            vec![(
                Bucket::Interface,
                DirectionTotals {
                    inbound: 800,
                    outbound: 1600
                }
            )]
        );
        assert!(bank.peek(&Bucket::Interface).is_zero());
    }

    #[test]
    fn test_second_drain_without_adds_is_zero() {
        let bank = CounterBank::new(vec![subnet("10.0.0.0/24"), subnet("172.16.0.0/16")]);
        bank.add(&subnet("10.0.0.0/24"), Direction::Inbound, 42);
        bank.drain_all();
        let second = bank.drain_all();
        assert_eq!(second.len(), 2);
        assert!(second.iter().all(|(_, totals)| totals.is_zero()));
    }

    #[test]
    fn test_drain_preserves_bucket_order() {
        let order = vec![subnet("192.168.0.0/16"), subnet("10.0.0.0/8"), subnet("172.16.0.0/12")];
        let bank = CounterBank::new(order.clone());
        let drained: Vec<Bucket> = bank.drain_all().into_iter().map(|(b, _)| b).collect();
        assert_eq!(drained, order);
    }

    #[test]
    fn test_untracked_bucket_is_ignored() {
        let bank = CounterBank::new(vec![subnet("10.0.0.0/24")]);
        assert!(!bank.add(&Bucket::Interface, Direction::Inbound, 8));
        assert!(bank.drain_all().iter().all(|(_, t)| t.is_zero()));
    }

    #[test]
    fn test_concurrent_adds_and_drains_lose_nothing() {
        let buckets = vec![subnet("10.0.0.0/24"), subnet("172.16.0.0/16"), subnet("192.168.1.0/24")];
        let bank = Arc::new(CounterBank::new(buckets.clone()));
        let done = Arc::new(AtomicBool::new(false));

        let drainer = {
            let bank = Arc::clone(&bank);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut drained = 0u64;
                let mut rng = rand::thread_rng();
                while !done.load(Ordering::Acquire) {
                    drained += bank
                        .drain_all()
                        .iter()
                        .map(|(_, t)| t.inbound + t.outbound)
                        .sum::<u64>();
                    std::thread::sleep(std::time::Duration::from_micros(rng.gen_range(0..200)));
                }
                drained
            })
        };

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let bank = Arc::clone(&bank);
                let buckets = buckets.clone();
                std::thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    let mut added = 0u64;
                    for _ in 0..20_000 {
                        let bucket = &buckets[rng.gen_range(0..buckets.len())];
                        let direction = if rng.gen_bool(0.5) {
                            Direction::Inbound
                        } else {
                            Direction::Outbound
                        };
                        let amount = rng.gen_range(60..=1514u64) * 8;
                        bank.add(bucket, direction, amount);
                        added += amount;
                        if rng.gen_ratio(1, 1000) {
                            std::thread::yield_now();
                        }
                    }
                    added
                })
            })
            .collect();

        let added: u64 = producers.into_iter().map(|h| h.join().unwrap()).sum();
        done.store(true, Ordering::Release);
        let mut drained = drainer.join().unwrap();
        drained += bank
            .drain_all()
            .iter()
            .map(|(_, t)| t.inbound + t.outbound)
            .sum::<u64>();

        assert_eq!(drained, added);
    }
}

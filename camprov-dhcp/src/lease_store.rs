use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use camprov_common::HardwareAddress;

/// A DHCP lease: a hardware address holding an address until `expiry`.
///
/// `seq` is the creation order of this hardware address's *first* lease,
/// assigned once and carried across refreshes — it is what lets
/// `active_leases()` report leases in discovery order even though the
/// backing map has none (spec §8 invariant 5 / scenario S2).
#[derive(Debug, Clone)]
pub struct Lease {
    pub hw: HardwareAddress,
    pub addr: Ipv4Addr,
    pub expiry: u64,
    pub seq: u64,
}

impl Lease {
    pub fn is_active(&self, now: u64) -> bool {
        now < self.expiry
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// The lease table: at most one lease per hardware address. Guarded
/// externally by a mutex shared with the address pool so that a
/// DISCOVER/REQUEST is handled as a single atomic step.
#[derive(Default)]
pub struct LeaseStore {
    leases: HashMap<HardwareAddress, Lease>,
    next_seq: u64,
}

impl LeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a lease for `hw`. A hardware address keeps the
    /// creation sequence of its first lease across refreshes, so a
    /// repeat DISCOVER/REQUEST never reorders it relative to other
    /// devices.
    pub fn put(&mut self, hw: HardwareAddress, addr: Ipv4Addr, lease_time_secs: u64) {
        let seq = match self.leases.get(&hw) {
            Some(existing) => existing.seq,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                seq
            }
        };
        self.leases.insert(
            hw,
            Lease {
                hw,
                addr,
                expiry: now_secs() + lease_time_secs,
                seq,
            },
        );
    }

    /// The active lease for `hw`, if any. A lease past its expiry is
    /// treated as absent without being removed here; `purge_expired`
    /// owns eviction so the pool and table stay consistent.
    pub fn active_lease(&self, hw: &HardwareAddress) -> Option<&Lease> {
        let now = now_secs();
        self.leases.get(hw).filter(|l| l.is_active(now))
    }

    /// Whether `addr` is held by any active lease.
    pub fn is_address_leased(&self, addr: Ipv4Addr) -> bool {
        let now = now_secs();
        self.leases.values().any(|l| l.addr == addr && l.is_active(now))
    }

    /// Evict expired leases, returning the addresses that should be
    /// returned to the pool.
    pub fn purge_expired(&mut self) -> Vec<Ipv4Addr> {
        let now = now_secs();
        let expired: Vec<HardwareAddress> = self
            .leases
            .iter()
            .filter(|(_, l)| !l.is_active(now))
            .map(|(hw, _)| *hw)
            .collect();

        let mut freed = Vec::with_capacity(expired.len());
        for hw in expired {
            if let Some(l) = self.leases.remove(&hw) {
                freed.push(l.addr);
            }
        }
        freed
    }

    /// A snapshot of all currently active leases, for concurrent readers
    /// (the discovery prober) to list without blocking the server loop
    /// any longer than the copy. Ordered by creation sequence, i.e.
    /// discovery order, not by the backing map's arbitrary iteration
    /// order.
    pub fn active_leases(&self) -> Vec<Lease> {
        let now = now_secs();
        let mut leases: Vec<Lease> = self
            .leases
            .values()
            .filter(|l| l.is_active(now))
            .cloned()
            .collect();
        leases.sort_by_key(|l| l.seq);
        leases
    }
}

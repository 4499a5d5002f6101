use std::collections::HashSet;
use std::net::Ipv4Addr;

use rand::seq::IteratorRandom;

use crate::error::CamError;

/// An ordered finite set of addresses drawn from `[start, end]` inclusive,
/// with the server's own address removed.
///
/// Acquisition is deliberately randomized (not strictly ascending): two
/// devices racing with an identical source address must not repeatedly
/// collide on the same offered address.
#[derive(Debug, Clone)]
pub struct AddressPool {
    /// The full range this pool was constructed from, used to reject
    /// `release()` calls for addresses that were never part of it.
    start: u32,
    end: u32,
    available: HashSet<Ipv4Addr>,
}

impl AddressPool {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr, server_addr: Ipv4Addr) -> Result<Self, CamError> {
        let start_u32 = u32::from(start);
        let end_u32 = u32::from(end);

        if start_u32 > end_u32 {
            return Err(CamError::BadRange(format!(
                "range start {start} is greater than range end {end}"
            )));
        }

        let available = (start_u32..=end_u32)
            .map(Ipv4Addr::from)
            .filter(|a| *a != server_addr)
            .collect();

        Ok(Self {
            start: start_u32,
            end: end_u32,
            available,
        })
    }

    /// Draw an arbitrary address from the pool, or `None` if exhausted.
    /// Depletion is an expected condition, not an error.
    pub fn acquire(&mut self) -> Option<Ipv4Addr> {
        let mut rng = rand::rng();
        let addr = self.available.iter().choose(&mut rng).copied()?;
        self.available.remove(&addr);
        Some(addr)
    }

    /// Return an address to the pool. A no-op if `addr` was never part of
    /// the range this pool was constructed from.
    pub fn release(&mut self, addr: Ipv4Addr) {
        let v = u32::from(addr);
        if v < self.start || v > self.end {
            return;
        }
        self.available.insert(addr);
    }

    pub fn remaining(&self) -> usize {
        self.available.len()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let v = u32::from(addr);
        v >= self.start && v <= self.end
    }
}

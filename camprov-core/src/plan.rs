//! Assignment planner (component I): given a sequence of discovered
//! `(temp_addr, hw)` pairs and an [`AssignmentPlan`], yield the final
//! address for each device.
//!
//! CSV *parsing* is boundary glue that lives in the `camprov` binary
//! crate (spec Non-goal: "the on-disk CSV parser" is out of scope for
//! the core); this module only validates already-parsed rows and drives
//! the two resolution policies.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use camprov_common::{CamError, HardwareAddress};

/// One already-parsed row from the external CSV loader: an address and,
/// for the keyed format, the hardware address it's pinned to.
#[derive(Debug, Clone)]
pub struct PlanRow {
    pub addr: Ipv4Addr,
    pub hw: Option<HardwareAddress>,
}

/// The two assignment policies named in spec §3. Validated once at
/// load time; read-only afterwards.
#[derive(Debug, Clone)]
pub enum AssignmentPlan {
    Positional(Vec<Ipv4Addr>),
    Keyed(HashMap<HardwareAddress, Ipv4Addr>),
}

impl AssignmentPlan {
    /// Build a plan from parsed rows. All rows must agree on format: if
    /// any row carries a hardware address, every row must. Duplicate
    /// addresses (either form) or duplicate hardware addresses abort the
    /// load with `ErrDuplicate`.
    pub fn from_rows(rows: Vec<PlanRow>) -> Result<Self, CamError> {
        if rows.is_empty() {
            return Err(CamError::Config("assignment plan has no rows".into()));
        }

        let keyed_count = rows.iter().filter(|r| r.hw.is_some()).count();
        if keyed_count != 0 && keyed_count != rows.len() {
            return Err(CamError::Config(
                "assignment plan mixes keyed and positional rows".into(),
            ));
        }

        if keyed_count == 0 {
            let mut seen = std::collections::HashSet::new();
            let mut addrs = Vec::with_capacity(rows.len());
            for row in rows {
                if !seen.insert(row.addr) {
                    return Err(CamError::Duplicate(row.addr.to_string()));
                }
                addrs.push(row.addr);
            }
            return Ok(AssignmentPlan::Positional(addrs));
        }

        let mut map = HashMap::with_capacity(rows.len());
        let mut seen_addrs = std::collections::HashSet::new();
        for row in rows {
            let hw = row.hw.expect("keyed_count == rows.len() guarantees Some");
            if map.contains_key(&hw) {
                return Err(CamError::Duplicate(hw.canonical()));
            }
            if !seen_addrs.insert(row.addr) {
                return Err(CamError::Duplicate(row.addr.to_string()));
            }
            map.insert(hw, row.addr);
        }
        Ok(AssignmentPlan::Keyed(map))
    }
}

/// Drives one orchestrator run's worth of address resolution. Confined
/// to the run: never constructed once and reused across runs.
pub struct AssignmentPlanner {
    plan: AssignmentPlan,
    next_positional: usize,
}

impl AssignmentPlanner {
    pub fn new(plan: AssignmentPlan) -> Self {
        Self {
            plan,
            next_positional: 0,
        }
    }

    /// Resolve the final address for a device. In positional mode, each
    /// call consumes the next address in plan order regardless of `hw`
    /// — callers MUST call this in discovery order to satisfy the
    /// ordering invariant in spec §8.5. In keyed mode, `hw` determines
    /// the result independent of call order.
    pub fn resolve(&mut self, hw: HardwareAddress) -> Result<Ipv4Addr, CamError> {
        match &self.plan {
            AssignmentPlan::Positional(addrs) => {
                let addr = addrs.get(self.next_positional).copied();
                self.next_positional += 1;
                addr.ok_or(CamError::PlanExhausted)
            }
            AssignmentPlan::Keyed(map) => {
                map.get(&hw).copied().ok_or_else(|| CamError::NoMatch(hw.canonical()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hw(s: &str) -> HardwareAddress {
        s.parse().unwrap()
    }

    #[test]
    fn positional_assigns_kth_address_to_kth_device() {
        let plan = AssignmentPlan::from_rows(vec![
            PlanRow { addr: Ipv4Addr::new(10, 0, 0, 50), hw: None },
            PlanRow { addr: Ipv4Addr::new(10, 0, 0, 51), hw: None },
        ])
        .unwrap();
        let mut planner = AssignmentPlanner::new(plan);

        assert_eq!(planner.resolve(hw("AA:BB:CC:DD:EE:01")).unwrap(), Ipv4Addr::new(10, 0, 0, 50));
        assert_eq!(planner.resolve(hw("AA:BB:CC:DD:EE:02")).unwrap(), Ipv4Addr::new(10, 0, 0, 51));
    }

    #[test]
    fn positional_exhaustion_is_reported() {
        let plan = AssignmentPlan::from_rows(vec![PlanRow {
            addr: Ipv4Addr::new(10, 0, 0, 50),
            hw: None,
        }])
        .unwrap();
        let mut planner = AssignmentPlanner::new(plan);
        planner.resolve(hw("AA:BB:CC:DD:EE:01")).unwrap();
        assert!(matches!(
            planner.resolve(hw("AA:BB:CC:DD:EE:02")),
            Err(CamError::PlanExhausted)
        ));
    }

    #[test]
    fn keyed_resolves_by_hardware_address_independent_of_order() {
        let plan = AssignmentPlan::from_rows(vec![
            PlanRow { addr: Ipv4Addr::new(10, 0, 0, 60), hw: Some(hw("AA:BB:CC:DD:EE:01")) },
        ])
        .unwrap();
        let mut planner = AssignmentPlanner::new(plan);
        assert_eq!(planner.resolve(hw("AA:BB:CC:DD:EE:01")).unwrap(), Ipv4Addr::new(10, 0, 0, 60));
        assert!(matches!(
            planner.resolve(hw("AA:BB:CC:DD:EE:02")),
            Err(CamError::NoMatch(_))
        ));
    }

    #[test]
    fn duplicate_addresses_abort_load() {
        let result = AssignmentPlan::from_rows(vec![
            PlanRow { addr: Ipv4Addr::new(10, 0, 0, 50), hw: None },
            PlanRow { addr: Ipv4Addr::new(10, 0, 0, 50), hw: None },
        ]);
        assert!(matches!(result, Err(CamError::Duplicate(_))));
    }

    #[test]
    fn duplicate_hardware_addresses_abort_load() {
        let result = AssignmentPlan::from_rows(vec![
            PlanRow { addr: Ipv4Addr::new(10, 0, 0, 50), hw: Some(hw("AA:BB:CC:DD:EE:01")) },
            PlanRow { addr: Ipv4Addr::new(10, 0, 0, 51), hw: Some(hw("AA:BB:CC:DD:EE:01")) },
        ]);
        assert!(matches!(result, Err(CamError::Duplicate(_))));
    }

    #[test]
    fn mixed_rows_are_rejected() {
        let result = AssignmentPlan::from_rows(vec![
            PlanRow { addr: Ipv4Addr::new(10, 0, 0, 50), hw: Some(hw("AA:BB:CC:DD:EE:01")) },
            PlanRow { addr: Ipv4Addr::new(10, 0, 0, 51), hw: None },
        ]);
        assert!(matches!(result, Err(CamError::Config(_))));
    }
}

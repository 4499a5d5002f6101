//! Interface enumerator (component A): a pure snapshot of local network
//! interfaces with their IPv4 and link-layer addresses.
//!
//! Grounded in `hr-agent::connection::detect_ipv4_address`, which shells
//! out to `ip` rather than opening a netlink socket or adding a
//! `libpnet`/raw-socket dependency the teacher's stack doesn't carry;
//! generalized here from "one configured interface" to "every interface
//! on the host."

use std::collections::HashMap;
use std::net::Ipv4Addr;

use camprov_common::HardwareAddress;
use tracing::{debug, warn};

/// A local network interface snapshot. Interfaces without an IPv4
/// address are filtered out before this type is ever constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub ipv4: Ipv4Addr,
    pub mac: Option<HardwareAddress>,
}

/// List local interfaces that carry an IPv4 address, each paired with its
/// link-layer address when one could be determined. No change
/// notifications: this is a one-shot snapshot taken at call time.
pub async fn list_interfaces() -> Vec<NetworkInterface> {
    let macs = link_addresses().await;
    let ipv4s = ipv4_addresses().await;

    let mut interfaces = Vec::new();
    for (name, ipv4) in ipv4s {
        let mac = macs.get(&name).copied();
        interfaces.push(NetworkInterface { name, ipv4, mac });
    }
    interfaces
}

/// Parse `ip -o link show` for `name -> hardware address`.
async fn link_addresses() -> HashMap<String, HardwareAddress> {
    let output = tokio::process::Command::new("ip")
        .args(["-o", "link", "show"])
        .output()
        .await;

    let output = match output {
        Ok(o) if o.status.success() => o,
        Ok(o) => {
            warn!(status = ?o.status, "`ip -o link show` exited non-zero");
            return HashMap::new();
        }
        Err(e) => {
            warn!(error = %e, "failed to run `ip -o link show`");
            return HashMap::new();
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut macs = HashMap::new();

    for line in stdout.lines() {
        // "2: eth0: <BROADCAST,...> mtu 1500 ... link/ether aa:bb:cc:dd:ee:ff brd ..."
        let Some((_, rest)) = line.split_once(": ") else {
            continue;
        };
        let Some((name, rest)) = rest.split_once(':') else {
            continue;
        };
        let name = name.trim().to_string();

        let parts: Vec<&str> = rest.split_whitespace().collect();
        let Some(idx) = parts.iter().position(|&p| p == "link/ether") else {
            continue;
        };
        let Some(mac_str) = parts.get(idx + 1) else {
            continue;
        };
        match mac_str.parse::<HardwareAddress>() {
            Ok(mac) => {
                macs.insert(name, mac);
            }
            Err(_) => debug!(mac = %mac_str, "unparseable link/ether address"),
        }
    }

    macs
}

/// Parse `ip -o -4 addr show` for `name -> primary IPv4 address`. Loopback
/// and link-local addresses are skipped.
async fn ipv4_addresses() -> Vec<(String, Ipv4Addr)> {
    let output = tokio::process::Command::new("ip")
        .args(["-o", "-4", "addr", "show"])
        .output()
        .await;

    let output = match output {
        Ok(o) if o.status.success() => o,
        Ok(o) => {
            warn!(status = ?o.status, "`ip -o -4 addr show` exited non-zero");
            return Vec::new();
        }
        Err(e) => {
            warn!(error = %e, "failed to run `ip -o -4 addr show`");
            return Vec::new();
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut seen = Vec::new();

    for line in stdout.lines() {
        // "2: eth0    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0"
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(name) = parts.get(1) else { continue };
        let Some(idx) = parts.iter().position(|&p| p == "inet") else {
            continue;
        };
        let Some(cidr) = parts.get(idx + 1) else { continue };
        let addr_str = cidr.split('/').next().unwrap_or(cidr);

        let Ok(addr) = addr_str.parse::<Ipv4Addr>() else {
            continue;
        };
        if addr.is_loopback() || addr.is_link_local() {
            continue;
        }

        let name = name.trim_end_matches(':').to_string();
        if !seen.iter().any(|(n, _): &(String, Ipv4Addr)| n == &name) {
            seen.push((name, addr));
        }
    }

    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_interface_equality_ignores_nothing() {
        let a = NetworkInterface {
            name: "eth0".into(),
            ipv4: Ipv4Addr::new(10, 0, 0, 1),
            mac: None,
        };
        let b = a.clone();
        assert_eq!(a, b);
    }
}

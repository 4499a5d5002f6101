use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Static configuration for the DHCP server loop. Loaded once at process
/// start as part of `camprov.toml`; read-only for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DhcpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub interface: String,
    pub range_start: Ipv4Addr,
    pub range_end: Ipv4Addr,
    #[serde(default = "default_netmask")]
    pub netmask: Ipv4Addr,
    #[serde(default = "default_lease_time")]
    pub default_lease_time_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_netmask() -> Ipv4Addr {
    Ipv4Addr::new(255, 255, 255, 0)
}

fn default_lease_time() -> u64 {
    86400
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize() {
        let json = r#"{
            "range_start": "10.0.0.10",
            "range_end": "10.0.0.200"
        }"#;
        let config: DhcpConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.range_start, Ipv4Addr::new(10, 0, 0, 10));
        assert_eq!(config.range_end, Ipv4Addr::new(10, 0, 0, 200));
        assert_eq!(config.netmask, Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(config.default_lease_time_secs, 86400);
        assert!(config.enabled);
    }
}

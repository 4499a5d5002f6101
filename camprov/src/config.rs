//! Top-level `camprov.toml` schema: the single configuration file this
//! binary loads at startup. Grounded in `homeroute`'s `DnsDhcpConfig`
//! (one struct per subsystem, serde-deserialized from a config file),
//! generalized from JSON to TOML per the teacher's own `toml` +
//! `serde` convention used elsewhere in its workspace.

use std::path::{Path, PathBuf};

use camprov_common::{Credentials, NetworkConfig};
use camprov_dhcp::DhcpConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CamprovConfig {
    pub dhcp: DhcpConfig,
    pub credentials: Credentials,
    pub network: NetworkConfig,
    pub assignment_csv: PathBuf,
    #[serde(default)]
    pub report_csv: Option<PathBuf>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_discovery_window_secs")]
    pub discovery_window_secs: u64,
}

fn default_concurrency() -> usize {
    1
}

fn default_discovery_window_secs() -> u64 {
    120
}

impl CamprovConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_deserializes() {
        let toml = r#"
            assignment_csv = "plan.csv"

            [dhcp]
            range_start = "10.0.0.10"
            range_end = "10.0.0.200"

            [credentials]
            root_password = "secret"

            [network]
            subnet_mask = "255.255.255.0"
            gateway = "10.0.0.1"
        "#;
        let config: CamprovConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.discovery_window_secs, 120);
        assert_eq!(config.assignment_csv, PathBuf::from("plan.csv"));
    }
}

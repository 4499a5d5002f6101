mod config;
mod csv_load;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use camprov_common::{cancellation_pair, AddressPool, HardwareAddress};
use camprov_core::{DiscoveredDevice, OrchestratorConfig};
use camprov_dhcp::{DhcpState, SharedDhcpState};
use clap::Parser;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use config::CamprovConfig;

#[derive(Parser, Debug)]
#[command(name = "camprov", about = "Factory-new Axis camera provisioning")]
struct Cli {
    /// Path to camprov.toml.
    #[arg(long, default_value = "camprov.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,camprov=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    info!("camprov starting, reading config from {}", cli.config.display());

    let config = CamprovConfig::load(&cli.config)?;
    let plan = csv_load::load_plan(&config.assignment_csv)?;

    let interfaces = camprov_core::list_interfaces().await;
    let server_ip = pick_server_address(&interfaces, &config.dhcp.interface)?;
    info!(%server_ip, "DHCP server address selected");

    let pool = AddressPool::new(config.dhcp.range_start, config.dhcp.range_end, server_ip)?;
    let dhcp_state: SharedDhcpState = Arc::new(Mutex::new(DhcpState {
        config: config.dhcp.clone(),
        lease_store: camprov_dhcp::LeaseStore::new(),
        pool,
        server_ip,
    }));

    let (dhcp_cancel_handle, dhcp_cancel) = cancellation_pair();
    let dhcp_task = {
        let dhcp_state = dhcp_state.clone();
        tokio::spawn(async move { camprov_dhcp::run_dhcp_server(dhcp_state, dhcp_cancel).await })
    };

    let devices = run_discovery_scan(dhcp_state.clone(), Duration::from_secs(config.discovery_window_secs)).await;

    dhcp_cancel_handle.cancel();
    match dhcp_task.await {
        Ok(Err(e)) => error!("DHCP server exited with an error: {e}"),
        Err(e) => error!("DHCP server task panicked: {e}"),
        Ok(Ok(())) => {}
    }

    if devices.is_empty() {
        warn!("discovery window elapsed with no candidate devices found");
    }

    let mut orchestrator_config = OrchestratorConfig::new(config.credentials, config.network);
    orchestrator_config.vapix_port = None;

    let (_cancel_handle, run_cancel) = cancellation_pair();
    let result = camprov_core::run_with_concurrency(
        devices,
        plan,
        orchestrator_config,
        run_cancel,
        config.concurrency.max(1),
    )
    .await;

    for device in result.iter() {
        info!(
            hw = %device.hw,
            temp_addr = %device.temp_addr,
            final_addr = ?device.final_addr,
            status = %device.status.label(),
            "device provisioning finished"
        );
    }

    if let Some(report_path) = &config.report_csv {
        csv_load::write_report(report_path, &result)?;
        info!("wrote inventory report to {}", report_path.display());
    }

    let success = result.all_succeeded();
    info!(devices = result.len(), success, "run complete");

    std::process::exit(if success { 0 } else { 1 });
}

/// Choose the interface's IPv4 address to use as the DHCP server's own
/// address: the configured interface by name if set, otherwise the
/// first interface with a non-loopback IPv4 address.
fn pick_server_address(
    interfaces: &[camprov_core::NetworkInterface],
    configured_interface: &str,
) -> anyhow::Result<std::net::Ipv4Addr> {
    if !configured_interface.is_empty() {
        return interfaces
            .iter()
            .find(|i| i.name == configured_interface)
            .map(|i| i.ipv4)
            .ok_or_else(|| anyhow::anyhow!("configured interface '{configured_interface}' not found"));
    }
    interfaces
        .first()
        .map(|i| i.ipv4)
        .ok_or_else(|| anyhow::anyhow!("no network interface with an IPv4 address found"))
}

/// Poll the shared lease table for new leases, probing each newly-leased
/// address to confirm it is a target camera before adding it to the
/// discovery list. Devices are appended in first-observed order, which
/// the positional assignment planner depends on.
async fn run_discovery_scan(dhcp_state: SharedDhcpState, window: Duration) -> Vec<DiscoveredDevice> {
    let start = tokio::time::Instant::now();
    let mut seen: HashSet<HardwareAddress> = HashSet::new();
    let mut devices = Vec::new();

    while start.elapsed() < window {
        let leases = {
            let guard = dhcp_state.lock().await;
            guard.lease_store.active_leases()
        };

        for lease in leases {
            if seen.contains(&lease.hw) {
                continue;
            }
            if camprov_vapix::probe(lease.addr).await {
                info!(hw = %lease.hw, addr = %lease.addr, "discovered candidate camera");
                seen.insert(lease.hw);
                devices.push(DiscoveredDevice {
                    temp_addr: lease.addr,
                    hw: lease.hw,
                });
            }
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    devices
}

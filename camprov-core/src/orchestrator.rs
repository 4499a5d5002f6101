//! Provisioning orchestrator (component J): drives each discovered device
//! through the ordered, idempotent configuration program in spec §4.J.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use camprov_common::{CancellationToken, Credentials, HardwareAddress, NetworkConfig};
use camprov_vapix::client::{DEFAULT_RETRY_COUNT, DEFAULT_RETRY_SPACING, DEFAULT_TIMEOUT};
use camprov_vapix::waiter::{
    self, ReachabilityOutcome, DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL,
};
use camprov_vapix::{calls, VapixClient};
use tokio::sync::{Mutex, Notify, Semaphore};
use tracing::{error, info, warn};

use crate::plan::{AssignmentPlan, AssignmentPlanner};
use crate::record::{DeviceRecord, ResultRecord};

/// A device found by the discovery scan, ready to be handed to the
/// orchestrator: its temporary DHCP-leased address and hardware address.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveredDevice {
    pub temp_addr: Ipv4Addr,
    pub hw: HardwareAddress,
}

/// Configuration carried explicitly into the orchestrator at
/// construction (design note §9: no process-wide mutable defaults).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub credentials: Credentials,
    pub network: NetworkConfig,
    pub vapix_timeout: Duration,
    pub vapix_retry_count: u32,
    pub vapix_retry_spacing: Duration,
    pub reachability_max_wait: Duration,
    pub reachability_poll_interval: Duration,
    /// Non-default port every device is addressed on. `None` in
    /// production; set by test harnesses stubbing devices behind an
    /// ephemeral port.
    pub vapix_port: Option<u16>,
}

impl OrchestratorConfig {
    pub fn new(credentials: Credentials, network: NetworkConfig) -> Self {
        Self {
            credentials,
            network,
            vapix_timeout: DEFAULT_TIMEOUT,
            vapix_retry_count: DEFAULT_RETRY_COUNT,
            vapix_retry_spacing: DEFAULT_RETRY_SPACING,
            reachability_max_wait: DEFAULT_MAX_WAIT,
            reachability_poll_interval: DEFAULT_POLL_INTERVAL,
            vapix_port: None,
        }
    }
}

/// Process every device sequentially — the caller's default, since
/// cameras share a bandwidth-limited provisioning segment and
/// overlapping address changes add DHCP-layer noise (spec §4.J).
pub async fn run_sequential(
    devices: Vec<DiscoveredDevice>,
    plan: AssignmentPlan,
    config: OrchestratorConfig,
    cancel: CancellationToken,
) -> ResultRecord {
    run_with_concurrency(devices, plan, config, cancel, 1).await
}

/// Process devices with up to `concurrency` workers in flight.
///
/// Steps 1-5 run freely concurrent across devices, but step 6 (address
/// resolution) is serialized through a chain of per-device turn gates so
/// that the planner is always called in discovery order — every device
/// takes its turn at the same logical point whether or not it already
/// aborted during steps 1-5, which is what keeps the positional
/// planner's k-th-*successful*-device guarantee correct under
/// concurrency (spec §5, §8 invariant 5) instead of resolving an address
/// for every discovered device regardless of outcome.
pub async fn run_with_concurrency(
    devices: Vec<DiscoveredDevice>,
    plan: AssignmentPlan,
    config: OrchestratorConfig,
    cancel: CancellationToken,
    concurrency: usize,
) -> ResultRecord {
    let planner = Arc::new(Mutex::new(AssignmentPlanner::new(plan)));

    // gates[i] is this device's turn to resolve; gates[i+1] is signalled
    // once it has (or, having already aborted, skips straight through).
    let gates: Vec<Arc<Notify>> = (0..=devices.len()).map(|_| Arc::new(Notify::new())).collect();
    gates[0].notify_one();

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(devices.len());

    for (i, device) in devices.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let config = config.clone();
        let cancel = cancel.clone();
        let planner = planner.clone();
        let my_turn = gates[i].clone();
        let next_turn = gates[i + 1].clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            provision_device(device, planner, my_turn, next_turn, &config, &cancel).await
        }));
    }

    let mut result = ResultRecord::new();
    for handle in handles {
        match handle.await {
            Ok(record) => result.push(record),
            Err(e) => error!("device provisioning task panicked: {e}"),
        }
    }
    result
}

/// Steps 1-5 of spec §4.J: create the initial admin, the optional
/// secondary and ONVIF accounts, and apply the two non-fatal toggles.
/// Returns the client built for this device's temporary address, or
/// `None` if the device already aborted (the reason is recorded in
/// `record`).
async fn run_initial_steps(
    device: &DiscoveredDevice,
    config: &OrchestratorConfig,
    cancel: &CancellationToken,
    record: &mut DeviceRecord,
) -> Option<VapixClient> {
    macro_rules! bail_if_cancelled {
        () => {
            if cancel.is_cancelled() {
                info!(hw = %device.hw, "cancellation observed at step boundary");
                record.abort("cancelled");
                return None;
            }
        };
    }

    let client = match VapixClient::with_port(
        device.temp_addr,
        config.network.transport,
        config.vapix_port,
        config.vapix_timeout,
        config.vapix_retry_count,
        config.vapix_retry_spacing,
    ) {
        Ok(c) => c,
        Err(e) => {
            record.record_step("create-initial-admin", false, e.to_string());
            record.abort("initial-admin");
            return None;
        }
    };

    // Step 1: required.
    bail_if_cancelled!();
    let (ok, msg) = calls::create_initial_admin(&client, &config.credentials.root_password).await;
    record.record_step("create-initial-admin", ok, msg);
    if !ok {
        record.abort("initial-admin");
        return None;
    }

    // Step 2: non-fatal, only if configured.
    if let Some((user, pass)) = config.credentials.secondary() {
        bail_if_cancelled!();
        let (ok, msg) =
            calls::create_secondary_admin(&client, &config.credentials.root_password, user, pass).await;
        record.record_step("create-secondary-admin", ok, msg);
    }

    // Step 3: non-fatal, only if configured.
    if let Some((user, pass)) = config.credentials.onvif() {
        bail_if_cancelled!();
        let (ok, msg) =
            calls::create_onvif_user(&client, &config.credentials.root_password, user, pass).await;
        record.record_step("create-onvif-user", ok, msg);
    }

    // Step 4: non-fatal.
    bail_if_cancelled!();
    let (ok, msg) = calls::set_wdr_off(&client, &config.credentials.root_password).await;
    record.record_step("set-wdr-off", ok, msg);

    // Step 5: non-fatal.
    bail_if_cancelled!();
    let (ok, msg) = calls::set_replay_protection_off(&client, &config.credentials.root_password).await;
    record.record_step("set-replay-protection-off", ok, msg);

    Some(client)
}

/// Run the ordered program of spec §4.J for one device, recording each
/// step's outcome before proceeding. Returns the finalized record.
async fn provision_device(
    device: DiscoveredDevice,
    planner: Arc<Mutex<AssignmentPlanner>>,
    my_turn: Arc<Notify>,
    next_turn: Arc<Notify>,
    config: &OrchestratorConfig,
    cancel: &CancellationToken,
) -> DeviceRecord {
    let mut record = DeviceRecord::new(device.temp_addr, device.hw);

    let client = run_initial_steps(&device, config, cancel, &mut record).await;

    // Step 6: required, aborts with `no-address`. Every device waits for
    // its turn here, whether or not it already aborted above, so the
    // planner is always consulted in discovery order and only for
    // devices that actually reached this point — see `run_with_concurrency`.
    my_turn.notified().await;
    let resolution = if client.is_some() {
        Some(planner.lock().await.resolve(device.hw))
    } else {
        None
    };
    next_turn.notify_one();

    let (client, resolution) = match (client, resolution) {
        (Some(client), Some(resolution)) => (client, resolution),
        _ => return record,
    };

    if cancel.is_cancelled() {
        info!(hw = %device.hw, "cancellation observed at step boundary");
        record.abort("cancelled");
        return record;
    }

    let final_addr = match resolution {
        Ok(addr) => addr,
        Err(e) => {
            record.record_step("resolve-address", false, e.to_string());
            record.abort("no-address");
            return record;
        }
    };
    record.record_step("resolve-address", true, format!("resolved to {final_addr}"));

    // Step 7: required, aborts with `ip-configuration`.
    bail_if_cancelled!();
    let (ok, msg) = calls::set_static_address(
        &client,
        &config.credentials.root_password,
        final_addr,
        config.network.subnet_mask,
        config.network.gateway,
    )
    .await;
    record.record_step("set-static-address", ok, msg);
    if !ok {
        record.abort("ip-configuration");
        return record;
    }
    record.final_addr = Some(final_addr);

    // Step 8: required, aborts with `reachability`.
    bail_if_cancelled!();
    let (outcome, elapsed) = waiter::wait_for_reachable_on_port(
        final_addr,
        config.vapix_port,
        Credentials::ADMIN_USER,
        &config.credentials.root_password,
        config.network.transport,
        config.reachability_max_wait,
        config.reachability_poll_interval,
    )
    .await;
    let reachable = outcome == ReachabilityOutcome::Reachable;
    record.record_step(
        "reachability-wait",
        reachable,
        format!("{outcome:?} after {:.1}s", elapsed.as_secs_f64()),
    );
    if !reachable {
        record.abort("reachability");
        return record;
    }

    // Step 9: non-fatal; logged but never downgrades overall status.
    bail_if_cancelled!();
    let final_client = match VapixClient::with_port(
        final_addr,
        config.network.transport,
        config.vapix_port,
        config.vapix_timeout,
        config.vapix_retry_count,
        config.vapix_retry_spacing,
    ) {
        Ok(c) => c,
        Err(e) => {
            warn!(%final_addr, "could not build client to verify MAC/serial: {e}");
            record.record_step("get-mac-and-serial", false, e.to_string());
            record.succeed();
            return record;
        }
    };
    let (ok, mac, serial, msg) =
        calls::get_mac_and_serial(&final_client, &config.credentials.root_password).await;
    record.record_step("get-mac-and-serial", ok, msg);
    record.verified_hw = mac;
    record.serial = serial;

    record.succeed();
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orchestrator_config_carries_explicit_defaults() {
        let creds = Credentials {
            root_password: "pw".into(),
            secondary_user: None,
            secondary_password: None,
            onvif_user: None,
            onvif_password: None,
        };
        let net = NetworkConfig {
            subnet_mask: "255.255.255.0".parse().unwrap(),
            gateway: None,
            transport: camprov_common::Transport::Plain,
        };
        let config = OrchestratorConfig::new(creds, net);
        assert_eq!(config.vapix_retry_count, DEFAULT_RETRY_COUNT);
        assert_eq!(config.reachability_max_wait, DEFAULT_MAX_WAIT);
    }
}

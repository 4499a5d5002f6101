//! End-to-end orchestrator tests against a stubbed VAPIX endpoint,
//! covering the scenarios in spec §8 that exercise step sequencing,
//! the assignment planner, and result recording. The DHCP-side
//! scenarios (offered address stability, lease uniqueness) live in
//! `camprov-dhcp`'s own test suite; these tests start from an
//! already-discovered `(temp_addr, hw)` pair, which is what the
//! orchestrator actually consumes.
//!
//! The stub never validates digest responses cryptographically: it
//! only checks for the presence of an `Authorization` header on the
//! second round trip, since the subject under test is the client's
//! request sequencing, not RFC 7616 arithmetic (already covered by
//! `digest_auth`'s own test suite upstream).

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use camprov_common::{Credentials, NetworkConfig, Transport};
use camprov_core::plan::{AssignmentPlan, PlanRow};
use camprov_core::{run_sequential, DiscoveredDevice, OrchestratorConfig};
use std::collections::HashMap;

fn hw(s: &str) -> camprov_common::HardwareAddress {
    s.parse().unwrap()
}

fn credentials() -> Credentials {
    Credentials {
        root_password: "rootpw".into(),
        secondary_user: None,
        secondary_password: None,
        onvif_user: None,
        onvif_password: None,
    }
}

fn network() -> NetworkConfig {
    NetworkConfig {
        subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
        gateway: Some(Ipv4Addr::new(10, 0, 0, 1)),
        transport: Transport::Plain,
    }
}

#[derive(Default)]
struct StubState {
    /// When true, the unauthenticated add-user call returns 401, and the
    /// authenticated liveness probe with the same password is what
    /// reports success (S4).
    already_initialized: bool,
    /// When true, the replay-protection update is reported unsupported
    /// by the device (S6).
    replay_protection_unsupported: bool,
    /// Attempts remaining before the WDR update stops returning a
    /// transient server error (S5).
    wdr_transient_failures: AtomicU32,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.contains_key(axum::http::header::AUTHORIZATION)
}

fn challenge() -> (StatusCode, HeaderMap, String) {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::WWW_AUTHENTICATE,
        r#"Digest realm="AXIS", nonce="abc123", qop="auth""#.parse().unwrap(),
    );
    (StatusCode::UNAUTHORIZED, headers, String::new())
}

async fn pwdgrp(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Query(_params): Query<HashMap<String, String>>,
) -> (StatusCode, HeaderMap, String) {
    if state.already_initialized && !authorized(&headers) {
        return challenge();
    }
    (StatusCode::OK, HeaderMap::new(), "OK".into())
}

async fn usergroup(headers: HeaderMap) -> (StatusCode, HeaderMap, String) {
    if !authorized(&headers) {
        return challenge();
    }
    (StatusCode::OK, HeaderMap::new(), "root=admin".into())
}

async fn param(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, HeaderMap, String) {
    if !authorized(&headers) {
        return challenge();
    }

    if params.contains_key("ImageSource.I0.Sensor.WDR") {
        let remaining = state.wdr_transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            state.wdr_transient_failures.fetch_sub(1, Ordering::SeqCst);
            return (StatusCode::SERVICE_UNAVAILABLE, HeaderMap::new(), "overloaded".into());
        }
        return (StatusCode::OK, HeaderMap::new(), "OK".into());
    }

    if params.contains_key("WebService.UsernameToken.ReplayAttackProtection") {
        if state.replay_protection_unsupported {
            return (
                StatusCode::NOT_FOUND,
                HeaderMap::new(),
                "Error: No such parameter".into(),
            );
        }
        return (StatusCode::OK, HeaderMap::new(), "OK".into());
    }

    if params.get("action").map(String::as_str) == Some("list") {
        let body = "root.Network.eth0.MACAddress=00408C123456\nroot.Properties.System.SerialNumber=ACCC12345678\n";
        return (StatusCode::OK, HeaderMap::new(), body.into());
    }

    (StatusCode::OK, HeaderMap::new(), "OK".into())
}

async fn network_settings(headers: HeaderMap) -> (StatusCode, HeaderMap, String) {
    if !authorized(&headers) {
        return challenge();
    }
    (
        StatusCode::OK,
        HeaderMap::new(),
        r#"{"apiVersion":"1.0","data":{}}"#.into(),
    )
}

/// Stand the stub up on `127.0.0.1` plus every address in `final_addrs`,
/// all sharing one ephemeral port. The 127.0.0.0/8 range is entirely
/// loopback, so a device's "move" from its temporary address to its
/// assigned final address can be simulated by one process listening on
/// several loopback addresses, without any real network reconfiguration.
async fn spawn_stub(state: StubState, final_addrs: &[Ipv4Addr]) -> u16 {
    let state = Arc::new(state);
    let app = Router::new()
        .route("/axis-cgi/pwdgrp.cgi", get(pwdgrp))
        .route("/axis-cgi/usergroup.cgi", get(usergroup))
        .route("/axis-cgi/param.cgi", get(param))
        .route("/axis-cgi/network_settings.cgi", post(network_settings))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    {
        let app = app.clone();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
    }

    for final_addr in final_addrs {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from((*final_addr, port)))
            .await
            .unwrap();
        let app = app.clone();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
    }

    port
}

fn config_for(port: u16) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::new(credentials(), network());
    config.vapix_port = Some(port);
    config.reachability_max_wait = std::time::Duration::from_millis(500);
    config.reachability_poll_interval = std::time::Duration::from_millis(50);
    config
}

#[tokio::test]
async fn s1_single_device_positional_assignment_succeeds() {
    let final_addr = Ipv4Addr::new(127, 0, 0, 50);
    let port = spawn_stub(StubState::default(), &[final_addr]).await;
    let config = config_for(port);

    let plan = AssignmentPlan::from_rows(vec![PlanRow {
        addr: final_addr,
        hw: None,
    }])
    .unwrap();

    let devices = vec![DiscoveredDevice {
        temp_addr: Ipv4Addr::new(127, 0, 0, 1),
        hw: hw("AA:BB:CC:DD:EE:01"),
    }];

    let cancel = camprov_common::cancellation_pair().1;
    let result = run_sequential(devices, plan, config, cancel).await;

    assert_eq!(result.len(), 1);
    let device = result.iter().next().unwrap();
    assert_eq!(device.status, camprov_core::DeviceStatus::Success);
    assert_eq!(device.final_addr, Some(final_addr));
}

#[tokio::test]
async fn s3_keyed_assignment_one_hit_one_miss() {
    let final_addr = Ipv4Addr::new(127, 0, 0, 60);
    let port = spawn_stub(StubState::default(), &[final_addr]).await;
    let config = config_for(port);

    let plan = AssignmentPlan::from_rows(vec![PlanRow {
        addr: final_addr,
        hw: Some(hw("AABBCCDDEE01")),
    }])
    .unwrap();

    let devices = vec![
        DiscoveredDevice {
            temp_addr: Ipv4Addr::new(127, 0, 0, 1),
            hw: hw("AA:BB:CC:DD:EE:01"),
        },
        DiscoveredDevice {
            temp_addr: Ipv4Addr::new(127, 0, 0, 1),
            hw: hw("AA:BB:CC:DD:EE:02"),
        },
    ];

    let cancel = camprov_common::cancellation_pair().1;
    let result = run_sequential(devices, plan, config, cancel).await;

    let mut iter = result.iter();
    let first = iter.next().unwrap();
    assert_eq!(first.status, camprov_core::DeviceStatus::Success);
    assert_eq!(first.final_addr, Some(final_addr));

    let second = iter.next().unwrap();
    assert_eq!(second.status.label(), "failed_no-address");
}

#[tokio::test]
async fn s4_already_initialized_device_proceeds() {
    let final_addr = Ipv4Addr::new(127, 0, 0, 50);
    let port = spawn_stub(
        StubState {
            already_initialized: true,
            ..Default::default()
        },
        &[final_addr],
    )
    .await;
    let config = config_for(port);

    let plan = AssignmentPlan::from_rows(vec![PlanRow {
        addr: final_addr,
        hw: None,
    }])
    .unwrap();
    let devices = vec![DiscoveredDevice {
        temp_addr: Ipv4Addr::new(127, 0, 0, 1),
        hw: hw("AA:BB:CC:DD:EE:01"),
    }];

    let cancel = camprov_common::cancellation_pair().1;
    let result = run_sequential(devices, plan, config, cancel).await;

    let device = result.iter().next().unwrap();
    assert_eq!(device.status, camprov_core::DeviceStatus::Success);
    let (_, outcome) = device
        .steps
        .iter()
        .find(|(name, _)| name == "create-initial-admin")
        .unwrap();
    assert!(outcome.success);
    assert!(outcome.message.to_ascii_lowercase().contains("already exist"));
}

#[tokio::test]
async fn s5_transient_failure_recovers_after_retry() {
    let final_addr = Ipv4Addr::new(127, 0, 0, 50);
    let port = spawn_stub(
        StubState {
            wdr_transient_failures: AtomicU32::new(2),
            ..Default::default()
        },
        &[final_addr],
    )
    .await;
    let mut config = config_for(port);
    config.vapix_retry_spacing = std::time::Duration::from_millis(10);

    let plan = AssignmentPlan::from_rows(vec![PlanRow {
        addr: final_addr,
        hw: None,
    }])
    .unwrap();
    let devices = vec![DiscoveredDevice {
        temp_addr: Ipv4Addr::new(127, 0, 0, 1),
        hw: hw("AA:BB:CC:DD:EE:01"),
    }];

    let cancel = camprov_common::cancellation_pair().1;
    let result = run_sequential(devices, plan, config, cancel).await;

    let device = result.iter().next().unwrap();
    assert_eq!(device.status, camprov_core::DeviceStatus::Success);
    let (_, outcome) = device
        .steps
        .iter()
        .find(|(name, _)| name == "set-wdr-off")
        .unwrap();
    assert!(outcome.success);
}

#[tokio::test]
async fn s6_missing_parameter_is_reported_as_capability_absent() {
    let final_addr = Ipv4Addr::new(127, 0, 0, 50);
    let port = spawn_stub(
        StubState {
            replay_protection_unsupported: true,
            ..Default::default()
        },
        &[final_addr],
    )
    .await;
    let config = config_for(port);

    let plan = AssignmentPlan::from_rows(vec![PlanRow {
        addr: final_addr,
        hw: None,
    }])
    .unwrap();
    let devices = vec![DiscoveredDevice {
        temp_addr: Ipv4Addr::new(127, 0, 0, 1),
        hw: hw("AA:BB:CC:DD:EE:01"),
    }];

    let cancel = camprov_common::cancellation_pair().1;
    let result = run_sequential(devices, plan, config, cancel).await;

    let device = result.iter().next().unwrap();
    assert_eq!(device.status, camprov_core::DeviceStatus::Success);
    let (_, outcome) = device
        .steps
        .iter()
        .find(|(name, _)| name == "set-replay-protection-off")
        .unwrap();
    assert!(outcome.success);
    assert!(outcome.message.contains("No such parameter"));
}

#[tokio::test]
async fn cancellation_aborts_before_any_step_runs() {
    let port = spawn_stub(StubState::default(), &[]).await;
    let config = config_for(port);

    let plan = AssignmentPlan::from_rows(vec![PlanRow {
        addr: Ipv4Addr::new(10, 0, 0, 50),
        hw: None,
    }])
    .unwrap();
    let devices = vec![DiscoveredDevice {
        temp_addr: Ipv4Addr::new(127, 0, 0, 1),
        hw: hw("AA:BB:CC:DD:EE:01"),
    }];

    let (handle, cancel) = camprov_common::cancellation_pair();
    handle.cancel();
    let result = run_sequential(devices, plan, config, cancel).await;

    let device = result.iter().next().unwrap();
    assert_eq!(device.status.label(), "failed_cancelled");
    assert!(device.steps.is_empty());
}

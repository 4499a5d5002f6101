//! The VAPIX calls exposed to the orchestrator (component H, continued).
//!
//! Each function runs the client's uniform attempt/classify/retry loop
//! once and returns `(success, message)`, matching the shape every step
//! in `camprov-core::orchestrator` expects. Grounded call-by-call in
//! `camera_operations.py`'s `CameraOperations` methods, generalized from
//! exception-driven control flow to the `Outcome` classification in
//! [`crate::classify`].

use std::net::Ipv4Addr;

use camprov_common::{mask_to_prefix_len, CamError, HardwareAddress};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{info, warn};

use crate::classify::{classify_status_and_body, Outcome};
use crate::client::VapixClient;

const PWDGRP: &str = "/axis-cgi/pwdgrp.cgi";
const USERGROUP: &str = "/axis-cgi/usergroup.cgi";
const PARAM: &str = "/axis-cgi/param.cgi";
const ADMIN_PARAM: &str = "/axis-cgi/admin/param.cgi";
const NETWORK_SETTINGS: &str = "/axis-cgi/network_settings.cgi";
const BASIC_DEVICE_INFO: &str = "/axis-cgi/basicdeviceinfo.cgi";

/// Step 1: create the initial `root` administrator on a factory-new
/// camera. No auth on the add-user call itself; a 401/403 is checked
/// against an authenticated liveness probe with the same password,
/// since a camera already initialized with these exact credentials is
/// treated as already-set rather than a failure.
pub async fn create_initial_admin(client: &VapixClient, root_password: &str) -> (bool, String) {
    client
        .retrying(|_attempt| async move {
            let query = [
                ("action", "add"),
                ("user", "root"),
                ("pwd", root_password),
                ("grp", "root"),
                ("sgrp", "admin:operator:viewer:ptz"),
            ];

            match client.get(PWDGRP, &query).await {
                Ok((200, _)) => Outcome::Success("initial admin user 'root' created".into()),
                Ok((401, _)) | Ok((403, _)) => {
                    match client.digest_get(USERGROUP, &[], "root", root_password).await {
                        Ok((200, _)) => Outcome::DeviceState(
                            "admin user 'root' already exists with matching credentials".into(),
                        ),
                        Ok((status, body)) => Outcome::Auth(format!(
                            "camera is not in factory-new state and provided credentials are invalid (HTTP {status}: {body})"
                        )),
                        Err(outcome) => outcome,
                    }
                }
                Ok((status, body)) => classify_status_and_body(status, &body, &[]),
                Err(outcome) => outcome,
            }
        })
        .await
}

/// Step 2: create the secondary administrator account, authenticated as
/// `root`. "account already exist" is a recognized non-error.
pub async fn create_secondary_admin(
    client: &VapixClient,
    root_password: &str,
    user: &str,
    password: &str,
) -> (bool, String) {
    client
        .retrying(|_attempt| async move {
            let query = [
                ("action", "add"),
                ("user", user),
                ("pwd", password),
                ("grp", "users"),
                ("sgrp", "admin:operator:viewer:ptz"),
            ];
            match client.digest_get(PWDGRP, &query, "root", root_password).await {
                Ok((status, body)) => {
                    classify_status_and_body(status, &body, &["account already exist"])
                }
                Err(outcome) => outcome,
            }
        })
        .await
}

/// Step 3: create the ONVIF-capable user. On a conflict, attempt an
/// update of the existing account instead of failing; both the update
/// succeeding and the update itself failing are treated as success,
/// since the account already exists either way.
pub async fn create_onvif_user(
    client: &VapixClient,
    root_password: &str,
    user: &str,
    password: &str,
) -> (bool, String) {
    client
        .retrying(|_attempt| async move {
            let add_query = [
                ("action", "add"),
                ("user", user),
                ("pwd", password),
                ("grp", "users"),
                ("sgrp", "onvif:admin:operator:viewer"),
            ];

            match client.digest_get(PWDGRP, &add_query, "root", root_password).await {
                Ok((200, _)) => Outcome::Success(format!("ONVIF user '{user}' created")),
                Ok((_status, body)) if body.to_ascii_lowercase().contains("account already exist") => {
                    let update_query = [
                        ("action", "update"),
                        ("user", user),
                        ("pwd", password),
                        ("grp", "users"),
                        ("sgrp", "onvif:admin:operator:viewer"),
                    ];
                    match client
                        .digest_get(PWDGRP, &update_query, "root", root_password)
                        .await
                    {
                        Ok((200, _)) => Outcome::DeviceState(format!(
                            "ONVIF user '{user}' already existed, updated settings"
                        )),
                        _ => Outcome::DeviceState(format!(
                            "ONVIF user '{user}' already existed, but could not update"
                        )),
                    }
                }
                Ok((status, body)) => classify_status_and_body(status, &body, &[]),
                Err(outcome) => outcome,
            }
        })
        .await
}

/// Step 4: turn off Wide Dynamic Range.
pub async fn set_wdr_off(client: &VapixClient, root_password: &str) -> (bool, String) {
    client
        .retrying(|_attempt| async move {
            let query = [("action", "update"), ("ImageSource.I0.Sensor.WDR", "off")];
            match client.digest_get(PARAM, &query, "root", root_password).await {
                Ok((status, body)) => classify_status_and_body(status, &body, &[]),
                Err(outcome) => outcome,
            }
        })
        .await
}

/// Step 5: turn off replay-attack protection. A "No such parameter"
/// body is a recognized non-error: the capability is simply absent on
/// this camera model.
pub async fn set_replay_protection_off(client: &VapixClient, root_password: &str) -> (bool, String) {
    client
        .retrying(|_attempt| async move {
            let query = [
                ("action", "update"),
                ("WebService.UsernameToken.ReplayAttackProtection", "no"),
            ];
            match client.digest_get(PARAM, &query, "root", root_password).await {
                Ok((status, body)) => {
                    classify_status_and_body(status, &body, &["No such parameter"])
                }
                Err(outcome) => outcome,
            }
        })
        .await
}

/// Step 7: set the final static network configuration. The subnet mask
/// is converted to a prefix length before any network I/O; a
/// non-contiguous mask fails immediately with no retry. The modern JSON
/// endpoint is tried first, with the legacy parameter endpoint as a
/// fallback — either one alone returning success is success.
pub async fn set_static_address(
    client: &VapixClient,
    root_password: &str,
    addr: Ipv4Addr,
    mask: Ipv4Addr,
    gateway: Option<Ipv4Addr>,
) -> (bool, String) {
    let prefix_len = match mask_to_prefix_len(mask) {
        Ok(p) => p,
        Err(CamError::BadMask(msg)) => return (false, msg),
        Err(e) => return (false, e.to_string()),
    };

    client
        .retrying(|_attempt| async move {
            let payload = serde_json::json!({
                "apiVersion": "1.0",
                "context": "camprov",
                "method": "setIPv4AddressConfiguration",
                "params": {
                    "deviceName": "eth0",
                    "configurationMode": "static",
                    "staticDefaultRouter": gateway.map(|g| g.to_string()).unwrap_or_default(),
                    "staticAddressConfigurations": [
                        { "address": addr.to_string(), "prefixLength": prefix_len }
                    ]
                }
            });

            match client
                .digest_post_json(NETWORK_SETTINGS, &payload, "root", root_password)
                .await
            {
                Ok((200, body)) if !json_reports_error(&body) => {
                    return Outcome::Success(format!("static address set to {addr} via JSON API"));
                }
                Ok((status, body)) => {
                    warn!(%addr, status, "JSON static-address API failed, falling back to legacy param.cgi");
                    let _ = (status, body);
                }
                Err(outcome) => {
                    warn!(%addr, "JSON static-address API transport error, falling back to legacy param.cgi: {outcome:?}");
                }
            }

            let gw = gateway.map(|g| g.to_string()).unwrap_or_default();
            let query = [
                ("action", "update"),
                ("Network.InterfaceName", "eth0"),
                ("Network.BootProto", "static"),
                ("Network.IPAddress", addr.to_string().as_str()),
                ("Network.SubnetMask", mask.to_string().as_str()),
                ("Network.DefaultRouter", gw.as_str()),
            ];
            match client.digest_get(ADMIN_PARAM, &query, "root", root_password).await {
                Ok((200, body)) if !body.contains("Error") => {
                    Outcome::Success(format!("static address set to {addr} via legacy param.cgi"))
                }
                Ok((status, body)) => classify_status_and_body(status, &body, &[]),
                Err(outcome) => outcome,
            }
        })
        .await
}

fn json_reports_error(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").cloned())
        .is_some()
}

/// Step 9: read back the device's MAC and serial number for
/// verification. Reads the parameter API first, falling back to the
/// basic-device-info XML endpoint. Either value alone is a success.
pub async fn get_mac_and_serial(
    client: &VapixClient,
    root_password: &str,
) -> (bool, Option<HardwareAddress>, Option<String>, String) {
    let query = [
        ("action", "list"),
        (
            "group",
            "root.Network.eth0.MACAddress,root.Properties.System.SerialNumber",
        ),
    ];

    if let Ok((200, body)) = client.digest_get(PARAM, &query, "root", root_password).await {
        let mac = extract_param_value(&body, "MACAddress").and_then(|v| v.parse().ok());
        let serial = extract_param_value(&body, "SerialNumber");
        if mac.is_some() || serial.is_some() {
            info!("read MAC/serial from parameter API");
            return (true, mac, serial, "read MAC/serial from parameter API".into());
        }
    }

    match client.digest_get(BASIC_DEVICE_INFO, &[], "root", root_password).await {
        Ok((200, body)) => {
            let (mac, serial) = parse_basic_device_info_xml(&body);
            if mac.is_some() || serial.is_some() {
                (
                    true,
                    mac,
                    serial,
                    "read MAC/serial from basic-device-info fallback".into(),
                )
            } else {
                (false, None, None, "no MAC or serial in any response".into())
            }
        }
        Ok((status, body)) => (false, None, None, format!("HTTP {status}: {body}")),
        Err(outcome) => (false, None, None, format!("{outcome:?}")),
    }
}

/// Parse a VAPIX `param.cgi?action=list` response line of the shape
/// `root.Foo.Bar=value` and return the value for a key ending in `key`.
fn extract_param_value(body: &str, key: &str) -> Option<String> {
    body.lines().find_map(|line| {
        let (name, value) = line.split_once('=')?;
        name.ends_with(key).then(|| value.trim().to_string())
    })
}

/// Extract `<SerialNumber>`/`<MACAddress>` text content from the
/// basic-device-info XML body, regardless of nesting.
fn parse_basic_device_info_xml(xml: &str) -> (Option<HardwareAddress>, Option<String>) {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut mac = None;
    let mut serial = None;
    let mut current_tag = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current_tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().unwrap_or_default().to_string();
                match current_tag.as_str() {
                    "SerialNumber" => serial = Some(text),
                    "MACAddress" => mac = text.parse().ok(),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    (mac, serial)
}

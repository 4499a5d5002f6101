use std::net::Ipv4Addr;
use tracing::{debug, info};

use camprov_common::AddressPool;

use crate::config::DhcpConfig;
use crate::lease_store::LeaseStore;
use crate::options::{DhcpOption, DHCPACK, DHCPDISCOVER, DHCPOFFER, DHCPREQUEST};
use crate::packet::DhcpPacket;

/// Handle an incoming DHCP packet and produce a reply, if any.
///
/// Only DISCOVER and REQUEST are acted on. Every other message type —
/// including DECLINE, RELEASE, and INFORM — is dropped without a reply;
/// this server tracks leases it hands out and nothing else.
pub fn handle_dhcp_packet(
    packet: &DhcpPacket,
    config: &DhcpConfig,
    lease_store: &mut LeaseStore,
    pool: &mut AddressPool,
    server_ip: Ipv4Addr,
) -> Option<DhcpPacket> {
    let msg_type = packet.msg_type()?;

    match msg_type {
        DHCPDISCOVER => handle_discover(packet, config, lease_store, pool, server_ip),
        DHCPREQUEST => handle_request(packet, config, lease_store, server_ip),
        other => {
            debug!("dropping DHCP message type {}", other);
            None
        }
    }
}

fn handle_discover(
    packet: &DhcpPacket,
    config: &DhcpConfig,
    lease_store: &mut LeaseStore,
    pool: &mut AddressPool,
    server_ip: Ipv4Addr,
) -> Option<DhcpPacket> {
    let hw = packet.hardware_address();

    let offered = if let Some(lease) = lease_store.active_lease(&hw) {
        lease.addr
    } else {
        let addr = pool.acquire()?;
        addr
    };

    lease_store.put(hw, offered, config.default_lease_time_secs);
    info!("DHCPOFFER {} to {}", offered, hw);

    let options = build_reply_options(config, server_ip);
    Some(packet.build_reply(DHCPOFFER, offered, server_ip, options))
}

fn handle_request(
    packet: &DhcpPacket,
    config: &DhcpConfig,
    lease_store: &mut LeaseStore,
    server_ip: Ipv4Addr,
) -> Option<DhcpPacket> {
    let hw = packet.hardware_address();

    let addr = lease_store.active_lease(&hw)?.addr;
    lease_store.put(hw, addr, config.default_lease_time_secs);
    info!("DHCPACK {} to {}", addr, hw);

    let options = build_reply_options(config, server_ip);
    Some(packet.build_reply(DHCPACK, addr, server_ip, options))
}

/// The server's address stands in for both the router and the name
/// server option, since this server is the only infrastructure the
/// provisioning segment has.
fn build_reply_options(config: &DhcpConfig, server_ip: Ipv4Addr) -> Vec<DhcpOption> {
    vec![
        DhcpOption::server_id(server_ip),
        DhcpOption::lease_time(config.default_lease_time_secs as u32),
        DhcpOption::subnet_mask(config.netmask),
        DhcpOption::router(server_ip),
        DhcpOption::dns_server(server_ip),
    ]
}

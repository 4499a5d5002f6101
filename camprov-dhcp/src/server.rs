use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use crate::packet::DhcpPacket;
use crate::state_machine;
use crate::{CancellationToken, DhcpState, SharedDhcpState};

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Run the DHCP server on port 67 until `cancel` is signalled.
///
/// The loop binds once and processes one datagram end-to-end before the
/// next, giving lease-table mutations a total order visible to
/// concurrent readers. Cancellation is checked at each receive timeout,
/// so shutdown happens within about a second of the signal.
pub async fn run_dhcp_server(state: SharedDhcpState, cancel: CancellationToken) -> Result<()> {
    let config = state.lock().await.config.clone();

    if !config.enabled {
        info!("DHCP server disabled");
        return Ok(());
    }

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;

    let addr: SocketAddr = "0.0.0.0:67".parse().unwrap();
    socket.bind(&addr.into())?;

    #[cfg(target_os = "linux")]
    if !config.interface.is_empty() {
        socket.bind_device(Some(config.interface.as_bytes()))?;
        info!("DHCP bound to interface {}", config.interface);
    }

    socket.set_nonblocking(true)?;
    let socket = tokio::net::UdpSocket::from_std(socket.into())?;

    info!("DHCP server listening on 0.0.0.0:67");

    let mut buf = [0u8; 1500];

    loop {
        if cancel.is_cancelled() {
            info!("DHCP server shutting down");
            return Ok(());
        }

        let recv = tokio::time::timeout(RECV_TIMEOUT, socket.recv_from(&mut buf)).await;

        let (len, src) = match recv {
            Err(_elapsed) => {
                // The receive timeout also doubles as the point where
                // expired leases are swept back into the pool (spec §8
                // invariant 2); no datagram arrived, so there is no
                // total-order concern with a request being handled.
                let mut guard = state.lock().await;
                let DhcpState {
                    ref mut lease_store,
                    ref mut pool,
                    ..
                } = *guard;
                for addr in lease_store.purge_expired() {
                    pool.release(addr);
                }
                continue;
            }
            Ok(Err(e)) => {
                warn!("DHCP recv error: {}", e);
                continue;
            }
            Ok(Ok(r)) => r,
        };

        let packet_data = &buf[..len];

        let packet = match DhcpPacket::parse(packet_data) {
            Ok(p) => p,
            Err(e) => {
                debug!("invalid DHCP packet from {}: {}", src, e);
                continue;
            }
        };

        if packet.op != 1 {
            continue;
        }

        let mut guard = state.lock().await;
        let config = guard.config.clone();
        let server_ip = guard.server_ip;
        let DhcpState {
            ref mut lease_store,
            ref mut pool,
            ..
        } = *guard;

        let response = state_machine::handle_dhcp_packet(&packet, &config, lease_store, pool, server_ip);

        drop(guard);

        if let Some(response) = response {
            let response_bytes = response.to_bytes();
            let dest = SocketAddr::new(Ipv4Addr::BROADCAST.into(), 68);

            if let Err(e) = socket.send_to(&response_bytes, dest).await {
                warn!("failed to send DHCP response to {}: {}", dest, e);
            }
        }
    }
}

pub mod config;
pub mod lease_store;
pub mod options;
pub mod packet;
pub mod server;
pub mod state_machine;

pub use config::DhcpConfig;
pub use lease_store::LeaseStore;
pub use server::run_dhcp_server;

use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::Mutex;

use camprov_common::AddressPool;

// Re-exported so existing callers of `camprov_dhcp::CancellationToken` keep
// working; the signal itself lives in `camprov-common` so the orchestrator
// (which has no other reason to depend on `camprov-dhcp`) can share it too.
pub use camprov_common::{cancellation_pair, CancellationHandle, CancellationToken};

/// State shared between the server loop and concurrent lease-table readers
/// (the discovery scan). The server loop holds the mutex only across
/// lookup + insert + expiry check; no HTTP I/O ever happens under it.
pub struct DhcpState {
    pub config: config::DhcpConfig,
    pub lease_store: lease_store::LeaseStore,
    pub pool: AddressPool,
    pub server_ip: Ipv4Addr,
}

pub type SharedDhcpState = Arc<Mutex<DhcpState>>;

pub mod cancellation;
pub mod credentials;
pub mod error;
pub mod hwaddr;
pub mod netconfig;
pub mod pool;

pub use cancellation::{cancellation_pair, CancellationHandle, CancellationToken};
pub use credentials::Credentials;
pub use error::{CamError, Result};
pub use hwaddr::HardwareAddress;
pub use netconfig::{mask_to_prefix_len, NetworkConfig, Transport};
pub use pool::AddressPool;

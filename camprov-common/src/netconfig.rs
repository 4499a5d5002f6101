use serde::Deserialize;
use std::net::Ipv4Addr;

use crate::error::CamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Plain,
    Tls,
}

impl Transport {
    pub fn scheme(&self) -> &'static str {
        match self {
            Transport::Plain => "http",
            Transport::Tls => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Transport::Plain => 80,
            Transport::Tls => 443,
        }
    }
}

/// The final network configuration applied to a device at step 7.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub subnet_mask: Ipv4Addr,
    #[serde(default)]
    pub gateway: Option<Ipv4Addr>,
    #[serde(default = "default_transport")]
    pub transport: Transport,
}

fn default_transport() -> Transport {
    Transport::Plain
}

/// Convert a dotted-decimal subnet mask to a CIDR prefix length.
/// Non-contiguous masks fail with `ErrBadMask` before any network I/O is
/// attempted. Delegates the contiguity check to `ipnet` rather than
/// hand-counting bits.
pub fn mask_to_prefix_len(mask: Ipv4Addr) -> Result<u8, CamError> {
    ipnet::Ipv4Net::with_netmask(Ipv4Addr::UNSPECIFIED, mask)
        .map(|net| net.prefix_len())
        .map_err(|_| CamError::BadMask(format!("{mask} is not a contiguous subnet mask")))
}

use std::net::Ipv4Addr;

/// DHCP option codes (RFC 2132) consumed or emitted by this server.
/// Only this fixed set is handled; anything else parses into a generic
/// `DhcpOption` but is never acted on.
pub const OPT_SUBNET_MASK: u8 = 1;
pub const OPT_ROUTER: u8 = 3;
pub const OPT_DNS_SERVER: u8 = 6;
pub const OPT_LEASE_TIME: u8 = 51;
pub const OPT_MSG_TYPE: u8 = 53;
pub const OPT_SERVER_ID: u8 = 54;
pub const OPT_END: u8 = 255;
pub const OPT_PAD: u8 = 0;

/// DHCP message types
pub const DHCPDISCOVER: u8 = 1;
pub const DHCPOFFER: u8 = 2;
pub const DHCPREQUEST: u8 = 3;
pub const DHCPDECLINE: u8 = 4;
pub const DHCPACK: u8 = 5;
pub const DHCPNAK: u8 = 6;
pub const DHCPRELEASE: u8 = 7;
pub const DHCPINFORM: u8 = 8;

/// A parsed DHCP option
#[derive(Debug, Clone)]
pub struct DhcpOption {
    pub code: u8,
    pub data: Vec<u8>,
}

impl DhcpOption {
    pub fn new(code: u8, data: Vec<u8>) -> Self {
        Self { code, data }
    }

    pub fn msg_type(t: u8) -> Self {
        Self::new(OPT_MSG_TYPE, vec![t])
    }

    pub fn server_id(ip: Ipv4Addr) -> Self {
        Self::new(OPT_SERVER_ID, ip.octets().to_vec())
    }

    pub fn lease_time(secs: u32) -> Self {
        Self::new(OPT_LEASE_TIME, secs.to_be_bytes().to_vec())
    }

    pub fn subnet_mask(mask: Ipv4Addr) -> Self {
        Self::new(OPT_SUBNET_MASK, mask.octets().to_vec())
    }

    pub fn router(ip: Ipv4Addr) -> Self {
        Self::new(OPT_ROUTER, ip.octets().to_vec())
    }

    pub fn dns_server(ip: Ipv4Addr) -> Self {
        Self::new(OPT_DNS_SERVER, ip.octets().to_vec())
    }

    /// Extract IPv4 address from option data
    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        if self.data.len() == 4 {
            Some(Ipv4Addr::new(self.data[0], self.data[1], self.data[2], self.data[3]))
        } else {
            None
        }
    }

    /// Extract u8 from option data
    pub fn as_u8(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

/// Parse DHCP options from bytes (after the magic cookie).
pub fn parse_options(data: &[u8]) -> Vec<DhcpOption> {
    let mut options = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let code = data[i];
        if code == OPT_END {
            break;
        }
        if code == OPT_PAD {
            i += 1;
            continue;
        }

        i += 1;
        if i >= data.len() {
            break;
        }

        let len = data[i] as usize;
        i += 1;

        if i + len > data.len() {
            break;
        }

        options.push(DhcpOption::new(code, data[i..i + len].to_vec()));
        i += len;
    }

    options
}

/// Encode DHCP options to bytes, terminated by option 255.
pub fn encode_options(options: &[DhcpOption]) -> Vec<u8> {
    let mut buf = Vec::new();
    for opt in options {
        buf.push(opt.code);
        buf.push(opt.data.len() as u8);
        buf.extend_from_slice(&opt.data);
    }
    buf.push(OPT_END);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_options() {
        let opts = vec![
            DhcpOption::msg_type(DHCPOFFER),
            DhcpOption::server_id(Ipv4Addr::new(10, 0, 0, 1)),
            DhcpOption::lease_time(86400),
        ];
        let bytes = encode_options(&opts);
        let parsed = parse_options(&bytes);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].as_u8(), Some(DHCPOFFER));
        assert_eq!(parsed[1].as_ipv4(), Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn truncated_option_is_dropped() {
        // code 1 ("subnet mask"), declared length 4, but only 1 byte follows.
        let data = [OPT_SUBNET_MASK, 4, 0xFF];
        let parsed = parse_options(&data);
        assert!(parsed.is_empty());
    }
}

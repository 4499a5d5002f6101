use std::fmt;
use std::str::FromStr;

use crate::error::CamError;

/// A six-octet hardware (MAC) address, always held in its canonical
/// form: twelve uppercase hex characters, no separators.
///
/// Canonicalization is representation-independent: colon-, hyphen-, and
/// dot-delimited forms, and bare 12-character hex, all parse to the same
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    pub fn from_octets(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Canonical form: uppercase hex, no separators (e.g. `00408C123456`).
    pub fn canonical(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl FromStr for HardwareAddress {
    type Err = CamError;

    /// Accepts colon-, hyphen-, or dot-separated hex, or a bare 12-hex-digit
    /// string; rejects anything that doesn't decode to exactly six octets.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();

        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CamError::Config(format!(
                "invalid hardware address: {s}"
            )));
        }

        let mut octets = [0u8; 6];
        for i in 0..6 {
            octets[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| CamError::Config(format!("invalid hardware address: {s}")))?;
        }

        Ok(Self(octets))
    }
}

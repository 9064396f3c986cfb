//! Hardware addresses.

use std::fmt;
use std::str::FromStr;

use super::error::AddressError;

/// A validated 48-bit hardware address such as `00:11:22:33:AA:BB`.
///
/// Only the canonical upper-case, colon-separated form is accepted, matching
/// what RFCOMM stacks report for remote devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress([u8; 6]);

impl PeerAddress {
    /// Textual length of a canonical address.
    pub const TEXT_LEN: usize = 17;

    /// Create an address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Parse a canonical address string.
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        let raw = text.as_bytes();
        if raw.len() != Self::TEXT_LEN {
            return Err(AddressError::Malformed(text.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let at = i * 3;
            if i > 0 && raw[at - 1] != b':' {
                return Err(AddressError::Malformed(text.to_string()));
            }
            let hi = hex_value(raw[at])
                .ok_or_else(|| AddressError::InvalidDigit(text.to_string()))?;
            let lo = hex_value(raw[at + 1])
                .ok_or_else(|| AddressError::InvalidDigit(text.to_string()))?;
            *byte = (hi << 4) | lo;
        }

        Ok(Self(bytes))
    }

    /// Check whether `text` is a canonical address.
    pub fn is_valid(text: &str) -> bool {
        Self::parse(text).is_ok()
    }

    /// Get the address bytes.
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for PeerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; 6]> for PeerAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self::new(bytes)
    }
}

impl serde::Serialize for PeerAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for PeerAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical() {
        let addr = PeerAddress::parse("00:11:22:33:AA:BB").unwrap();
        assert_eq!(addr.as_bytes(), &[0x00, 0x11, 0x22, 0x33, 0xAA, 0xBB]);
        assert_eq!(addr.to_string(), "00:11:22:33:AA:BB");
    }

    #[test]
    fn test_rejects_lower_case() {
        assert!(matches!(
            PeerAddress::parse("00:11:22:33:aa:bb"),
            Err(AddressError::InvalidDigit(_))
        ));
    }

    #[test]
    fn test_rejects_bad_shape() {
        assert!(!PeerAddress::is_valid(""));
        assert!(!PeerAddress::is_valid("00:11:22:33:AA"));
        assert!(!PeerAddress::is_valid("00-11-22-33-AA-BB"));
        assert!(!PeerAddress::is_valid("00:11:22:33:AA:BB:"));
    }

    #[test]
    fn test_from_str() {
        let addr: PeerAddress = "DE:AD:BE:EF:00:01".parse().unwrap();
        assert_eq!(addr, PeerAddress::new([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]));
    }
}

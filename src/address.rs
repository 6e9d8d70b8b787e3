//! # Printer Addresses
//!
//! Bluetooth hardware addresses in the canonical `XX:XX:XX:XX:XX:XX` form.
//!
//! Validation is case-insensitive and never rewrites the input: an address
//! accepted as `aa:bb:cc:dd:ee:ff` is stored and reported in lowercase.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EstafetaError;

/// Validate a Bluetooth MAC address format (XX:XX:XX:XX:XX:XX).
///
/// Exactly six groups of two hex digits joined by colons. Any other
/// grouping, length or separator fails.
///
/// ```
/// use estafeta::address::validate;
///
/// assert!(validate("AA:BB:CC:DD:EE:FF"));
/// assert!(!validate("AA:BB:CC:DD:EE"));
/// assert!(!validate("AABBCCDDEEFF"));
/// ```
pub fn validate(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return false;
    }
    parts
        .iter()
        .all(|part| part.len() == 2 && part.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// A validated printer hardware address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrinterAddress(String);

impl PrinterAddress {
    /// Parse and validate an address, keeping the caller's spelling.
    pub fn parse(s: &str) -> Result<Self, EstafetaError> {
        if validate(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(EstafetaError::InvalidAddress(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key used to group operations on the same physical device.
    ///
    /// `aa:..` and `AA:..` name the same radio.
    pub fn device_key(&self) -> String {
        self.0.to_ascii_uppercase()
    }

    /// The six octets in display order (most significant first).
    pub fn octets(&self) -> [u8; 6] {
        let mut out = [0u8; 6];
        for (slot, part) in out.iter_mut().zip(self.0.split(':')) {
            // Validated on construction
            *slot = u8::from_str_radix(part, 16).unwrap_or(0);
        }
        out
    }
}

impl fmt::Display for PrinterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PrinterAddress {
    type Err = EstafetaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PrinterAddress {
    type Error = EstafetaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if validate(&value) {
            Ok(Self(value))
        } else {
            Err(EstafetaError::InvalidAddress(value))
        }
    }
}

impl From<PrinterAddress> for String {
    fn from(value: PrinterAddress) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_mac_addresses() {
        assert!(validate("00:11:22:33:44:55"));
        assert!(validate("AA:BB:CC:DD:EE:FF"));
        assert!(validate("aa:bb:cc:dd:ee:ff"));
        assert!(validate("aA:Bb:cC:Dd:eE:Ff"));
        assert!(validate("00:00:00:00:00:00"));
    }

    #[test]
    fn test_invalid_mac_addresses() {
        assert!(!validate("00:11:22:33:44")); // too short
        assert!(!validate("00:11:22:33:44:55:66")); // too long
        assert!(!validate("00-11-22-33-44-55")); // wrong separator
        assert!(!validate("001122334455")); // no separator
        assert!(!validate("0:11:22:33:44:55")); // short group
        assert!(!validate("000:11:22:33:44:55")); // long group
        assert!(!validate("GG:HH:II:JJ:KK:LL")); // invalid hex
        assert!(!validate("00:11:22:33:44:55 ")); // trailing space
        assert!(!validate(":00:11:22:33:44"));
        assert!(!validate(""));
    }

    #[test]
    fn test_non_ascii_does_not_sneak_through() {
        // Two bytes long but a single non-hex char
        assert!(!validate("é:11:22:33:44:55"));
    }

    #[test]
    fn test_parse_preserves_spelling() {
        let addr = PrinterAddress::parse("aa:BB:cc:DD:ee:FF").unwrap();
        assert_eq!(addr.as_str(), "aa:BB:cc:DD:ee:FF");
        assert_eq!(addr.to_string(), "aa:BB:cc:DD:ee:FF");
        assert_eq!(addr.device_key(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        let err = PrinterAddress::parse("AA:BB:CC:DD:EE").unwrap_err();
        assert!(matches!(err, EstafetaError::InvalidAddress(s) if s == "AA:BB:CC:DD:EE"));
    }

    #[test]
    fn test_octets() {
        let addr: PrinterAddress = "00:11:22:AA:bb:FF".parse().unwrap();
        assert_eq!(addr.octets(), [0x00, 0x11, 0x22, 0xAA, 0xBB, 0xFF]);
    }

    #[test]
    fn test_serde_validates() {
        let addr: PrinterAddress = serde_json::from_str("\"00:11:22:33:44:55\"").unwrap();
        assert_eq!(addr.as_str(), "00:11:22:33:44:55");
        assert!(serde_json::from_str::<PrinterAddress>("\"nope\"").is_err());
    }
}

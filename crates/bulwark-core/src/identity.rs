// crates/bulwark-core/src/identity.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::hash_bytes;
use crate::error::BulwarkError;

/// A 32-byte account, contract or asset identifier.
///
/// Modules, receipt tokens, triggers, drip models and users all share this
/// address space. Underlying assets are identified by the address of their
/// token contract (see [`AssetId`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 32]);

/// Identifier of an underlying asset.
pub type AssetId = Address;

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; 32]);

    /// Derive a stable address from a human-readable label.
    ///
    /// Used by the CLI scenarios and tests to name actors
    /// (e.g. `Address::from_label("alice")`).
    pub fn from_label(label: &str) -> Self {
        Address(hash_bytes(label.as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Abbreviated hex form (`0x` + first 4 bytes) for logs and tables.
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = BulwarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex32(s).map(Address)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn decode_hex32(s: &str) -> Result<[u8; 32], BulwarkError> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw)
        .map_err(|e| BulwarkError::Serialization(format!("Invalid hex '{}': {}", s, e)))?;
    bytes
        .try_into()
        .map_err(|_| BulwarkError::Serialization("Expected exactly 32 bytes".to_string()))
}

/// Serde adapter for raw 32-byte digests as `0x`-prefixed hex.
///
/// Usage: `#[serde(with = "bulwark_core::identity::hex32")]`.
pub mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_hex32(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_is_deterministic() {
        assert_eq!(Address::from_label("alice"), Address::from_label("alice"));
        assert_ne!(Address::from_label("alice"), Address::from_label("bob"));
    }

    #[test]
    fn test_display_and_short() {
        let addr = Address([0xab; 32]);
        assert_eq!(addr.to_string().len(), 2 + 64);
        assert_eq!(addr.short(), "0xabababab");
        assert!(Address::ZERO.is_zero());
        assert!(!addr.is_zero());
    }

    #[test]
    fn test_parse_round_trip() {
        let addr = Address::from_label("carol");
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
        assert!("0x1234".parse::<Address>().is_err());
        assert!("zz".parse::<Address>().is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let addr = Address([1u8; 32]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "01".repeat(32)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}

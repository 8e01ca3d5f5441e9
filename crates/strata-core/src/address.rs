//! Chunk addresses
//!
//! Every stored object is named by a 32-byte keyed hash. Addresses render as
//! 64 uppercase hex characters, which is also the object name used by
//! file-like backends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StrataError;

/// Size of an address in bytes (HMAC-SHA256 output)
pub const ADDRESS_SIZE: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub const fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build an address from a slice that must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, StrataError> {
        let arr: [u8; ADDRESS_SIZE] = bytes.try_into().map_err(|_| {
            StrataError::Format(format!(
                "address must be {ADDRESS_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Uppercase hex rendering (64 chars)
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Parse a 64-char hex string (either case).
    pub fn from_hex(s: &str) -> Result<Self, StrataError> {
        let bytes = hex::decode(s)
            .map_err(|e| StrataError::Format(format!("invalid address hex '{s}': {e}")))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A 12-char prefix is enough to tell chunks apart in logs
        write!(f, "Address({}…)", &self.to_hex()[..12])
    }
}

impl FromStr for Address {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_uppercase_and_parses_back() {
        let addr = Address::from_bytes([0xABu8; ADDRESS_SIZE]);
        let hex = addr.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| !c.is_ascii_lowercase()));
        assert_eq!(Address::from_hex(&hex).unwrap(), addr);
        assert_eq!(Address::from_hex(&hex.to_lowercase()).unwrap(), addr);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(Address::from_slice(&[0u8; 31]).is_err());
        assert!(Address::from_hex("ABCD").is_err());
        assert!(Address::from_hex("zz").is_err());
    }
}

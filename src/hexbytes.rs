//! Fixed-size, lowercase-hex-encoded byte newtypes used throughout the wire
//! protocol: 32-byte digests/nonces/commitments and 20-byte chain addresses.
//!
//! Wraps raw key material in a newtype with explicit `From`/`Display`/
//! `FromStr` conversions rather than passing `Vec<u8>` around.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HexError {
    #[error("expected 0x-prefixed hex string")]
    MissingPrefix,
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("hex digits must be lowercase")]
    NotLowercase,
}

/// Wire hex encodings are strictly lowercase (spec.md §6); any deviation is
/// a malformed value, not a case-insensitive alias.
fn reject_uppercase(stripped: &str) -> Result<(), HexError> {
    if stripped.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(HexError::NotLowercase);
    }
    Ok(())
}

/// A 32-byte value, serialized as `0x` + 64 lowercase hex chars.
///
/// Used for nonces, session ids, transcript/transaction digests and
/// adaptor commitments (`T`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hex32(pub [u8; 32]);

impl Hex32 {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hex32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hex32({})", self.to_hex())
    }
}

impl fmt::Display for Hex32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hex32 {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").ok_or(HexError::MissingPrefix)?;
        reject_uppercase(stripped)?;
        let bytes = hex::decode(stripped).map_err(|e| HexError::InvalidHex(e.to_string()))?;
        let actual = bytes.len();
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| HexError::WrongLength { expected: 32, actual })?;
        Ok(Hex32(array))
    }
}

impl Serialize for Hex32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hex32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hex32::from_str(&s).map_err(de::Error::custom)
    }
}

/// A 20-byte chain address, serialized as `0x` + 40 lowercase hex chars.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address20(pub [u8; 20]);

impl Address20 {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address20({})", self.to_hex())
    }
}

impl fmt::Display for Address20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address20 {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").ok_or(HexError::MissingPrefix)?;
        reject_uppercase(stripped)?;
        let bytes = hex::decode(stripped).map_err(|e| HexError::InvalidHex(e.to_string()))?;
        let actual = bytes.len();
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| HexError::WrongLength { expected: 20, actual })?;
        Ok(Address20(array))
    }
}

impl Serialize for Address20 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address20 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address20::from_str(&s).map_err(de::Error::custom)
    }
}

/// A 64-byte value, serialized as `0x` + 128 lowercase hex chars. Used for
/// adaptor signatures (`maskCommit ‖ maskedSecret`, or `sigCore ‖ maskSalt`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hex64(pub [u8; 64]);

impl Hex64 {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..]))
    }

    pub fn from_parts(first: [u8; 32], second: [u8; 32]) -> Self {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&first);
        buf[32..].copy_from_slice(&second);
        Self(buf)
    }

    pub fn split(&self) -> ([u8; 32], [u8; 32]) {
        let mut first = [0u8; 32];
        let mut second = [0u8; 32];
        first.copy_from_slice(&self.0[..32]);
        second.copy_from_slice(&self.0[32..]);
        (first, second)
    }
}

impl fmt::Debug for Hex64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hex64({})", self.to_hex())
    }
}

impl fmt::Display for Hex64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hex64 {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").ok_or(HexError::MissingPrefix)?;
        reject_uppercase(stripped)?;
        let bytes = hex::decode(stripped).map_err(|e| HexError::InvalidHex(e.to_string()))?;
        let actual = bytes.len();
        let array: [u8; 64] = bytes
            .try_into()
            .map_err(|_| HexError::WrongLength { expected: 64, actual })?;
        Ok(Hex64(array))
    }
}

impl Serialize for Hex64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hex64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hex64::from_str(&s).map_err(de::Error::custom)
    }
}

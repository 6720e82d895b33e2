//! Hash primitives. SHA-256 backs canonical-serialization digests (session
//! id, transcript, commit hashes); keccak-256 backs the EIP-1559 signing
//! digest, matching the chains this crate targets.

use crate::hexbytes::Hex32;
use sha2::{Digest as _, Sha256};
use sha3::Keccak256;

pub fn sha256(bytes: &[u8]) -> Hex32 {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&out);
    Hex32(buf)
}

pub fn keccak256(bytes: &[u8]) -> Hex32 {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&out);
    Hex32(buf)
}

/// `H(tag | a | b | ...)` style domain-separated hash used throughout the
/// mock cryptography and the adaptor commit-reveal scheme. Each part is
/// length-prefixed (4-byte big-endian) before concatenation so that
/// `H("ab" | "c")` cannot collide with `H("a" | "bc")`.
pub fn domain_hash(parts: &[&[u8]]) -> Hex32 {
    let mut buf = Vec::new();
    for part in parts {
        buf.extend_from_slice(&(part.len() as u32).to_be_bytes());
        buf.extend_from_slice(part);
    }
    sha256(&buf)
}

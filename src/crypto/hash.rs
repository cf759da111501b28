//! Cryptographic hashing utilities for the blockchain
//!
//! Provides the SHA-256 based digests used for transaction identifiers,
//! block hashes and merkle trees, plus the `Hash256` value type that
//! carries them around.

use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors when parsing a hash from text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashParseError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Invalid hash length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 256-bit hash value (transaction ids, block hashes, merkle roots)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// The all-zero hash, used as the "no previous output" marker
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        let bytes = hex::decode(s).map_err(|e| HashParseError::InvalidHex(e.to_string()))?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashParseError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Computes double SHA-256 hash (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> Hash256 {
    Hash256(sha256(&sha256(data)))
}

/// RIPEMD-160 of SHA-256, the payload of every address
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(data));
    ripemd.finalize().into()
}

/// Checks if a hash meets the difficulty target
/// The hash must have `difficulty` leading zero bits
pub fn meets_difficulty(hash: &Hash256, difficulty: u32) -> bool {
    let bytes = hash.as_bytes();
    let required_zeros = (difficulty as usize / 8).min(32);
    let remaining_bits = difficulty as usize % 8;

    if bytes.iter().take(required_zeros).any(|b| *b != 0) {
        return false;
    }

    if remaining_bits > 0 && required_zeros < bytes.len() {
        let mask = 0xFFu8 << (8 - remaining_bits);
        if bytes[required_zeros] & mask != 0 {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        assert_eq!(
            hex::encode(sha256(b"hello world")),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_hash256_hex_round_trip() {
        let hash = double_sha256(b"hello world");
        let parsed: Hash256 = hash.to_hex().parse().unwrap();
        assert_eq!(hash, parsed);
        assert!(Hash256::from_hex("abcd").is_err());
        assert!(Hash256::from_hex("zz").is_err());
    }

    #[test]
    fn test_meets_difficulty() {
        let mut bytes = [0xFFu8; 32];
        bytes[0] = 0x00;
        bytes[1] = 0x00;
        bytes[2] = 0x0F;
        let hash = Hash256::from_bytes(bytes);
        assert!(meets_difficulty(&hash, 16));
        assert!(meets_difficulty(&hash, 20));
        assert!(!meets_difficulty(&hash, 21));
        assert!(!meets_difficulty(&hash, 24));
    }

    #[test]
    fn test_hash256_serde_as_hex_string() {
        let hash = double_sha256(b"abc");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}

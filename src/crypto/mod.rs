//! Cryptographic utilities for the blockchain
//!
//! This module provides:
//! - SHA-256 / RIPEMD-160 hashing and the `Hash256` value type
//! - ECDSA key management (secp256k1) and addresses
//! - Merkle root calculation

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{double_sha256, hash160, meets_difficulty, sha256, Hash256, HashParseError};
pub use keys::{
    decode_address, encode_address, parse_public_key, parse_signature, public_key_to_address,
    verify_signature, KeyError, KeyPair, PUBKEY_ADDRESS_VERSION, PUBLIC_KEY_SIZE,
    SCRIPT_ADDRESS_VERSION, SIGNATURE_SIZE,
};
pub use merkle::calculate_merkle_root;

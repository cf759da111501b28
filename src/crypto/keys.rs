//! ECDSA key management
//!
//! Key pairs, compact signatures and Base58Check addresses on the
//! secp256k1 curve. Transactions are always signed over a 32-byte
//! digest (the bare txid), so there is no message pre-hashing here.

use rand::rngs::OsRng;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::{hash160, sha256, Hash256};

/// Version byte of pay-to-public-key-hash addresses
pub const PUBKEY_ADDRESS_VERSION: u8 = 0x1e;

/// Version byte of script-hash (multisig) addresses
pub const SCRIPT_ADDRESS_VERSION: u8 = 0x0d;

/// Length of a compressed public key
pub const PUBLIC_KEY_SIZE: usize = 33;

/// Length of a compact ECDSA signature
pub const SIGNATURE_SIZE: usize = 64;

/// Errors that can occur during key operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Compressed public key bytes
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    /// Pay-to-public-key-hash address of this key
    pub fn address(&self) -> String {
        public_key_to_address(&self.public_key_bytes())
    }

    /// Sign a 32-byte digest, returning the compact signature
    pub fn sign(&self, digest: &Hash256) -> [u8; SIGNATURE_SIZE] {
        let message = Message::from_digest(*digest.as_bytes());
        Secp256k1::signing_only()
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_compact()
    }
}

/// Base58Check encoding of a versioned 20-byte payload
pub fn encode_address(version: u8, payload: &[u8; 20]) -> String {
    let mut bytes = Vec::with_capacity(25);
    bytes.push(version);
    bytes.extend_from_slice(payload);
    let checksum = sha256(&sha256(&bytes));
    bytes.extend_from_slice(&checksum[..4]);
    bs58::encode(bytes).into_string()
}

/// Decode a Base58Check address into its version byte and payload
pub fn decode_address(address: &str) -> Result<(u8, [u8; 20]), KeyError> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|_| KeyError::InvalidAddress(address.to_string()))?;
    if bytes.len() != 25 {
        return Err(KeyError::InvalidAddress(address.to_string()));
    }
    let (body, checksum) = bytes.split_at(21);
    if sha256(&sha256(body))[..4] != *checksum {
        return Err(KeyError::InvalidAddress(address.to_string()));
    }
    let mut payload = [0u8; 20];
    payload.copy_from_slice(&body[1..]);
    Ok((body[0], payload))
}

/// Convert compressed public key bytes to an address
pub fn public_key_to_address(public_key: &[u8]) -> String {
    encode_address(PUBKEY_ADDRESS_VERSION, &hash160(public_key))
}

/// Parse a compressed public key, rejecting anything not on the curve
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, KeyError> {
    if bytes.len() != PUBLIC_KEY_SIZE {
        return Err(KeyError::InvalidPublicKey);
    }
    PublicKey::from_slice(bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Parse a compact signature
pub fn parse_signature(bytes: &[u8]) -> Result<Signature, KeyError> {
    if bytes.len() != SIGNATURE_SIZE {
        return Err(KeyError::InvalidSignature);
    }
    Signature::from_compact(bytes).map_err(|_| KeyError::InvalidSignature)
}

/// Verify a compact signature over a digest
pub fn verify_signature(
    public_key: &[u8],
    digest: &Hash256,
    signature: &[u8],
) -> Result<bool, KeyError> {
    let public_key = parse_public_key(public_key)?;
    let signature = parse_signature(signature)?;
    let message = Message::from_digest(*digest.as_bytes());
    Ok(Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::double_sha256;

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let digest = double_sha256(b"Hello, blockchain!");

        let signature = kp.sign(&digest);
        assert!(verify_signature(&kp.public_key_bytes(), &digest, &signature).unwrap());

        let other = double_sha256(b"something else");
        assert!(!verify_signature(&kp.public_key_bytes(), &other, &signature).unwrap());
    }

    #[test]
    fn test_signing_is_deterministic_per_key() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let digest = double_sha256(b"payload");
        assert_eq!(a.sign(&digest), a.sign(&digest));
        assert_ne!(a.sign(&digest), b.sign(&digest));
    }

    #[test]
    fn test_address_round_trip() {
        let kp = KeyPair::generate();
        let (version, payload) = decode_address(&kp.address()).unwrap();
        assert_eq!(version, PUBKEY_ADDRESS_VERSION);
        assert_eq!(payload, hash160(&kp.public_key_bytes()));

        let mut corrupted = kp.address();
        corrupted.pop();
        corrupted.push('1');
        assert!(decode_address(&corrupted).is_err());
    }

    #[test]
    fn test_malformed_key_material() {
        assert_eq!(parse_public_key(&[2u8; 10]), Err(KeyError::InvalidPublicKey));
        assert_eq!(parse_signature(&[0u8; 63]), Err(KeyError::InvalidSignature));
    }
}

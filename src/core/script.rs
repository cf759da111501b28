//! Locking conditions on outputs and the unlocking data that satisfies them
//!
//! Two output types exist: pay-to-public-key-hash and bare M-of-N
//! multisig. Unlocking data is a list of `(public key, signature)` pairs
//! over the spending transaction's signature hash. Since several keys can
//! satisfy one multisig output, the same economic transaction can carry
//! different, equally valid unlocking data.

use crate::core::encoding::{write_u8, write_var_bytes, ByteReader, DecodeError};
use crate::crypto::{
    decode_address, encode_address, hash160, parse_public_key, parse_signature,
    public_key_to_address, verify_signature, Hash256, KeyError, PUBKEY_ADDRESS_VERSION,
    SCRIPT_ADDRESS_VERSION,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest number of keys a multisig output may list
pub const MAX_MULTISIG_KEYS: usize = 16;

const TAG_PUBKEY_HASH: u8 = 0x01;
const TAG_MULTISIG: u8 = 0x02;

/// Script-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Public key does not match address {0}")]
    KeyMismatch(String),
    #[error("Public key is not part of the multisig script")]
    UnknownMultisigKey,
    #[error("Duplicate signer in unlocking data")]
    DuplicateSigner,
    #[error("Threshold not met: need {0} of {1} signatures, got {2}")]
    ThresholdNotMet(u8, u8, u8),
    #[error("Invalid multisig parameters: {0} of {1}")]
    InvalidMultisig(u8, usize),
}

impl From<KeyError> for ScriptError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::InvalidSignature => ScriptError::InvalidSignature,
            KeyError::InvalidAddress(address) => ScriptError::InvalidAddress(address),
            KeyError::InvalidPublicKey => ScriptError::InvalidPublicKey,
        }
    }
}

/// One signer's contribution to an input's unlocking data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSignature {
    /// Compressed secp256k1 public key
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
    /// Compact ECDSA signature over the signature hash
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl InputSignature {
    /// Check that key and signature are structurally valid curve objects
    pub fn check_structure(&self) -> Result<(), ScriptError> {
        parse_public_key(&self.public_key)?;
        parse_signature(&self.signature)?;
        Ok(())
    }
}

/// The condition under which an output may be spent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockingScript {
    /// Spendable by the key hashing to this address
    PayToPubKeyHash { address: String },
    /// Spendable by `required` signatures from the listed keys
    Multisig {
        required: u8,
        /// Hex-encoded compressed public keys
        public_keys: Vec<String>,
    },
}

impl LockingScript {
    /// Pay-to-public-key-hash script for a base58 address
    pub fn pay_to_address(address: &str) -> Result<Self, ScriptError> {
        let (version, _) = decode_address(address)?;
        if version != PUBKEY_ADDRESS_VERSION {
            return Err(ScriptError::InvalidAddress(address.to_string()));
        }
        Ok(LockingScript::PayToPubKeyHash {
            address: address.to_string(),
        })
    }

    /// M-of-N multisig script over hex public keys
    pub fn multisig(required: u8, public_keys: Vec<String>) -> Result<Self, ScriptError> {
        if required == 0 || required as usize > public_keys.len() {
            return Err(ScriptError::InvalidMultisig(required, public_keys.len()));
        }
        if public_keys.len() > MAX_MULTISIG_KEYS {
            return Err(ScriptError::InvalidMultisig(required, public_keys.len()));
        }
        for key in &public_keys {
            let bytes = hex::decode(key).map_err(|_| ScriptError::InvalidPublicKey)?;
            parse_public_key(&bytes)?;
        }
        Ok(LockingScript::Multisig {
            required,
            public_keys,
        })
    }

    /// Address this script is displayed and paid to as
    pub fn address(&self) -> String {
        match self {
            LockingScript::PayToPubKeyHash { address } => address.clone(),
            LockingScript::Multisig { .. } => {
                let mut encoded = Vec::new();
                self.encode(&mut encoded);
                encode_address(SCRIPT_ADDRESS_VERSION, &hash160(&encoded))
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            LockingScript::PayToPubKeyHash { .. } => "pubkeyhash",
            LockingScript::Multisig { .. } => "multisig",
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            LockingScript::PayToPubKeyHash { address } => {
                write_u8(out, TAG_PUBKEY_HASH);
                write_var_bytes(out, address.as_bytes());
            }
            LockingScript::Multisig {
                required,
                public_keys,
            } => {
                write_u8(out, TAG_MULTISIG);
                write_u8(out, *required);
                write_u8(out, public_keys.len() as u8);
                for key in public_keys {
                    write_var_bytes(out, key.as_bytes());
                }
            }
        }
    }

    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        match reader.read_u8()? {
            TAG_PUBKEY_HASH => Ok(LockingScript::PayToPubKeyHash {
                address: reader.read_string()?,
            }),
            TAG_MULTISIG => {
                let required = reader.read_u8()?;
                let count = reader.read_u8()? as usize;
                let public_keys = (0..count)
                    .map(|_| reader.read_string())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(LockingScript::Multisig {
                    required,
                    public_keys,
                })
            }
            tag => Err(DecodeError::UnknownTag(tag)),
        }
    }

    /// Check unlocking data against this script for the given signature hash
    pub fn verify(&self, sighash: &Hash256, signatures: &[InputSignature]) -> Result<(), ScriptError> {
        match self {
            LockingScript::PayToPubKeyHash { address } => {
                let [sig] = signatures else {
                    return Err(ScriptError::ThresholdNotMet(1, 1, signatures.len() as u8));
                };
                if public_key_to_address(&sig.public_key) != *address {
                    return Err(ScriptError::KeyMismatch(address.clone()));
                }
                if !verify_signature(&sig.public_key, sighash, &sig.signature)? {
                    return Err(ScriptError::InvalidSignature);
                }
                Ok(())
            }
            LockingScript::Multisig {
                required,
                public_keys,
            } => {
                let mut signers: Vec<String> = Vec::with_capacity(signatures.len());
                for sig in signatures {
                    let key_hex = hex::encode(&sig.public_key);
                    if !public_keys.contains(&key_hex) {
                        return Err(ScriptError::UnknownMultisigKey);
                    }
                    if signers.contains(&key_hex) {
                        return Err(ScriptError::DuplicateSigner);
                    }
                    if !verify_signature(&sig.public_key, sighash, &sig.signature)? {
                        return Err(ScriptError::InvalidSignature);
                    }
                    signers.push(key_hex);
                }
                if signers.len() < *required as usize {
                    return Err(ScriptError::ThresholdNotMet(
                        *required,
                        public_keys.len() as u8,
                        signers.len() as u8,
                    ));
                }
                Ok(())
            }
        }
    }
}

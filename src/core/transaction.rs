//! Transaction handling for the blockchain
//!
//! Implements a UTXO-based transaction model with digital signatures.
//! Each transaction has two identifiers (see [`crate::core::identity`]):
//! the txid over its complete encoding and the bare txid over the
//! encoding without unlocking data. Outpoints always reference the
//! bare txid of the transaction that created the output.

use crate::core::encoding::{
    write_u32, write_u64, write_var_bytes, ByteReader, DecodeError,
};
use crate::core::identity::{self, Encoding};
use crate::core::script::{InputSignature, LockingScript, ScriptError};
use crate::crypto::{Hash256, KeyPair};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Current transaction version
pub const TX_VERSION: u32 = 1;

/// Sequence number that disables locktime
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// Locktime threshold: values below are block heights, above are timestamps
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Maximum encoded transaction size in bytes
pub const MAX_TX_SIZE: usize = 100_000;

/// Maximum number of signatures on a single input
pub const MAX_SIGNATURES_PER_INPUT: usize = 16;

/// Smallest units per coin
pub const COIN: u64 = 100_000_000;

/// Upper bound for any amount or sum of amounts
pub const MAX_MONEY: u64 = 21_000_000 * COIN;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// Unlocking data that cannot be canonicalized
    #[error("Malformed identity: input {index}: {reason}")]
    MalformedIdentity { index: usize, reason: ScriptError },
    #[error("Decoding failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("Invalid hex encoding")]
    InvalidHex,
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Transaction not final: locktime {0} not reached")]
    NotFinal(u32),
}

// =============================================================================
// Outpoint
// =============================================================================

/// Reference to an output: bare txid of the creating transaction plus index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn new(hash: Hash256, index: u32) -> Self {
        Self { hash, index }
    }

    /// Whether this is the null reference carried by coinbase inputs
    pub fn is_null(&self) -> bool {
        self.hash.is_zero()
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.index)
    }
}

// =============================================================================
// Transaction Input / Output
// =============================================================================

/// Transaction input (reference to previous output plus unlocking data)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prev_out: OutPoint,
    /// Unlocking data; excluded from the bare txid
    #[serde(default)]
    pub signatures: Vec<InputSignature>,
    #[serde(default = "default_sequence")]
    pub sequence: u32,
}

fn default_sequence() -> u32 {
    SEQUENCE_FINAL
}

impl TransactionInput {
    pub fn new(prev_out: OutPoint) -> Self {
        Self {
            prev_out,
            signatures: Vec::new(),
            sequence: SEQUENCE_FINAL,
        }
    }

    pub fn is_final(&self) -> bool {
        self.sequence == SEQUENCE_FINAL
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub amount: u64,
    pub script: LockingScript,
}

impl TransactionOutput {
    pub fn new(amount: u64, script: LockingScript) -> Self {
        Self { amount, script }
    }

    pub fn address(&self) -> String {
        self.script.address()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A blockchain transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Locktime: block height or timestamp when tx becomes valid
    /// - 0: transaction is always valid
    /// - < LOCKTIME_THRESHOLD: block height
    /// - >= LOCKTIME_THRESHOLD: Unix timestamp
    #[serde(default)]
    pub locktime: u32,
}

impl Transaction {
    /// Create a new (unsigned) transaction
    pub fn new(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Self {
        Self {
            version: TX_VERSION,
            inputs,
            outputs,
            locktime: 0,
        }
    }

    /// Create a coinbase transaction; the null input carries the height
    /// so that coinbases paying the same script stay distinct
    pub fn coinbase(script: LockingScript, amount: u64, block_height: u64) -> Self {
        let input = TransactionInput::new(OutPoint::new(Hash256::zero(), block_height as u32));
        Self::new(vec![input], vec![TransactionOutput::new(amount, script)])
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prev_out.is_null()
    }

    /// Full id: changes with any change to the unlocking data
    pub fn txid(&self) -> Hash256 {
        identity::full_id(self)
    }

    /// Bare id: stable under re-signing
    pub fn bare_txid(&self) -> Hash256 {
        identity::canonical_id(self)
    }

    /// The digest every input signs; equal to the bare txid
    pub fn signature_hash(&self) -> Hash256 {
        self.bare_txid()
    }

    /// Serialize in the given form
    pub fn encode(&self, encoding: Encoding) -> Vec<u8> {
        let mut out = Vec::new();
        write_u32(&mut out, self.version);

        write_u32(&mut out, self.inputs.len() as u32);
        for input in &self.inputs {
            out.extend_from_slice(input.prev_out.hash.as_bytes());
            write_u32(&mut out, input.prev_out.index);
            write_u32(&mut out, input.sequence);
            match encoding {
                Encoding::Full => {
                    write_u32(&mut out, input.signatures.len() as u32);
                    for sig in &input.signatures {
                        write_var_bytes(&mut out, &sig.public_key);
                        write_var_bytes(&mut out, &sig.signature);
                    }
                }
                // Canonical placeholder: no unlocking data at all
                Encoding::Bare => write_u32(&mut out, 0),
            }
        }

        write_u32(&mut out, self.outputs.len() as u32);
        for output in &self.outputs {
            write_u64(&mut out, output.amount);
            output.script.encode(&mut out);
        }

        write_u32(&mut out, self.locktime);
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode(Encoding::Full)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Decode a full encoding
    ///
    /// Besides framing errors this rejects unlocking data whose keys or
    /// signatures are not valid curve objects, since such a transaction
    /// has no well-defined identity.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = ByteReader::new(bytes);
        let version = reader.read_u32()?;

        let input_count = reader.read_count(44)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let hash = Hash256::from_bytes(reader.read_array()?);
            let index = reader.read_u32()?;
            let sequence = reader.read_u32()?;
            let sig_count = reader.read_count(8)?;
            let mut signatures = Vec::with_capacity(sig_count);
            for _ in 0..sig_count {
                signatures.push(InputSignature {
                    public_key: reader.read_var_bytes()?,
                    signature: reader.read_var_bytes()?,
                });
            }
            inputs.push(TransactionInput {
                prev_out: OutPoint::new(hash, index),
                signatures,
                sequence,
            });
        }

        let output_count = reader.read_count(9)?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            let amount = reader.read_u64()?;
            let script = LockingScript::decode(&mut reader)?;
            outputs.push(TransactionOutput { amount, script });
        }

        let locktime = reader.read_u32()?;
        reader.finish()?;

        let tx = Self {
            version,
            inputs,
            outputs,
            locktime,
        };
        tx.check_unlocking_structure()?;
        Ok(tx)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| TransactionError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    /// Check that every input's unlocking data is canonicalizable
    pub fn check_unlocking_structure(&self) -> Result<(), TransactionError> {
        for (index, input) in self.inputs.iter().enumerate() {
            for sig in &input.signatures {
                sig.check_structure()
                    .map_err(|reason| TransactionError::MalformedIdentity { index, reason })?;
            }
        }
        Ok(())
    }

    /// Context-free sanity checks
    pub fn check_basic(&self) -> Result<(), TransactionError> {
        if self.inputs.is_empty() {
            return Err(TransactionError::InvalidTransaction("no inputs".to_string()));
        }
        if self.outputs.is_empty() {
            return Err(TransactionError::InvalidTransaction("no outputs".to_string()));
        }
        if self.estimated_size() > MAX_TX_SIZE {
            return Err(TransactionError::InvalidTransaction(format!(
                "size {} exceeds {}",
                self.estimated_size(),
                MAX_TX_SIZE
            )));
        }
        self.checked_total_output()?;

        let mut seen = HashSet::new();
        for input in &self.inputs {
            if !seen.insert(input.prev_out) {
                return Err(TransactionError::InvalidTransaction(format!(
                    "duplicate input {}",
                    input.prev_out
                )));
            }
            if input.signatures.len() > MAX_SIGNATURES_PER_INPUT {
                return Err(TransactionError::InvalidTransaction(format!(
                    "{} signatures on input {}",
                    input.signatures.len(),
                    input.prev_out
                )));
            }
            if !self.is_coinbase() && input.prev_out.is_null() {
                return Err(TransactionError::InvalidTransaction(
                    "null input outside coinbase".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Sum of output amounts, rejecting zero outputs and overflow
    pub fn checked_total_output(&self) -> Result<u64, TransactionError> {
        let mut total = 0u64;
        for output in &self.outputs {
            if output.amount == 0 || output.amount > MAX_MONEY {
                return Err(TransactionError::InvalidTransaction(format!(
                    "output amount {} out of range",
                    output.amount
                )));
            }
            total = total
                .checked_add(output.amount)
                .filter(|t| *t <= MAX_MONEY)
                .ok_or_else(|| {
                    TransactionError::InvalidTransaction("total output out of range".to_string())
                })?;
        }
        Ok(total)
    }

    pub fn estimated_size(&self) -> usize {
        self.to_bytes().len()
    }

    /// Add this key's signature to one input
    pub fn sign_input(&mut self, index: usize, key_pair: &KeyPair) -> Result<(), TransactionError> {
        let sighash = self.signature_hash();
        let input = self.inputs.get_mut(index).ok_or_else(|| {
            TransactionError::InvalidTransaction(format!("no input {}", index))
        })?;
        let public_key = key_pair.public_key_bytes().to_vec();
        if input.signatures.iter().any(|s| s.public_key == public_key) {
            return Ok(());
        }
        input.signatures.push(InputSignature {
            public_key,
            signature: key_pair.sign(&sighash).to_vec(),
        });
        Ok(())
    }

    // =========================================================================
    // Locktime & Finality
    // =========================================================================

    /// Check if transaction is final (can be included in a block)
    pub fn is_final(&self, block_height: u64, block_time: i64) -> bool {
        if self.locktime == 0 {
            return true;
        }

        if self.inputs.iter().all(|i| i.is_final()) {
            return true;
        }

        if self.locktime < LOCKTIME_THRESHOLD {
            block_height >= self.locktime as u64
        } else {
            block_time >= self.locktime as i64
        }
    }

    pub fn check_final(&self, block_height: u64, block_time: i64) -> Result<(), TransactionError> {
        if self.is_final(block_height, block_time) {
            Ok(())
        } else {
            Err(TransactionError::NotFinal(self.locktime))
        }
    }
}

// =============================================================================
// Transaction Builder
// =============================================================================

/// Builder for unsigned transactions
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
    locktime: u32,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(mut self, prev_out: OutPoint) -> Self {
        self.inputs.push(TransactionInput::new(prev_out));
        self
    }

    pub fn add_input_with_sequence(mut self, prev_out: OutPoint, sequence: u32) -> Self {
        self.inputs.push(TransactionInput {
            prev_out,
            signatures: Vec::new(),
            sequence,
        });
        self
    }

    pub fn add_output(mut self, script: LockingScript, amount: u64) -> Self {
        self.outputs.push(TransactionOutput::new(amount, script));
        self
    }

    pub fn locktime(mut self, locktime: u32) -> Self {
        self.locktime = locktime;
        self
    }

    pub fn build(self) -> Transaction {
        let mut tx = Transaction::new(self.inputs, self.outputs);
        tx.locktime = self.locktime;
        tx
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::double_sha256;

    fn p2pkh(key: &KeyPair) -> LockingScript {
        LockingScript::pay_to_address(&key.address()).unwrap()
    }

    fn outpoint(seed: &[u8]) -> OutPoint {
        OutPoint::new(double_sha256(seed), 0)
    }

    #[test]
    fn test_coinbase_transaction() {
        let key = KeyPair::generate();
        let tx = Transaction::coinbase(p2pkh(&key), 50 * COIN, 7);
        assert!(tx.is_coinbase());
        assert_eq!(tx.inputs[0].prev_out.index, 7);
        assert!(tx.check_basic().is_ok());

        let other = Transaction::coinbase(p2pkh(&key), 50 * COIN, 8);
        assert_ne!(tx.bare_txid(), other.bare_txid());
    }

    #[test]
    fn test_encoding_round_trip_preserves_ids() {
        let key = KeyPair::generate();
        let mut tx = TransactionBuilder::new()
            .add_input(outpoint(b"a"))
            .add_input(outpoint(b"b"))
            .add_output(p2pkh(&key), 5 * COIN)
            .locktime(12)
            .build();
        tx.sign_input(0, &key).unwrap();
        tx.sign_input(1, &key).unwrap();

        let decoded = Transaction::from_hex(&tx.to_hex()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.txid(), tx.txid());
        assert_eq!(decoded.bare_txid(), tx.bare_txid());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(Transaction::from_hex("zz"), Err(TransactionError::InvalidHex));
        assert!(matches!(
            Transaction::from_hex("01000000"),
            Err(TransactionError::Decode(_))
        ));

        let key = KeyPair::generate();
        let tx = TransactionBuilder::new()
            .add_input(outpoint(b"a"))
            .add_output(p2pkh(&key), COIN)
            .build();
        let mut bytes = tx.to_bytes();
        bytes.push(0);
        assert!(matches!(
            Transaction::from_bytes(&bytes),
            Err(TransactionError::Decode(DecodeError::TrailingBytes(1)))
        ));
    }

    #[test]
    fn test_decode_rejects_uncanonicalizable_unlocking_data() {
        let key = KeyPair::generate();
        let mut tx = TransactionBuilder::new()
            .add_input(outpoint(b"a"))
            .add_output(p2pkh(&key), COIN)
            .build();
        tx.inputs[0].signatures.push(InputSignature {
            public_key: vec![0xAB; 12],
            signature: vec![0; 64],
        });

        assert!(matches!(
            Transaction::from_hex(&tx.to_hex()),
            Err(TransactionError::MalformedIdentity { index: 0, .. })
        ));
        assert!(tx.check_unlocking_structure().is_err());
    }

    #[test]
    fn test_check_basic() {
        let key = KeyPair::generate();
        let dup = TransactionBuilder::new()
            .add_input(outpoint(b"a"))
            .add_input(outpoint(b"a"))
            .add_output(p2pkh(&key), COIN)
            .build();
        assert!(dup.check_basic().is_err());

        let zero = TransactionBuilder::new()
            .add_input(outpoint(b"a"))
            .add_output(p2pkh(&key), 0)
            .build();
        assert!(zero.check_basic().is_err());

        let no_outputs = TransactionBuilder::new().add_input(outpoint(b"a")).build();
        assert!(no_outputs.check_basic().is_err());
    }

    #[test]
    fn test_signing_twice_with_same_key_is_noop() {
        let key = KeyPair::generate();
        let mut tx = TransactionBuilder::new()
            .add_input(outpoint(b"a"))
            .add_output(p2pkh(&key), COIN)
            .build();
        tx.sign_input(0, &key).unwrap();
        let once = tx.clone();
        tx.sign_input(0, &key).unwrap();
        assert_eq!(tx, once);
        assert!(tx.sign_input(3, &key).is_err());
    }

    #[test]
    fn test_locktime_block_height() {
        let key = KeyPair::generate();
        let tx = TransactionBuilder::new()
            .add_input_with_sequence(outpoint(b"a"), 0)
            .add_output(p2pkh(&key), COIN)
            .locktime(100)
            .build();

        assert!(!tx.is_final(99, 0));
        assert!(tx.is_final(100, 0));
        assert_eq!(tx.check_final(50, 0), Err(TransactionError::NotFinal(100)));
    }

    #[test]
    fn test_locktime_timestamp_and_final_sequence() {
        let key = KeyPair::generate();
        let locktime = LOCKTIME_THRESHOLD + 1000;
        let tx = TransactionBuilder::new()
            .add_input_with_sequence(outpoint(b"a"), 0)
            .add_output(p2pkh(&key), COIN)
            .locktime(locktime)
            .build();
        assert!(!tx.is_final(0, (locktime - 1) as i64));
        assert!(tx.is_final(0, locktime as i64));

        let final_seq = TransactionBuilder::new()
            .add_input(outpoint(b"a"))
            .add_output(p2pkh(&key), COIN)
            .locktime(locktime)
            .build();
        assert!(final_seq.is_final(0, 0));
    }
}

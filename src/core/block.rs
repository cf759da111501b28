//! Block implementation for the blockchain
//!
//! A block contains a header with metadata and a list of transactions.
//! The merkle root commits to the full txids, so a block fixes the exact
//! unlocking data of every transaction it carries.

use crate::core::encoding::{write_i64, write_u32, write_u64};
use crate::core::script::LockingScript;
use crate::core::transaction::{Transaction, MAX_TX_SIZE};
use crate::crypto::{
    calculate_merkle_root, double_sha256, encode_address, meets_difficulty, Hash256,
    PUBKEY_ADDRESS_VERSION,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

// =============================================================================
// Block Constants
// =============================================================================

/// Maximum block size in bytes
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Maximum number of transactions per block
pub const MAX_BLOCK_TXS: usize = 10_000;

/// Encoded block header size in bytes
pub const BLOCK_HEADER_SIZE: usize = 88;

// =============================================================================
// Block Errors
// =============================================================================

/// Context-free block validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("Block too large: {0} bytes (max: {1})")]
    BlockTooLarge(usize, usize),
    #[error("Too many transactions: {0} (max: {1})")]
    TooManyTransactions(usize, usize),
    #[error("Invalid proof of work")]
    InvalidProofOfWork,
    #[error("Invalid merkle root")]
    InvalidMerkleRoot,
    #[error("Invalid block hash")]
    InvalidBlockHash,
    #[error("Transaction too large in block: tx {0}")]
    TransactionTooLarge(Hash256),
    #[error("First transaction must be the only coinbase")]
    BadCoinbase,
    #[error("Transaction {0} appears twice")]
    DuplicateTransaction(Hash256),
    #[error("Block has no transactions")]
    Empty,
}

/// Block header containing metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block version
    pub version: u32,
    /// Hash of the previous block
    pub previous_hash: Hash256,
    /// Merkle root of the txids
    pub merkle_root: Hash256,
    /// Block time (unix seconds)
    pub time: i64,
    /// Difficulty target (number of leading zero bits required)
    pub difficulty: u32,
    /// Nonce used for proof of work
    pub nonce: u64,
}

impl BlockHeader {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOCK_HEADER_SIZE);
        write_u32(&mut out, self.version);
        out.extend_from_slice(self.previous_hash.as_bytes());
        out.extend_from_slice(self.merkle_root.as_bytes());
        write_i64(&mut out, self.time);
        write_u32(&mut out, self.difficulty);
        write_u64(&mut out, self.nonce);
        out
    }

    /// Calculate the hash of the block header
    pub fn hash(&self) -> Hash256 {
        double_sha256(&self.to_bytes())
    }
}

/// A block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block height
    pub height: u64,
    /// Block header
    pub header: BlockHeader,
    /// Block hash (cached)
    pub hash: Hash256,
    /// List of transactions in the block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a new block (unmined)
    pub fn new(
        height: u64,
        previous_hash: Hash256,
        transactions: Vec<Transaction>,
        difficulty: u32,
        time: i64,
    ) -> Self {
        let header = BlockHeader {
            version: 1,
            previous_hash,
            merkle_root: Self::calculate_merkle_root(&transactions),
            time,
            difficulty,
            nonce: 0,
        };
        let hash = header.hash();

        Self {
            height,
            header,
            hash,
            transactions,
        }
    }

    /// Create the genesis block; its single output is unspendable
    pub fn genesis(difficulty: u32, time: i64) -> Self {
        let burn = LockingScript::PayToPubKeyHash {
            address: encode_address(PUBKEY_ADDRESS_VERSION, &[0u8; 20]),
        };
        let coinbase = Transaction::coinbase(burn, 1, 0);
        let mut block = Self::new(0, Hash256::zero(), vec![coinbase], difficulty, time);
        block.mine();
        block
    }

    /// Merkle root over the full txids
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Hash256 {
        let txids: Vec<Hash256> = transactions.iter().map(|tx| tx.txid()).collect();
        calculate_merkle_root(&txids)
    }

    /// Mine the block (find a valid nonce), returning the attempts made
    pub fn mine(&mut self) -> u64 {
        let mut attempts = 0u64;

        loop {
            self.header.nonce = attempts;
            self.hash = self.header.hash();

            if self.is_valid_pow() {
                return attempts;
            }

            attempts += 1;

            if attempts == u64::MAX {
                break;
            }
        }

        attempts
    }

    pub fn is_valid_pow(&self) -> bool {
        meets_difficulty(&self.hash, self.header.difficulty)
    }

    pub fn verify_merkle_root(&self) -> bool {
        Self::calculate_merkle_root(&self.transactions) == self.header.merkle_root
    }

    pub fn verify_hash(&self) -> bool {
        self.hash == self.header.hash()
    }

    /// Get the coinbase transaction (first transaction)
    pub fn coinbase_tx(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// Calculate the total size of this block in bytes
    pub fn size(&self) -> usize {
        let tx_sizes: usize = self.transactions.iter().map(|tx| tx.estimated_size()).sum();
        BLOCK_HEADER_SIZE + tx_sizes
    }

    /// Validate that the block size is within limits
    pub fn validate_size(&self) -> Result<(), BlockError> {
        let size = self.size();
        if size > MAX_BLOCK_SIZE {
            return Err(BlockError::BlockTooLarge(size, MAX_BLOCK_SIZE));
        }

        let tx_count = self.transactions.len();
        if tx_count > MAX_BLOCK_TXS {
            return Err(BlockError::TooManyTransactions(tx_count, MAX_BLOCK_TXS));
        }

        for tx in &self.transactions {
            if tx.estimated_size() > MAX_TX_SIZE {
                return Err(BlockError::TransactionTooLarge(tx.txid()));
            }
        }

        Ok(())
    }

    /// Everything that can be checked without the chain:
    /// size, proof of work, hash, merkle root and coinbase placement
    pub fn validate_structure(&self) -> Result<(), BlockError> {
        if self.transactions.is_empty() {
            return Err(BlockError::Empty);
        }
        self.validate_size()?;

        if !self.verify_hash() {
            return Err(BlockError::InvalidBlockHash);
        }
        if !self.is_valid_pow() {
            return Err(BlockError::InvalidProofOfWork);
        }
        if !self.verify_merkle_root() {
            return Err(BlockError::InvalidMerkleRoot);
        }

        if self.coinbase_tx().is_none()
            || self.transactions.iter().skip(1).any(|tx| tx.is_coinbase())
        {
            return Err(BlockError::BadCoinbase);
        }

        // Two encodings of one transaction would spend the same coins;
        // reject on the bare txid
        let mut seen = HashSet::new();
        for tx in &self.transactions {
            let bare = tx.bare_txid();
            if !seen.insert(bare) {
                return Err(BlockError::DuplicateTransaction(bare));
            }
        }

        Ok(())
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

//! Blockchain implementation
//!
//! The main blockchain struct that manages the chain of blocks, the
//! confirmed coin set and the transaction index. Block validation is
//! free of any segwit-light time policy: a block may contain a chain of
//! dependent transactions at any time, as long as they are in order.

use crate::core::block::{Block, BlockError};
use crate::core::identity::TxIdentity;
use crate::core::script::LockingScript;
use crate::core::transaction::{OutPoint, Transaction, TransactionError, COIN};
use crate::core::utxo::{check_inputs, Coin, InputError, UtxoOverlay, UtxoSet, UtxoView};
use crate::crypto::Hash256;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Default mining difficulty (number of leading zero bits)
pub const DEFAULT_DIFFICULTY: u32 = 8;

/// Block reward
pub const BLOCK_REWARD: u64 = 50 * COIN;

/// Default number of blocks before a coinbase output can be spent
pub const DEFAULT_COINBASE_MATURITY: u64 = 10;

/// Blockchain-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    #[error("Invalid block: {0}")]
    Block(#[from] BlockError),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Invalid transaction {txid}: {source}")]
    Transaction {
        txid: Hash256,
        source: TransactionError,
    },
    #[error("Invalid inputs in {txid}: {source}")]
    Inputs { txid: Hash256, source: InputError },
    #[error("Coinbase pays {paid}, at most {allowed} allowed")]
    CoinbaseTooLarge { paid: u64, allowed: u64 },
    #[error("Block not found: {0}")]
    BlockNotFound(String),
}

/// Where a confirmed transaction lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLocation {
    pub height: u64,
    pub index: usize,
}

/// The main blockchain structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blockchain {
    /// The chain of blocks
    pub blocks: Vec<Block>,
    /// Mining difficulty
    pub difficulty: u32,
    /// Blocks a coinbase output has to wait before it is spendable
    pub coinbase_maturity: u64,
    /// Unspent transaction outputs
    #[serde(skip)]
    utxo_set: UtxoSet,
    /// Both txid and bare txid of every confirmed transaction
    #[serde(skip)]
    tx_index: HashMap<Hash256, TxLocation>,
}

impl Blockchain {
    /// Create a blockchain with a freshly mined genesis block
    pub fn new(difficulty: u32, coinbase_maturity: u64, genesis_time: i64) -> Self {
        let genesis = Block::genesis(difficulty, genesis_time);
        let mut blockchain = Self {
            blocks: vec![genesis],
            difficulty,
            coinbase_maturity,
            utxo_set: UtxoSet::new(),
            tx_index: HashMap::new(),
        };
        blockchain.rebuild_indexes();
        blockchain
    }

    /// Get the latest block
    pub fn latest_block(&self) -> &Block {
        // The chain always holds at least the genesis block
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn get_block(&self, height: u64) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    /// Get blockchain height
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxo_set
    }

    /// Confirmed coin at an outpoint
    pub fn get_utxo(&self, outpoint: &OutPoint) -> Option<&Coin> {
        self.utxo_set.get(outpoint)
    }

    /// Confirmations of something included at `height`
    pub fn confirmations(&self, height: u64) -> u64 {
        if height > self.height() {
            0
        } else {
            self.height() - height + 1
        }
    }

    /// Time of the block at `height`
    pub fn block_time(&self, height: u64) -> Option<i64> {
        self.get_block(height).map(|b| b.header.time)
    }

    /// Look up a confirmed transaction by txid or bare txid
    pub fn get_transaction(&self, id: &Hash256) -> Option<(&Transaction, TxLocation)> {
        let location = *self.tx_index.get(id)?;
        let tx = self
            .get_block(location.height)?
            .transactions
            .get(location.index)?;
        Some((tx, location))
    }

    /// Validate a block against the current tip, returning its total fees
    pub fn check_block(&self, block: &Block) -> Result<u64, BlockchainError> {
        block.validate_structure()?;
        self.check_block_content(block)
    }

    /// Everything [`Self::check_block`] checks except proof of work and
    /// the context-free structure, for candidates that are not mined yet
    ///
    /// Transactions are applied in order to an overlay of the coin set,
    /// so a later transaction may spend outputs of an earlier one.
    pub fn check_block_content(&self, block: &Block) -> Result<u64, BlockchainError> {
        let latest = self.latest_block();
        block.validate_size()?;

        if block.height != latest.height + 1 {
            return Err(BlockchainError::InvalidBlock(format!(
                "Invalid height: expected {}, got {}",
                latest.height + 1,
                block.height
            )));
        }

        if block.header.previous_hash != latest.hash {
            return Err(BlockchainError::InvalidBlock(
                "Invalid previous hash".to_string(),
            ));
        }

        if block.header.difficulty != self.difficulty {
            return Err(BlockchainError::InvalidBlock(format!(
                "Invalid difficulty: expected {}, got {}",
                self.difficulty, block.header.difficulty
            )));
        }

        let mut overlay = UtxoOverlay::new(&self.utxo_set);
        let mut fees = 0u64;

        for tx in &block.transactions {
            let txid = tx.txid();
            let tx_error = |source| BlockchainError::Transaction { txid, source };

            tx.check_basic().map_err(tx_error)?;
            tx.check_unlocking_structure().map_err(tx_error)?;
            tx.check_final(block.height, block.header.time)
                .map_err(tx_error)?;

            if !tx.is_coinbase() {
                let fee = check_inputs(tx, &overlay, block.height, self.coinbase_maturity)
                    .map_err(|source| BlockchainError::Inputs { txid, source })?;
                fees = fees.saturating_add(fee);
            }
            overlay.apply(tx, Some(block.height));
        }

        let paid = block
            .coinbase_tx()
            .map(|tx| tx.outputs.iter().map(|o| o.amount).sum::<u64>())
            .unwrap_or(0);
        let allowed = BLOCK_REWARD.saturating_add(fees);
        if paid > allowed {
            return Err(BlockchainError::CoinbaseTooLarge { paid, allowed });
        }

        Ok(fees)
    }

    /// Add a new block to the chain
    pub fn add_block(&mut self, block: Block) -> Result<(), BlockchainError> {
        let fees = self.check_block(&block)?;

        self.connect(&block);
        info!(
            "Connected block {} at height {} ({} txs, {} fees)",
            block.hash,
            block.height,
            block.tx_count(),
            fees
        );
        self.blocks.push(block);

        Ok(())
    }

    fn connect(&mut self, block: &Block) {
        for (index, tx) in block.transactions.iter().enumerate() {
            self.utxo_set.apply(tx, block.height);

            let identity = TxIdentity::of(tx);
            let location = TxLocation {
                height: block.height,
                index,
            };
            self.tx_index.insert(identity.txid, location);
            self.tx_index.insert(identity.bare_txid, location);
            debug!(
                "Indexed tx {} (bare {}) at {}:{}",
                identity.txid, identity.bare_txid, block.height, index
            );
        }
    }

    /// Rebuild the coin set and tx index from the blocks
    pub fn rebuild_indexes(&mut self) {
        self.utxo_set = UtxoSet::new();
        self.tx_index.clear();

        let blocks = std::mem::take(&mut self.blocks);
        for block in &blocks {
            self.connect(block);
        }
        self.blocks = blocks;
    }

    /// Confirmed coins whose script satisfies the predicate
    pub fn coins_matching<F>(&self, mut predicate: F) -> Vec<(OutPoint, Coin)>
    where
        F: FnMut(&LockingScript) -> bool,
    {
        self.utxo_set
            .iter()
            .filter(|(_, coin)| predicate(&coin.output.script))
            .map(|(outpoint, coin)| (*outpoint, coin.clone()))
            .collect()
    }
}

impl UtxoView for Blockchain {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.utxo_set.get_coin(outpoint)
    }
}

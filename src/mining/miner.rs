//! Mining engine for the blockchain
//!
//! Assembles candidate blocks and grinds their proof of work. Assembly
//! applies no relay policy: any transaction that is valid in block order
//! can be mined, including spends of outputs created earlier in the
//! same block.

use crate::core::{
    Block, Blockchain, BlockchainError, LockingScript, Transaction, BLOCK_HEADER_SIZE,
    BLOCK_REWARD, MAX_BLOCK_SIZE,
};
use log::info;
use std::time::Instant;

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

/// Miner for creating new blocks
#[derive(Debug, Clone)]
pub struct Miner {
    /// Script the block reward is paid to
    pub reward_script: LockingScript,
}

impl Miner {
    pub fn new(reward_script: LockingScript) -> Self {
        Self { reward_script }
    }

    fn coinbase(&self, height: u64) -> Transaction {
        Transaction::coinbase(self.reward_script.clone(), BLOCK_REWARD, height)
    }

    /// Bytes left for non-coinbase transactions in the next block
    pub fn block_space(&self, blockchain: &Blockchain) -> usize {
        let coinbase = self.coinbase(blockchain.height() + 1);
        MAX_BLOCK_SIZE.saturating_sub(BLOCK_HEADER_SIZE + coinbase.estimated_size())
    }

    /// Build the next block on top of `blockchain` without mining it
    pub fn assemble_block(
        &self,
        blockchain: &Blockchain,
        transactions: Vec<Transaction>,
        time: i64,
    ) -> Block {
        let height = blockchain.height() + 1;
        let coinbase = self.coinbase(height);

        let mut all_transactions = vec![coinbase];
        all_transactions.extend(transactions);

        Block::new(
            height,
            blockchain.latest_block().hash,
            all_transactions,
            blockchain.difficulty,
            time,
        )
    }

    /// Mine a new block with the given transactions and connect it
    pub fn mine_block(
        &self,
        blockchain: &mut Blockchain,
        transactions: Vec<Transaction>,
        time: i64,
    ) -> Result<(Block, MiningStats), BlockchainError> {
        let start = Instant::now();
        let mut block = self.assemble_block(blockchain, transactions, time);

        // Reject before spending work on an invalid candidate
        blockchain.check_block_content(&block)?;

        info!(
            "Mining block {} with difficulty {}...",
            block.height, block.header.difficulty
        );

        let attempts = block.mine();

        let elapsed = start.elapsed().as_millis();
        let hash_rate = if elapsed > 0 {
            (attempts as f64) / (elapsed as f64 / 1000.0)
        } else {
            attempts as f64
        };

        let stats = MiningStats {
            hash_attempts: attempts,
            time_ms: elapsed,
            hash_rate,
        };

        info!(
            "Block {} mined in {}ms ({} attempts, {:.2} H/s, {} txs)",
            block.height,
            elapsed,
            attempts,
            hash_rate,
            block.tx_count()
        );

        blockchain.add_block(block.clone())?;

        Ok((block, stats))
    }
}

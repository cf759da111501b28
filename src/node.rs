//! Node facade
//!
//! Ties chain, mempool and wallet together behind async methods named
//! after the RPCs they stand in for. State lives behind
//! `Arc<RwLock<_>>`; locks are always taken in the order chain, mempool,
//! wallet. The only place that reads the clock is here: every policy
//! decision below receives `now` explicitly.

use crate::config::{ConfigError, NodeConfig};
use crate::core::{
    Blockchain, BlockchainError, LockingScript, OutPoint, PolicyZone, TimeSource, Transaction,
    TransactionBuilder, TransactionError, TxIdentity,
};
use crate::crypto::Hash256;
use crate::mining::{Mempool, MempoolError, Miner};
use crate::wallet::{Wallet, WalletBalance, WalletError, WalletInfo};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors surfaced by node operations
#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error("No transaction {0} in chain or mempool")]
    TransactionNotFound(Hash256),
}

/// Result of `sign_raw_transaction`
#[derive(Debug, Clone, Serialize)]
pub struct SignedTransaction {
    pub hex: String,
    /// Whether every input carries valid unlocking data
    pub complete: bool,
}

/// A transaction with both of its ids
#[derive(Debug, Clone, Serialize)]
pub struct DecodedTransaction {
    pub txid: Hash256,
    pub bare_txid: Hash256,
    pub size: usize,
    pub transaction: Transaction,
}

impl DecodedTransaction {
    fn new(transaction: Transaction) -> Self {
        let identity = TxIdentity::of(&transaction);
        Self {
            txid: identity.txid,
            bare_txid: identity.bare_txid,
            size: transaction.estimated_size(),
            transaction,
        }
    }
}

/// Result of `get_raw_transaction`
#[derive(Debug, Clone, Serialize)]
pub struct TransactionInfo {
    pub hex: String,
    #[serde(flatten)]
    pub decoded: DecodedTransaction,
    pub confirmations: u64,
    pub block_height: Option<u64>,
    pub block_hash: Option<Hash256>,
    pub block_time: Option<i64>,
}

/// Result of `get_tx_out`
#[derive(Debug, Clone, Serialize)]
pub struct TxOut {
    pub amount: u64,
    pub address: String,
    pub script_type: &'static str,
    pub confirmations: u64,
    pub coinbase: bool,
}

/// A full node's local state and the operations on it
pub struct Node {
    config: NodeConfig,
    chain: Arc<RwLock<Blockchain>>,
    mempool: Arc<RwLock<Mempool>>,
    wallet: Arc<RwLock<Wallet>>,
    clock: Arc<dyn TimeSource>,
}

impl Node {
    /// Create a node with a fresh chain whose genesis is stamped `clock.now()`
    pub fn new(config: NodeConfig, clock: Arc<dyn TimeSource>) -> Result<Self, NodeError> {
        config.validate()?;
        let chain = Blockchain::new(config.difficulty, config.coinbase_maturity, clock.now());
        let mempool = Mempool::new(config.admission_filter()?);
        let wallet = Wallet::new(config.spend_filter()?, config.wallet_fee);

        info!(
            "Node started: activation at {}, windows {}s/{}s",
            config.activation_time, config.mempool_window_secs, config.wallet_window_secs
        );

        Ok(Self {
            config,
            chain: Arc::new(RwLock::new(chain)),
            mempool: Arc::new(RwLock::new(mempool)),
            wallet: Arc::new(RwLock::new(wallet)),
            clock,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Policy zone at the node's current time
    pub async fn policy_zone(&self) -> PolicyZone {
        self.mempool.read().await.filter().zone(self.now())
    }

    pub async fn get_block_count(&self) -> u64 {
        self.chain.read().await.height()
    }

    // =========================================================================
    // Wallet
    // =========================================================================

    pub async fn get_new_address(&self, label: Option<&str>) -> String {
        self.wallet.write().await.get_new_address(label)
    }

    pub async fn add_multisig_address(
        &self,
        required: u8,
        keys: &[String],
        label: Option<&str>,
    ) -> Result<String, NodeError> {
        Ok(self
            .wallet
            .write()
            .await
            .add_multisig_address(required, keys, label)?)
    }

    /// Single-key wallet addresses with their labels, oldest first
    pub async fn list_addresses(&self) -> Vec<WalletInfo> {
        self.wallet.read().await.list_addresses()
    }

    pub async fn get_balance(&self) -> WalletBalance {
        let chain = self.chain.read().await;
        let mempool = self.mempool.read().await;
        let wallet = self.wallet.read().await;
        wallet.balance(&chain, &mempool)
    }

    /// Build, sign and relay a payment from the wallet
    pub async fn send_to_address(&self, address: &str, amount: u64) -> Result<Hash256, NodeError> {
        let chain = self.chain.read().await;
        let mut mempool = self.mempool.write().await;
        let mut wallet = self.wallet.write().await;
        let now = self.now();

        let recipient = wallet.script_for_address(address)?;
        let tx = wallet.create_transaction(&recipient, amount, &chain, &mempool, now)?;
        let admission = mempool.admit(tx, now, &chain)?;
        Ok(admission.txid())
    }

    // =========================================================================
    // Raw transactions
    // =========================================================================

    /// Unsigned transaction spending `inputs` (bare-txid outpoints)
    pub async fn create_raw_transaction(
        &self,
        inputs: &[OutPoint],
        outputs: &[(String, u64)],
    ) -> Result<String, NodeError> {
        let wallet = self.wallet.read().await;

        let mut builder = TransactionBuilder::new();
        for outpoint in inputs {
            builder = builder.add_input(*outpoint);
        }
        for (address, amount) in outputs {
            builder = builder.add_output(wallet.script_for_address(address)?, *amount);
        }
        Ok(builder.build().to_hex())
    }

    /// Sign what the wallet can
    ///
    /// Previous outputs are looked up in the chain and the mempool;
    /// `prevouts` supplies any the node does not know about.
    pub async fn sign_raw_transaction(
        &self,
        hex: &str,
        prevouts: &[(OutPoint, LockingScript)],
    ) -> Result<SignedTransaction, NodeError> {
        let mut tx = Transaction::from_hex(hex)?;

        let chain = self.chain.read().await;
        let mempool = self.mempool.read().await;
        let wallet = self.wallet.read().await;

        let mut scripts: HashMap<OutPoint, LockingScript> = prevouts.iter().cloned().collect();
        for input in &tx.inputs {
            if scripts.contains_key(&input.prev_out) {
                continue;
            }
            let known = chain
                .get_utxo(&input.prev_out)
                .map(|coin| &coin.output)
                .or_else(|| mempool.output(&input.prev_out));
            if let Some(output) = known {
                scripts.insert(input.prev_out, output.script.clone());
            }
        }

        let complete = wallet.sign_transaction(&mut tx, &scripts)?;
        debug!("Signed raw tx {} (complete: {})", tx.txid(), complete);
        Ok(SignedTransaction {
            hex: tx.to_hex(),
            complete,
        })
    }

    /// Submit an encoded transaction for relay
    pub async fn send_raw_transaction(&self, hex: &str) -> Result<Hash256, NodeError> {
        let tx = Transaction::from_hex(hex)?;

        let chain = self.chain.read().await;
        let mut mempool = self.mempool.write().await;
        let admission = mempool.admit(tx, self.now(), &chain)?;
        Ok(admission.txid())
    }

    pub fn decode_raw_transaction(&self, hex: &str) -> Result<DecodedTransaction, NodeError> {
        Ok(DecodedTransaction::new(Transaction::from_hex(hex)?))
    }

    /// Look up a pooled or confirmed transaction by txid or bare txid
    pub async fn get_raw_transaction(&self, id: &Hash256) -> Result<TransactionInfo, NodeError> {
        let chain = self.chain.read().await;
        let mempool = self.mempool.read().await;

        if let Some(tx) = mempool.get_transaction(id) {
            return Ok(TransactionInfo {
                hex: tx.to_hex(),
                decoded: DecodedTransaction::new(tx.clone()),
                confirmations: 0,
                block_height: None,
                block_hash: None,
                block_time: None,
            });
        }

        let (tx, location) = chain
            .get_transaction(id)
            .ok_or(NodeError::TransactionNotFound(*id))?;
        Ok(TransactionInfo {
            hex: tx.to_hex(),
            decoded: DecodedTransaction::new(tx.clone()),
            confirmations: chain.confirmations(location.height),
            block_height: Some(location.height),
            block_hash: chain.get_block(location.height).map(|b| b.hash),
            block_time: chain.block_time(location.height),
        })
    }

    /// Unspent output, optionally seeing pool spends and pool outputs
    pub async fn get_tx_out(&self, outpoint: &OutPoint, include_mempool: bool) -> Option<TxOut> {
        let chain = self.chain.read().await;
        let mempool = self.mempool.read().await;

        if include_mempool && mempool.is_spent(outpoint) {
            return None;
        }
        if let Some(coin) = chain.get_utxo(outpoint) {
            return Some(TxOut {
                amount: coin.output.amount,
                address: coin.output.address(),
                script_type: coin.output.script.type_name(),
                confirmations: coin.height.map(|h| chain.confirmations(h)).unwrap_or(0),
                coinbase: coin.is_coinbase,
            });
        }
        if include_mempool {
            return mempool.output(outpoint).map(|output| TxOut {
                amount: output.amount,
                address: output.address(),
                script_type: output.script.type_name(),
                confirmations: 0,
                coinbase: false,
            });
        }
        None
    }

    /// Pooled txids in arrival order
    pub async fn get_raw_mempool(&self) -> Vec<Hash256> {
        self.mempool.read().await.txids()
    }

    // =========================================================================
    // Mining
    // =========================================================================

    /// Mine `count` blocks with the pool's content, rewards to the wallet
    pub async fn generate(&self, count: u32) -> Result<Vec<Hash256>, NodeError> {
        let mut hashes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            hashes.push(self.mine(Vec::new()).await?);
        }
        Ok(hashes)
    }

    /// Mine one block with the pool's content plus `extra` encoded
    /// transactions, which bypass relay policy entirely
    pub async fn generate_block(&self, extra: &[String]) -> Result<Hash256, NodeError> {
        let extra = extra
            .iter()
            .map(|hex| Transaction::from_hex(hex))
            .collect::<Result<Vec<_>, _>>()?;
        self.mine(extra).await
    }

    async fn mine(&self, extra: Vec<Transaction>) -> Result<Hash256, NodeError> {
        let mut chain = self.chain.write().await;
        let mut mempool = self.mempool.write().await;
        let mut wallet = self.wallet.write().await;

        let reward_address = wallet.get_new_address(None);
        let miner = Miner::new(wallet.script_for_address(&reward_address)?);

        // Extra transactions are always included; the pool fills what is left
        let extra_size: usize = extra.iter().map(Transaction::estimated_size).sum();
        let space = miner.block_space(&chain).saturating_sub(extra_size);
        let mut transactions = mempool.transactions_for_block(space);
        for tx in extra {
            let bare = tx.bare_txid();
            if !transactions.iter().any(|t| t.bare_txid() == bare) {
                transactions.push(tx);
            }
        }

        let (block, _) = miner.mine_block(&mut chain, transactions, self.now())?;

        mempool.remove_for_block(&block, &chain);
        Ok(block.hash)
    }
}

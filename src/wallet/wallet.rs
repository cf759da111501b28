//! Wallet implementation for the blockchain
//!
//! Holds signing keys and the multisig scripts the wallet watches,
//! tracks the coins it can spend (chain and pool, keyed by bare txid)
//! and builds and signs transactions.

use crate::core::{
    Blockchain, LockingScript, OutPoint, ScriptError, Transaction, TransactionBuilder,
    TransactionError,
};
use crate::crypto::KeyPair;
use crate::mining::Mempool;
use crate::wallet::spend_filter::{WalletCoin, WalletSpendFilter};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Default flat fee per wallet-built transaction
pub const DEFAULT_WALLET_FEE: u64 = 10_000;

/// Wallet-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Invalid amount: {0}")]
    InvalidAmount(u64),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Script error: {0}")]
    ScriptError(#[from] ScriptError),
    #[error("Unknown key or address: {0}")]
    UnknownKey(String),
    #[error("Previous output {0} unknown")]
    UnknownPrevout(OutPoint),
}

/// Confirmed and unconfirmed spendable value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub confirmed: u64,
    pub unconfirmed: u64,
}

/// Public wallet information (safe to share)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: String,
    pub public_key: String,
    pub label: Option<String>,
}

/// A blockchain wallet for managing keys and creating transactions
pub struct Wallet {
    /// Signing keys by P2PKH address
    keys: HashMap<String, KeyPair>,
    /// Key addresses in creation order
    order: Vec<String>,
    labels: HashMap<String, String>,
    /// Registered multisig scripts by script address
    multisig: HashMap<String, LockingScript>,
    spend_filter: WalletSpendFilter,
    fee: u64,
}

impl Wallet {
    pub fn new(spend_filter: WalletSpendFilter, fee: u64) -> Self {
        Self {
            keys: HashMap::new(),
            order: Vec::new(),
            labels: HashMap::new(),
            multisig: HashMap::new(),
            spend_filter,
            fee,
        }
    }

    // =========================================================================
    // Keys and addresses
    // =========================================================================

    /// Generate a fresh key and return its address
    pub fn get_new_address(&mut self, label: Option<&str>) -> String {
        self.add_key(KeyPair::generate(), label)
    }

    fn add_key(&mut self, key_pair: KeyPair, label: Option<&str>) -> String {
        let address = key_pair.address();
        if let Some(label) = label {
            self.labels.insert(address.clone(), label.to_string());
        }
        if self.keys.insert(address.clone(), key_pair).is_none() {
            self.order.push(address.clone());
        }
        address
    }

    /// Public key (hex) behind one of this wallet's addresses
    pub fn public_key_for(&self, address: &str) -> Option<String> {
        self.keys.get(address).map(|k| k.public_key_hex())
    }

    /// Register an M-of-N multisig script and return its address
    ///
    /// Each key may be a hex public key or an address of this wallet.
    pub fn add_multisig_address(
        &mut self,
        required: u8,
        keys: &[String],
        label: Option<&str>,
    ) -> Result<String, WalletError> {
        let public_keys = keys
            .iter()
            .map(|key| {
                self.public_key_for(key)
                    .or_else(|| hex::decode(key).ok().map(|_| key.clone()))
                    .ok_or_else(|| WalletError::UnknownKey(key.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let script = LockingScript::multisig(required, public_keys)?;
        let address = script.address();
        if let Some(label) = label {
            self.labels.insert(address.clone(), label.to_string());
        }
        info!("Registered {}-of-{} multisig {}", required, keys.len(), address);
        self.multisig.insert(address.clone(), script);
        Ok(address)
    }

    /// Locking script for a P2PKH or registered multisig address
    pub fn script_for_address(&self, address: &str) -> Result<LockingScript, WalletError> {
        if let Some(script) = self.multisig.get(address) {
            return Ok(script.clone());
        }
        Ok(LockingScript::pay_to_address(address)?)
    }

    pub fn list_addresses(&self) -> Vec<WalletInfo> {
        self.order
            .iter()
            .filter_map(|address| {
                self.keys.get(address).map(|key| WalletInfo {
                    address: address.clone(),
                    public_key: key.public_key_hex(),
                    label: self.labels.get(address).cloned(),
                })
            })
            .collect()
    }

    /// Whether this wallet can fully sign for outputs locked by `script`
    pub fn is_mine(&self, script: &LockingScript) -> bool {
        match script {
            LockingScript::PayToPubKeyHash { address } => self.keys.contains_key(address),
            LockingScript::Multisig { required, .. } => {
                self.multisig.contains_key(&script.address())
                    && self.multisig_signers(script).len() >= *required as usize
            }
        }
    }

    /// Own keys that appear in a multisig script
    fn multisig_signers(&self, script: &LockingScript) -> Vec<&KeyPair> {
        match script {
            LockingScript::Multisig { public_keys, .. } => public_keys
                .iter()
                .filter_map(|pk| self.keys.values().find(|k| k.public_key_hex() == *pk))
                .collect(),
            LockingScript::PayToPubKeyHash { .. } => Vec::new(),
        }
    }

    // =========================================================================
    // Coins
    // =========================================================================

    /// Every coin this wallet can spend: mature chain coins not spent in
    /// the pool, plus unspent pool outputs with zero confirmations
    pub fn candidate_coins(&self, chain: &Blockchain, mempool: &Mempool) -> Vec<WalletCoin> {
        let next_height = chain.height() + 1;
        let mut coins: Vec<WalletCoin> = chain
            .coins_matching(|script| self.is_mine(script))
            .into_iter()
            .filter(|(outpoint, coin)| {
                let height = coin.height.unwrap_or(next_height);
                let mature = !coin.is_coinbase
                    || next_height.saturating_sub(height) >= chain.coinbase_maturity;
                mature && !mempool.is_spent(outpoint)
            })
            .map(|(outpoint, coin)| WalletCoin {
                outpoint,
                confirmations: coin.height.map(|h| chain.confirmations(h)).unwrap_or(0),
                output: coin.output,
            })
            .collect();

        coins.extend(
            mempool
                .unspent_outputs()
                .into_iter()
                .filter(|(_, output)| self.is_mine(&output.script))
                .map(|(outpoint, output)| WalletCoin {
                    outpoint,
                    output,
                    confirmations: 0,
                }),
        );
        coins
    }

    pub fn balance(&self, chain: &Blockchain, mempool: &Mempool) -> WalletBalance {
        self.candidate_coins(chain, mempool)
            .iter()
            .fold(WalletBalance::default(), |mut balance, coin| {
                if coin.is_confirmed() {
                    balance.confirmed += coin.output.amount;
                } else {
                    balance.unconfirmed += coin.output.amount;
                }
                balance
            })
    }

    // =========================================================================
    // Spending
    // =========================================================================

    /// Build and sign a payment to `recipient`
    ///
    /// Coins pass through the spend filter first, so close to activation
    /// unconfirmed coins do not count; running out of eligible coins is
    /// reported as `InsufficientFunds`.
    pub fn create_transaction(
        &mut self,
        recipient: &LockingScript,
        amount: u64,
        chain: &Blockchain,
        mempool: &Mempool,
        now: i64,
    ) -> Result<Transaction, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let need = amount.saturating_add(self.fee);

        let mut selectable = self
            .spend_filter
            .selectable_inputs(self.candidate_coins(chain, mempool), now);
        selectable.sort_by(|a, b| b.output.amount.cmp(&a.output.amount));
        let have: u64 = selectable.iter().map(|c| c.output.amount).sum();

        // Largest first until covered
        let mut selected = Vec::new();
        let mut selected_amount = 0u64;
        for coin in selectable {
            if selected_amount >= need {
                break;
            }
            selected_amount += coin.output.amount;
            selected.push(coin);
        }

        if selected_amount < need {
            debug!("Wallet spend of {} failed: {} eligible", need, have);
            return Err(WalletError::InsufficientFunds { have, need });
        }

        let mut builder = TransactionBuilder::new();
        for coin in &selected {
            builder = builder.add_input(coin.outpoint);
        }
        builder = builder.add_output(recipient.clone(), amount);

        let change = selected_amount - need;
        if change > 0 {
            let change_address = self.get_new_address(None);
            builder = builder.add_output(LockingScript::pay_to_address(&change_address)?, change);
        }

        let mut tx = builder.build();
        let prevouts: HashMap<OutPoint, LockingScript> = selected
            .into_iter()
            .map(|coin| (coin.outpoint, coin.output.script))
            .collect();
        self.sign_transaction(&mut tx, &prevouts)?;

        info!(
            "Wallet built tx {} (bare {}) paying {} to {}",
            tx.txid(),
            tx.bare_txid(),
            amount,
            recipient.address()
        );
        Ok(tx)
    }

    /// Add every signature this wallet can provide
    ///
    /// Inputs whose previous output is not in `prevouts` are left alone.
    /// Returns whether every input is now fully and validly signed.
    pub fn sign_transaction(
        &self,
        tx: &mut Transaction,
        prevouts: &HashMap<OutPoint, LockingScript>,
    ) -> Result<bool, WalletError> {
        let sighash = tx.signature_hash();

        for index in 0..tx.inputs.len() {
            let Some(script) = prevouts.get(&tx.inputs[index].prev_out) else {
                continue;
            };
            if script.verify(&sighash, &tx.inputs[index].signatures).is_ok() {
                continue;
            }

            match script {
                LockingScript::PayToPubKeyHash { address } => {
                    if let Some(key) = self.keys.get(address) {
                        tx.inputs[index].signatures.clear();
                        tx.sign_input(index, key)?;
                    }
                }
                LockingScript::Multisig { required, .. } => {
                    for key in self.multisig_signers(script) {
                        if tx.inputs[index].signatures.len() >= *required as usize {
                            break;
                        }
                        tx.sign_input(index, key)?;
                    }
                }
            }
        }

        Ok(tx.inputs.iter().all(|input| {
            prevouts
                .get(&input.prev_out)
                .map(|script| script.verify(&sighash, &input.signatures).is_ok())
                .unwrap_or(false)
        }))
    }
}

//! Transaction pool (mempool) for pending transactions
//!
//! Manages unconfirmed transactions waiting to be included in blocks.
//! - One entry per bare txid; a malleated encoding of a pooled
//!   transaction is recognized as the same transaction
//! - Lookups by either txid or bare txid
//! - Double-spend conflict detection
//! - Ancestor limits (Bitcoin-style)
//! - Segwit-light relay policy via [`MempoolAdmissionFilter`]

use crate::core::{
    check_inputs, Block, Blockchain, Coin, InputError, OutPoint, PolicyZone, Transaction,
    TransactionError, TransactionOutput, TxIdentity, UtxoView, MAX_BLOCK_TXS,
};
use crate::crypto::Hash256;
use crate::mining::admission::{MempoolAdmissionFilter, ResolvedSpend};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

// =============================================================================
// Configuration
// =============================================================================

/// Default maximum mempool transaction count
pub const DEFAULT_MEMPOOL_SIZE: usize = 10_000;

/// Maximum number of in-pool ancestors of a transaction
pub const MAX_ANCESTORS: usize = 25;

// =============================================================================
// Error Types
// =============================================================================

/// Mempool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("Spend of unconfirmed output {outpoint} not relayed in zone {zone}")]
    UnconfirmedSpendRestricted { outpoint: OutPoint, zone: PolicyZone },
    #[error("Missing inputs: {0}")]
    MissingInputs(OutPoint),
    #[error("Input {outpoint} already spent by pooled transaction {spent_by}")]
    Conflict { outpoint: OutPoint, spent_by: Hash256 },
    #[error("Transaction {0} is already confirmed")]
    AlreadyConfirmed(Hash256),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Transaction validation error: {0}")]
    ValidationError(#[from] TransactionError),
    #[error("Input validation error: {0}")]
    InputError(#[from] InputError),
    #[error("Too many ancestors: {0} (max: {1})")]
    TooManyAncestors(usize, usize),
    #[error("Mempool full")]
    MempoolFull,
}

/// Successful outcome of [`Mempool::admit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Newly added; carries the txid of the pooled encoding
    Accepted(Hash256),
    /// Its bare txid was already pooled; carries the pooled txid
    AlreadyInPool(Hash256),
}

impl Admission {
    pub fn txid(&self) -> Hash256 {
        match self {
            Admission::Accepted(txid) | Admission::AlreadyInPool(txid) => *txid,
        }
    }
}

// =============================================================================
// Mempool Entry
// =============================================================================

/// Entry in the mempool with metadata
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    pub tx: Transaction,
    pub identity: TxIdentity,
    pub fee: u64,
    /// When the transaction was added (unix seconds)
    pub added_time: i64,
    pub ancestor_count: usize,
}

// =============================================================================
// Mempool
// =============================================================================

/// Memory pool for pending transactions
#[derive(Debug)]
pub struct Mempool {
    /// Transactions indexed by bare txid
    entries: HashMap<Hash256, MempoolEntry>,
    /// txid -> bare txid
    by_txid: HashMap<Hash256, Hash256>,
    /// Outpoints spent by pooled transactions -> spender's bare txid
    spent: HashMap<OutPoint, Hash256>,
    /// Bare txids in order of arrival; parents always precede children
    by_time: Vec<Hash256>,
    filter: MempoolAdmissionFilter,
    max_size: usize,
}

impl Mempool {
    pub fn new(filter: MempoolAdmissionFilter) -> Self {
        Self::with_capacity(filter, DEFAULT_MEMPOOL_SIZE)
    }

    pub fn with_capacity(filter: MempoolAdmissionFilter, max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            by_txid: HashMap::new(),
            spent: HashMap::new(),
            by_time: Vec::new(),
            filter,
            max_size,
        }
    }

    pub fn filter(&self) -> &MempoolAdmissionFilter {
        &self.filter
    }

    /// Submit a transaction for relay
    ///
    /// Resubmitting a pooled transaction, in its pooled encoding or any
    /// other, is a no-op that reports `AlreadyInPool`.
    pub fn admit(
        &mut self,
        tx: Transaction,
        now: i64,
        chain: &Blockchain,
    ) -> Result<Admission, MempoolError> {
        let identity = TxIdentity::of(&tx);

        if let Some(pooled) = self.entries.get(&identity.bare_txid).map(|e| e.identity.txid) {
            // Another encoding must still unlock the same coins
            if pooled != identity.txid {
                tx.check_unlocking_structure()?;
                check_inputs(
                    &tx,
                    &PoolView {
                        chain,
                        pool: &*self,
                        spender: Some(identity.bare_txid),
                    },
                    chain.height() + 1,
                    chain.coinbase_maturity,
                )?;
            }
            debug!("Tx {} already pooled as {}", identity.txid, pooled);
            return Ok(Admission::AlreadyInPool(pooled));
        }

        if tx.is_coinbase() {
            return Err(MempoolError::InvalidTransaction(
                "coinbase outside a block".to_string(),
            ));
        }
        tx.check_basic()?;
        tx.check_unlocking_structure()?;
        tx.check_final(chain.height() + 1, now)?;

        if chain.get_transaction(&identity.bare_txid).is_some() {
            return Err(MempoolError::AlreadyConfirmed(identity.txid));
        }

        // Resolve every input by bare txid, chain first
        let mut spends = Vec::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            let outpoint = input.prev_out;
            let confirmed = if chain.get_utxo(&outpoint).is_some() {
                true
            } else if self.output(&outpoint).is_some() {
                false
            } else {
                return Err(MempoolError::MissingInputs(outpoint));
            };
            spends.push(ResolvedSpend {
                outpoint,
                confirmed,
            });
        }

        let zone = self.filter.check(now, spends.iter().copied())?;

        for spend in &spends {
            if let Some(spent_by) = self.spent.get(&spend.outpoint) {
                return Err(MempoolError::Conflict {
                    outpoint: spend.outpoint,
                    spent_by: self
                        .entries
                        .get(spent_by)
                        .map(|e| e.identity.txid)
                        .unwrap_or(*spent_by),
                });
            }
        }

        let fee = check_inputs(
            &tx,
            &PoolView {
                chain,
                pool: &*self,
                spender: None,
            },
            chain.height() + 1,
            chain.coinbase_maturity,
        )?;

        let ancestor_count = self.calculate_ancestors(&tx).len();
        if ancestor_count > MAX_ANCESTORS {
            return Err(MempoolError::TooManyAncestors(ancestor_count, MAX_ANCESTORS));
        }

        if self.entries.len() >= self.max_size {
            return Err(MempoolError::MempoolFull);
        }

        info!(
            "Accepted tx {} (bare {}) in zone {}, fee {}",
            identity.txid, identity.bare_txid, zone, fee
        );
        self.insert(MempoolEntry {
            tx,
            identity,
            fee,
            added_time: now,
            ancestor_count,
        });

        Ok(Admission::Accepted(identity.txid))
    }

    fn insert(&mut self, entry: MempoolEntry) {
        let bare = entry.identity.bare_txid;
        for input in &entry.tx.inputs {
            self.spent.insert(input.prev_out, bare);
        }
        self.by_txid.insert(entry.identity.txid, bare);
        self.by_time.push(bare);
        self.entries.insert(bare, entry);
    }

    /// Remove a transaction (by either id) without touching descendants
    fn remove_entry(&mut self, id: &Hash256) -> Option<MempoolEntry> {
        let bare = self.resolve(id)?;
        let entry = self.entries.remove(&bare)?;
        self.by_txid.remove(&entry.identity.txid);
        for input in &entry.tx.inputs {
            if self.spent.get(&input.prev_out) == Some(&bare) {
                self.spent.remove(&input.prev_out);
            }
        }
        self.by_time.retain(|id| *id != bare);
        Some(entry)
    }

    /// Drop what a newly connected block confirmed or invalidated
    ///
    /// Confirmed transactions are matched by bare txid, so a block
    /// carrying a different encoding still clears the pooled one. The
    /// rest are kept in arrival order while all of their inputs still
    /// resolve; the zone policy is not re-applied.
    pub fn remove_for_block(&mut self, block: &Block, chain: &Blockchain) {
        let before = self.entries.len();
        for tx in &block.transactions {
            self.remove_entry(&tx.bare_txid());
        }
        let confirmed = before - self.entries.len();

        let order = std::mem::take(&mut self.by_time);
        let mut entries = std::mem::take(&mut self.entries);
        self.by_txid.clear();
        self.spent.clear();

        let mut evicted = 0usize;
        for bare in order {
            let Some(entry) = entries.remove(&bare) else {
                continue;
            };
            let resolvable = entry.tx.inputs.iter().all(|input| {
                !self.spent.contains_key(&input.prev_out)
                    && (chain.get_utxo(&input.prev_out).is_some()
                        || self.output(&input.prev_out).is_some())
            });
            if resolvable {
                self.insert(entry);
            } else {
                debug!("Evicting tx {} after block {}", entry.identity.txid, block.height);
                evicted += 1;
            }
        }

        if confirmed + evicted > 0 {
            info!(
                "Block {} removed {} confirmed and {} invalidated txs from the mempool",
                block.height, confirmed, evicted
            );
        }
    }

    /// Map either id to the bare txid of a pooled transaction
    fn resolve(&self, id: &Hash256) -> Option<Hash256> {
        if self.entries.contains_key(id) {
            Some(*id)
        } else {
            self.by_txid.get(id).copied()
        }
    }

    /// Get a mempool entry by txid or bare txid
    pub fn get_entry(&self, id: &Hash256) -> Option<&MempoolEntry> {
        self.resolve(id).and_then(|bare| self.entries.get(&bare))
    }

    pub fn get_transaction(&self, id: &Hash256) -> Option<&Transaction> {
        self.get_entry(id).map(|e| &e.tx)
    }

    pub fn contains(&self, id: &Hash256) -> bool {
        self.resolve(id).is_some()
    }

    /// Output created by a pooled transaction
    pub fn output(&self, outpoint: &OutPoint) -> Option<&TransactionOutput> {
        self.entries
            .get(&outpoint.hash)
            .and_then(|e| e.tx.outputs.get(outpoint.index as usize))
    }

    /// Whether a pooled transaction spends this outpoint
    pub fn is_spent(&self, outpoint: &OutPoint) -> bool {
        self.spent.contains_key(outpoint)
    }

    /// Outputs of pooled transactions not spent by other pooled ones
    pub fn unspent_outputs(&self) -> Vec<(OutPoint, TransactionOutput)> {
        self.by_time
            .iter()
            .filter_map(|bare| self.entries.get(bare))
            .flat_map(|entry| {
                entry.tx.outputs.iter().enumerate().map(move |(index, output)| {
                    (
                        OutPoint::new(entry.identity.bare_txid, index as u32),
                        output.clone(),
                    )
                })
            })
            .filter(|(outpoint, _)| !self.is_spent(outpoint))
            .collect()
    }

    /// Transactions for the next block, parents before children
    ///
    /// Takes pooled transactions in arrival order while they fit in
    /// `max_bytes` and the block's transaction count. A transaction left
    /// out takes its in-pool descendants with it; everything not taken
    /// stays pooled for later blocks.
    pub fn transactions_for_block(&self, max_bytes: usize) -> Vec<Transaction> {
        let mut selected = Vec::new();
        let mut left_out: HashSet<Hash256> = HashSet::new();
        let mut used = 0usize;

        for bare in &self.by_time {
            let Some(entry) = self.entries.get(bare) else {
                continue;
            };
            let size = entry.tx.estimated_size();
            let orphaned = entry
                .tx
                .inputs
                .iter()
                .any(|input| left_out.contains(&input.prev_out.hash));

            if orphaned || selected.len() >= MAX_BLOCK_TXS - 1 || used + size > max_bytes {
                left_out.insert(*bare);
                continue;
            }
            used += size;
            selected.push(entry.tx.clone());
        }

        if !left_out.is_empty() {
            debug!(
                "Block template holds {} txs ({} bytes), {} left in the pool",
                selected.len(),
                used,
                left_out.len()
            );
        }
        selected
    }

    /// Pooled txids in arrival order
    pub fn txids(&self) -> Vec<Hash256> {
        self.by_time
            .iter()
            .filter_map(|bare| self.entries.get(bare).map(|e| e.identity.txid))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_txid.clear();
        self.spent.clear();
        self.by_time.clear();
    }

    /// Bare txids of all in-pool ancestors of a transaction
    pub fn calculate_ancestors(&self, tx: &Transaction) -> HashSet<Hash256> {
        let mut ancestors = HashSet::new();
        self.collect_ancestors_recursive(tx, &mut ancestors);
        ancestors
    }

    fn collect_ancestors_recursive(&self, tx: &Transaction, ancestors: &mut HashSet<Hash256>) {
        for input in &tx.inputs {
            let parent = input.prev_out.hash;
            if let Some(parent_entry) = self.entries.get(&parent) {
                if ancestors.insert(parent) {
                    self.collect_ancestors_recursive(&parent_entry.tx, ancestors);
                }
            }
        }
    }

}

/// Chain coins plus unspent pool outputs
///
/// Outpoints spent by `spender` (a pooled bare txid) stay visible.
struct PoolView<'a> {
    chain: &'a Blockchain,
    pool: &'a Mempool,
    spender: Option<Hash256>,
}

impl UtxoView for PoolView<'_> {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        if let Some(spent_by) = self.pool.spent.get(outpoint) {
            if Some(*spent_by) != self.spender {
                return None;
            }
        }
        self.chain.get_coin(outpoint).or_else(|| {
            self.pool.output(outpoint).map(|output| Coin {
                output: output.clone(),
                height: None,
                is_coinbase: false,
            })
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ActivationPolicy, BlockError, BlockchainError, LockingScript, TransactionBuilder, COIN,
        MAX_BLOCK_SIZE, SEGWIT_LIGHT_ACTIVATION_TIME,
    };
    use crate::crypto::KeyPair;
    use crate::mining::Miner;

    const HOUR: i64 = 3_600;
    const T: i64 = SEGWIT_LIGHT_ACTIVATION_TIME;
    const FAR: i64 = T - 48 * HOUR;

    fn p2pkh(key: &KeyPair) -> LockingScript {
        LockingScript::pay_to_address(&key.address()).unwrap()
    }

    /// Chain with `count` mature coinbase outputs owned by `key`
    fn chain_with_coins(key: &KeyPair, count: usize) -> (Blockchain, Vec<OutPoint>) {
        let mut chain = Blockchain::new(4, 1, FAR);
        let miner = Miner::new(p2pkh(key));
        let mut coins = Vec::new();
        for i in 0..=count {
            let (block, _) = miner.mine_block(&mut chain, vec![], FAR + i as i64).unwrap();
            coins.push(OutPoint::new(block.transactions[0].bare_txid(), 0));
        }
        coins.truncate(count);
        (chain, coins)
    }

    fn funded_chain(key: &KeyPair) -> (Blockchain, Vec<OutPoint>) {
        chain_with_coins(key, 2)
    }

    /// One input split into `outputs` small outputs
    fn fan_out(key: &KeyPair, from: OutPoint, outputs: usize) -> Transaction {
        let mut builder = TransactionBuilder::new().add_input(from);
        for _ in 0..outputs {
            builder = builder.add_output(p2pkh(key), COIN / 100);
        }
        let mut tx = builder.build();
        tx.sign_input(0, key).unwrap();
        tx
    }

    fn spend(key: &KeyPair, from: OutPoint, amount: u64) -> Transaction {
        let mut tx = TransactionBuilder::new()
            .add_input(from)
            .add_output(p2pkh(key), amount)
            .build();
        tx.sign_input(0, key).unwrap();
        tx
    }

    fn pool() -> Mempool {
        Mempool::new(MempoolAdmissionFilter::new(ActivationPolicy::default()))
    }

    #[test]
    fn test_admit_and_lookup_by_either_id() {
        let key = KeyPair::generate();
        let (chain, coins) = funded_chain(&key);
        let mut mempool = pool();

        let tx = spend(&key, coins[0], 49 * COIN);
        let admission = mempool.admit(tx.clone(), FAR, &chain).unwrap();
        assert_eq!(admission, Admission::Accepted(tx.txid()));

        assert!(mempool.contains(&tx.txid()));
        assert!(mempool.contains(&tx.bare_txid()));
        assert_eq!(mempool.get_entry(&tx.txid()).unwrap().fee, COIN);
        assert_eq!(mempool.txids(), vec![tx.txid()]);
        assert!(mempool.is_spent(&coins[0]));
    }

    #[test]
    fn test_resubmission_is_idempotent() {
        let key = KeyPair::generate();
        let (chain, coins) = funded_chain(&key);
        let mut mempool = pool();

        let tx = spend(&key, coins[0], 49 * COIN);
        mempool.admit(tx.clone(), FAR, &chain).unwrap();
        assert_eq!(
            mempool.admit(tx.clone(), FAR, &chain),
            Ok(Admission::AlreadyInPool(tx.txid()))
        );
        assert_eq!(mempool.len(), 1);
    }

    #[test]
    fn test_malleated_resubmission_keeps_pooled_encoding() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let (mut chain, coins) = funded_chain(&a);
        let mut mempool = pool();

        let multisig =
            LockingScript::multisig(1, vec![a.public_key_hex(), b.public_key_hex()]).unwrap();
        let mut fund = TransactionBuilder::new()
            .add_input(coins[0])
            .add_output(multisig, 49 * COIN)
            .build();
        fund.sign_input(0, &a).unwrap();
        Miner::new(p2pkh(&a))
            .mine_block(&mut chain, vec![fund.clone()], FAR + 10)
            .unwrap();

        let unsigned = TransactionBuilder::new()
            .add_input(OutPoint::new(fund.bare_txid(), 0))
            .add_output(p2pkh(&a), 48 * COIN)
            .build();
        let mut by_a = unsigned.clone();
        by_a.sign_input(0, &a).unwrap();
        let mut by_b = unsigned;
        by_b.sign_input(0, &b).unwrap();

        assert_eq!(
            mempool.admit(by_a.clone(), FAR, &chain),
            Ok(Admission::Accepted(by_a.txid()))
        );
        assert_eq!(
            mempool.admit(by_b.clone(), FAR, &chain),
            Ok(Admission::AlreadyInPool(by_a.txid()))
        );
        assert_eq!(mempool.get_transaction(&by_b.bare_txid()), Some(&by_a));
        assert!(!mempool.contains(&by_b.txid()));
    }

    #[test]
    fn test_resubmitted_encoding_must_unlock_its_inputs() {
        let key = KeyPair::generate();
        let (chain, coins) = funded_chain(&key);
        let mut mempool = pool();

        let tx = spend(&key, coins[0], 49 * COIN);
        mempool.admit(tx.clone(), FAR, &chain).unwrap();

        let mut forged = tx.clone();
        forged.inputs[0].signatures.clear();
        forged.sign_input(0, &KeyPair::generate()).unwrap();
        assert_eq!(forged.bare_txid(), tx.bare_txid());
        assert_ne!(forged.txid(), tx.txid());

        assert!(matches!(
            mempool.admit(forged, FAR, &chain),
            Err(MempoolError::InputError(InputError::Script { index: 0, .. }))
        ));
        assert_eq!(mempool.get_transaction(&tx.bare_txid()), Some(&tx));
        assert_eq!(mempool.len(), 1);
    }

    #[test]
    fn test_conflict_and_missing_inputs() {
        let key = KeyPair::generate();
        let (chain, coins) = funded_chain(&key);
        let mut mempool = pool();

        let first = spend(&key, coins[0], 49 * COIN);
        mempool.admit(first.clone(), FAR, &chain).unwrap();

        let double = spend(&key, coins[0], 48 * COIN);
        assert_eq!(
            mempool.admit(double, FAR, &chain),
            Err(MempoolError::Conflict {
                outpoint: coins[0],
                spent_by: first.txid()
            })
        );

        // Outpoints name the bare txid; the full txid resolves nothing
        let by_full_id = spend(&key, OutPoint::new(first.txid(), 0), COIN);
        assert!(matches!(
            mempool.admit(by_full_id, FAR, &chain),
            Err(MempoolError::MissingInputs(_))
        ));
    }

    #[test]
    fn test_unconfirmed_spend_by_zone() {
        let key = KeyPair::generate();
        let (chain, coins) = funded_chain(&key);

        for (now, allowed) in [
            (T - 24 * HOUR, true),
            (T - 10 * HOUR, true),
            (T - HOUR, false),
            (T + HOUR, false),
            (T + 10 * HOUR, true),
        ] {
            let mut mempool = pool();
            let parent = spend(&key, coins[0], 49 * COIN);
            mempool.admit(parent.clone(), now, &chain).unwrap();

            let child = spend(&key, OutPoint::new(parent.bare_txid(), 0), 48 * COIN);
            let result = mempool.admit(child, now, &chain);
            assert_eq!(result.is_ok(), allowed, "at offset {}", now - T);
            if !allowed {
                assert!(matches!(
                    result,
                    Err(MempoolError::UnconfirmedSpendRestricted { .. })
                ));
            }
        }
    }

    #[test]
    fn test_bad_signature_rejected() {
        let key = KeyPair::generate();
        let (chain, coins) = funded_chain(&key);
        let mut mempool = pool();

        let thief = KeyPair::generate();
        let stolen = spend(&thief, coins[0], COIN);
        assert!(matches!(
            mempool.admit(stolen, FAR, &chain),
            Err(MempoolError::InputError(InputError::Script { .. }))
        ));
    }

    #[test]
    fn test_ancestor_limit() {
        let key = KeyPair::generate();
        let (chain, coins) = funded_chain(&key);
        let mut mempool = pool();

        let mut previous = coins[0];
        let mut amount = 49 * COIN;
        for _ in 0..=MAX_ANCESTORS {
            let tx = spend(&key, previous, amount);
            mempool.admit(tx.clone(), FAR, &chain).unwrap();
            previous = OutPoint::new(tx.bare_txid(), 0);
            amount -= 1_000;
        }
        assert_eq!(
            mempool.admit(spend(&key, previous, amount), FAR, &chain),
            Err(MempoolError::TooManyAncestors(MAX_ANCESTORS + 1, MAX_ANCESTORS))
        );
    }

    #[test]
    fn test_remove_for_block() {
        let key = KeyPair::generate();
        let (mut chain, coins) = funded_chain(&key);
        let mut mempool = pool();

        let parent = spend(&key, coins[0], 49 * COIN);
        let child = spend(&key, OutPoint::new(parent.bare_txid(), 0), 48 * COIN);
        let other = spend(&key, coins[1], 49 * COIN);
        mempool.admit(parent.clone(), FAR, &chain).unwrap();
        mempool.admit(child.clone(), FAR, &chain).unwrap();
        mempool.admit(other.clone(), FAR, &chain).unwrap();
        assert_eq!(
            mempool.transactions_for_block(MAX_BLOCK_SIZE),
            vec![parent.clone(), child.clone(), other]
        );

        // A block confirms the parent and a competing spend of coins[1]
        let competing = spend(&key, coins[1], 10 * COIN);
        let (block, _) = Miner::new(p2pkh(&key))
            .mine_block(&mut chain, vec![parent.clone(), competing], FAR + 10)
            .unwrap();
        mempool.remove_for_block(&block, &chain);

        assert_eq!(mempool.txids(), vec![child.txid()]);
        assert!(mempool.unspent_outputs().iter().all(|(o, _)| o.hash == child.bare_txid()));
    }

    #[test]
    fn test_block_template_drops_descendants_of_what_does_not_fit() {
        let key = KeyPair::generate();
        let (chain, coins) = funded_chain(&key);
        let mut mempool = pool();

        let parent = fan_out(&key, coins[0], 50);
        let child = spend(&key, OutPoint::new(parent.bare_txid(), 0), COIN / 200);
        let other = spend(&key, coins[1], 49 * COIN);
        for tx in [&parent, &child, &other] {
            mempool.admit(tx.clone(), FAR, &chain).unwrap();
        }

        let budget = child.estimated_size() + other.estimated_size();
        assert!(parent.estimated_size() > budget);
        assert_eq!(mempool.transactions_for_block(budget), vec![other]);
        assert_eq!(mempool.len(), 3);
    }

    #[test]
    fn test_pool_larger_than_a_block_still_mines() {
        let key = KeyPair::generate();
        let (mut chain, coins) = chain_with_coins(&key, 12);
        let mut mempool = pool();

        for coin in &coins {
            mempool.admit(fan_out(&key, *coin, 2_000), FAR, &chain).unwrap();
        }
        let pooled: usize = mempool
            .txids()
            .iter()
            .filter_map(|id| mempool.get_transaction(id))
            .map(Transaction::estimated_size)
            .sum();
        assert!(pooled > MAX_BLOCK_SIZE);

        // The whole pool is refused before any proof of work is done
        let miner = Miner::new(p2pkh(&key));
        let everything = miner.assemble_block(
            &chain,
            mempool.transactions_for_block(usize::MAX),
            FAR + 20,
        );
        assert!(matches!(
            chain.check_block_content(&everything),
            Err(BlockchainError::Block(BlockError::BlockTooLarge(..)))
        ));

        let template = mempool.transactions_for_block(miner.block_space(&chain));
        let (block, _) = miner.mine_block(&mut chain, template, FAR + 20).unwrap();
        assert!(block.size() <= MAX_BLOCK_SIZE);
        mempool.remove_for_block(&block, &chain);
        assert!(!mempool.is_empty());

        let template = mempool.transactions_for_block(miner.block_space(&chain));
        let (block, _) = miner.mine_block(&mut chain, template, FAR + 30).unwrap();
        mempool.remove_for_block(&block, &chain);
        assert!(mempool.is_empty());
    }

    #[test]
    fn test_confirmed_transaction_not_pooled_again() {
        let key = KeyPair::generate();
        let (mut chain, coins) = funded_chain(&key);
        let tx = spend(&key, coins[0], 49 * COIN);
        Miner::new(p2pkh(&key))
            .mine_block(&mut chain, vec![tx.clone()], FAR + 10)
            .unwrap();

        assert_eq!(
            pool().admit(tx.clone(), FAR, &chain),
            Err(MempoolError::AlreadyConfirmed(tx.txid()))
        );
    }
}

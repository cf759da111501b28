//! Unspent output tracking and input checks
//!
//! Coins are keyed by [`OutPoint`], i.e. by the bare txid of the
//! transaction that created them. The same checks run for blocks (over
//! an overlay of the chain's set) and for the mempool (over chain plus
//! pool outputs).

use crate::core::script::ScriptError;
use crate::core::transaction::{OutPoint, Transaction, TransactionOutput, MAX_MONEY};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Why a transaction's inputs do not check out
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Missing input {0}")]
    Missing(OutPoint),
    #[error("Coinbase output {outpoint} is immature: {depth} of {maturity} blocks")]
    ImmatureCoinbase {
        outpoint: OutPoint,
        depth: u64,
        maturity: u64,
    },
    #[error("Input {index} fails its locking script: {reason}")]
    Script { index: usize, reason: ScriptError },
    #[error("Inputs ({inputs}) less than outputs ({outputs})")]
    InsufficientInputValue { inputs: u64, outputs: u64 },
    #[error("Value out of range")]
    ValueOutOfRange,
}

/// An unspent output plus where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub output: TransactionOutput,
    /// Height of the block that created it, `None` while unconfirmed
    pub height: Option<u64>,
    pub is_coinbase: bool,
}

impl Coin {
    pub fn is_confirmed(&self) -> bool {
        self.height.is_some()
    }
}

/// Read access to a set of coins
pub trait UtxoView {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin>;

    fn contains(&self, outpoint: &OutPoint) -> bool {
        self.get_coin(outpoint).is_some()
    }
}

/// The confirmed coin set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UtxoSet {
    coins: HashMap<OutPoint, Coin>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&Coin> {
        self.coins.get(outpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &Coin)> {
        self.coins.iter()
    }

    /// Spend the inputs and add the outputs of a confirmed transaction
    pub fn apply(&mut self, tx: &Transaction, height: u64) {
        if !tx.is_coinbase() {
            for input in &tx.inputs {
                self.coins.remove(&input.prev_out);
            }
        }
        let bare = tx.bare_txid();
        let is_coinbase = tx.is_coinbase();
        for (index, output) in tx.outputs.iter().enumerate() {
            self.coins.insert(
                OutPoint::new(bare, index as u32),
                Coin {
                    output: output.clone(),
                    height: Some(height),
                    is_coinbase,
                },
            );
        }
    }
}

impl UtxoView for UtxoSet {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.coins.get(outpoint).cloned()
    }
}

/// Pending changes layered over a base view
///
/// Lets a block's transactions be checked one after another, each
/// seeing the outputs of the ones before it, without touching the base.
pub struct UtxoOverlay<'a, V: UtxoView + ?Sized> {
    base: &'a V,
    added: HashMap<OutPoint, Coin>,
    spent: HashSet<OutPoint>,
}

impl<'a, V: UtxoView + ?Sized> UtxoOverlay<'a, V> {
    pub fn new(base: &'a V) -> Self {
        Self {
            base,
            added: HashMap::new(),
            spent: HashSet::new(),
        }
    }

    /// Record a transaction's effect at the given height
    pub fn apply(&mut self, tx: &Transaction, height: Option<u64>) {
        if !tx.is_coinbase() {
            for input in &tx.inputs {
                if self.added.remove(&input.prev_out).is_none() {
                    self.spent.insert(input.prev_out);
                }
            }
        }
        let bare = tx.bare_txid();
        for (index, output) in tx.outputs.iter().enumerate() {
            self.added.insert(
                OutPoint::new(bare, index as u32),
                Coin {
                    output: output.clone(),
                    height,
                    is_coinbase: tx.is_coinbase(),
                },
            );
        }
    }
}

impl<V: UtxoView + ?Sized> UtxoView for UtxoOverlay<'_, V> {
    fn get_coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        if let Some(coin) = self.added.get(outpoint) {
            return Some(coin.clone());
        }
        if self.spent.contains(outpoint) {
            return None;
        }
        self.base.get_coin(outpoint)
    }
}

/// Check a non-coinbase transaction's inputs against a view
///
/// Verifies existence, coinbase maturity (`spend_height - coin_height
/// >= maturity`), the unlocking data of every input against the
/// signature hash, and value balance. Returns the fee.
pub fn check_inputs<V: UtxoView + ?Sized>(
    tx: &Transaction,
    view: &V,
    spend_height: u64,
    coinbase_maturity: u64,
) -> Result<u64, InputError> {
    let sighash = tx.signature_hash();
    let mut total_in = 0u64;

    for (index, input) in tx.inputs.iter().enumerate() {
        let coin = view
            .get_coin(&input.prev_out)
            .ok_or(InputError::Missing(input.prev_out))?;

        if coin.is_coinbase {
            let coin_height = coin.height.unwrap_or(spend_height);
            let depth = spend_height.saturating_sub(coin_height);
            if depth < coinbase_maturity {
                return Err(InputError::ImmatureCoinbase {
                    outpoint: input.prev_out,
                    depth,
                    maturity: coinbase_maturity,
                });
            }
        }

        coin.output
            .script
            .verify(&sighash, &input.signatures)
            .map_err(|reason| InputError::Script { index, reason })?;

        total_in = total_in
            .checked_add(coin.output.amount)
            .filter(|v| *v <= MAX_MONEY)
            .ok_or(InputError::ValueOutOfRange)?;
    }

    let total_out = tx
        .checked_total_output()
        .map_err(|_| InputError::ValueOutOfRange)?;
    if total_in < total_out {
        return Err(InputError::InsufficientInputValue {
            inputs: total_in,
            outputs: total_out,
        });
    }

    Ok(total_in - total_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::LockingScript;
    use crate::core::transaction::{TransactionBuilder, COIN};
    use crate::crypto::KeyPair;

    fn p2pkh(key: &KeyPair) -> LockingScript {
        LockingScript::pay_to_address(&key.address()).unwrap()
    }

    fn funded(key: &KeyPair, height: u64) -> (UtxoSet, Transaction) {
        let coinbase = Transaction::coinbase(p2pkh(key), 50 * COIN, height);
        let mut set = UtxoSet::new();
        set.apply(&coinbase, height);
        (set, coinbase)
    }

    fn spend(key: &KeyPair, from: OutPoint, amount: u64) -> Transaction {
        let mut tx = TransactionBuilder::new()
            .add_input(from)
            .add_output(p2pkh(key), amount)
            .build();
        tx.sign_input(0, key).unwrap();
        tx
    }

    #[test]
    fn test_outputs_keyed_by_bare_txid() {
        let key = KeyPair::generate();
        let (mut set, coinbase) = funded(&key, 1);
        let coin_out = OutPoint::new(coinbase.bare_txid(), 0);

        let tx = spend(&key, coin_out, 10 * COIN);
        set.apply(&tx, 5);

        assert!(set.get(&coin_out).is_none());
        assert!(set.get(&OutPoint::new(tx.bare_txid(), 0)).is_some());
        assert!(set.get(&OutPoint::new(tx.txid(), 0)).is_none());
    }

    #[test]
    fn test_check_inputs_fee_and_maturity() {
        let key = KeyPair::generate();
        let (set, coinbase) = funded(&key, 1);
        let tx = spend(&key, OutPoint::new(coinbase.bare_txid(), 0), 49 * COIN);

        assert!(matches!(
            check_inputs(&tx, &set, 2, 2),
            Err(InputError::ImmatureCoinbase { depth: 1, .. })
        ));
        assert_eq!(check_inputs(&tx, &set, 3, 2), Ok(COIN));
    }

    #[test]
    fn test_check_inputs_rejects_bad_signature_and_overspend() {
        let key = KeyPair::generate();
        let (set, coinbase) = funded(&key, 1);
        let from = OutPoint::new(coinbase.bare_txid(), 0);

        let stranger = KeyPair::generate();
        let mut stolen = TransactionBuilder::new()
            .add_input(from)
            .add_output(p2pkh(&stranger), COIN)
            .build();
        stolen.sign_input(0, &stranger).unwrap();
        assert!(matches!(
            check_inputs(&stolen, &set, 10, 0),
            Err(InputError::Script { index: 0, .. })
        ));

        let greedy = spend(&key, from, 51 * COIN);
        assert!(matches!(
            check_inputs(&greedy, &set, 10, 0),
            Err(InputError::InsufficientInputValue { .. })
        ));

        let missing = spend(&key, OutPoint::new(coinbase.txid(), 1), COIN);
        assert!(matches!(
            check_inputs(&missing, &set, 10, 0),
            Err(InputError::Missing(_))
        ));
    }

    #[test]
    fn test_overlay_chains_dependent_spends() {
        let key = KeyPair::generate();
        let (set, coinbase) = funded(&key, 1);
        let parent = spend(&key, OutPoint::new(coinbase.bare_txid(), 0), 40 * COIN);
        let child = spend(&key, OutPoint::new(parent.bare_txid(), 0), 30 * COIN);

        let mut overlay = UtxoOverlay::new(&set);
        assert!(check_inputs(&child, &overlay, 10, 0).is_err());

        assert!(check_inputs(&parent, &overlay, 10, 0).is_ok());
        overlay.apply(&parent, Some(10));
        assert_eq!(check_inputs(&child, &overlay, 10, 0), Ok(10 * COIN));
        overlay.apply(&child, Some(10));

        // Parent output consumed inside the overlay, base untouched
        assert!(!overlay.contains(&OutPoint::new(parent.bare_txid(), 0)));
        assert!(!overlay.contains(&OutPoint::new(coinbase.bare_txid(), 0)));
        assert!(set.get(&OutPoint::new(coinbase.bare_txid(), 0)).is_some());
    }
}

//! Transaction identity
//!
//! A transaction is named two ways:
//!
//! - the **txid** (full id) hashes the complete encoding, so every
//!   alternate signature produces a different value
//! - the **bare txid** (canonical id) hashes the encoding with all
//!   unlocking data replaced by an empty placeholder, so it depends only
//!   on inputs, outputs, their order and amounts
//!
//! Everything that tracks coins (UTXO keys, outpoints, mempool ancestry,
//! wallet coin tracking) uses the bare txid. The txid survives as the
//! relay/display name and for the block merkle root.

use crate::core::transaction::Transaction;
use crate::crypto::{double_sha256, Hash256};
use serde::{Deserialize, Serialize};

/// Which form of a transaction to serialize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Everything, including unlocking data
    Full,
    /// Unlocking data stripped
    Bare,
}

/// Both identifiers of one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxIdentity {
    pub txid: Hash256,
    pub bare_txid: Hash256,
}

impl TxIdentity {
    pub fn of(tx: &Transaction) -> Self {
        Self {
            txid: full_id(tx),
            bare_txid: canonical_id(tx),
        }
    }
}

/// Hash of the complete serialization
pub fn full_id(tx: &Transaction) -> Hash256 {
    double_sha256(&tx.encode(Encoding::Full))
}

/// Hash of the serialization with unlocking data stripped
pub fn canonical_id(tx: &Transaction) -> Hash256 {
    double_sha256(&tx.encode(Encoding::Bare))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::LockingScript;
    use crate::core::transaction::{OutPoint, TransactionBuilder, COIN};
    use crate::crypto::KeyPair;

    fn unsigned_spend(to: &KeyPair) -> Transaction {
        TransactionBuilder::new()
            .add_input(OutPoint::new(double_sha256(b"funding"), 1))
            .add_output(LockingScript::pay_to_address(&to.address()).unwrap(), 999 * COIN)
            .build()
    }

    #[test]
    fn test_resigning_keeps_bare_txid() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let multisig =
            LockingScript::multisig(1, vec![a.public_key_hex(), b.public_key_hex()]).unwrap();
        let unsigned = unsigned_spend(&a);

        let mut signed_a = unsigned.clone();
        signed_a.sign_input(0, &a).unwrap();
        let mut signed_b = unsigned.clone();
        signed_b.sign_input(0, &b).unwrap();

        assert_eq!(canonical_id(&signed_a), canonical_id(&signed_b));
        assert_eq!(canonical_id(&signed_a), canonical_id(&unsigned));
        assert_ne!(full_id(&signed_a), full_id(&signed_b));
        assert!(multisig.verify(&signed_a.signature_hash(), &signed_a.inputs[0].signatures).is_ok());
        assert!(multisig.verify(&signed_b.signature_hash(), &signed_b.inputs[0].signatures).is_ok());
    }

    #[test]
    fn test_bare_txid_covers_economic_content() {
        let a = KeyPair::generate();
        let base = TransactionBuilder::new()
            .add_input(OutPoint::new(double_sha256(b"x"), 0))
            .add_input(OutPoint::new(double_sha256(b"y"), 0))
            .add_output(LockingScript::pay_to_address(&a.address()).unwrap(), COIN)
            .build();

        let mut amount = base.clone();
        amount.outputs[0].amount += 1;
        assert_ne!(canonical_id(&base), canonical_id(&amount));

        let mut order = base.clone();
        order.inputs.swap(0, 1);
        assert_ne!(canonical_id(&base), canonical_id(&order));

        let mut sequence = base.clone();
        sequence.inputs[0].sequence = 1;
        assert_ne!(canonical_id(&base), canonical_id(&sequence));
    }

    #[test]
    fn test_unsigned_full_and_bare_differ_only_with_signatures() {
        let a = KeyPair::generate();
        let mut tx = TransactionBuilder::new()
            .add_input(OutPoint::new(double_sha256(b"x"), 0))
            .add_output(LockingScript::pay_to_address(&a.address()).unwrap(), COIN)
            .build();
        assert_eq!(full_id(&tx), canonical_id(&tx));

        tx.sign_input(0, &a).unwrap();
        let identity = TxIdentity::of(&tx);
        assert_ne!(identity.txid, identity.bare_txid);
        assert_eq!(identity.txid, tx.txid());
        assert_eq!(identity.bare_txid, canonical_id(&tx));
    }
}

//! Core blockchain components
//!
//! This module contains the fundamental building blocks:
//! - Transactions with a full txid and a signature-independent bare txid
//! - Locking scripts (P2PKH, M-of-N multisig)
//! - Blocks (with proof of work and size limits)
//! - Blockchain (coin set, tx index, coinbase maturity)
//! - The segwit-light activation policy and the clock it is evaluated on

pub mod activation;
pub mod block;
pub mod blockchain;
pub mod encoding;
pub mod identity;
pub mod script;
pub mod time;
pub mod transaction;
pub mod utxo;

pub use activation::{
    zone, ActivationError, ActivationPolicy, PolicyZone, DEFAULT_MEMPOOL_WINDOW,
    DEFAULT_WALLET_WINDOW, SEGWIT_LIGHT_ACTIVATION_TIME,
};
pub use block::{Block, BlockError, BlockHeader, BLOCK_HEADER_SIZE, MAX_BLOCK_SIZE, MAX_BLOCK_TXS};
pub use blockchain::{
    Blockchain, BlockchainError, TxLocation, BLOCK_REWARD, DEFAULT_COINBASE_MATURITY,
    DEFAULT_DIFFICULTY,
};
pub use encoding::DecodeError;
pub use identity::{canonical_id, full_id, Encoding, TxIdentity};
pub use script::{InputSignature, LockingScript, ScriptError};
pub use time::{MockClock, SystemClock, TimeSource};
pub use transaction::{
    OutPoint, Transaction, TransactionBuilder, TransactionError, TransactionInput,
    TransactionOutput, COIN, LOCKTIME_THRESHOLD, MAX_MONEY, MAX_TX_SIZE, SEQUENCE_FINAL,
    TX_VERSION,
};
pub use utxo::{check_inputs, Coin, InputError, UtxoOverlay, UtxoSet, UtxoView};

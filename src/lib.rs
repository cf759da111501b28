//! Segwit-light: dual transaction identity and the unconfirmed-spend policy
//!
//! This crate models a small UTXO node around the activation of
//! segwit-light, the fork after which outpoints reference a transaction's
//! bare id (its encoding with unlocking data stripped) rather than its full
//! id. It provides:
//! - Full and bare transaction ids, with a secp256k1 signature hash over
//!   the bare id so re-signing never changes it
//! - Pay-to-pubkey-hash and m-of-n multisig locking conditions
//! - An activation clock that maps time to a policy zone
//! - A wallet spend filter and a mempool admission filter that stop new
//!   spends of unconfirmed outputs near activation
//! - Proof-of-work block assembly and validation that ignore the zones
//! - An async node facade over shared chain, mempool and wallet state
//!
//! # Example
//!
//! ```rust
//! use segwit_light::core::{ActivationPolicy, PolicyZone, SEGWIT_LIGHT_ACTIVATION_TIME};
//!
//! let policy = ActivationPolicy::default();
//! let t = SEGWIT_LIGHT_ACTIVATION_TIME;
//!
//! assert_eq!(policy.zone_at(t - 24 * 3_600), PolicyZone::Unrestricted);
//! assert_eq!(policy.zone_at(t + 10 * 3_600), PolicyZone::WalletRestricted);
//! assert_eq!(policy.zone_at(t - 3_600), PolicyZone::MempoolRestricted);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod node;
pub mod wallet;

// Re-export commonly used types
pub use config::{ConfigError, NodeConfig};
pub use core::{
    canonical_id, full_id, zone, ActivationPolicy, Block, Blockchain, MockClock, OutPoint,
    PolicyZone, SystemClock, TimeSource, Transaction, TxIdentity, BLOCK_REWARD,
    DEFAULT_DIFFICULTY,
};
pub use crypto::KeyPair;
pub use mining::{Admission, Mempool, MempoolAdmissionFilter, MempoolError, Miner};
pub use node::{Node, NodeError};
pub use wallet::{Wallet, WalletError, WalletSpendFilter};

//! Wallet module for key and transaction management

pub mod spend_filter;
pub mod wallet;

pub use spend_filter::{WalletCoin, WalletSpendFilter};
pub use wallet::{Wallet, WalletBalance, WalletError, WalletInfo, DEFAULT_WALLET_FEE};

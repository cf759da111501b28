//! Node configuration
//!
//! Loaded from a JSON file; every field has a default so a partial file
//! (or none at all) is fine.

use crate::core::{
    ActivationError, ActivationPolicy, DEFAULT_COINBASE_MATURITY, DEFAULT_DIFFICULTY,
    DEFAULT_MEMPOOL_WINDOW, DEFAULT_WALLET_WINDOW, SEGWIT_LIGHT_ACTIVATION_TIME,
};
use crate::mining::MempoolAdmissionFilter;
use crate::wallet::{WalletSpendFilter, DEFAULT_WALLET_FEE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid activation policy: {0}")]
    Activation(#[from] ActivationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Segwit-light activation time (unix seconds)
    pub activation_time: i64,
    pub mempool_window_secs: u64,
    pub wallet_window_secs: u64,
    /// Let the wallet spend unconfirmed outputs outside the restricted zones
    pub spend_zero_conf_change: bool,
    /// Leading zero bits required of block hashes
    pub difficulty: u32,
    pub coinbase_maturity: u64,
    /// Flat fee per wallet-built transaction
    pub wallet_fee: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            activation_time: SEGWIT_LIGHT_ACTIVATION_TIME,
            mempool_window_secs: DEFAULT_MEMPOOL_WINDOW.as_secs(),
            wallet_window_secs: DEFAULT_WALLET_WINDOW.as_secs(),
            spend_zero_conf_change: true,
            difficulty: DEFAULT_DIFFICULTY,
            coinbase_maturity: DEFAULT_COINBASE_MATURITY,
            wallet_fee: DEFAULT_WALLET_FEE,
        }
    }
}

impl NodeConfig {
    /// Load from a JSON file and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = fs::File::open(path)?;
        let config: NodeConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.activation_policy()?;
        Ok(())
    }

    pub fn activation_policy(&self) -> Result<ActivationPolicy, ConfigError> {
        Ok(ActivationPolicy::new(
            self.activation_time,
            Duration::from_secs(self.mempool_window_secs),
            Duration::from_secs(self.wallet_window_secs),
        )?)
    }

    pub fn admission_filter(&self) -> Result<MempoolAdmissionFilter, ConfigError> {
        Ok(MempoolAdmissionFilter::new(self.activation_policy()?))
    }

    pub fn spend_filter(&self) -> Result<WalletSpendFilter, ConfigError> {
        Ok(WalletSpendFilter::new(
            self.activation_policy()?,
            self.spend_zero_conf_change,
        ))
    }
}

//! Coin eligibility for wallet-built spends
//!
//! Near segwit-light activation the wallet stops chaining new spends onto
//! unconfirmed outputs, starting earlier and ending later than the
//! mempool does. Outside that window, unconfirmed outputs stay eligible
//! unless the wallet is configured never to spend them.

use crate::core::{ActivationPolicy, OutPoint, TransactionOutput};
use log::debug;
use serde::Serialize;

/// A coin the wallet can sign for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletCoin {
    pub outpoint: OutPoint,
    pub output: TransactionOutput,
    /// 0 while the creating transaction is unconfirmed
    pub confirmations: u64,
}

impl WalletCoin {
    pub fn is_confirmed(&self) -> bool {
        self.confirmations > 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WalletSpendFilter {
    policy: ActivationPolicy,
    spend_zero_conf_change: bool,
}

impl WalletSpendFilter {
    pub fn new(policy: ActivationPolicy, spend_zero_conf_change: bool) -> Self {
        Self {
            policy,
            spend_zero_conf_change,
        }
    }

    pub fn policy(&self) -> &ActivationPolicy {
        &self.policy
    }

    /// Whether unconfirmed coins may be selected at `now`
    pub fn allows_unconfirmed(&self, now: i64) -> bool {
        self.spend_zero_conf_change && self.policy.zone_at(now).allows_wallet_unconfirmed()
    }

    /// Keep every confirmed coin and, when allowed, the unconfirmed ones
    pub fn selectable_inputs(&self, candidates: Vec<WalletCoin>, now: i64) -> Vec<WalletCoin> {
        let allow_unconfirmed = self.allows_unconfirmed(now);
        let before = candidates.len();
        let selectable: Vec<WalletCoin> = candidates
            .into_iter()
            .filter(|coin| coin.is_confirmed() || allow_unconfirmed)
            .collect();

        if selectable.len() < before {
            debug!(
                "Excluded {} unconfirmed coins in zone {}",
                before - selectable.len(),
                self.policy.zone_at(now)
            );
        }
        selectable
    }
}

impl Default for WalletSpendFilter {
    fn default() -> Self {
        Self::new(ActivationPolicy::default(), true)
    }
}

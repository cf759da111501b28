//! Segwit-light activation policy
//!
//! Around the activation instant of segwit-light, outputs created by
//! not-yet-confirmed transactions must not be spent: if the fork falls
//! between a parent and its child, the child may end up referencing an
//! id that no longer exists. The restriction is enforced in two tiers
//! that widen with distance from the fork:
//!
//! - within `mempool_window`: neither wallet nor mempool accept such spends
//! - within `wallet_window`: the wallet refuses to build them, the mempool
//!   still relays them
//! - beyond: no restriction
//!
//! Blocks are never subject to this policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Activation time of segwit-light (unix seconds)
pub const SEGWIT_LIGHT_ACTIVATION_TIME: i64 = 2_000_000_000;

/// Distance from activation within which the mempool rejects unconfirmed spends
pub const DEFAULT_MEMPOOL_WINDOW: Duration = Duration::from_secs(3_600);

/// Distance from activation within which the wallet avoids unconfirmed spends
pub const DEFAULT_WALLET_WINDOW: Duration = Duration::from_secs(12 * 3_600);

/// Activation policy configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    #[error("Mempool window ({mempool}s) must be shorter than wallet window ({wallet}s)")]
    InvalidWindows { mempool: u64, wallet: u64 },
}

/// How strictly spends of unconfirmed outputs are treated right now
///
/// Variants are ordered from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PolicyZone {
    Unrestricted,
    WalletRestricted,
    MempoolRestricted,
}

impl PolicyZone {
    /// Whether wallet coin selection may pick unconfirmed outputs
    pub fn allows_wallet_unconfirmed(self) -> bool {
        self == PolicyZone::Unrestricted
    }

    /// Whether the mempool relays transactions spending unconfirmed outputs
    pub fn allows_relay_unconfirmed(self) -> bool {
        self != PolicyZone::MempoolRestricted
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyZone::Unrestricted => "unrestricted",
            PolicyZone::WalletRestricted => "wallet-restricted",
            PolicyZone::MempoolRestricted => "mempool-restricted",
        }
    }
}

impl fmt::Display for PolicyZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a point in time to its policy zone
///
/// Symmetric around `activation_time`; a distance equal to
/// `mempool_window` is still mempool-restricted, a distance equal to
/// `wallet_window` is already unrestricted.
pub fn zone(
    now: i64,
    activation_time: i64,
    mempool_window: Duration,
    wallet_window: Duration,
) -> PolicyZone {
    let distance = now.abs_diff(activation_time);
    if distance <= mempool_window.as_secs() {
        PolicyZone::MempoolRestricted
    } else if distance < wallet_window.as_secs() {
        PolicyZone::WalletRestricted
    } else {
        PolicyZone::Unrestricted
    }
}

/// Activation instant plus the two restriction windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationPolicy {
    activation_time: i64,
    mempool_window: Duration,
    wallet_window: Duration,
}

impl ActivationPolicy {
    pub fn new(
        activation_time: i64,
        mempool_window: Duration,
        wallet_window: Duration,
    ) -> Result<Self, ActivationError> {
        if mempool_window >= wallet_window {
            return Err(ActivationError::InvalidWindows {
                mempool: mempool_window.as_secs(),
                wallet: wallet_window.as_secs(),
            });
        }
        Ok(Self {
            activation_time,
            mempool_window,
            wallet_window,
        })
    }

    pub fn activation_time(&self) -> i64 {
        self.activation_time
    }

    pub fn mempool_window(&self) -> Duration {
        self.mempool_window
    }

    pub fn wallet_window(&self) -> Duration {
        self.wallet_window
    }

    /// Policy zone at the given time
    pub fn zone_at(&self, now: i64) -> PolicyZone {
        zone(
            now,
            self.activation_time,
            self.mempool_window,
            self.wallet_window,
        )
    }
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self {
            activation_time: SEGWIT_LIGHT_ACTIVATION_TIME,
            mempool_window: DEFAULT_MEMPOOL_WINDOW,
            wallet_window: DEFAULT_WALLET_WINDOW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3_600;
    const T: i64 = SEGWIT_LIGHT_ACTIVATION_TIME;

    #[test]
    fn test_zones_around_activation() {
        let policy = ActivationPolicy::default();

        for sign in [-1, 1] {
            assert_eq!(policy.zone_at(T + sign * 24 * HOUR), PolicyZone::Unrestricted);
            assert_eq!(policy.zone_at(T + sign * 10 * HOUR), PolicyZone::WalletRestricted);
            assert_eq!(policy.zone_at(T + sign * HOUR), PolicyZone::MempoolRestricted);
        }
        assert_eq!(policy.zone_at(T), PolicyZone::MempoolRestricted);
        assert_eq!(policy.zone_at(T + 7 * 24 * HOUR), PolicyZone::Unrestricted);
    }

    #[test]
    fn test_window_boundaries() {
        let policy = ActivationPolicy::new(
            T,
            Duration::from_secs(100),
            Duration::from_secs(200),
        )
        .unwrap();

        assert_eq!(policy.zone_at(T - 100), PolicyZone::MempoolRestricted);
        assert_eq!(policy.zone_at(T + 101), PolicyZone::WalletRestricted);
        assert_eq!(policy.zone_at(T - 199), PolicyZone::WalletRestricted);
        assert_eq!(policy.zone_at(T + 200), PolicyZone::Unrestricted);
        assert_eq!(policy.zone_at(T - 200), PolicyZone::Unrestricted);
    }

    #[test]
    fn test_symmetric_for_every_offset() {
        let policy = ActivationPolicy::default();
        for offset in (0..48 * HOUR).step_by(1_799) {
            assert_eq!(policy.zone_at(T + offset), policy.zone_at(T - offset));
        }
    }

    #[test]
    fn test_strictness_never_increases_moving_away() {
        let policy = ActivationPolicy::default();
        let mut previous = policy.zone_at(T);
        for offset in (0..48 * HOUR).step_by(600) {
            let current = policy.zone_at(T + offset);
            assert!(current <= previous);
            previous = current;
        }
    }

    #[test]
    fn test_extreme_times_do_not_overflow() {
        let policy = ActivationPolicy::default();
        assert_eq!(policy.zone_at(i64::MIN), PolicyZone::Unrestricted);
        assert_eq!(policy.zone_at(i64::MAX), PolicyZone::Unrestricted);
    }

    #[test]
    fn test_rejects_inverted_windows() {
        let err = ActivationPolicy::new(T, Duration::from_secs(10), Duration::from_secs(10));
        assert_eq!(
            err,
            Err(ActivationError::InvalidWindows {
                mempool: 10,
                wallet: 10
            })
        );
    }

    #[test]
    fn test_zone_permissions() {
        assert!(PolicyZone::Unrestricted.allows_wallet_unconfirmed());
        assert!(!PolicyZone::WalletRestricted.allows_wallet_unconfirmed());
        assert!(PolicyZone::WalletRestricted.allows_relay_unconfirmed());
        assert!(!PolicyZone::MempoolRestricted.allows_relay_unconfirmed());
        assert!(!PolicyZone::MempoolRestricted.allows_wallet_unconfirmed());
    }
}

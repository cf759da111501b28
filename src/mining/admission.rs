//! Relay policy for spends of unconfirmed outputs around activation
//!
//! The filter does not care how a transaction was built: wallet output
//! and raw submissions go through the same gate. It is only a relay
//! rule; blocks never consult it.

use crate::core::{ActivationPolicy, OutPoint, PolicyZone};
use crate::mining::mempool::MempoolError;
use log::debug;

/// One spent output as resolved by the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSpend {
    pub outpoint: OutPoint,
    pub confirmed: bool,
}

/// Decides whether a transaction's spends are acceptable at a given time
#[derive(Debug, Clone, Copy, Default)]
pub struct MempoolAdmissionFilter {
    policy: ActivationPolicy,
}

impl MempoolAdmissionFilter {
    pub fn new(policy: ActivationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ActivationPolicy {
        &self.policy
    }

    pub fn zone(&self, now: i64) -> PolicyZone {
        self.policy.zone_at(now)
    }

    /// Reject if any spend is unconfirmed while the zone forbids relaying
    /// such spends; returns the zone the decision was made in
    pub fn check<I>(&self, now: i64, spends: I) -> Result<PolicyZone, MempoolError>
    where
        I: IntoIterator<Item = ResolvedSpend>,
    {
        let zone = self.zone(now);
        if zone.allows_relay_unconfirmed() {
            return Ok(zone);
        }

        if let Some(spend) = spends.into_iter().find(|s| !s.confirmed) {
            debug!(
                "Refusing unconfirmed spend of {} in zone {}",
                spend.outpoint, zone
            );
            return Err(MempoolError::UnconfirmedSpendRestricted {
                outpoint: spend.outpoint,
                zone,
            });
        }
        Ok(zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SEGWIT_LIGHT_ACTIVATION_TIME;
    use crate::crypto::double_sha256;

    const HOUR: i64 = 3_600;
    const T: i64 = SEGWIT_LIGHT_ACTIVATION_TIME;

    fn spend(confirmed: bool) -> ResolvedSpend {
        ResolvedSpend {
            outpoint: OutPoint::new(double_sha256(&[confirmed as u8]), 0),
            confirmed,
        }
    }

    #[test]
    fn test_unconfirmed_spend_only_blocked_close_to_activation() {
        let filter = MempoolAdmissionFilter::default();

        for offset in [-24 * HOUR, -10 * HOUR, 10 * HOUR, 24 * HOUR] {
            assert!(filter.check(T + offset, [spend(true), spend(false)]).is_ok());
        }
        for offset in [-HOUR, 0, HOUR] {
            assert!(matches!(
                filter.check(T + offset, [spend(true), spend(false)]),
                Err(MempoolError::UnconfirmedSpendRestricted {
                    zone: PolicyZone::MempoolRestricted,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_confirmed_spends_always_pass() {
        let filter = MempoolAdmissionFilter::default();
        assert_eq!(
            filter.check(T, [spend(true)]).unwrap(),
            PolicyZone::MempoolRestricted
        );
        assert!(filter.check(T, std::iter::empty()).is_ok());
    }
}

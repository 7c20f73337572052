//! Supply conservation tracker for certificate ids.
//!
//! Mathematical invariant enforced by the certificate ledger:
//! ```text
//! ∀ id: Σ(holder balances) == Σ(minted) - Σ(retired)
//! ```
//!
//! If this invariant ever breaks, something has gone catastrophically
//! wrong — [`SupplyTracker::verify`] is the safety net that detects it.

use std::collections::HashMap;

use carbonledger_types::{CarbonledgerError, Result, TokenId};

/// Tracks per-id minted and retired totals and validates conservation.
#[derive(Debug, Default)]
pub struct SupplyTracker {
    /// Total units minted per id since genesis.
    minted: HashMap<TokenId, u128>,
    /// Total units retired per id since genesis.
    retired: HashMap<TokenId, u128>,
}

impl SupplyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            minted: HashMap::new(),
            retired: HashMap::new(),
        }
    }

    /// Record an issuance.
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::AmountOverflow`] if the minted total
    /// would exceed the 128-bit unit space.
    pub fn record_mint(&mut self, id: TokenId, amount: u128) -> Result<()> {
        let total = self.minted.entry(id).or_insert(0);
        *total = total
            .checked_add(amount)
            .ok_or(CarbonledgerError::AmountOverflow)?;
        Ok(())
    }

    /// Record a retirement. The caller has already checked the holder's
    /// balance, so retired can never exceed minted.
    pub fn record_retire(&mut self, id: TokenId, amount: u128) {
        *self.retired.entry(id).or_insert(0) += amount;
    }

    /// Total units ever minted for `id`.
    #[must_use]
    pub fn minted(&self, id: TokenId) -> u128 {
        self.minted.get(&id).copied().unwrap_or(0)
    }

    /// Total units ever retired for `id`.
    #[must_use]
    pub fn retired(&self, id: TokenId) -> u128 {
        self.retired.get(&id).copied().unwrap_or(0)
    }

    /// Units still in circulation for `id`: minted − retired.
    #[must_use]
    pub fn circulating(&self, id: TokenId) -> u128 {
        self.minted(id) - self.retired(id)
    }

    /// Verify that the actual holder sum matches the expected circulation.
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::SupplyInvariantViolation`] on mismatch.
    pub fn verify(&self, id: TokenId, actual: u128) -> Result<()> {
        let expected = self.circulating(id);
        if actual != expected {
            return Err(CarbonledgerError::SupplyInvariantViolation {
                reason: format!(
                    "{id}: holder sum {actual} != expected {expected} \
                     (minted={}, retired={})",
                    self.minted(id),
                    self.retired(id),
                ),
            });
        }
        Ok(())
    }

    /// All ids that ever saw a mint or retirement.
    #[must_use]
    pub fn tracked_ids(&self) -> Vec<TokenId> {
        let mut ids: std::collections::HashSet<TokenId> = self.minted.keys().copied().collect();
        ids.extend(self.retired.keys().copied());
        ids.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untracked_id_is_zero() {
        let tracker = SupplyTracker::new();
        assert_eq!(tracker.minted(TokenId(1)), 0);
        assert_eq!(tracker.circulating(TokenId(1)), 0);
        assert!(tracker.verify(TokenId(1), 0).is_ok());
    }

    #[test]
    fn mints_accumulate() {
        let mut tracker = SupplyTracker::new();
        tracker.record_mint(TokenId(1), 1000).unwrap();
        tracker.record_mint(TokenId(1), 500).unwrap();
        assert_eq!(tracker.minted(TokenId(1)), 1500);
        assert_eq!(tracker.circulating(TokenId(1)), 1500);
    }

    #[test]
    fn retirements_reduce_circulation() {
        let mut tracker = SupplyTracker::new();
        tracker.record_mint(TokenId(1), 1000).unwrap();
        tracker.record_retire(TokenId(1), 300);
        assert_eq!(tracker.circulating(TokenId(1)), 700);
        assert_eq!(tracker.retired(TokenId(1)), 300);
    }

    #[test]
    fn verify_passes_when_balanced() {
        let mut tracker = SupplyTracker::new();
        tracker.record_mint(TokenId(2), 10).unwrap();
        tracker.record_retire(TokenId(2), 3);
        assert!(tracker.verify(TokenId(2), 7).is_ok());
    }

    #[test]
    fn verify_fails_when_imbalanced() {
        let mut tracker = SupplyTracker::new();
        tracker.record_mint(TokenId(2), 10).unwrap();
        let err = tracker.verify(TokenId(2), 11).unwrap_err();
        assert!(matches!(
            err,
            CarbonledgerError::SupplyInvariantViolation { .. }
        ));
    }

    #[test]
    fn mint_overflow_rejected() {
        let mut tracker = SupplyTracker::new();
        tracker.record_mint(TokenId(1), u128::MAX).unwrap();
        let err = tracker.record_mint(TokenId(1), 1).unwrap_err();
        assert!(matches!(err, CarbonledgerError::AmountOverflow));
        // Total unchanged by the failed mint.
        assert_eq!(tracker.minted(TokenId(1)), u128::MAX);
    }

    #[test]
    fn ids_are_independent() {
        let mut tracker = SupplyTracker::new();
        tracker.record_mint(TokenId(11), 100).unwrap();
        tracker.record_mint(TokenId(22), 200).unwrap();
        tracker.record_retire(TokenId(11), 40);
        assert_eq!(tracker.circulating(TokenId(11)), 60);
        assert_eq!(tracker.circulating(TokenId(22)), 200);
        assert_eq!(tracker.tracked_ids().len(), 2);
    }
}

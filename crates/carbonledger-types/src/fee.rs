//! Fee and treasury policy for the marketplace.
//!
//! Every purchase splits its cost between the seller and the protocol
//! treasury. The split is pure integer arithmetic: the fee truncates toward
//! zero, the seller receives the remainder, and the two parts always sum
//! back to the cost exactly.

use serde::{Deserialize, Serialize};

use crate::{constants, Address, CarbonledgerError, Result};

/// Validated fee-rate and treasury-address configuration.
///
/// Invariants (checked on construction and on every update):
/// - `fee_bps <= 2000` (20% cap)
/// - `treasury` is a non-zero address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Fee rate in basis points (1 bps = 0.01%).
    pub fee_bps: u16,
    /// Address receiving the fee portion of every purchase.
    pub treasury: Address,
}

impl FeeConfig {
    /// Build a validated fee configuration.
    ///
    /// # Errors
    /// - [`CarbonledgerError::FeeTooHigh`] above the 2000 bps cap
    /// - [`CarbonledgerError::TreasuryZero`] for a zero treasury address
    pub fn new(fee_bps: u16, treasury: Address) -> Result<Self> {
        if fee_bps > constants::MAX_FEE_BPS {
            return Err(CarbonledgerError::FeeTooHigh { bps: fee_bps });
        }
        if treasury.is_zero() {
            return Err(CarbonledgerError::TreasuryZero);
        }
        Ok(Self { fee_bps, treasury })
    }

    /// Split a purchase cost into `(fee, net)`.
    ///
    /// `fee = cost * fee_bps / 10_000`, integer division truncating toward
    /// zero; `net = cost - fee`. The parts always satisfy `fee + net == cost`.
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::AmountOverflow`] if `cost * fee_bps`
    /// exceeds the 128-bit space.
    pub fn split(&self, cost: u128) -> Result<(u128, u128)> {
        let fee = cost
            .checked_mul(u128::from(self.fee_bps))
            .ok_or(CarbonledgerError::AmountOverflow)?
            / constants::BPS_DENOMINATOR;
        Ok((fee, cost - fee))
    }
}

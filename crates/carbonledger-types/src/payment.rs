//! The payment-token collaborator contract.
//!
//! The marketplace settles purchases in a fungible token it does not own.
//! This trait pins down exactly what it relies on: balance queries, an
//! approve/allowance step performed out-of-band by the payer, and a
//! pull-transfer that fails atomically when allowance or balance is short.
//! The marketplace treats those failures as opaque and propagates them
//! unchanged.

use crate::{Address, CarbonledgerError, Result};

/// A fungible balance ledger with approve-and-pull semantics.
pub trait PaymentToken {
    /// The token contract's own address.
    fn address(&self) -> Address;

    /// Current balance of `owner`.
    fn balance_of(&self, owner: Address) -> u128;

    /// How much `spender` may still pull from `owner`.
    fn allowance(&self, owner: Address, spender: Address) -> u128;

    /// Set `spender`'s allowance from `owner` (overwrites, no increment).
    fn approve(&mut self, owner: Address, spender: Address, amount: u128);

    /// Move `amount` from the caller's own balance to `to`.
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::InsufficientFunds`] when the caller's
    /// balance is short.
    fn transfer(&mut self, caller: Address, to: Address, amount: u128) -> Result<()>;

    /// Pull `amount` from `owner` to `to`, debiting `spender`'s allowance.
    ///
    /// Allowance is checked before balance, and the whole operation either
    /// commits or leaves both untouched.
    ///
    /// # Errors
    /// - [`CarbonledgerError::InsufficientAllowance`] when the allowance is short
    /// - [`CarbonledgerError::InsufficientFunds`] when `owner`'s balance is short
    fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: u128,
    ) -> Result<()>;

    /// Check that a pull of `amount` by `spender` from `owner` would succeed,
    /// without moving anything. Used to pre-validate multi-leg settlements.
    ///
    /// # Errors
    /// Same errors as [`PaymentToken::transfer_from`], in the same order.
    fn ensure_can_pull(&self, owner: Address, spender: Address, amount: u128) -> Result<()> {
        let allowed = self.allowance(owner, spender);
        if allowed < amount {
            return Err(CarbonledgerError::InsufficientAllowance {
                needed: amount,
                allowed,
            });
        }
        let available = self.balance_of(owner);
        if available < amount {
            return Err(CarbonledgerError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        Ok(())
    }
}

//! In-memory settlement token — the fungible payment leg.
//!
//! A minimal balance ledger with approve-and-pull semantics implementing
//! the [`PaymentToken`] collaborator contract the marketplace settles
//! against. Mirrors a 6-decimal stable-value token: amounts are integer
//! minor units, and the faucet-style [`SettlementToken::mint`] is open so
//! test and staging environments can fund accounts directly.

use std::collections::HashMap;

use carbonledger_types::{Address, CarbonledgerError, PaymentToken, Result};

/// Fungible payment ledger with allowance-based pull transfers.
pub struct SettlementToken {
    /// This token contract's own address.
    address: Address,
    /// Minor units per whole token, as a power of ten.
    decimals: u32,
    /// Per-owner balances in minor units.
    balances: HashMap<Address, u128>,
    /// (owner, spender) → remaining pull allowance.
    allowances: HashMap<(Address, Address), u128>,
    /// Total minted supply.
    total_supply: u128,
}

impl SettlementToken {
    /// Create an empty token ledger.
    #[must_use]
    pub fn new(address: Address, decimals: u32) -> Self {
        Self {
            address,
            decimals,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            total_supply: 0,
        }
    }

    /// Mint `amount` minor units to `to` (open faucet).
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::AmountOverflow`] if the total supply
    /// would overflow.
    pub fn mint(&mut self, to: Address, amount: u128) -> Result<()> {
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(CarbonledgerError::AmountOverflow)?;
        *self.balances.entry(to).or_insert(0) += amount;
        tracing::debug!(to = %to.short(), amount, "settlement token minted");
        Ok(())
    }

    /// Minor units per whole token, as a power of ten.
    #[must_use]
    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Total minted supply.
    #[must_use]
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    fn debit(&mut self, from: Address, amount: u128) -> Result<()> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(CarbonledgerError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        if let Some(balance) = self.balances.get_mut(&from) {
            *balance -= amount;
        }
        Ok(())
    }
}

impl PaymentToken for SettlementToken {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, owner: Address) -> u128 {
        self.balances.get(&owner).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: Address, spender: Address) -> u128 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: u128) {
        self.allowances.insert((owner, spender), amount);
        tracing::debug!(
            owner = %owner.short(),
            spender = %spender.short(),
            amount,
            "allowance set"
        );
    }

    fn transfer(&mut self, caller: Address, to: Address, amount: u128) -> Result<()> {
        self.debit(caller, amount)?;
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: u128,
    ) -> Result<()> {
        // Allowance first, then balance — both checked before any mutation.
        let allowed = self.allowance(owner, spender);
        if allowed < amount {
            return Err(CarbonledgerError::InsufficientAllowance {
                needed: amount,
                allowed,
            });
        }
        self.debit(owner, amount)?;
        self.allowances.insert((owner, spender), allowed - amount);
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }
}

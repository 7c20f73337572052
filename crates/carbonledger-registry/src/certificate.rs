//! Certificate ledger — the sole authority over certificate balances.
//!
//! Tracks per-(holder, id) balances for one semi-fungible certificate
//! collection, with operator approvals, role-gated issuance, holder-driven
//! retirement, per-id revocation, and a collection-wide pause switch.
//!
//! All mutations are atomic: either the full operation commits or the
//! ledger is unchanged. Every committed mutation lands in the hash-chained
//! event journal.

use std::collections::{HashMap, HashSet};

use carbonledger_types::{
    constants, Address, CarbonledgerError, Event, EventLog, EventRecord, Result, Role, TokenId,
};

use crate::roles::RoleRegistry;
use crate::supply::SupplyTracker;

/// Balance ledger for one certificate collection.
///
/// The marketplace never mutates balances directly — it drives escrow pulls
/// and deliveries through [`CertificateLedger::transfer`] like any other
/// operator.
pub struct CertificateLedger {
    /// This collection's own address.
    address: Address,
    /// Metadata URI template with an `{id}` placeholder.
    uri_template: String,
    /// Per-(holder, id) balances.
    balances: HashMap<(Address, TokenId), u128>,
    /// (owner, operator) pairs allowed to move the owner's units.
    approvals: HashSet<(Address, Address)>,
    /// Ids whose transfers are administratively blocked.
    revoked: HashSet<TokenId>,
    /// Collection-wide pause switch.
    paused: bool,
    /// Minted/retired totals per id.
    supply: SupplyTracker,
    /// Hash-chained audit journal.
    events: EventLog,
}

impl CertificateLedger {
    /// Create an empty ledger for the collection at `address`.
    #[must_use]
    pub fn new(address: Address, uri_template: impl Into<String>) -> Self {
        Self {
            address,
            uri_template: uri_template.into(),
            balances: HashMap::new(),
            approvals: HashSet::new(),
            revoked: HashSet::new(),
            paused: false,
            supply: SupplyTracker::new(),
            events: EventLog::new(),
        }
    }

    // =====================================================================
    // Issuance and retirement
    // =====================================================================

    /// Mint `amount` units of `id` to `to`. Issuer-gated.
    ///
    /// `data` is an opaque payload recorded in the journal alongside the
    /// issuance (certification evidence, batch metadata, etc.).
    ///
    /// # Errors
    /// - [`CarbonledgerError::Unauthorized`] if `caller` lacks [`Role::Issuer`]
    /// - [`CarbonledgerError::Paused`] while the ledger is paused
    /// - [`CarbonledgerError::ZeroAddress`] for a zero recipient
    /// - [`CarbonledgerError::AmountOverflow`] if the id's minted total would overflow
    pub fn mint(
        &mut self,
        registry: &RoleRegistry,
        caller: Address,
        to: Address,
        id: TokenId,
        amount: u128,
        data: &[u8],
    ) -> Result<()> {
        registry.ensure(Role::Issuer, caller)?;
        self.ensure_not_paused()?;
        if to.is_zero() {
            return Err(CarbonledgerError::ZeroAddress);
        }

        self.supply.record_mint(id, amount)?;
        *self.balances.entry((to, id)).or_insert(0) += amount;

        tracing::info!(%id, to = %to.short(), amount, "minted");
        self.events.append(Event::Minted {
            to,
            id,
            amount,
            data: data.to_vec(),
        });
        Ok(())
    }

    /// Retire `amount` units of `id` from the caller's own balance.
    ///
    /// Retirement permanently removes units from circulation; a revoked id
    /// can still be retired (revocation blocks transfers only).
    ///
    /// # Errors
    /// - [`CarbonledgerError::Paused`] while the ledger is paused
    /// - [`CarbonledgerError::InsufficientBalance`] if the balance is short
    pub fn retire(
        &mut self,
        caller: Address,
        id: TokenId,
        amount: u128,
        reason: impl Into<String>,
    ) -> Result<()> {
        self.ensure_not_paused()?;
        self.debit(caller, id, amount)?;
        self.supply.record_retire(id, amount);

        let reason = reason.into();
        tracing::info!(%id, holder = %caller.short(), amount, reason, "retired");
        self.events.append(Event::Retired {
            holder: caller,
            id,
            amount,
            reason,
        });
        Ok(())
    }

    /// Retire several ids in one all-or-nothing batch.
    ///
    /// Every pair is validated against the caller's balances — including
    /// repeated ids, whose amounts accumulate — before anything is burned.
    /// A failing pair rejects the entire batch.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Paused`] while the ledger is paused
    /// - [`CarbonledgerError::LengthMismatch`] for unequal input lengths
    /// - [`CarbonledgerError::AmountOverflow`] if amounts for one id overflow
    /// - [`CarbonledgerError::InsufficientBalance`] if any cumulative amount
    ///   exceeds the caller's balance
    pub fn retire_batch(
        &mut self,
        caller: Address,
        ids: &[TokenId],
        amounts: &[u128],
        reason: impl Into<String>,
    ) -> Result<()> {
        self.ensure_not_paused()?;
        if ids.len() != amounts.len() {
            return Err(CarbonledgerError::LengthMismatch {
                ids: ids.len(),
                amounts: amounts.len(),
            });
        }

        // Validate cumulative amounts per id before burning anything.
        let mut needed: HashMap<TokenId, u128> = HashMap::new();
        for (&id, &amount) in ids.iter().zip(amounts) {
            let total = needed.entry(id).or_insert(0);
            *total = total
                .checked_add(amount)
                .ok_or(CarbonledgerError::AmountOverflow)?;
        }
        for (&id, &total) in &needed {
            let available = self.balance_of(caller, id);
            if available < total {
                return Err(CarbonledgerError::InsufficientBalance {
                    id,
                    needed: total,
                    available,
                });
            }
        }

        // Commit: nothing below can fail.
        for (&id, &amount) in ids.iter().zip(amounts) {
            *self
                .balances
                .entry((caller, id))
                .or_insert(0) -= amount;
            self.supply.record_retire(id, amount);
        }

        let reason = reason.into();
        tracing::info!(
            holder = %caller.short(),
            count = ids.len(),
            reason,
            "batch retired"
        );
        self.events.append(Event::RetiredBatch {
            holder: caller,
            ids: ids.to_vec(),
            amounts: amounts.to_vec(),
            reason,
        });
        Ok(())
    }

    // =====================================================================
    // Transfers and approvals
    // =====================================================================

    /// Move `amount` units of `id` from `from` to `to`.
    ///
    /// `caller` must be `from` itself or an approved operator. Zero-amount
    /// and self-transfers are permitted no-ops that still journal an event.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Paused`] while the ledger is paused
    /// - [`CarbonledgerError::TokenRevoked`] if `id` is revoked
    /// - [`CarbonledgerError::MissingApproval`] if `caller` may not move `from`'s units
    /// - [`CarbonledgerError::ZeroAddress`] for a zero recipient
    /// - [`CarbonledgerError::InsufficientBalance`] if `from`'s balance is short
    pub fn transfer(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        id: TokenId,
        amount: u128,
    ) -> Result<()> {
        self.ensure_transferable(id)?;
        if caller != from && !self.is_approved_for_all(from, caller) {
            return Err(CarbonledgerError::MissingApproval {
                owner: from,
                operator: caller,
            });
        }
        if to.is_zero() {
            return Err(CarbonledgerError::ZeroAddress);
        }

        self.debit(from, id, amount)?;
        *self.balances.entry((to, id)).or_insert(0) += amount;

        tracing::info!(
            %id,
            from = %from.short(),
            to = %to.short(),
            amount,
            "transferred"
        );
        self.events.append(Event::Transferred {
            from,
            to,
            id,
            amount,
        });
        Ok(())
    }

    /// Grant or withdraw `operator`'s right to move all of `owner`'s units.
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::ZeroAddress`] for a zero operator.
    pub fn set_approval_for_all(
        &mut self,
        owner: Address,
        operator: Address,
        approved: bool,
    ) -> Result<()> {
        if operator.is_zero() {
            return Err(CarbonledgerError::ZeroAddress);
        }
        if approved {
            self.approvals.insert((owner, operator));
        } else {
            self.approvals.remove(&(owner, operator));
        }
        self.events.append(Event::ApprovalSet {
            owner,
            operator,
            approved,
        });
        Ok(())
    }

    // =====================================================================
    // Administration
    // =====================================================================

    /// Toggle the transfer-blocking flag for `id`. Admin-gated.
    ///
    /// Balances and past transfers are untouched; only subsequent transfers
    /// of `id` are blocked while the flag is set.
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::Unauthorized`] if `caller` lacks [`Role::Admin`].
    pub fn set_revoked(
        &mut self,
        registry: &RoleRegistry,
        caller: Address,
        id: TokenId,
        revoked: bool,
        reason: impl Into<String>,
    ) -> Result<()> {
        registry.ensure(Role::Admin, caller)?;
        if revoked {
            self.revoked.insert(id);
        } else {
            self.revoked.remove(&id);
        }

        let reason = reason.into();
        tracing::warn!(%id, revoked, reason, "revocation flag changed");
        self.events.append(Event::RevokedSet {
            id,
            revoked,
            reason,
        });
        Ok(())
    }

    /// Pause the ledger. Pauser-gated.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Unauthorized`] if `caller` lacks [`Role::Pauser`]
    /// - [`CarbonledgerError::Paused`] if already paused
    pub fn pause(&mut self, registry: &RoleRegistry, caller: Address) -> Result<()> {
        registry.ensure(Role::Pauser, caller)?;
        self.ensure_not_paused()?;
        self.paused = true;
        tracing::warn!(by = %caller.short(), "certificate ledger paused");
        self.events.append(Event::Paused { by: caller });
        Ok(())
    }

    /// Unpause the ledger. Pauser-gated.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Unauthorized`] if `caller` lacks [`Role::Pauser`]
    /// - [`CarbonledgerError::NotPaused`] if not paused
    pub fn unpause(&mut self, registry: &RoleRegistry, caller: Address) -> Result<()> {
        registry.ensure(Role::Pauser, caller)?;
        if !self.paused {
            return Err(CarbonledgerError::NotPaused);
        }
        self.paused = false;
        tracing::info!(by = %caller.short(), "certificate ledger unpaused");
        self.events.append(Event::Unpaused { by: caller });
        Ok(())
    }

    // =====================================================================
    // Views
    // =====================================================================

    /// This collection's address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Balance of `owner` for certificate `id`.
    #[must_use]
    pub fn balance_of(&self, owner: Address, id: TokenId) -> u128 {
        self.balances.get(&(owner, id)).copied().unwrap_or(0)
    }

    /// Whether `operator` may move all of `owner`'s units.
    #[must_use]
    pub fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.approvals.contains(&(owner, operator))
    }

    /// Whether transfers of `id` are administratively blocked.
    #[must_use]
    pub fn is_revoked(&self, id: TokenId) -> bool {
        self.revoked.contains(&id)
    }

    /// Whether the ledger is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Total units ever minted for `id`.
    #[must_use]
    pub fn minted(&self, id: TokenId) -> u128 {
        self.supply.minted(id)
    }

    /// Total units ever retired for `id`.
    #[must_use]
    pub fn retired(&self, id: TokenId) -> u128 {
        self.supply.retired(id)
    }

    /// Units still in circulation for `id`.
    #[must_use]
    pub fn circulating(&self, id: TokenId) -> u128 {
        self.supply.circulating(id)
    }

    /// Metadata URI for `id`: the template with `{id}` replaced by the
    /// zero-padded 64-digit lowercase hex id.
    #[must_use]
    pub fn uri(&self, id: TokenId) -> String {
        self.uri_template
            .replace(constants::URI_ID_PLACEHOLDER, &format!("{:064x}", id.0))
    }

    /// The audit journal in commit order.
    #[must_use]
    pub fn events(&self) -> &[EventRecord] {
        self.events.records()
    }

    /// Verify the journal's hash chain.
    #[must_use]
    pub fn verify_events(&self) -> bool {
        self.events.verify()
    }

    /// Read-only guard: `Ok(())` iff transfers of `id` would currently be
    /// accepted (not paused, not revoked). Lets multi-leg settlements
    /// validate the certificate leg before committing anything.
    ///
    /// # Errors
    /// [`CarbonledgerError::Paused`] or [`CarbonledgerError::TokenRevoked`].
    pub fn ensure_transferable(&self, id: TokenId) -> Result<()> {
        self.ensure_not_paused()?;
        if self.is_revoked(id) {
            return Err(CarbonledgerError::TokenRevoked(id));
        }
        Ok(())
    }

    /// Recompute the holder sum for `id` and check supply conservation.
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::SupplyInvariantViolation`] on mismatch.
    pub fn verify_supply(&self, id: TokenId) -> Result<()> {
        let actual: u128 = self
            .balances
            .iter()
            .filter(|((_, token), _)| *token == id)
            .map(|(_, balance)| balance)
            .sum();
        self.supply.verify(id, actual)
    }

    // =====================================================================
    // Internals
    // =====================================================================

    fn ensure_not_paused(&self) -> Result<()> {
        if self.paused {
            Err(CarbonledgerError::Paused)
        } else {
            Ok(())
        }
    }

    fn debit(&mut self, from: Address, id: TokenId, amount: u128) -> Result<()> {
        let available = self.balance_of(from, id);
        if available < amount {
            return Err(CarbonledgerError::InsufficientBalance {
                id,
                needed: amount,
                available,
            });
        }
        if let Some(balance) = self.balances.get_mut(&(from, id)) {
            *balance -= amount;
        }
        Ok(())
    }
}

//! Role registry — capability membership and authorization checks.
//!
//! ## Design Principles
//!
//! - **Fail-closed**: every role-gated operation calls [`RoleRegistry::ensure`]
//!   before touching state
//! - **No self-service**: only an admin may grant or revoke
//! - **Never admin-less**: the registry is constructed with one admin and
//!   refuses to revoke the last one

use std::collections::HashSet;

use carbonledger_types::{Address, CarbonledgerError, Result, Role};

/// Membership authority for the [`Role`] capability set.
///
/// Shared by the certificate ledger and the marketplace: each passes the
/// registry into its role-gated entry points by reference.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    /// Granted (role, account) pairs.
    grants: HashSet<(Role, Address)>,
}

impl RoleRegistry {
    /// Create a registry with `initial_admin` holding [`Role::Admin`].
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::ZeroAddress`] for a zero admin address.
    pub fn new(initial_admin: Address) -> Result<Self> {
        if initial_admin.is_zero() {
            return Err(CarbonledgerError::ZeroAddress);
        }
        let mut grants = HashSet::new();
        grants.insert((Role::Admin, initial_admin));
        Ok(Self { grants })
    }

    /// Whether `account` holds `role`.
    #[must_use]
    pub fn has(&self, role: Role, account: Address) -> bool {
        self.grants.contains(&(role, account))
    }

    /// Authorization guard: `Ok(())` iff `account` holds `role`.
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::Unauthorized`] naming the missing role.
    pub fn ensure(&self, role: Role, account: Address) -> Result<()> {
        if self.has(role, account) {
            Ok(())
        } else {
            Err(CarbonledgerError::Unauthorized { role, account })
        }
    }

    /// Grant `role` to `account`. Idempotent.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Unauthorized`] if `caller` is not an admin
    /// - [`CarbonledgerError::ZeroAddress`] for a zero grantee
    pub fn grant(&mut self, caller: Address, role: Role, account: Address) -> Result<()> {
        self.ensure(Role::Admin, caller)?;
        if account.is_zero() {
            return Err(CarbonledgerError::ZeroAddress);
        }
        if self.grants.insert((role, account)) {
            tracing::info!(%role, account = %account.short(), "role granted");
        }
        Ok(())
    }

    /// Revoke `role` from `account`. Revoking an absent grant is a no-op.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Unauthorized`] if `caller` is not an admin
    /// - [`CarbonledgerError::LastAdmin`] if this would remove the only admin
    pub fn revoke(&mut self, caller: Address, role: Role, account: Address) -> Result<()> {
        self.ensure(Role::Admin, caller)?;
        if role == Role::Admin && self.has(Role::Admin, account) && self.count(Role::Admin) == 1 {
            return Err(CarbonledgerError::LastAdmin(account));
        }
        if self.grants.remove(&(role, account)) {
            tracing::info!(%role, account = %account.short(), "role revoked");
        }
        Ok(())
    }

    /// Number of accounts holding `role`.
    #[must_use]
    pub fn count(&self, role: Role) -> usize {
        self.grants.iter().filter(|(r, _)| *r == role).count()
    }
}

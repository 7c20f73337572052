//! Capability roles gating mutation of the ledgers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named capability an address can hold.
///
/// Every role-gated operation declares the role it requires as a
/// precondition; the registry is the single membership authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Grants/revokes roles, manages the collection allow-list, fee policy,
    /// revocation flags, and the rescue escape hatches.
    Admin,
    /// May mint new certificate units.
    Issuer,
    /// May pause and unpause a ledger.
    Pauser,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "ADMIN"),
            Self::Issuer => write!(f, "ISSUER"),
            Self::Pauser => write!(f, "PAUSER"),
        }
    }
}

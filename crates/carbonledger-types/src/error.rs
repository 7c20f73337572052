//! Error types for the CarbonLedger registry and marketplace.
//!
//! All errors use the `CL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Authorization errors
//! - 2xx: Certificate ledger errors
//! - 3xx: Payment token errors
//! - 4xx: Marketplace / listing errors
//! - 5xx: Fee / treasury configuration errors
//! - 6xx: Pause state guards
//! - 9xx: Invariant violations

use thiserror::Error;

use crate::{Address, ListingId, Role, TokenId};

/// Central error enum for all CarbonLedger operations.
///
/// A failed call has zero observable effect on balances, listings, roles, or
/// flags — every operation validates before it mutates.
#[derive(Debug, Error)]
pub enum CarbonledgerError {
    // =================================================================
    // Authorization Errors (1xx)
    // =================================================================
    /// The caller does not hold the role the operation requires.
    #[error("CL_ERR_100: Unauthorized: account {account} is missing role {role}")]
    Unauthorized { role: Role, account: Address },

    /// Only the listing's seller (or an admin) may cancel it.
    #[error("CL_ERR_101: Not seller: account {account} cannot cancel {listing}")]
    NotSeller {
        listing: ListingId,
        account: Address,
    },

    /// Revoking this grant would leave the registry without any admin.
    #[error("CL_ERR_102: Cannot revoke the last remaining admin {0}")]
    LastAdmin(Address),

    /// The zero address is not a valid counterparty here.
    #[error("CL_ERR_103: Zero address not allowed")]
    ZeroAddress,

    // =================================================================
    // Certificate Ledger Errors (2xx)
    // =================================================================
    /// The holder's balance for this certificate id is too small.
    #[error("CL_ERR_200: Insufficient balance for {id}: need {needed}, have {available}")]
    InsufficientBalance {
        id: TokenId,
        needed: u128,
        available: u128,
    },

    /// The certificate id is revoked; transfers of it are blocked.
    #[error("CL_ERR_201: Token revoked: {0}")]
    TokenRevoked(TokenId),

    /// The caller is neither the holder nor an approved operator.
    #[error("CL_ERR_202: Missing approval: {operator} is not an operator for {owner}")]
    MissingApproval { owner: Address, operator: Address },

    /// Batch ids and amounts have different lengths.
    #[error("CL_ERR_203: Length mismatch: {ids} ids vs {amounts} amounts")]
    LengthMismatch { ids: usize, amounts: usize },

    /// An amount computation would overflow the 128-bit unit space.
    #[error("CL_ERR_204: Amount overflow")]
    AmountOverflow,

    // =================================================================
    // Payment Token Errors (3xx)
    // =================================================================
    /// The payer's fungible balance is too small.
    #[error("CL_ERR_300: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u128, available: u128 },

    /// The spender's allowance from the payer is too small.
    #[error("CL_ERR_301: Insufficient allowance: need {needed}, allowed {allowed}")]
    InsufficientAllowance { needed: u128, allowed: u128 },

    // =================================================================
    // Marketplace Errors (4xx)
    // =================================================================
    /// No listing exists under this id.
    #[error("CL_ERR_400: Listing not found: {0}")]
    ListingNotFound(ListingId),

    /// The listing is consumed or canceled; no further transitions accepted.
    #[error("CL_ERR_401: Listing not active: {0}")]
    ListingNotActive(ListingId),

    /// The purchase asks for more units than the listing still holds.
    #[error("CL_ERR_402: Insufficient remaining: requested {requested}, remaining {remaining}")]
    InsufficientRemaining { requested: u128, remaining: u128 },

    /// The certificate collection is not on the admin allow-list.
    #[error("CL_ERR_403: Collection not allowed: {0}")]
    CollectionNotAllowed(Address),

    /// Degenerate listing parameters (zero amount or zero price).
    #[error("CL_ERR_404: Invalid listing: {reason}")]
    InvalidListing { reason: String },

    /// The ledger handed into the call is not the one the market settles
    /// against (wrong collection or wrong payment token).
    #[error("CL_ERR_405: Ledger mismatch: expected {expected}, got {actual}")]
    LedgerMismatch { expected: Address, actual: Address },

    /// A market entry point was re-entered while a transfer was in flight.
    #[error("CL_ERR_406: Reentrant call rejected")]
    ReentrantCall,

    // =================================================================
    // Fee / Treasury Configuration Errors (5xx)
    // =================================================================
    /// Fee above the 2000 bps (20%) cap.
    #[error("CL_ERR_500: Fee too high: {bps} bps exceeds cap")]
    FeeTooHigh { bps: u16 },

    /// The treasury address must be non-zero.
    #[error("CL_ERR_501: Treasury is the zero address")]
    TreasuryZero,

    // =================================================================
    // Pause State Guards (6xx)
    // =================================================================
    /// The ledger is paused; mutating entry points are rejected.
    #[error("CL_ERR_600: Paused")]
    Paused,

    /// Unpause was called while not paused.
    #[error("CL_ERR_601: Not paused")]
    NotPaused,

    // =================================================================
    // Invariant Violations (9xx)
    // =================================================================
    /// Supply conservation broke — critical safety alert.
    #[error("CL_ERR_900: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, CarbonledgerError>;

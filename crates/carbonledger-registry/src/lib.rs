//! # carbonledger-registry
//!
//! **Certificate Registry Plane**: role gating, certificate balances,
//! issuance, retirement, revocation, and the supply conservation invariant.
//!
//! ## Architecture
//!
//! 1. **RoleRegistry**: membership authority for the ADMIN / ISSUER / PAUSER
//!    capabilities — every gated operation checks it first
//! 2. **CertificateLedger**: sole authority over per-(holder, id) balances;
//!    mint, transfer, retire, revoke, pause
//! 3. **SupplyTracker**: per-id minted/retired totals backing the
//!    `Σ balances == minted − retired` invariant
//!
//! The marketplace plane never touches balances directly — it drives escrow
//! pulls and deliveries through [`CertificateLedger::transfer`] like any
//! other approved operator.

pub mod certificate;
pub mod roles;
pub mod supply;

pub use certificate::CertificateLedger;
pub use roles::RoleRegistry;
pub use supply::SupplyTracker;

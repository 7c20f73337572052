//! # carbonledger-types
//!
//! Shared types, errors, and configuration for the **CarbonLedger**
//! environmental-certificate registry and marketplace.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`TokenId`], [`ListingId`]
//! - **Capabilities**: [`Role`]
//! - **Listing model**: [`Listing`], [`ListingState`]
//! - **Fee policy**: [`FeeConfig`]
//! - **Payment collaborator contract**: [`PaymentToken`]
//! - **Audit journal**: [`Event`], [`EventRecord`], [`EventLog`]
//! - **Errors**: [`CarbonledgerError`] with `CL_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod constants;
pub mod error;
pub mod event;
pub mod fee;
pub mod ids;
pub mod listing;
pub mod payment;
pub mod role;

// Re-export all primary types at crate root for ergonomic imports:
//   use carbonledger_types::{Address, Listing, Role, ...};

pub use error::*;
pub use event::*;
pub use fee::*;
pub use ids::*;
pub use listing::*;
pub use payment::*;
pub use role::*;

// Constants are accessed via `carbonledger_types::constants::FOO`
// (not re-exported to avoid name collisions).

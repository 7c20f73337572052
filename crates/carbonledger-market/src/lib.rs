//! # carbonledger-market
//!
//! **Marketplace Plane**: escrow listings, fee-split purchase settlement,
//! and the fungible payment ledger the market settles in.
//!
//! ## Architecture
//!
//! 1. **SettlementToken**: in-memory fungible ledger with approve-and-pull
//!    semantics (the [`carbonledger_types::PaymentToken`] contract)
//! 2. **ReentrancyGuard**: single-entry latch over the transfer-issuing
//!    entry points
//! 3. **EscrowMarket**: listing table, certificate custody, purchase
//!    settlement, cancellation, fee policy, rescue escape hatches
//!
//! ## Purchase Flow
//!
//! ```text
//! seller: approve market → list (escrow pull, listing stored)
//! buyer:  approve market → buy  (cost pulled, net → seller, fee → treasury,
//!                                units → buyer, remaining decremented)
//! seller: cancel               (unsold units returned, listing terminal)
//! ```
//!
//! Every operation is a single atomic transition — a failing step leaves
//! balances, listings, and flags exactly as they were.

pub mod guard;
pub mod market;
pub mod payment;

pub use guard::ReentrancyGuard;
pub use market::{EscrowMarket, MarketConfig};
pub use payment::SettlementToken;

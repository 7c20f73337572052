//! # Listing — the marketplace escrow record
//!
//! A `Listing` is a seller's standing fixed-price offer. The offered units
//! sit in market custody from creation until they are bought or returned.
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────┐  remaining hits 0   ┌──────────┐
//!   │ ACTIVE ├────────────────────▶│ CONSUMED │
//!   └───┬────┘                     └──────────┘
//!       │ cancel
//!       ▼
//!   ┌──────────┐
//!   │ CANCELED │
//!   └──────────┘
//! ```
//!
//! Transitions are monotonic: nothing leaves CONSUMED or CANCELED, and no
//! purchase is accepted once the listing left ACTIVE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Address, CarbonledgerError, ListingId, Result, TokenId};

/// The lifecycle state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingState {
    /// Units remain for sale; purchases and cancellation are accepted.
    Active,
    /// Every unit was sold. Terminal.
    Consumed,
    /// The seller (or an admin) canceled; unsold units went back. Terminal.
    Canceled,
}

impl ListingState {
    /// Can this listing transition to the given target state?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Consumed | Self::Canceled)
        )
    }
}

impl std::fmt::Display for ListingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Consumed => write!(f, "CONSUMED"),
            Self::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// A seller's fixed-price offer of certificate units held in market custody.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Monotonically assigned listing id, never reused.
    pub id: ListingId,
    /// The account that created the listing and receives the proceeds.
    pub seller: Address,
    /// The certificate collection the units belong to.
    pub collection: Address,
    /// The certificate id on offer.
    pub token_id: TokenId,
    /// Units originally offered.
    pub total_amount: u128,
    /// Units still unsold and escrowed.
    pub remaining_amount: u128,
    /// Price per certificate unit, in payment-token minor units.
    pub price_per_unit: u128,
    /// Current lifecycle state.
    pub state: ListingState,
    /// When the listing was created.
    pub created_at: DateTime<Utc>,
}

impl Listing {
    /// Create a fresh ACTIVE listing with everything still unsold.
    #[must_use]
    pub fn new(
        id: ListingId,
        seller: Address,
        collection: Address,
        token_id: TokenId,
        amount: u128,
        price_per_unit: u128,
    ) -> Self {
        Self {
            id,
            seller,
            collection,
            token_id,
            total_amount: amount,
            remaining_amount: amount,
            price_per_unit,
            state: ListingState::Active,
            created_at: Utc::now(),
        }
    }

    /// Whether purchases and cancellation are still accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == ListingState::Active
    }

    /// Consume `amount` units from the listing after a purchase settles.
    ///
    /// Hitting zero remaining flips the listing to CONSUMED.
    ///
    /// # Errors
    /// - [`CarbonledgerError::ListingNotActive`] outside ACTIVE
    /// - [`CarbonledgerError::InsufficientRemaining`] if `amount` exceeds what is left
    pub fn fill(&mut self, amount: u128) -> Result<()> {
        if !self.is_active() {
            return Err(CarbonledgerError::ListingNotActive(self.id));
        }
        if amount > self.remaining_amount {
            return Err(CarbonledgerError::InsufficientRemaining {
                requested: amount,
                remaining: self.remaining_amount,
            });
        }
        self.remaining_amount -= amount;
        if self.remaining_amount == 0 {
            self.state = ListingState::Consumed;
        }
        Ok(())
    }

    /// Cancel the listing, returning the number of units to hand back.
    ///
    /// # Errors
    /// Returns [`CarbonledgerError::ListingNotActive`] if the listing is
    /// already consumed or canceled — cancellation is never a silent no-op.
    pub fn cancel(&mut self) -> Result<u128> {
        if !self.is_active() {
            return Err(CarbonledgerError::ListingNotActive(self.id));
        }
        let returned = self.remaining_amount;
        self.remaining_amount = 0;
        self.state = ListingState::Canceled;
        Ok(returned)
    }
}

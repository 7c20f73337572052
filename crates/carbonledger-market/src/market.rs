//! Escrow marketplace — listings, purchases, and fee-split settlement.
//!
//! The market owns the listing table and custodies the offered certificate
//! units between listing and purchase or cancellation. It never mutates
//! balances directly: every movement goes through the certificate ledger's
//! and payment token's transfer primitives.
//!
//! ## Settlement discipline
//!
//! Every multi-leg operation is validate-then-commit:
//! 1. take the reentrancy latch
//! 2. run every check read-only (pause, listing state, fee math, payment
//!    funds *and* allowance, certificate transferability and custody)
//! 3. commit the listing mutation
//! 4. execute the transfers — which the checks have made infallible
//!
//! A failing step therefore leaves no observable partial state, and
//! collaborator errors surface exactly as the collaborator raised them.

use std::collections::{BTreeMap, HashSet};

use carbonledger_registry::{CertificateLedger, RoleRegistry};
use carbonledger_types::{
    Address, CarbonledgerError, Event, EventLog, EventRecord, FeeConfig, Listing, ListingId,
    PaymentToken, Result, Role, TokenId,
};
use serde::{Deserialize, Serialize};

use crate::guard::ReentrancyGuard;

/// Construction parameters for an [`EscrowMarket`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// The market's own custody address.
    pub address: Address,
    /// The payment token this market settles in.
    pub payment_token: Address,
    /// Address receiving the fee portion of every purchase.
    pub treasury: Address,
    /// Fee rate in basis points, capped at 2000.
    pub fee_bps: u16,
}

/// Fixed-price escrow marketplace for allow-listed certificate collections.
#[derive(Debug)]
pub struct EscrowMarket {
    /// The market's own custody address.
    address: Address,
    /// The payment token this market settles in.
    payment_token: Address,
    /// Validated fee-rate and treasury configuration.
    fee: FeeConfig,
    /// Admin-controlled collection allow-list.
    allowed: HashSet<Address>,
    /// Listing table; entries are never removed, terminal states included.
    listings: BTreeMap<ListingId, Listing>,
    /// Next listing id to assign. Monotonic, never reused.
    next_listing: ListingId,
    /// Market-wide pause switch.
    paused: bool,
    /// Single-entry latch over the transfer-issuing entry points.
    guard: ReentrancyGuard,
    /// Hash-chained audit journal.
    events: EventLog,
}

impl EscrowMarket {
    /// Create a market from a validated configuration.
    ///
    /// # Errors
    /// - [`CarbonledgerError::ZeroAddress`] for a zero market or payment address
    /// - [`CarbonledgerError::FeeTooHigh`] / [`CarbonledgerError::TreasuryZero`]
    ///   from fee validation
    pub fn new(config: MarketConfig) -> Result<Self> {
        if config.address.is_zero() || config.payment_token.is_zero() {
            return Err(CarbonledgerError::ZeroAddress);
        }
        let fee = FeeConfig::new(config.fee_bps, config.treasury)?;
        Ok(Self {
            address: config.address,
            payment_token: config.payment_token,
            fee,
            allowed: HashSet::new(),
            listings: BTreeMap::new(),
            next_listing: ListingId::FIRST,
            paused: false,
            guard: ReentrancyGuard::new(),
            events: EventLog::new(),
        })
    }

    // =====================================================================
    // Administration
    // =====================================================================

    /// Allow or disallow a certificate collection for listing. Admin-gated.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Unauthorized`] if `caller` lacks [`Role::Admin`]
    /// - [`CarbonledgerError::ZeroAddress`] for a zero collection address
    pub fn allow_collection(
        &mut self,
        registry: &RoleRegistry,
        caller: Address,
        collection: Address,
        allowed: bool,
    ) -> Result<()> {
        registry.ensure(Role::Admin, caller)?;
        if collection.is_zero() {
            return Err(CarbonledgerError::ZeroAddress);
        }
        if allowed {
            self.allowed.insert(collection);
        } else {
            self.allowed.remove(&collection);
        }
        tracing::info!(collection = %collection.short(), allowed, "collection allow-list changed");
        self.events.append(Event::CollectionAllowed {
            collection,
            allowed,
        });
        Ok(())
    }

    /// Update the fee rate and treasury. Admin-gated, validated, takes
    /// effect for every subsequent purchase.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Unauthorized`] if `caller` lacks [`Role::Admin`]
    /// - [`CarbonledgerError::FeeTooHigh`] above the 2000 bps cap
    /// - [`CarbonledgerError::TreasuryZero`] for a zero treasury
    pub fn set_fee(
        &mut self,
        registry: &RoleRegistry,
        caller: Address,
        fee_bps: u16,
        treasury: Address,
    ) -> Result<()> {
        registry.ensure(Role::Admin, caller)?;
        let config = FeeConfig::new(fee_bps, treasury)?;
        self.fee = config;
        tracing::info!(fee_bps, treasury = %treasury.short(), "fee updated");
        self.events.append(Event::FeeUpdated { config });
        Ok(())
    }

    /// Pause the market. Pauser-gated.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Unauthorized`] if `caller` lacks [`Role::Pauser`]
    /// - [`CarbonledgerError::Paused`] if already paused
    pub fn pause(&mut self, registry: &RoleRegistry, caller: Address) -> Result<()> {
        registry.ensure(Role::Pauser, caller)?;
        self.ensure_not_paused()?;
        self.paused = true;
        tracing::warn!(by = %caller.short(), "market paused");
        self.events.append(Event::Paused { by: caller });
        Ok(())
    }

    /// Unpause the market. Pauser-gated.
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
        tracing::info!(by = %caller.short(), "market unpaused");
        self.events.append(Event::Unpaused { by: caller });
        Ok(())
    }

    // =====================================================================
    // Listing lifecycle
    // =====================================================================

    /// Create a listing: pull `amount` units of `id` from the caller into
    /// market custody and open them for sale at `price_per_unit`.
    ///
    /// The caller must have approved the market as an operator on the
    /// certificate ledger beforehand; pull failures surface as that
    /// ledger's own errors and leave the listing counter untouched.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Paused`] while the market is paused
    /// - [`CarbonledgerError::CollectionNotAllowed`] for a collection off the allow-list
    /// - [`CarbonledgerError::LedgerMismatch`] if `certificates` is not that collection
    /// - [`CarbonledgerError::InvalidListing`] for zero amount or zero price
    /// - any certificate-ledger error from the escrow pull
    pub fn list(
        &mut self,
        certificates: &mut CertificateLedger,
        caller: Address,
        collection: Address,
        id: TokenId,
        amount: u128,
        price_per_unit: u128,
    ) -> Result<ListingId> {
        self.guard.enter()?;
        let result = self.list_inner(certificates, caller, collection, id, amount, price_per_unit);
        self.guard.exit();
        result
    }

    fn list_inner(
        &mut self,
        certificates: &mut CertificateLedger,
        caller: Address,
        collection: Address,
        id: TokenId,
        amount: u128,
        price_per_unit: u128,
    ) -> Result<ListingId> {
        self.ensure_not_paused()?;
        if !self.allowed.contains(&collection) {
            return Err(CarbonledgerError::CollectionNotAllowed(collection));
        }
        self.ensure_collection(certificates, collection)?;
        if amount == 0 {
            return Err(CarbonledgerError::InvalidListing {
                reason: "amount must be positive".into(),
            });
        }
        if price_per_unit == 0 {
            return Err(CarbonledgerError::InvalidListing {
                reason: "price per unit must be positive".into(),
            });
        }

        // Escrow pull. On failure nothing was assigned or stored.
        certificates.transfer(self.address, caller, self.address, id, amount)?;

        let listing_id = self.next_listing;
        self.next_listing = listing_id.next();
        self.listings.insert(
            listing_id,
            Listing::new(listing_id, caller, collection, id, amount, price_per_unit),
        );

        tracing::info!(
            %listing_id,
            seller = %caller.short(),
            %id,
            amount,
            price_per_unit,
            "listed"
        );
        self.events.append(Event::Listed {
            listing: listing_id,
            seller: caller,
            collection,
            id,
            amount,
            price_per_unit,
        });
        Ok(listing_id)
    }

    /// Buy `amount` units from a listing.
    ///
    /// Settles atomically: the buyer pays `cost = amount * price_per_unit`,
    /// split into `net` to the seller and `fee` to the treasury, and the
    /// units leave market custody for the buyer. The buyer must have
    /// approved the market to pull at least `cost` of the payment token.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Paused`] while the market is paused
    /// - [`CarbonledgerError::ListingNotFound`] / [`CarbonledgerError::ListingNotActive`]
    /// - [`CarbonledgerError::InsufficientRemaining`] when `amount` exceeds what is left
    /// - [`CarbonledgerError::AmountOverflow`] if the cost computation overflows
    /// - the payment token's own allowance/balance errors
    /// - the certificate ledger's pause/revocation errors
    pub fn buy<P: PaymentToken>(
        &mut self,
        certificates: &mut CertificateLedger,
        payment: &mut P,
        caller: Address,
        listing_id: ListingId,
        amount: u128,
    ) -> Result<()> {
        self.guard.enter()?;
        let result = self.buy_inner(certificates, payment, caller, listing_id, amount);
        self.guard.exit();
        result
    }

    fn buy_inner<P: PaymentToken>(
        &mut self,
        certificates: &mut CertificateLedger,
        payment: &mut P,
        caller: Address,
        listing_id: ListingId,
        amount: u128,
    ) -> Result<()> {
        self.ensure_not_paused()?;
        if payment.address() != self.payment_token {
            return Err(CarbonledgerError::LedgerMismatch {
                expected: self.payment_token,
                actual: payment.address(),
            });
        }

        let (seller, collection, token_id, price_per_unit, remaining) = {
            let listing = self
                .listings
                .get(&listing_id)
                .ok_or(CarbonledgerError::ListingNotFound(listing_id))?;
            if !listing.is_active() {
                return Err(CarbonledgerError::ListingNotActive(listing_id));
            }
            (
                listing.seller,
                listing.collection,
                listing.token_id,
                listing.price_per_unit,
                listing.remaining_amount,
            )
        };
        if amount > remaining {
            return Err(CarbonledgerError::InsufficientRemaining {
                requested: amount,
                remaining,
            });
        }
        self.ensure_collection(certificates, collection)?;

        let cost = amount
            .checked_mul(price_per_unit)
            .ok_or(CarbonledgerError::AmountOverflow)?;
        let (fee, net) = self.fee.split(cost)?;

        // Pre-validate every leg so the commit below cannot fail halfway.
        payment.ensure_can_pull(caller, self.address, cost)?;
        certificates.ensure_transferable(token_id)?;
        let custody = certificates.balance_of(self.address, token_id);
        if custody < amount {
            return Err(CarbonledgerError::SupplyInvariantViolation {
                reason: format!(
                    "escrow custody for {token_id} holds {custody}, listing {listing_id} needs {amount}"
                ),
            });
        }

        // Effects before interactions.
        self.listings
            .get_mut(&listing_id)
            .ok_or(CarbonledgerError::ListingNotFound(listing_id))?
            .fill(amount)?;

        let treasury = self.fee.treasury;
        payment.transfer_from(self.address, caller, seller, net)?;
        payment.transfer_from(self.address, caller, treasury, fee)?;
        certificates.transfer(self.address, self.address, caller, token_id, amount)?;

        tracing::debug!(cost, fee, net, "purchase split");
        tracing::info!(
            %listing_id,
            buyer = %caller.short(),
            amount,
            cost,
            "purchased"
        );
        self.events.append(Event::Purchased {
            listing: listing_id,
            buyer: caller,
            amount,
            cost,
            fee,
        });
        Ok(())
    }

    /// Cancel a listing and return the unsold units to the seller.
    ///
    /// Only the listing's seller or an admin may cancel. Canceling a
    /// consumed or already-canceled listing fails — never a silent success.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Paused`] while the market is paused
    /// - [`CarbonledgerError::ListingNotFound`] for an unknown id
    /// - [`CarbonledgerError::NotSeller`] for any other caller
    /// - [`CarbonledgerError::ListingNotActive`] for a terminal listing
    /// - the certificate ledger's pause/revocation errors on the return leg
    pub fn cancel(
        &mut self,
        certificates: &mut CertificateLedger,
        registry: &RoleRegistry,
        caller: Address,
        listing_id: ListingId,
    ) -> Result<u128> {
        self.guard.enter()?;
        let result = self.cancel_inner(certificates, registry, caller, listing_id);
        self.guard.exit();
        result
    }

    fn cancel_inner(
        &mut self,
        certificates: &mut CertificateLedger,
        registry: &RoleRegistry,
        caller: Address,
        listing_id: ListingId,
    ) -> Result<u128> {
        self.ensure_not_paused()?;

        let (seller, collection, token_id, active) = {
            let listing = self
                .listings
                .get(&listing_id)
                .ok_or(CarbonledgerError::ListingNotFound(listing_id))?;
            (
                listing.seller,
                listing.collection,
                listing.token_id,
                listing.is_active(),
            )
        };
        if caller != seller && !registry.has(Role::Admin, caller) {
            return Err(CarbonledgerError::NotSeller {
                listing: listing_id,
                account: caller,
            });
        }
        if !active {
            return Err(CarbonledgerError::ListingNotActive(listing_id));
        }
        self.ensure_collection(certificates, collection)?;
        certificates.ensure_transferable(token_id)?;

        let returned = self
            .listings
            .get_mut(&listing_id)
            .ok_or(CarbonledgerError::ListingNotFound(listing_id))?
            .cancel()?;
        certificates.transfer(self.address, self.address, seller, token_id, returned)?;

        tracing::info!(%listing_id, seller = %seller.short(), returned, "canceled");
        self.events.append(Event::Canceled {
            listing: listing_id,
            seller,
            returned,
        });
        Ok(returned)
    }

    // =====================================================================
    // Rescue escape hatches
    // =====================================================================

    /// Recover payment tokens sent to the market outside the listing flow.
    /// Admin-gated; no other invariants checked. Works while paused.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Unauthorized`] if `caller` lacks [`Role::Admin`]
    /// - the payment token's own balance error
    pub fn rescue_payment<P: PaymentToken>(
        &mut self,
        registry: &RoleRegistry,
        caller: Address,
        token: &mut P,
        to: Address,
        amount: u128,
    ) -> Result<()> {
        self.guard.enter()?;
        let result = self.rescue_payment_inner(registry, caller, token, to, amount);
        self.guard.exit();
        result
    }

    fn rescue_payment_inner<P: PaymentToken>(
        &mut self,
        registry: &RoleRegistry,
        caller: Address,
        token: &mut P,
        to: Address,
        amount: u128,
    ) -> Result<()> {
        registry.ensure(Role::Admin, caller)?;
        token.transfer(self.address, to, amount)?;
        tracing::warn!(
            token = %token.address().short(),
            to = %to.short(),
            amount,
            "payment rescued"
        );
        self.events.append(Event::RescuedPayment {
            token: token.address(),
            to,
            amount,
        });
        Ok(())
    }

    /// Recover certificate units held by the market outside any listing.
    /// Admin-gated; no other invariants checked.
    ///
    /// # Errors
    /// - [`CarbonledgerError::Unauthorized`] if `caller` lacks [`Role::Admin`]
    /// - the certificate ledger's own errors on the transfer
    pub fn rescue_certificates(
        &mut self,
        registry: &RoleRegistry,
        caller: Address,
        certificates: &mut CertificateLedger,
        to: Address,
        id: TokenId,
        amount: u128,
    ) -> Result<()> {
        self.guard.enter()?;
        let result = self.rescue_certificates_inner(registry, caller, certificates, to, id, amount);
        self.guard.exit();
        result
    }

    fn rescue_certificates_inner(
        &mut self,
        registry: &RoleRegistry,
        caller: Address,
        certificates: &mut CertificateLedger,
        to: Address,
        id: TokenId,
        amount: u128,
    ) -> Result<()> {
        registry.ensure(Role::Admin, caller)?;
        certificates.transfer(self.address, self.address, to, id, amount)?;
        tracing::warn!(
            collection = %certificates.address().short(),
            to = %to.short(),
            %id,
            amount,
            "certificates rescued"
        );
        self.events.append(Event::RescuedCertificates {
            collection: certificates.address(),
            to,
            id,
            amount,
        });
        Ok(())
    }

    // =====================================================================
    // Views
    // =====================================================================

    /// The market's custody address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The payment token this market settles in.
    #[must_use]
    pub fn payment_token(&self) -> Address {
        self.payment_token
    }

    /// Current fee configuration.
    #[must_use]
    pub fn fee_config(&self) -> FeeConfig {
        self.fee
    }

    /// Current fee rate in basis points.
    #[must_use]
    pub fn fee_bps(&self) -> u16 {
        self.fee.fee_bps
    }

    /// Current treasury address.
    #[must_use]
    pub fn treasury(&self) -> Address {
        self.fee.treasury
    }

    /// Whether the market is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether a collection may be listed.
    #[must_use]
    pub fn is_collection_allowed(&self, collection: Address) -> bool {
        self.allowed.contains(&collection)
    }

    /// Look up a listing, terminal states included.
    #[must_use]
    pub fn listing(&self, id: ListingId) -> Option<&Listing> {
        self.listings.get(&id)
    }

    /// Unsold units remaining in a listing.
    #[must_use]
    pub fn remaining(&self, id: ListingId) -> Option<u128> {
        self.listings.get(&id).map(|l| l.remaining_amount)
    }

    /// Number of listings ever created (terminal states included).
    #[must_use]
    pub fn listing_count(&self) -> usize {
        self.listings.len()
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

    fn ensure_collection(
        &self,
        certificates: &CertificateLedger,
        expected: Address,
    ) -> Result<()> {
        if certificates.address() != expected {
            return Err(CarbonledgerError::LedgerMismatch {
                expected,
                actual: certificates.address(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::SettlementToken;

    struct Harness {
        registry: RoleRegistry,
        certificates: CertificateLedger,
        payment: SettlementToken,
        market: EscrowMarket,
        admin: Address,
        seller: Address,
        buyer: Address,
        treasury: Address,
    }

    /// One USDC-style whole unit (6 decimals).
    const UNIT: u128 = 1_000_000;
    const ID: TokenId = TokenId(1);

    fn setup() -> Harness {
        let admin = Address::random();
        let seller = Address::random();
        let buyer = Address::random();
        let treasury = Address::random();

        let mut registry = RoleRegistry::new(admin).unwrap();
        registry.grant(admin, Role::Issuer, admin).unwrap();
        registry.grant(admin, Role::Pauser, admin).unwrap();

        let mut certificates =
            CertificateLedger::new(Address::random(), "https://joulix.io/meta/{id}.json");
        certificates
            .mint(&registry, admin, seller, ID, 2, b"")
            .unwrap();

        let mut payment = SettlementToken::new(Address::random(), 6);
        payment.mint(buyer, 1_000_000 * UNIT).unwrap();

        let mut market = EscrowMarket::new(MarketConfig {
            address: Address::random(),
            payment_token: payment.address(),
            treasury,
            fee_bps: 100,
        })
        .unwrap();
        market
            .allow_collection(&registry, admin, certificates.address(), true)
            .unwrap();

        // Out-of-band authorizations: seller lets the market pull escrow,
        // buyer lets the market pull payment.
        certificates
            .set_approval_for_all(seller, market.address(), true)
            .unwrap();
        payment.approve(buyer, market.address(), 1_000_000 * UNIT);

        Harness {
            registry,
            certificates,
            payment,
            market,
            admin,
            seller,
            buyer,
            treasury,
        }
    }

    fn list_two_units(h: &mut Harness) -> ListingId {
        let collection = h.certificates.address();
        h.market
            .list(&mut h.certificates, h.seller, collection, ID, 2, 100 * UNIT)
            .unwrap()
    }

    #[test]
    fn market_config_serde_roundtrip() {
        let config = MarketConfig {
            address: Address::random(),
            payment_token: Address::random(),
            treasury: Address::random(),
            fee_bps: 250,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: MarketConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.address, back.address);
        assert_eq!(config.fee_bps, back.fee_bps);
    }

    #[test]
    fn config_is_validated() {
        let err = EscrowMarket::new(MarketConfig {
            address: Address::random(),
            payment_token: Address::random(),
            treasury: Address::random(),
            fee_bps: 2001,
        })
        .unwrap_err();
        assert!(matches!(err, CarbonledgerError::FeeTooHigh { bps: 2001 }));

        let err = EscrowMarket::new(MarketConfig {
            address: Address::ZERO,
            payment_token: Address::random(),
            treasury: Address::random(),
            fee_bps: 100,
        })
        .unwrap_err();
        assert!(matches!(err, CarbonledgerError::ZeroAddress));
    }

    #[test]
    fn list_escrows_units_and_assigns_first_id() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);

        assert_eq!(listing_id, ListingId::FIRST);
        assert_eq!(h.certificates.balance_of(h.seller, ID), 0);
        assert_eq!(h.certificates.balance_of(h.market.address(), ID), 2);
        let listing = h.market.listing(listing_id).unwrap();
        assert!(listing.is_active());
        assert_eq!(listing.remaining_amount, 2);
        assert_eq!(listing.price_per_unit, 100 * UNIT);
    }

    #[test]
    fn list_rejects_unallowed_collection() {
        let mut h = setup();
        let stranger = Address::random();
        let err = h
            .market
            .list(&mut h.certificates, h.seller, stranger, ID, 1, UNIT)
            .unwrap_err();
        assert!(matches!(
            err,
            CarbonledgerError::CollectionNotAllowed(c) if c == stranger
        ));
        // Counter untouched.
        assert_eq!(h.market.listing_count(), 0);
    }

    #[test]
    fn list_rejects_degenerate_parameters() {
        let mut h = setup();
        let collection = h.certificates.address();
        let err = h
            .market
            .list(&mut h.certificates, h.seller, collection, ID, 0, UNIT)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::InvalidListing { .. }));

        let err = h
            .market
            .list(&mut h.certificates, h.seller, collection, ID, 1, 0)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::InvalidListing { .. }));
        assert_eq!(h.market.listing_count(), 0);
    }

    #[test]
    fn list_without_operator_approval_fails_cleanly() {
        let mut h = setup();
        let collection = h.certificates.address();
        h.certificates
            .set_approval_for_all(h.seller, h.market.address(), false)
            .unwrap();

        let err = h
            .market
            .list(&mut h.certificates, h.seller, collection, ID, 1, UNIT)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::MissingApproval { .. }));
        assert_eq!(h.market.listing_count(), 0);
        assert_eq!(h.certificates.balance_of(h.seller, ID), 2);
    }

    #[test]
    fn buy_splits_payment_and_delivers_certificates() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);
        let buyer_before = h.payment.balance_of(h.buyer);

        h.market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 1)
            .unwrap();

        // cost 100 units, 1% fee → 1 unit to treasury, 99 to seller.
        assert_eq!(h.payment.balance_of(h.buyer), buyer_before - 100 * UNIT);
        assert_eq!(h.payment.balance_of(h.seller), 99 * UNIT);
        assert_eq!(h.payment.balance_of(h.treasury), UNIT);
        assert_eq!(h.certificates.balance_of(h.buyer, ID), 1);
        assert_eq!(h.certificates.balance_of(h.market.address(), ID), 1);
        assert_eq!(h.market.remaining(listing_id), Some(1));
        h.certificates.verify_supply(ID).unwrap();
    }

    #[test]
    fn buy_consumes_listing_at_zero_remaining() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);
        h.market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 2)
            .unwrap();

        let listing = h.market.listing(listing_id).unwrap();
        assert!(!listing.is_active());
        assert_eq!(h.market.remaining(listing_id), Some(0));

        let err = h
            .market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 1)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::ListingNotActive(_)));
    }

    #[test]
    fn buy_over_remaining_rejected_and_unchanged() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);

        let err = h
            .market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 3)
            .unwrap_err();
        assert!(matches!(
            err,
            CarbonledgerError::InsufficientRemaining {
                requested: 3,
                remaining: 2
            }
        ));
        assert_eq!(h.market.remaining(listing_id), Some(2));
        assert_eq!(h.payment.balance_of(h.seller), 0);
    }

    #[test]
    fn buy_unknown_listing_rejected() {
        let mut h = setup();
        let err = h
            .market
            .buy(
                &mut h.certificates,
                &mut h.payment,
                h.buyer,
                ListingId(99),
                1,
            )
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::ListingNotFound(_)));
    }

    #[test]
    fn buy_without_allowance_fails_with_payment_error() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);
        h.payment.approve(h.buyer, h.market.address(), 0);

        let err = h
            .market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 1)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::InsufficientAllowance { .. }));

        // Nothing moved, listing untouched.
        assert_eq!(h.market.remaining(listing_id), Some(2));
        assert_eq!(h.payment.balance_of(h.seller), 0);
        assert_eq!(h.certificates.balance_of(h.buyer, ID), 0);
    }

    #[test]
    fn buy_with_poor_buyer_fails_atomically() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);
        let pauper = Address::random();
        h.payment.mint(pauper, UNIT).unwrap();
        h.payment.approve(pauper, h.market.address(), 1_000 * UNIT);

        let err = h
            .market
            .buy(&mut h.certificates, &mut h.payment, pauper, listing_id, 1)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::InsufficientFunds { .. }));
        assert_eq!(h.payment.balance_of(pauper), UNIT);
        assert_eq!(h.market.remaining(listing_id), Some(2));
    }

    #[test]
    fn buy_blocked_when_certificate_revoked() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);
        h.certificates
            .set_revoked(&h.registry, h.admin, ID, true, "audit hold")
            .unwrap();

        let err = h
            .market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 1)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::TokenRevoked(_)));
        // No payment moved even though funds and allowance were fine.
        assert_eq!(h.payment.balance_of(h.seller), 0);
        assert_eq!(h.payment.balance_of(h.treasury), 0);
        assert_eq!(h.market.remaining(listing_id), Some(2));
    }

    #[test]
    fn zero_amount_buy_is_a_permitted_noop() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);
        h.market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 0)
            .unwrap();
        assert_eq!(h.market.remaining(listing_id), Some(2));
        assert_eq!(h.payment.balance_of(h.seller), 0);
    }

    #[test]
    fn wrong_payment_token_rejected() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);
        let mut other = SettlementToken::new(Address::random(), 6);
        other.mint(h.buyer, 1_000 * UNIT).unwrap();
        other.approve(h.buyer, h.market.address(), 1_000 * UNIT);

        let err = h
            .market
            .buy(&mut h.certificates, &mut other, h.buyer, listing_id, 1)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::LedgerMismatch { .. }));
    }

    #[test]
    fn cancel_returns_remaining_to_seller() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);
        h.market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 1)
            .unwrap();

        let returned = h
            .market
            .cancel(&mut h.certificates, &h.registry, h.seller, listing_id)
            .unwrap();
        assert_eq!(returned, 1);
        assert_eq!(h.certificates.balance_of(h.seller, ID), 1);
        assert_eq!(h.certificates.balance_of(h.market.address(), ID), 0);
        assert_eq!(h.market.remaining(listing_id), Some(0));
        assert!(!h.market.listing(listing_id).unwrap().is_active());
    }

    #[test]
    fn only_seller_or_admin_cancels() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);

        let err = h
            .market
            .cancel(&mut h.certificates, &h.registry, h.buyer, listing_id)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::NotSeller { .. }));

        // Admin intervention is allowed; units still return to the seller.
        h.market
            .cancel(&mut h.certificates, &h.registry, h.admin, listing_id)
            .unwrap();
        assert_eq!(h.certificates.balance_of(h.seller, ID), 2);
    }

    #[test]
    fn cancel_terminal_listing_rejected() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);
        h.market
            .cancel(&mut h.certificates, &h.registry, h.seller, listing_id)
            .unwrap();

        let err = h
            .market
            .cancel(&mut h.certificates, &h.registry, h.seller, listing_id)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::ListingNotActive(_)));
    }

    #[test]
    fn listing_ids_are_never_reused() {
        let mut h = setup();
        let first = list_two_units(&mut h);
        h.market
            .cancel(&mut h.certificates, &h.registry, h.seller, first)
            .unwrap();

        // The returned units back a fresh listing; the id keeps climbing.
        let collection = h.certificates.address();
        let second = h
            .market
            .list(&mut h.certificates, h.seller, collection, ID, 2, 50 * UNIT)
            .unwrap();
        assert_eq!(second, ListingId(2));
        assert_eq!(h.market.listing_count(), 2);
    }

    #[test]
    fn pause_blocks_list_buy_cancel() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);
        h.market.pause(&h.registry, h.admin).unwrap();

        let collection = h.certificates.address();
        let err = h
            .market
            .list(&mut h.certificates, h.seller, collection, ID, 1, UNIT)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::Paused));
        let err = h
            .market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 1)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::Paused));
        let err = h
            .market
            .cancel(&mut h.certificates, &h.registry, h.seller, listing_id)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::Paused));

        h.market.unpause(&h.registry, h.admin).unwrap();
        h.market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 1)
            .unwrap();
        assert_eq!(h.payment.balance_of(h.seller), 99 * UNIT);
    }

    #[test]
    fn set_fee_validates_and_applies_to_later_purchases() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);

        let err = h
            .market
            .set_fee(&h.registry, h.admin, 2001, h.treasury)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::FeeTooHigh { bps: 2001 }));
        let err = h
            .market
            .set_fee(&h.registry, h.admin, 100, Address::ZERO)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::TreasuryZero));

        // 2.5% from now on.
        h.market
            .set_fee(&h.registry, h.admin, 250, h.treasury)
            .unwrap();
        assert_eq!(h.market.fee_bps(), 250);

        h.market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 1)
            .unwrap();
        assert_eq!(h.payment.balance_of(h.treasury), 100 * UNIT * 250 / 10_000);
    }

    #[test]
    fn set_fee_requires_admin() {
        let mut h = setup();
        let err = h
            .market
            .set_fee(&h.registry, h.seller, 100, h.treasury)
            .unwrap_err();
        assert!(matches!(
            err,
            CarbonledgerError::Unauthorized {
                role: Role::Admin,
                ..
            }
        ));
    }

    #[test]
    fn rescue_payment_is_admin_gated() {
        let mut h = setup();
        // Stray funds land on the market address outside any listing.
        h.payment
            .transfer(h.buyer, h.market.address(), 100 * UNIT)
            .unwrap();

        let err = h
            .market
            .rescue_payment(&h.registry, h.buyer, &mut h.payment, h.buyer, 100 * UNIT)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::Unauthorized { .. }));

        let before = h.payment.balance_of(h.buyer);
        h.market
            .rescue_payment(&h.registry, h.admin, &mut h.payment, h.buyer, 100 * UNIT)
            .unwrap();
        assert_eq!(h.payment.balance_of(h.buyer), before + 100 * UNIT);
        assert_eq!(h.payment.balance_of(h.market.address()), 0);
    }

    #[test]
    fn rescue_certificates_is_admin_gated() {
        let mut h = setup();
        let stray = TokenId(222);
        let other = Address::random();
        let market_addr = h.market.address();
        h.certificates
            .mint(&h.registry, h.admin, market_addr, stray, 3, b"")
            .unwrap();

        let err = h
            .market
            .rescue_certificates(&h.registry, other, &mut h.certificates, other, stray, 1)
            .unwrap_err();
        assert!(matches!(err, CarbonledgerError::Unauthorized { .. }));

        h.market
            .rescue_certificates(&h.registry, h.admin, &mut h.certificates, other, stray, 2)
            .unwrap();
        assert_eq!(h.certificates.balance_of(other, stray), 2);
        assert_eq!(h.certificates.balance_of(market_addr, stray), 1);
    }

    #[test]
    fn journal_covers_the_lifecycle() {
        let mut h = setup();
        let listing_id = list_two_units(&mut h);
        h.market
            .buy(&mut h.certificates, &mut h.payment, h.buyer, listing_id, 1)
            .unwrap();
        h.market
            .cancel(&mut h.certificates, &h.registry, h.seller, listing_id)
            .unwrap();

        let labels: Vec<&str> = h.market.events().iter().map(|r| r.event.label()).collect();
        assert_eq!(
            labels,
            vec!["COLLECTION_ALLOWED", "LISTED", "PURCHASED", "CANCELED"]
        );
        assert!(h.market.verify_events());
    }
}

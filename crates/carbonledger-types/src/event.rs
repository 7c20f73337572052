//! Ledger events and the hash-chained audit journal.
//!
//! Every committed mutation appends one [`Event`] to its plane's
//! [`EventLog`]. Records are hash-chained (SHA-256 over the previous hash,
//! the sequence number, and the serialized payload) so the journal is
//! tamper-evident and can be re-verified offline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Address, FeeConfig, ListingId, TokenId};

/// A state transition recorded by one of the ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// New certificate units issued (transfer-in from the zero address).
    Minted {
        to: Address,
        id: TokenId,
        amount: u128,
        data: Vec<u8>,
    },
    /// Certificate units moved between holders.
    Transferred {
        from: Address,
        to: Address,
        id: TokenId,
        amount: u128,
    },
    /// An operator approval was granted or withdrawn.
    ApprovalSet {
        owner: Address,
        operator: Address,
        approved: bool,
    },
    /// Certificate units permanently removed from circulation.
    Retired {
        holder: Address,
        id: TokenId,
        amount: u128,
        reason: String,
    },
    /// Several ids retired in one atomic batch.
    RetiredBatch {
        holder: Address,
        ids: Vec<TokenId>,
        amounts: Vec<u128>,
        reason: String,
    },
    /// Transfer-blocking flag toggled for a certificate id.
    RevokedSet {
        id: TokenId,
        revoked: bool,
        reason: String,
    },
    /// The ledger was paused.
    Paused { by: Address },
    /// The ledger was unpaused.
    Unpaused { by: Address },
    /// A listing was created and its units escrowed.
    Listed {
        listing: ListingId,
        seller: Address,
        collection: Address,
        id: TokenId,
        amount: u128,
        price_per_unit: u128,
    },
    /// A purchase settled: payment split and certificates delivered.
    Purchased {
        listing: ListingId,
        buyer: Address,
        amount: u128,
        cost: u128,
        fee: u128,
    },
    /// A listing was canceled and unsold units returned.
    Canceled {
        listing: ListingId,
        seller: Address,
        returned: u128,
    },
    /// Fee rate or treasury address changed.
    FeeUpdated { config: FeeConfig },
    /// A collection was allowed or disallowed for listing.
    CollectionAllowed { collection: Address, allowed: bool },
    /// Admin recovered stray payment tokens from market custody.
    RescuedPayment {
        token: Address,
        to: Address,
        amount: u128,
    },
    /// Admin recovered stray certificate units from market custody.
    RescuedCertificates {
        collection: Address,
        to: Address,
        id: TokenId,
        amount: u128,
    },
}

impl Event {
    /// Stable label for log lines and journal inspection.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Minted { .. } => "MINTED",
            Self::Transferred { .. } => "TRANSFERRED",
            Self::ApprovalSet { .. } => "APPROVAL_SET",
            Self::Retired { .. } => "RETIRED",
            Self::RetiredBatch { .. } => "RETIRED_BATCH",
            Self::RevokedSet { .. } => "REVOKED_SET",
            Self::Paused { .. } => "PAUSED",
            Self::Unpaused { .. } => "UNPAUSED",
            Self::Listed { .. } => "LISTED",
            Self::Purchased { .. } => "PURCHASED",
            Self::Canceled { .. } => "CANCELED",
            Self::FeeUpdated { .. } => "FEE_UPDATED",
            Self::CollectionAllowed { .. } => "COLLECTION_ALLOWED",
            Self::RescuedPayment { .. } => "RESCUED_PAYMENT",
            Self::RescuedCertificates { .. } => "RESCUED_CERTIFICATES",
        }
    }
}

/// One journal entry: the event plus its position and chain hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// 1-based position in the journal.
    pub sequence: u64,
    /// When the event was committed.
    pub at: DateTime<Utc>,
    /// The recorded state transition.
    pub event: Event,
    /// SHA-256 over (previous hash || sequence || payload).
    pub chain_hash: [u8; 32],
}

/// Append-only, hash-chained event journal for one ledger plane.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append an event, extending the hash chain.
    pub fn append(&mut self, event: Event) -> &EventRecord {
        let sequence = self.records.len() as u64 + 1;
        let prev = self
            .records
            .last()
            .map_or([0u8; 32], |record| record.chain_hash);
        let chain_hash = Self::hash_link(&prev, sequence, &event);
        self.records.push(EventRecord {
            sequence,
            at: Utc::now(),
            event,
            chain_hash,
        });
        self.records.last().expect("record was just pushed")
    }

    /// All journal entries in commit order.
    #[must_use]
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Recompute the full chain and compare against the stored hashes.
    #[must_use]
    pub fn verify(&self) -> bool {
        let mut prev = [0u8; 32];
        for record in &self.records {
            let expected = Self::hash_link(&prev, record.sequence, &record.event);
            if expected != record.chain_hash {
                return false;
            }
            prev = record.chain_hash;
        }
        true
    }

    fn hash_link(prev: &[u8; 32], sequence: u64, event: &Event) -> [u8; 32] {
        let payload = serde_json::to_vec(event).expect("event serialization is infallible");
        let mut hasher = Sha256::new();
        hasher.update(b"carbonledger:event:v1:");
        hasher.update(prev);
        hasher.update(sequence.to_le_bytes());
        hasher.update(&payload);
        hasher.finalize().into()
    }
}

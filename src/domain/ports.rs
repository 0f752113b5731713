use crate::domain::fee::FeeLine;
use crate::domain::history::HistoryEntry;
use crate::domain::payment::{PaymentTransaction, TransactionId};
use crate::domain::shipment::{Shipment, TrackingId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type StoreBox = Box<dyn TrackingStore>;

/// Storage port for the tracking core.
///
/// Reads are point lookups; every mutation goes through [`commit`], which
/// applies a whole [`WriteBatch`] atomically. Concurrent commits touching
/// the same shipment are serialized by the backend, so a reader never
/// observes a fee line without its effect on the cached total, and the
/// payment guard check-then-act happens under the same exclusion as the
/// writes it protects.
///
/// [`commit`]: TrackingStore::commit
#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn shipment(&self, id: &TrackingId) -> Result<Option<Shipment>>;

    async fn all_shipments(&self) -> Result<Vec<Shipment>>;

    /// Fee lines for a shipment, ordered by creation.
    async fn fee_lines(&self, id: &TrackingId) -> Result<Vec<FeeLine>>;

    /// History entries for a shipment, ascending by timestamp.
    async fn history(&self, id: &TrackingId) -> Result<Vec<HistoryEntry>>;

    async fn payments(&self, id: &TrackingId) -> Result<Vec<PaymentTransaction>>;

    /// Global uniqueness check for transaction ids.
    async fn transaction_id_exists(&self, id: &TransactionId) -> Result<bool>;

    /// Applies the batch all-or-nothing. If the batch carries a guard, the
    /// guard is evaluated under the store's write exclusion before anything
    /// is written; a violated guard fails the whole commit.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

/// A single write inside a batch.
#[derive(Debug, Clone)]
pub enum Write {
    PutShipment(Shipment),
    PutFeeLine(FeeLine),
    DeleteFeeLine { shipment: TrackingId, fee_id: u64 },
    AppendHistory(HistoryEntry),
    PutPayment(PaymentTransaction),
    /// Removes the shipment and cascades to its fee lines, history entries
    /// and payment records.
    DeleteShipment(TrackingId),
}

/// Precondition evaluated atomically with the batch it guards.
#[derive(Debug, Clone)]
pub enum Guard {
    /// Fails with `DuplicatePayment` (naming the conflicting transaction) if
    /// the shipment already has a completed payment created at or after the
    /// cutoff. Closes the race between the processor's idempotency read and
    /// its commit.
    NoCompletedPaymentSince {
        shipment: TrackingId,
        cutoff: DateTime<Utc>,
    },
}

/// An ordered, atomic set of writes with an optional guard.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub guard: Option<Guard>,
    pub writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn put_shipment(mut self, shipment: Shipment) -> Self {
        self.writes.push(Write::PutShipment(shipment));
        self
    }

    pub fn put_fee_line(mut self, fee: FeeLine) -> Self {
        self.writes.push(Write::PutFeeLine(fee));
        self
    }

    pub fn delete_fee_line(mut self, shipment: TrackingId, fee_id: u64) -> Self {
        self.writes.push(Write::DeleteFeeLine { shipment, fee_id });
        self
    }

    pub fn append_history(mut self, entry: HistoryEntry) -> Self {
        self.writes.push(Write::AppendHistory(entry));
        self
    }

    pub fn put_payment(mut self, payment: PaymentTransaction) -> Self {
        self.writes.push(Write::PutPayment(payment));
        self
    }

    pub fn delete_shipment(mut self, id: TrackingId) -> Self {
        self.writes.push(Write::DeleteShipment(id));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

use crate::domain::fee::{FeeLine, FeeLineUpdate, NewFeeLine};
use crate::domain::history::HistoryEntry;
use crate::domain::money::{ChargeAmount, Money};
use crate::domain::payment::{CardDetails, PaymentStatus, PaymentTransaction, TransactionId};
use crate::domain::ports::{Guard, StoreBox, WriteBatch};
use crate::domain::shipment::{Shipment, ShipmentStatus, TrackingId};
use crate::error::{Result, TrackingError};
use chrono::{Duration, Utc};
use serde::Serialize;

/// Trailing window during which a repeated payment request for the same
/// shipment is treated as a duplicate rather than a new charge. Pragmatic
/// double-submission bound, not a cryptographic guarantee.
const IDEMPOTENCY_WINDOW_MINUTES: i64 = 5;

/// History label written when a payment completes. Not a shipment status.
pub const PAYMENT_COMPLETED_LABEL: &str = "payment_completed";

/// Fee breakdown for a shipment: the itemized lines, their live sum, and
/// whether that sum matches the shipment's cached total. `synchronized`
/// should always be true in a correctly functioning system; it exists to
/// surface reconciliation bugs to operators and tests.
#[derive(Debug, Clone, Serialize)]
pub struct FeeBreakdown {
    pub lines: Vec<FeeLine>,
    pub total: Money,
    pub count: usize,
    pub shipment_total: Money,
    pub synchronized: bool,
}

/// Financial operations: fee-line lifecycle with reconciliation, the
/// payment protocol, and the breakdown report.
pub struct FinanceService {
    store: StoreBox,
    idempotency_window: Duration,
}

impl FinanceService {
    pub fn new(store: StoreBox) -> Self {
        Self {
            store,
            idempotency_window: Duration::minutes(IDEMPOTENCY_WINDOW_MINUTES),
        }
    }

    /// Overrides the duplicate-payment window. Intended for tests.
    pub fn with_idempotency_window(mut self, window: Duration) -> Self {
        self.idempotency_window = window;
        self
    }

    /// Recomputes the shipment's cached fee total from its fee lines.
    ///
    /// Idempotent: when the cached fields already match the live sum the
    /// call performs no write at all. Returns `None` when the shipment no
    /// longer exists (lost race against a cascading delete) — that case is
    /// silently skipped rather than surfaced as an error.
    pub async fn recalculate(&self, id: &TrackingId) -> Result<Option<Money>> {
        let Some(mut shipment) = self.store.shipment(id).await? else {
            return Ok(None);
        };
        let lines = self.store.fee_lines(id).await?;
        let total: Money = lines.iter().map(|l| l.amount).sum();

        if shipment.fee_amount != total || shipment.fee_required != total.is_positive() {
            shipment.apply_fee_total(total, Utc::now());
            self.store
                .commit(WriteBatch::new().put_shipment(shipment))
                .await?;
            tracing::debug!(tracking_id = %id, total = %total, "fee total reconciled");
        }
        Ok(Some(total))
    }

    /// Attaches a fee line and reconciles the owner's cached total in the
    /// same commit, so no reader ever sees the line without its effect.
    pub async fn add_fee(&self, id: &TrackingId, input: NewFeeLine) -> Result<FeeLine> {
        let mut shipment = self.require_shipment(id).await?;
        let lines = self.store.fee_lines(id).await?;

        let next_id = lines.iter().map(|l| l.id).max().unwrap_or(0) + 1;
        let fee = FeeLine::new(next_id, id.clone(), input, Utc::now())?;

        let total = lines.iter().map(|l| l.amount).sum::<Money>() + fee.amount;
        shipment.apply_fee_total(total, Utc::now());

        self.store
            .commit(
                WriteBatch::new()
                    .put_fee_line(fee.clone())
                    .put_shipment(shipment),
            )
            .await?;
        Ok(fee)
    }

    /// Applies a partial update to a fee line, reconciling in the same
    /// commit.
    pub async fn update_fee(
        &self,
        id: &TrackingId,
        fee_id: u64,
        update: FeeLineUpdate,
    ) -> Result<FeeLine> {
        let mut shipment = self.require_shipment(id).await?;
        let lines = self.store.fee_lines(id).await?;

        let mut fee = lines
            .iter()
            .find(|l| l.id == fee_id)
            .cloned()
            .ok_or_else(|| TrackingError::NotFound(format!("Fee line {fee_id} on {id}")))?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(TrackingError::Validation(
                    "Fee name must not be empty".to_string(),
                ));
            }
            fee.name = name;
        }
        if let Some(amount) = update.amount {
            fee.amount = amount;
        }
        if let Some(description) = update.description {
            fee.description = Some(description);
        }

        let total: Money = lines
            .iter()
            .map(|l| if l.id == fee_id { fee.amount } else { l.amount })
            .sum();
        shipment.apply_fee_total(total, Utc::now());

        self.store
            .commit(
                WriteBatch::new()
                    .put_fee_line(fee.clone())
                    .put_shipment(shipment),
            )
            .await?;
        Ok(fee)
    }

    /// Removes a fee line, reconciling in the same commit.
    pub async fn remove_fee(&self, id: &TrackingId, fee_id: u64) -> Result<()> {
        let mut shipment = self.require_shipment(id).await?;
        let lines = self.store.fee_lines(id).await?;

        if !lines.iter().any(|l| l.id == fee_id) {
            return Err(TrackingError::NotFound(format!(
                "Fee line {fee_id} on {id}"
            )));
        }

        let total: Money = lines
            .iter()
            .filter(|l| l.id != fee_id)
            .map(|l| l.amount)
            .sum();
        shipment.apply_fee_total(total, Utc::now());

        self.store
            .commit(
                WriteBatch::new()
                    .delete_fee_line(id.clone(), fee_id)
                    .put_shipment(shipment),
            )
            .await
    }

    /// Pure read: itemized lines, live sum, and the synchronization flag.
    pub async fn breakdown(&self, id: &TrackingId) -> Result<FeeBreakdown> {
        let shipment = self.require_shipment(id).await?;
        let lines = self.store.fee_lines(id).await?;
        let total: Money = lines.iter().map(|l| l.amount).sum();

        Ok(FeeBreakdown {
            count: lines.len(),
            synchronized: total == shipment.fee_amount,
            shipment_total: shipment.fee_amount,
            total,
            lines,
        })
    }

    /// Processes a one-shot simulated payment against the shipment's
    /// outstanding fees.
    ///
    /// Protocol: precondition (`fee_required`), idempotency lookup within
    /// the trailing window, card validation, amount resolution (live fee sum
    /// falling back to the cached total), then a single guarded atomic
    /// commit that records the completed transaction, clears
    /// `fee_required`, advances the shipment to `in_transit`, and appends
    /// the `payment_completed` history entry. Either all of that becomes
    /// durable or none of it does.
    pub async fn process_payment(
        &self,
        id: &TrackingId,
        card: CardDetails,
    ) -> Result<PaymentTransaction> {
        let mut shipment = self.require_shipment(id).await?;

        if !shipment.fee_required {
            return Err(TrackingError::PaymentNotRequired);
        }

        let cutoff = Utc::now() - self.idempotency_window;
        if let Some(recent) = self
            .store
            .payments(id)
            .await?
            .iter()
            .find(|p| p.status == PaymentStatus::Completed && p.created_at >= cutoff)
        {
            return Err(TrackingError::DuplicatePayment {
                transaction_id: recent.transaction_id.to_string(),
            });
        }

        card.validate()?;

        let lines = self.store.fee_lines(id).await?;
        let total = if lines.is_empty() {
            shipment.fee_amount
        } else {
            lines.iter().map(|l| l.amount).sum()
        };
        let amount = ChargeAmount::new(total)?;

        let transaction_id = self.unique_transaction_id().await?;
        let now = Utc::now();
        let payment =
            PaymentTransaction::completed(transaction_id, id.clone(), amount, &card, now);

        shipment.fee_required = false;
        shipment.status = ShipmentStatus::InTransit;
        shipment.updated_at = now;

        let entry = HistoryEntry {
            shipment: id.clone(),
            status: PAYMENT_COMPLETED_LABEL.to_string(),
            location: shipment.current_location.clone(),
            description: Some(format!(
                "Payment of ${} processed successfully (Transaction: {})",
                amount, payment.transaction_id
            )),
            timestamp: now,
        };

        // The guard re-checks the idempotency condition under the store's
        // write exclusion: of two concurrent submissions that both passed
        // the read above, at most one commit can succeed.
        self.store
            .commit(
                WriteBatch::new()
                    .guard(Guard::NoCompletedPaymentSince {
                        shipment: id.clone(),
                        cutoff,
                    })
                    .put_payment(payment.clone())
                    .put_shipment(shipment)
                    .append_history(entry),
            )
            .await?;

        tracing::info!(
            tracking_id = %id,
            transaction_id = %payment.transaction_id,
            amount = %payment.amount,
            "payment completed"
        );
        Ok(payment)
    }

    async fn require_shipment(&self, id: &TrackingId) -> Result<Shipment> {
        self.store
            .shipment(id)
            .await?
            .ok_or_else(|| TrackingError::NotFound(format!("Shipment {id}")))
    }

    async fn unique_transaction_id(&self) -> Result<TransactionId> {
        loop {
            let candidate = TransactionId::random();
            if !self.store.transaction_id_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
    }
}

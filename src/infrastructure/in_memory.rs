use crate::domain::fee::FeeLine;
use crate::domain::history::HistoryEntry;
use crate::domain::payment::{PaymentStatus, PaymentTransaction, TransactionId};
use crate::domain::ports::{Guard, TrackingStore, Write, WriteBatch};
use crate::domain::shipment::{Shipment, TrackingId};
use crate::error::{Result, TrackingError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    shipments: HashMap<TrackingId, Shipment>,
    fees: HashMap<TrackingId, Vec<FeeLine>>,
    history: HashMap<TrackingId, Vec<HistoryEntry>>,
    payments: HashMap<TrackingId, Vec<PaymentTransaction>>,
}

/// In-memory store.
///
/// All state lives behind one `Arc<RwLock<..>>`; `Clone` shares it, which is
/// how tests hand the same ledger to several services. A commit takes the
/// write lock once, evaluates the guard, then applies every write, so
/// batches are atomic and writers are fully serialized.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_guard(state: &LedgerState, guard: &Guard) -> Result<()> {
    match guard {
        Guard::NoCompletedPaymentSince { shipment, cutoff } => {
            if let Some(existing) = state
                .payments
                .get(shipment)
                .into_iter()
                .flatten()
                .find(|p| p.status == PaymentStatus::Completed && p.created_at >= *cutoff)
            {
                return Err(TrackingError::DuplicatePayment {
                    transaction_id: existing.transaction_id.to_string(),
                });
            }
            Ok(())
        }
    }
}

fn apply(state: &mut LedgerState, write: Write) {
    match write {
        Write::PutShipment(shipment) => {
            state
                .shipments
                .insert(shipment.tracking_id.clone(), shipment);
        }
        Write::PutFeeLine(fee) => {
            let lines = state.fees.entry(fee.shipment.clone()).or_default();
            if let Some(slot) = lines.iter_mut().find(|l| l.id == fee.id) {
                *slot = fee;
            } else {
                lines.push(fee);
            }
        }
        Write::DeleteFeeLine { shipment, fee_id } => {
            if let Some(lines) = state.fees.get_mut(&shipment) {
                lines.retain(|l| l.id != fee_id);
            }
        }
        Write::AppendHistory(entry) => {
            state.history.entry(entry.shipment.clone()).or_default().push(entry);
        }
        Write::PutPayment(payment) => {
            state
                .payments
                .entry(payment.shipment.clone())
                .or_default()
                .push(payment);
        }
        Write::DeleteShipment(id) => {
            state.shipments.remove(&id);
            state.fees.remove(&id);
            state.history.remove(&id);
            state.payments.remove(&id);
        }
    }
}

#[async_trait]
impl TrackingStore for InMemoryLedger {
    async fn shipment(&self, id: &TrackingId) -> Result<Option<Shipment>> {
        let state = self.state.read().await;
        Ok(state.shipments.get(id).cloned())
    }

    async fn all_shipments(&self) -> Result<Vec<Shipment>> {
        let state = self.state.read().await;
        let mut shipments: Vec<Shipment> = state.shipments.values().cloned().collect();
        shipments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(shipments)
    }

    async fn fee_lines(&self, id: &TrackingId) -> Result<Vec<FeeLine>> {
        let state = self.state.read().await;
        let mut lines = state.fees.get(id).cloned().unwrap_or_default();
        lines.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(lines)
    }

    async fn history(&self, id: &TrackingId) -> Result<Vec<HistoryEntry>> {
        let state = self.state.read().await;
        let mut entries = state.history.get(id).cloned().unwrap_or_default();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    async fn payments(&self, id: &TrackingId) -> Result<Vec<PaymentTransaction>> {
        let state = self.state.read().await;
        Ok(state.payments.get(id).cloned().unwrap_or_default())
    }

    async fn transaction_id_exists(&self, id: &TransactionId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .flatten()
            .any(|p| p.transaction_id == *id))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(guard) = &batch.guard {
            check_guard(&state, guard)?;
        }
        for write in batch.writes {
            apply(&mut state, write);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::{ChargeAmount, Money};
    use crate::domain::payment::CardDetails;
    use crate::domain::shipment::ShipmentStatus;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn shipment(id: &str) -> Shipment {
        Shipment {
            tracking_id: TrackingId::parse(id).unwrap(),
            owner_name: "Jane Roe".to_string(),
            owner_email: None,
            owner_phone: None,
            owner_address: None,
            status: ShipmentStatus::LabelCreated,
            current_location: None,
            destination: None,
            fee_required: false,
            fee_amount: Money::ZERO,
            weight: None,
            dimensions: None,
            estimated_delivery: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn payment(id: &TrackingId, txn: &str) -> PaymentTransaction {
        let card = CardDetails {
            cardholder_name: "Jane Roe".to_string(),
            card_number: "4111111111111111".to_string(),
            expiry: None,
            cvv: None,
            card_type: None,
        };
        PaymentTransaction::completed(
            TransactionId::parse(txn).unwrap(),
            id.clone(),
            ChargeAmount::new(Money::new(dec!(50.00)).unwrap()).unwrap(),
            &card,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_commit_and_read_back() {
        let store = InMemoryLedger::new();
        let s = shipment("US-9000-TKG-000001");
        let id = s.tracking_id.clone();

        store
            .commit(WriteBatch::new().put_shipment(s.clone()))
            .await
            .unwrap();
        assert_eq!(store.shipment(&id).await.unwrap().unwrap(), s);
        assert!(
            store
                .shipment(&TrackingId::parse("US-9000-TKG-000002").unwrap())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_guard_rejects_whole_batch() {
        let store = InMemoryLedger::new();
        let s = shipment("US-9000-TKG-000001");
        let id = s.tracking_id.clone();
        store
            .commit(
                WriteBatch::new()
                    .put_shipment(s)
                    .put_payment(payment(&id, "TXN-AAAAAAAAAAA1")),
            )
            .await
            .unwrap();

        let cutoff = Utc::now() - Duration::minutes(5);
        let mut changed = store.shipment(&id).await.unwrap().unwrap();
        changed.status = ShipmentStatus::InTransit;
        let err = store
            .commit(
                WriteBatch::new()
                    .guard(Guard::NoCompletedPaymentSince {
                        shipment: id.clone(),
                        cutoff,
                    })
                    .put_payment(payment(&id, "TXN-AAAAAAAAAAA2"))
                    .put_shipment(changed),
            )
            .await
            .unwrap_err();

        match err {
            TrackingError::DuplicatePayment { transaction_id } => {
                assert_eq!(transaction_id, "TXN-AAAAAAAAAAA1");
            }
            other => panic!("expected DuplicatePayment, got {other}"),
        }

        // Nothing from the rejected batch is visible.
        assert_eq!(store.payments(&id).await.unwrap().len(), 1);
        assert_eq!(
            store.shipment(&id).await.unwrap().unwrap().status,
            ShipmentStatus::LabelCreated
        );
    }

    #[tokio::test]
    async fn test_guard_passes_outside_window() {
        let store = InMemoryLedger::new();
        let s = shipment("US-9000-TKG-000001");
        let id = s.tracking_id.clone();

        let mut old_payment = payment(&id, "TXN-AAAAAAAAAAA1");
        old_payment.created_at = Utc::now() - Duration::minutes(10);
        store
            .commit(WriteBatch::new().put_shipment(s).put_payment(old_payment))
            .await
            .unwrap();

        let cutoff = Utc::now() - Duration::minutes(5);
        store
            .commit(
                WriteBatch::new()
                    .guard(Guard::NoCompletedPaymentSince {
                        shipment: id.clone(),
                        cutoff,
                    })
                    .put_payment(payment(&id, "TXN-AAAAAAAAAAA2")),
            )
            .await
            .unwrap();
        assert_eq!(store.payments(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_shipment_cascades() {
        let store = InMemoryLedger::new();
        let s = shipment("US-9000-TKG-000001");
        let id = s.tracking_id.clone();

        let fee = FeeLine {
            id: 1,
            shipment: id.clone(),
            name: "Storage Fee".to_string(),
            amount: Money::new(dec!(42.00)).unwrap(),
            description: None,
            created_at: Utc::now(),
        };
        let entry = HistoryEntry::new(id.clone(), "label_created", None, None);
        store
            .commit(
                WriteBatch::new()
                    .put_shipment(s)
                    .put_fee_line(fee)
                    .append_history(entry)
                    .put_payment(payment(&id, "TXN-AAAAAAAAAAA1")),
            )
            .await
            .unwrap();

        store
            .commit(WriteBatch::new().delete_shipment(id.clone()))
            .await
            .unwrap();

        assert!(store.shipment(&id).await.unwrap().is_none());
        assert!(store.fee_lines(&id).await.unwrap().is_empty());
        assert!(store.history(&id).await.unwrap().is_empty());
        assert!(store.payments(&id).await.unwrap().is_empty());
        assert!(
            !store
                .transaction_id_exists(&TransactionId::parse("TXN-AAAAAAAAAAA1").unwrap())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_put_fee_line_upserts_by_id() {
        let store = InMemoryLedger::new();
        let id = TrackingId::parse("US-9000-TKG-000001").unwrap();
        let mut fee = FeeLine {
            id: 1,
            shipment: id.clone(),
            name: "Storage Fee".to_string(),
            amount: Money::new(dec!(42.00)).unwrap(),
            description: None,
            created_at: Utc::now(),
        };
        store
            .commit(WriteBatch::new().put_fee_line(fee.clone()))
            .await
            .unwrap();

        fee.amount = Money::new(dec!(50.00)).unwrap();
        store
            .commit(WriteBatch::new().put_fee_line(fee))
            .await
            .unwrap();

        let lines = store.fee_lines(&id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].amount.value(), dec!(50.00));
    }
}

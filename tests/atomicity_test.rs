mod common;

use async_trait::async_trait;
use common::{demo_card, held_shipment, ledger_services};
use parceltrack::application::finance::FinanceService;
use parceltrack::domain::fee::FeeLine;
use parceltrack::domain::history::HistoryEntry;
use parceltrack::domain::payment::{PaymentTransaction, TransactionId};
use parceltrack::domain::ports::{TrackingStore, WriteBatch};
use parceltrack::domain::shipment::{Shipment, ShipmentStatus, TrackingId};
use parceltrack::error::{Result, TrackingError};
use parceltrack::infrastructure::in_memory::InMemoryLedger;

/// Store that serves reads from a real ledger but refuses every commit,
/// simulating a storage failure at the transaction boundary.
struct FailingStore {
    inner: InMemoryLedger,
}

#[async_trait]
impl TrackingStore for FailingStore {
    async fn shipment(&self, id: &TrackingId) -> Result<Option<Shipment>> {
        self.inner.shipment(id).await
    }

    async fn all_shipments(&self) -> Result<Vec<Shipment>> {
        self.inner.all_shipments().await
    }

    async fn fee_lines(&self, id: &TrackingId) -> Result<Vec<FeeLine>> {
        self.inner.fee_lines(id).await
    }

    async fn history(&self, id: &TrackingId) -> Result<Vec<HistoryEntry>> {
        self.inner.history(id).await
    }

    async fn payments(&self, id: &TrackingId) -> Result<Vec<PaymentTransaction>> {
        self.inner.payments(id).await
    }

    async fn transaction_id_exists(&self, id: &TransactionId) -> Result<bool> {
        self.inner.transaction_id_exists(id).await
    }

    async fn commit(&self, _batch: WriteBatch) -> Result<()> {
        Err(TrackingError::Storage("injected write failure".to_string()))
    }
}

#[tokio::test]
async fn test_failed_payment_commit_leaves_no_trace() {
    let (ledger, shipments, _) = ledger_services();
    let id = held_shipment(&shipments).await;
    let history_before = ledger.history(&id).await.unwrap().len();

    let flaky = FinanceService::new(Box::new(FailingStore {
        inner: ledger.clone(),
    }));
    let err = flaky.process_payment(&id, demo_card()).await.unwrap_err();
    assert!(matches!(err, TrackingError::Storage(_)));
    assert!(err.to_string().contains("injected write failure"));

    // No transaction record, no shipment field change, no history entry.
    assert!(ledger.payments(&id).await.unwrap().is_empty());
    let shipment = ledger.shipment(&id).await.unwrap().unwrap();
    assert!(shipment.fee_required);
    assert_eq!(shipment.status, ShipmentStatus::LabelCreated);
    assert_eq!(ledger.history(&id).await.unwrap().len(), history_before);
}

#[tokio::test]
async fn test_failed_fee_mutation_leaves_totals_untouched() {
    let (ledger, shipments, _) = ledger_services();
    let id = held_shipment(&shipments).await;

    let flaky = FinanceService::new(Box::new(FailingStore {
        inner: ledger.clone(),
    }));
    let err = flaky
        .add_fee(&id, common::new_fee("Redelivery Fee", rust_decimal_macros::dec!(15.00)))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackingError::Storage(_)));

    assert_eq!(ledger.fee_lines(&id).await.unwrap().len(), 4);
    let shipment = ledger.shipment(&id).await.unwrap().unwrap();
    assert_eq!(
        shipment.fee_amount.value(),
        rust_decimal_macros::dec!(271.00)
    );
}

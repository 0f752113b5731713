#![allow(dead_code)]

use parceltrack::application::finance::FinanceService;
use parceltrack::application::shipments::{NewShipment, ShipmentService};
use parceltrack::domain::fee::NewFeeLine;
use parceltrack::domain::money::Money;
use parceltrack::domain::payment::CardDetails;
use parceltrack::domain::shipment::TrackingId;
use parceltrack::infrastructure::in_memory::InMemoryLedger;
use rust_decimal_macros::dec;

/// Services wired over one shared in-memory ledger.
pub fn ledger_services() -> (InMemoryLedger, ShipmentService, FinanceService) {
    let ledger = InMemoryLedger::new();
    let shipments = ShipmentService::new(Box::new(ledger.clone()));
    let finance = FinanceService::new(Box::new(ledger.clone()));
    (ledger, shipments, finance)
}

/// Creates the canonical held shipment: four customs fee lines totaling
/// 271.00, fee_required set.
pub async fn held_shipment(shipments: &ShipmentService) -> TrackingId {
    let shipment = shipments
        .create_shipment(NewShipment {
            owner_name: "John A. Doe".to_string(),
            current_location: Some("Dallas Distribution Center".to_string()),
            destination: Some("Dallas, TX".to_string()),
            fee_lines: vec![
                new_fee("Import Duty", dec!(125.00)),
                new_fee("Brokerage Fee", dec!(75.50)),
                new_fee("Storage Fee", dec!(42.00)),
                new_fee("Documentation Fee", dec!(28.50)),
            ],
            ..Default::default()
        })
        .await
        .expect("failed to create held shipment");
    shipment.tracking_id
}

pub fn new_fee(name: &str, amount: rust_decimal::Decimal) -> NewFeeLine {
    NewFeeLine {
        name: name.to_string(),
        amount: Money::new(amount).expect("fee amounts in tests are non-negative"),
        description: None,
    }
}

pub fn demo_card() -> CardDetails {
    CardDetails {
        cardholder_name: "John A. Doe".to_string(),
        card_number: "4111 1111 1111 1111".to_string(),
        expiry: Some("12/28".to_string()),
        cvv: Some("123".to_string()),
        card_type: Some("visa".to_string()),
    }
}

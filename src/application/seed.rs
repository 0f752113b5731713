use crate::application::finance::FinanceService;
use crate::application::shipments::{NewShipment, ShipmentService};
use crate::domain::fee::NewFeeLine;
use crate::domain::money::Money;
use crate::domain::shipment::{ShipmentStatus, TrackingId};
use crate::error::Result;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

/// Seeds the demo data set through the public services: one shipment held
/// for outstanding customs fees and one fee-free shipment already
/// delivered. Returns the tracking ids in that order.
pub async fn seed_demo(
    shipments: &ShipmentService,
    finance: &FinanceService,
) -> Result<Vec<TrackingId>> {
    let held = shipments
        .create_shipment(NewShipment {
            tracking_id: Some(TrackingId::parse("US-9000-TKG-938711")?),
            owner_name: "John A. Doe".to_string(),
            owner_email: Some("john.doe@example.com".to_string()),
            owner_phone: Some("(555) 123-4567".to_string()),
            owner_address: Some("1247 Commerce Street, Dallas, TX 75201".to_string()),
            current_location: Some("Los Angeles, CA".to_string()),
            destination: Some("Dallas, TX".to_string()),
            weight: Some(dec!(12.5)),
            dimensions: Some("18x12x10 inches".to_string()),
            estimated_delivery: Some(Utc::now() + Duration::days(2)),
            notes: None,
            fee_lines: vec![
                demo_fee("Import Duty", dec!(125.00), "US Customs import duty"),
                demo_fee("Brokerage Fee", dec!(75.50), "Customs clearance brokerage"),
                demo_fee("Storage Fee", dec!(42.00), "Warehouse storage charges"),
                demo_fee("Documentation Fee", dec!(28.50), "Processing and documentation"),
            ],
        })
        .await?;
    let held_id = held.tracking_id;

    shipments
        .advance_status(
            &held_id,
            ShipmentStatus::PickedUp,
            Some("Los Angeles, CA".to_string()),
            Some("Package picked up by carrier".to_string()),
        )
        .await?;
    shipments
        .advance_status(
            &held_id,
            ShipmentStatus::InTransit,
            Some("Phoenix, AZ".to_string()),
            Some("In transit to destination".to_string()),
        )
        .await?;
    shipments
        .advance_status(
            &held_id,
            ShipmentStatus::ArrivedFacility,
            Some("Dallas Distribution Center".to_string()),
            Some("Arrived at regional facility".to_string()),
        )
        .await?;
    shipments
        .advance_status(
            &held_id,
            ShipmentStatus::ProcessingHold,
            Some("Dallas Distribution Center".to_string()),
            Some("Held pending payment of outstanding customs fees".to_string()),
        )
        .await?;

    // Sanity: seeded fee lines must already match the cached total.
    finance.recalculate(&held_id).await?;

    let delivered = shipments
        .create_shipment(NewShipment {
            owner_name: "Maria Santos".to_string(),
            owner_email: Some("maria.santos@example.com".to_string()),
            current_location: Some("Austin, TX".to_string()),
            destination: Some("Austin, TX".to_string()),
            ..Default::default()
        })
        .await?;
    let delivered_id = delivered.tracking_id;

    for (status, location, note) in [
        (ShipmentStatus::PickedUp, "Houston, TX", "Package picked up by carrier"),
        (ShipmentStatus::InTransit, "Houston, TX", "In transit to destination"),
        (
            ShipmentStatus::OutForDelivery,
            "Austin, TX",
            "Out for delivery",
        ),
        (ShipmentStatus::Delivered, "Austin, TX", "Delivered to recipient"),
    ] {
        shipments
            .advance_status(
                &delivered_id,
                status,
                Some(location.to_string()),
                Some(note.to_string()),
            )
            .await?;
    }

    Ok(vec![held_id, delivered_id])
}

fn demo_fee(name: &str, amount: rust_decimal::Decimal, description: &str) -> NewFeeLine {
    NewFeeLine {
        name: name.to_string(),
        // Amounts are literal non-negative constants.
        amount: Money::new(amount).unwrap_or(Money::ZERO),
        description: Some(description.to_string()),
    }
}

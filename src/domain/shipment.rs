use crate::domain::money::Money;
use crate::error::{Result, TrackingError};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const TRACKING_PREFIX: &str = "US-9000-TKG-";

/// Externally-facing shipment identifier: `US-9000-TKG-` plus 6 digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingId(String);

impl TrackingId {
    /// Validates an externally supplied tracking id.
    pub fn parse(value: &str) -> Result<Self> {
        let suffix = value.strip_prefix(TRACKING_PREFIX).ok_or_else(|| {
            TrackingError::Validation(format!("Malformed tracking id: {value}"))
        })?;
        if suffix.len() != 6 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TrackingError::Validation(format!(
                "Malformed tracking id: {value}"
            )));
        }
        Ok(Self(value.to_string()))
    }

    /// Draws a random candidate id. Uniqueness is checked against the store
    /// by the caller, which redraws on collision.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let digits: String = (0..6)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Self(format!("{TRACKING_PREFIX}{digits}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    LabelCreated,
    PickedUp,
    InTransit,
    ArrivedFacility,
    ProcessingHold,
    OutForDelivery,
    Delivered,
}

impl ShipmentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LabelCreated => "label_created",
            Self::PickedUp => "picked_up",
            Self::InTransit => "in_transit",
            Self::ArrivedFacility => "arrived_facility",
            Self::ProcessingHold => "processing_hold",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
        }
    }

    /// `delivered` is terminal: no further transitions are modeled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Forward transition table used only in strict mode. The permissive
    /// default accepts any operator-driven transition, matching the admin
    /// console behavior this system replaces.
    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        use ShipmentStatus::*;
        matches!(
            (self, next),
            (LabelCreated, PickedUp)
                | (PickedUp, InTransit)
                | (InTransit, ArrivedFacility)
                | (ArrivedFacility, ProcessingHold)
                | (ArrivedFacility, OutForDelivery)
                | (ProcessingHold, InTransit)
                | (ProcessingHold, OutForDelivery)
                | (OutForDelivery, Delivered)
        )
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ShipmentStatus {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "label_created" => Ok(Self::LabelCreated),
            "picked_up" => Ok(Self::PickedUp),
            "in_transit" => Ok(Self::InTransit),
            "arrived_facility" => Ok(Self::ArrivedFacility),
            "processing_hold" => Ok(Self::ProcessingHold),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            other => Err(TrackingError::Validation(format!(
                "Unknown shipment status: {other}"
            ))),
        }
    }
}

/// The aggregate root: identity, status, location, and the cached fee total.
///
/// `fee_amount` and `fee_required` are maintained by the reconciliation
/// paths in the finance service; callers never write them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub tracking_id: TrackingId,
    pub owner_name: String,
    pub owner_email: Option<String>,
    pub owner_phone: Option<String>,
    pub owner_address: Option<String>,
    pub status: ShipmentStatus,
    pub current_location: Option<String>,
    pub destination: Option<String>,
    pub fee_required: bool,
    pub fee_amount: Money,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// Writes a freshly reconciled fee total into the cached fields.
    pub fn apply_fee_total(&mut self, total: Money, at: DateTime<Utc>) {
        self.fee_amount = total;
        self.fee_required = total.is_positive();
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tracking_id_parse() {
        assert!(TrackingId::parse("US-9000-TKG-938711").is_ok());
        assert!(TrackingId::parse("US-9000-TKG-93871").is_err());
        assert!(TrackingId::parse("US-9000-TKG-93871a").is_err());
        assert!(TrackingId::parse("US-9001-TKG-938711").is_err());
        assert!(TrackingId::parse("938711").is_err());
    }

    #[test]
    fn test_tracking_id_random_format() {
        for _ in 0..100 {
            let id = TrackingId::random();
            assert!(TrackingId::parse(id.as_str()).is_ok(), "bad id {id}");
        }
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            ShipmentStatus::LabelCreated,
            ShipmentStatus::PickedUp,
            ShipmentStatus::InTransit,
            ShipmentStatus::ArrivedFacility,
            ShipmentStatus::ProcessingHold,
            ShipmentStatus::OutForDelivery,
            ShipmentStatus::Delivered,
        ] {
            assert_eq!(s.label().parse::<ShipmentStatus>().unwrap(), s);
        }
    }

    #[test]
    fn test_transition_table() {
        use ShipmentStatus::*;
        assert!(LabelCreated.can_transition_to(PickedUp));
        assert!(ArrivedFacility.can_transition_to(ProcessingHold));
        assert!(ProcessingHold.can_transition_to(InTransit));
        assert!(OutForDelivery.can_transition_to(Delivered));
        // No skipping forward, no moving backward, no leaving delivered.
        assert!(!LabelCreated.can_transition_to(InTransit));
        assert!(!InTransit.can_transition_to(PickedUp));
        assert!(!Delivered.can_transition_to(OutForDelivery));
        assert!(Delivered.is_terminal());
    }

    #[test]
    fn test_apply_fee_total() {
        let mut shipment = Shipment {
            tracking_id: TrackingId::parse("US-9000-TKG-000001").unwrap(),
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
        };

        shipment.apply_fee_total(Money::new(dec!(10.00)).unwrap(), Utc::now());
        assert!(shipment.fee_required);
        assert_eq!(shipment.fee_amount.value(), dec!(10.00));

        shipment.apply_fee_total(Money::ZERO, Utc::now());
        assert!(!shipment.fee_required);
    }
}

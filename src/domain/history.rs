use crate::domain::shipment::TrackingId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a shipment's append-only transition ledger.
///
/// The status field is a free-text label rather than `ShipmentStatus`:
/// payment completion is recorded here as `payment_completed`, which is not
/// a shipment state. Entries are never mutated or deleted except by a
/// cascading shipment delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub shipment: TrackingId,
    pub status: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        shipment: TrackingId,
        status: impl Into<String>,
        location: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            shipment,
            status: status.into(),
            location,
            description,
            timestamp: Utc::now(),
        }
    }
}

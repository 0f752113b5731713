use crate::domain::money::Money;
use crate::domain::shipment::TrackingId;
use crate::error::{Result, TrackingError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One itemized charge attached to a shipment.
///
/// Fee lines are exclusively owned by their shipment; deleting the shipment
/// cascades to them. Every create/update/delete of a fee line recomputes the
/// owner's cached total in the same commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeLine {
    /// Sequence number, unique within the owning shipment.
    pub id: u64,
    pub shipment: TrackingId,
    pub name: String,
    pub amount: Money,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a fee line.
#[derive(Debug, Clone)]
pub struct NewFeeLine {
    pub name: String,
    pub amount: Money,
    pub description: Option<String>,
}

impl FeeLine {
    pub fn new(id: u64, shipment: TrackingId, input: NewFeeLine, at: DateTime<Utc>) -> Result<Self> {
        if input.name.trim().is_empty() {
            return Err(TrackingError::Validation(
                "Fee name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id,
            shipment,
            name: input.name,
            amount: input.amount,
            description: input.description,
            created_at: at,
        })
    }
}

/// Partial update of a fee line; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct FeeLineUpdate {
    pub name: Option<String>,
    pub amount: Option<Money>,
    pub description: Option<String>,
}

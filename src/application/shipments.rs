use crate::domain::fee::{FeeLine, NewFeeLine};
use crate::domain::history::HistoryEntry;
use crate::domain::money::Money;
use crate::domain::ports::{StoreBox, WriteBatch};
use crate::domain::shipment::{Shipment, ShipmentStatus, TrackingId};
use crate::error::{Result, TrackingError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Input for the shipment factory. Fee lines are explicit: callers supply
/// them (or an empty list) at creation time; nothing is injected by default.
#[derive(Debug, Clone, Default)]
pub struct NewShipment {
    /// Externally assigned id; generated (collision-checked) when absent.
    pub tracking_id: Option<TrackingId>,
    pub owner_name: String,
    pub owner_email: Option<String>,
    pub owner_phone: Option<String>,
    pub owner_address: Option<String>,
    pub current_location: Option<String>,
    pub destination: Option<String>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub fee_lines: Vec<NewFeeLine>,
}

/// A shipment together with its transition ledger, for tracking views.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingView {
    pub shipment: Shipment,
    pub history: Vec<HistoryEntry>,
}

/// Shipment lifecycle operations: creation, lookup, status transitions and
/// cascading deletion.
pub struct ShipmentService {
    store: StoreBox,
    strict_transitions: bool,
}

impl ShipmentService {
    pub fn new(store: StoreBox) -> Self {
        Self {
            store,
            strict_transitions: false,
        }
    }

    /// Enables the forward transition table. The permissive default accepts
    /// any operator-driven transition.
    pub fn with_strict_transitions(mut self) -> Self {
        self.strict_transitions = true;
        self
    }

    /// Creates a shipment in `label_created`, persisting it together with
    /// its fee lines and the initial history entry in one commit. Cached
    /// fee totals are derived from the supplied lines.
    pub async fn create_shipment(&self, input: NewShipment) -> Result<Shipment> {
        if input.owner_name.trim().is_empty() {
            return Err(TrackingError::Validation(
                "Owner name must not be empty".to_string(),
            ));
        }

        let tracking_id = match input.tracking_id {
            Some(id) => {
                if self.store.shipment(&id).await?.is_some() {
                    return Err(TrackingError::Validation(format!(
                        "Tracking id already in use: {id}"
                    )));
                }
                id
            }
            None => self.unique_tracking_id().await?,
        };

        let now = Utc::now();
        let mut lines = Vec::with_capacity(input.fee_lines.len());
        for (idx, line) in input.fee_lines.into_iter().enumerate() {
            lines.push(FeeLine::new(idx as u64 + 1, tracking_id.clone(), line, now)?);
        }
        let total: Money = lines.iter().map(|l| l.amount).sum();

        let shipment = Shipment {
            tracking_id: tracking_id.clone(),
            owner_name: input.owner_name,
            owner_email: input.owner_email,
            owner_phone: input.owner_phone,
            owner_address: input.owner_address,
            status: ShipmentStatus::LabelCreated,
            current_location: input.current_location,
            destination: input.destination,
            fee_required: total.is_positive(),
            fee_amount: total,
            weight: input.weight,
            dimensions: input.dimensions,
            estimated_delivery: input.estimated_delivery,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };

        let entry = HistoryEntry {
            shipment: tracking_id.clone(),
            status: ShipmentStatus::LabelCreated.label().to_string(),
            location: shipment.current_location.clone(),
            description: Some("Shipping label created".to_string()),
            timestamp: now,
        };

        let mut batch = WriteBatch::new().put_shipment(shipment.clone());
        for line in lines {
            batch = batch.put_fee_line(line);
        }
        batch = batch.append_history(entry);
        self.store.commit(batch).await?;

        tracing::info!(tracking_id = %tracking_id, "shipment created");
        Ok(shipment)
    }

    pub async fn shipment(&self, id: &TrackingId) -> Result<Shipment> {
        self.store
            .shipment(id)
            .await?
            .ok_or_else(|| TrackingError::NotFound(format!("Shipment {id}")))
    }

    pub async fn list(&self) -> Result<Vec<Shipment>> {
        self.store.all_shipments().await
    }

    /// Shipment plus its full transition ledger.
    pub async fn track(&self, id: &TrackingId) -> Result<TrackingView> {
        let shipment = self.shipment(id).await?;
        let history = self.store.history(id).await?;
        Ok(TrackingView { shipment, history })
    }

    /// Moves the shipment to a new status, appending the history entry in
    /// the same commit. Strict mode enforces the forward table and the
    /// `delivered` terminal; the default accepts any transition.
    pub async fn advance_status(
        &self,
        id: &TrackingId,
        status: ShipmentStatus,
        location: Option<String>,
        description: Option<String>,
    ) -> Result<Shipment> {
        let mut shipment = self.shipment(id).await?;

        if self.strict_transitions {
            if shipment.status.is_terminal() {
                return Err(TrackingError::Validation(format!(
                    "Shipment {id} is delivered; no further transitions"
                )));
            }
            if !shipment.status.can_transition_to(status) {
                return Err(TrackingError::Validation(format!(
                    "Illegal transition {} -> {}",
                    shipment.status, status
                )));
            }
        }

        let now = Utc::now();
        shipment.status = status;
        if location.is_some() {
            shipment.current_location = location.clone();
        }
        shipment.updated_at = now;

        let entry = HistoryEntry {
            shipment: id.clone(),
            status: status.label().to_string(),
            location: shipment.current_location.clone(),
            description: description
                .or_else(|| Some(format!("Status changed to {status}"))),
            timestamp: now,
        };

        self.store
            .commit(
                WriteBatch::new()
                    .put_shipment(shipment.clone())
                    .append_history(entry),
            )
            .await?;
        Ok(shipment)
    }

    /// Removes the shipment and everything attached to it: fee lines,
    /// history entries, payment records.
    pub async fn delete_shipment(&self, id: &TrackingId) -> Result<()> {
        // Existence check so callers get NotFound rather than a silent no-op.
        self.shipment(id).await?;
        self.store
            .commit(WriteBatch::new().delete_shipment(id.clone()))
            .await
    }

    async fn unique_tracking_id(&self) -> Result<TrackingId> {
        loop {
            let candidate = TrackingId::random();
            if self.store.shipment(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
    }
}

use crate::domain::money::ChargeAmount;
use crate::domain::shipment::TrackingId;
use crate::error::{Result, TrackingError};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const TXN_PREFIX: &str = "TXN-";
const TXN_SUFFIX_LEN: usize = 12;
const TXN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Payment transaction identifier: `TXN-` plus 12 uppercase alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn parse(value: &str) -> Result<Self> {
        let suffix = value.strip_prefix(TXN_PREFIX).ok_or_else(|| {
            TrackingError::Validation(format!("Malformed transaction id: {value}"))
        })?;
        if suffix.len() != TXN_SUFFIX_LEN
            || !suffix.bytes().all(|b| TXN_CHARSET.contains(&b))
        {
            return Err(TrackingError::Validation(format!(
                "Malformed transaction id: {value}"
            )));
        }
        Ok(Self(value.to_string()))
    }

    /// Draws a random candidate id; the caller redraws on store collision.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..TXN_SUFFIX_LEN)
            .map(|_| char::from(TXN_CHARSET[rng.gen_range(0..TXN_CHARSET.len())]))
            .collect();
        Self(format!("{TXN_PREFIX}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// Card input for the simulated processor.
///
/// Only the cardholder name and the trailing four digits ever reach storage;
/// the full number, expiry and CVV are dropped after validation.
#[derive(Debug, Clone)]
pub struct CardDetails {
    pub cardholder_name: String,
    pub card_number: String,
    pub expiry: Option<String>,
    pub cvv: Option<String>,
    pub card_type: Option<String>,
}

impl CardDetails {
    /// Simulated-processor validation: both fields present, at least four
    /// characters of card number after stripping whitespace. No Luhn check,
    /// no network call.
    pub fn validate(&self) -> Result<()> {
        if self.cardholder_name.trim().is_empty() || self.card_number.trim().is_empty() {
            return Err(TrackingError::InvalidPaymentInput(
                "Missing required payment information".to_string(),
            ));
        }
        if self.sanitized_number().len() < 4 {
            return Err(TrackingError::InvalidPaymentInput(
                "Invalid card number".to_string(),
            ));
        }
        Ok(())
    }

    fn sanitized_number(&self) -> String {
        self.card_number
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    }

    pub fn last_four(&self) -> String {
        let digits = self.sanitized_number();
        let chars: Vec<char> = digits.chars().collect();
        let start = chars.len().saturating_sub(4);
        chars[start..].iter().collect()
    }
}

/// A simulated payment, created and completed in one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub transaction_id: TransactionId,
    pub shipment: TrackingId,
    pub amount: ChargeAmount,
    pub status: PaymentStatus,
    pub cardholder_name: String,
    pub card_last_four: String,
    pub card_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl PaymentTransaction {
    pub fn completed(
        transaction_id: TransactionId,
        shipment: TrackingId,
        amount: ChargeAmount,
        card: &CardDetails,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            shipment,
            amount,
            status: PaymentStatus::Completed,
            cardholder_name: card.cardholder_name.clone(),
            card_last_four: card.last_four(),
            card_type: card.card_type.clone(),
            created_at: at,
            completed_at: Some(at),
            notes: None,
        }
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackingError>;

/// Error taxonomy for the tracking and payment core.
///
/// Validation and business-rule failures are rejected before any write and
/// carry the message shown to the caller verbatim. `Storage` is the
/// catch-all for persistence failures; the enclosing transaction has been
/// rolled back by the time it surfaces.
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No payment required for this shipment")]
    PaymentNotRequired,

    #[error("Payment already processed: {transaction_id}")]
    DuplicatePayment { transaction_id: String },

    #[error("{0}")]
    InvalidPaymentInput(String),

    #[error("Invalid fee amount")]
    InvalidAmount,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackingError {
    /// Wraps any storage-layer failure, passing the message through.
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        Self::Storage(err.to_string())
    }
}

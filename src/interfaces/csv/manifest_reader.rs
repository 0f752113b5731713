use crate::error::{Result, TrackingError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a shipment manifest.
///
/// Rows are grouped by tracking id: the first row seen for an id describes
/// the shipment, and every row carrying fee columns appends a fee line to
/// it. A row may do both.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ManifestRecord {
    /// Blank to let the system generate one; rows for a generated id must
    /// then repeat the same owner name.
    pub tracking_id: Option<String>,
    pub owner_name: String,
    pub destination: Option<String>,
    pub location: Option<String>,
    pub fee_name: Option<String>,
    pub fee_amount: Option<Decimal>,
    pub fee_description: Option<String>,
}

/// Streaming CSV reader for shipment manifests.
pub struct ManifestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ManifestReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn records(self) -> impl Iterator<Item = Result<ManifestRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(TrackingError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str =
        "tracking_id, owner_name, destination, location, fee_name, fee_amount, fee_description";

    #[test]
    fn test_reader_full_row() {
        let data = format!(
            "{HEADER}\nUS-9000-TKG-938711, John A. Doe, \"Dallas, TX\", \"Los Angeles, CA\", Import Duty, 125.00, US Customs import duty"
        );
        let reader = ManifestReader::new(data.as_bytes());
        let records: Vec<_> = reader.records().collect();

        assert_eq!(records.len(), 1);
        let record = records[0].as_ref().unwrap();
        assert_eq!(record.tracking_id.as_deref(), Some("US-9000-TKG-938711"));
        assert_eq!(record.owner_name, "John A. Doe");
        assert_eq!(record.fee_name.as_deref(), Some("Import Duty"));
        assert_eq!(record.fee_amount, Some(dec!(125.00)));
    }

    #[test]
    fn test_reader_shipment_only_row() {
        let data = format!("{HEADER}\n, Maria Santos, \"Austin, TX\", , , , ");
        let reader = ManifestReader::new(data.as_bytes());
        let record = reader.records().next().unwrap().unwrap();

        assert_eq!(record.tracking_id, None);
        assert_eq!(record.owner_name, "Maria Santos");
        assert_eq!(record.fee_name, None);
        assert_eq!(record.fee_amount, None);
    }

    #[test]
    fn test_reader_malformed_amount() {
        let data = format!("{HEADER}\nUS-9000-TKG-938711, John A. Doe, , , Import Duty, not-a-number, ");
        let reader = ManifestReader::new(data.as_bytes());
        let records: Vec<_> = reader.records().collect();
        assert!(records[0].is_err());
    }
}

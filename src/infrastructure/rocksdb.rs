use crate::domain::fee::FeeLine;
use crate::domain::history::HistoryEntry;
use crate::domain::payment::{PaymentStatus, PaymentTransaction, TransactionId};
use crate::domain::ports::{Guard, TrackingStore, Write, WriteBatch};
use crate::domain::shipment::{Shipment, TrackingId};
use crate::error::{Result, TrackingError};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Column Family for shipment records, keyed by tracking id.
pub const CF_SHIPMENTS: &str = "shipments";
/// Column Family for fee lines, keyed `{tracking_id}/{fee_id}`.
pub const CF_FEES: &str = "fees";
/// Column Family for history entries, keyed `{tracking_id}/{micros}/{seq}`.
pub const CF_HISTORY: &str = "history";
/// Column Family for payments, keyed `{tracking_id}/{transaction_id}`.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping transaction id to tracking id, for global
/// uniqueness checks.
pub const CF_TXN_INDEX: &str = "txn_index";

const ALL_CFS: [&str; 5] = [CF_SHIPMENTS, CF_FEES, CF_HISTORY, CF_PAYMENTS, CF_TXN_INDEX];

/// Persistent store backed by RocksDB.
///
/// Records are stored as JSON per Column Family. A [`WriteBatch`] maps onto
/// one `rocksdb::WriteBatch`, which RocksDB applies atomically; the commit
/// mutex serializes guard evaluation with the write it protects, matching
/// the in-memory ledger's exclusion semantics.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksStore {
    /// Opens or creates the database at `path`, ensuring all column
    /// families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)
            .map_err(TrackingError::storage)?;
        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| TrackingError::Storage(format!("Column family {name} not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key).map_err(TrackingError::storage)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(TrackingError::storage)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Scans one column family for entries whose key starts with `prefix`,
    /// returning `(key, value)` pairs in key order.
    fn scan_prefix<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        prefix: &str,
    ) -> Result<Vec<(Vec<u8>, T)>> {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        let iter = self.db.iterator_cf(
            cf,
            IteratorMode::From(prefix.as_bytes(), rocksdb::Direction::Forward),
        );
        for item in iter {
            let (key, value) = item.map_err(TrackingError::storage)?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let record = serde_json::from_slice(&value).map_err(TrackingError::storage)?;
            out.push((key.to_vec(), record));
        }
        Ok(out)
    }

    fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(TrackingError::storage)
    }

    fn check_guard(&self, guard: &Guard) -> Result<()> {
        match guard {
            Guard::NoCompletedPaymentSince { shipment, cutoff } => {
                let payments: Vec<(Vec<u8>, PaymentTransaction)> =
                    self.scan_prefix(CF_PAYMENTS, &format!("{shipment}/"))?;
                if let Some((_, existing)) = payments.iter().find(|(_, p)| {
                    p.status == PaymentStatus::Completed && p.created_at >= *cutoff
                }) {
                    return Err(TrackingError::DuplicatePayment {
                        transaction_id: existing.transaction_id.to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    fn stage(&self, batch: &mut rocksdb::WriteBatch, seq: usize, write: &Write) -> Result<()> {
        match write {
            Write::PutShipment(shipment) => {
                let cf = self.cf(CF_SHIPMENTS)?;
                batch.put_cf(cf, shipment.tracking_id.as_str(), Self::to_json(shipment)?);
            }
            Write::PutFeeLine(fee) => {
                let cf = self.cf(CF_FEES)?;
                batch.put_cf(cf, fee_key(&fee.shipment, fee.id), Self::to_json(fee)?);
            }
            Write::DeleteFeeLine { shipment, fee_id } => {
                let cf = self.cf(CF_FEES)?;
                batch.delete_cf(cf, fee_key(shipment, *fee_id));
            }
            Write::AppendHistory(entry) => {
                let cf = self.cf(CF_HISTORY)?;
                let key = format!(
                    "{}/{:020}/{:04}",
                    entry.shipment,
                    entry.timestamp.timestamp_micros(),
                    seq
                );
                batch.put_cf(cf, key, Self::to_json(entry)?);
            }
            Write::PutPayment(payment) => {
                let cf = self.cf(CF_PAYMENTS)?;
                let key = format!("{}/{}", payment.shipment, payment.transaction_id);
                batch.put_cf(cf, key, Self::to_json(payment)?);
                let index = self.cf(CF_TXN_INDEX)?;
                batch.put_cf(
                    index,
                    payment.transaction_id.as_str(),
                    payment.shipment.as_str(),
                );
            }
            Write::DeleteShipment(id) => {
                let prefix = format!("{id}/");
                let cf = self.cf(CF_SHIPMENTS)?;
                batch.delete_cf(cf, id.as_str());

                let fees = self.cf(CF_FEES)?;
                for (key, _) in self.scan_prefix::<FeeLine>(CF_FEES, &prefix)? {
                    batch.delete_cf(fees, key);
                }
                let history = self.cf(CF_HISTORY)?;
                for (key, _) in self.scan_prefix::<HistoryEntry>(CF_HISTORY, &prefix)? {
                    batch.delete_cf(history, key);
                }
                let payments = self.cf(CF_PAYMENTS)?;
                let index = self.cf(CF_TXN_INDEX)?;
                for (key, payment) in
                    self.scan_prefix::<PaymentTransaction>(CF_PAYMENTS, &prefix)?
                {
                    batch.delete_cf(payments, key);
                    batch.delete_cf(index, payment.transaction_id.as_str());
                }
            }
        }
        Ok(())
    }
}

fn fee_key(shipment: &TrackingId, fee_id: u64) -> String {
    format!("{shipment}/{fee_id:010}")
}

#[async_trait]
impl TrackingStore for RocksStore {
    async fn shipment(&self, id: &TrackingId) -> Result<Option<Shipment>> {
        self.get_json(CF_SHIPMENTS, id.as_str().as_bytes())
    }

    async fn all_shipments(&self) -> Result<Vec<Shipment>> {
        let cf = self.cf(CF_SHIPMENTS)?;
        let mut shipments = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(TrackingError::storage)?;
            let shipment: Shipment =
                serde_json::from_slice(&value).map_err(TrackingError::storage)?;
            shipments.push(shipment);
        }
        shipments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(shipments)
    }

    async fn fee_lines(&self, id: &TrackingId) -> Result<Vec<FeeLine>> {
        let mut lines: Vec<FeeLine> = self
            .scan_prefix(CF_FEES, &format!("{id}/"))?
            .into_iter()
            .map(|(_, line)| line)
            .collect();
        lines.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(lines)
    }

    async fn history(&self, id: &TrackingId) -> Result<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> = self
            .scan_prefix(CF_HISTORY, &format!("{id}/"))?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(entries)
    }

    async fn payments(&self, id: &TrackingId) -> Result<Vec<PaymentTransaction>> {
        Ok(self
            .scan_prefix(CF_PAYMENTS, &format!("{id}/"))?
            .into_iter()
            .map(|(_, payment)| payment)
            .collect())
    }

    async fn transaction_id_exists(&self, id: &TransactionId) -> Result<bool> {
        let cf = self.cf(CF_TXN_INDEX)?;
        let found = self
            .db
            .get_pinned_cf(cf, id.as_str())
            .map_err(TrackingError::storage)?;
        Ok(found.is_some())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut staged = rocksdb::WriteBatch::default();
        // Synchronous section: the lock covers guard evaluation and the
        // atomic write, nothing here awaits.
        let _exclusive = self
            .commit_lock
            .lock()
            .map_err(|_| TrackingError::Storage("Commit lock poisoned".to_string()))?;

        if let Some(guard) = &batch.guard {
            self.check_guard(guard)?;
        }
        for (seq, write) in batch.writes.iter().enumerate() {
            self.stage(&mut staged, seq, write)?;
        }
        self.db.write(staged).map_err(TrackingError::storage)
    }
}

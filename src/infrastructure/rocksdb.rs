use crate::domain::invoice::Invoice;
use crate::domain::payment::Payment;
use crate::domain::ports::{InvoiceStore, PaymentStore};
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing payment records, keyed by payment id.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for storing invoices, keyed by invoice id.
pub const CF_INVOICES: &str = "invoices";

/// A persistent store implementation using RocksDB.
///
/// Payments and invoices live in separate Column Families. Lookups other than by id
/// scan the payments family, which is fine for a single gateway's volume.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("payments" and "invoices") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());
        let cf_invoices = ColumnFamilyDescriptor::new(CF_INVOICES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_payments, cf_invoices])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ReconcileError::Storage(format!("Column family {} not found", name)))
    }

    fn put<T: serde::Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    /// The newest matching payment by `created`.
    ///
    /// RocksDB keeps no insertion order, so equal timestamps resolve to the greatest id.
    /// The in-memory store resolves them to the last inserted record instead.
    fn latest_payment(&self, filter: impl Fn(&Payment) -> bool) -> Result<Option<Payment>> {
        let payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        Ok(payments
            .into_iter()
            .filter(|p| filter(p))
            .max_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id))))
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn upsert(&self, payment: Payment) -> Result<()> {
        self.put(CF_PAYMENTS, &payment.id, &payment)
    }

    async fn get(&self, payment_id: &str) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, payment_id)
    }

    async fn find_by_transaction(&self, txid: &str, address: &str) -> Result<Option<Payment>> {
        let payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        Ok(payments.into_iter().find(|p| p.matches(txid, address)))
    }

    async fn latest_for_address(&self, address: &str) -> Result<Option<Payment>> {
        self.latest_payment(|p| p.address == address)
    }

    async fn latest_with_block_hash(&self) -> Result<Option<Payment>> {
        self.latest_payment(|p| p.blockhash.is_some())
    }

    async fn for_invoice(&self, invoice_id: &str) -> Result<Vec<Payment>> {
        let payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        Ok(payments
            .into_iter()
            .filter(|p| p.invoice_id == invoice_id)
            .collect())
    }
}

#[async_trait]
impl InvoiceStore for RocksDBStore {
    async fn store(&self, invoice: Invoice) -> Result<()> {
        self.put(CF_INVOICES, &invoice.id, &invoice)
    }

    async fn get(&self, invoice_id: &str) -> Result<Option<Invoice>> {
        self.get_json(CF_INVOICES, invoice_id)
    }

    async fn all_invoices(&self) -> Result<Vec<Invoice>> {
        self.scan(CF_INVOICES)
    }
}

use crate::domain::invoice::Invoice;
use crate::domain::payment::Payment;
use crate::domain::ports::{InvoiceStore, PaymentStore};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for payment records.
///
/// Payments are kept in insertion order so that "latest" lookups with equal
/// creation timestamps resolve to the most recently inserted record. The RocksDB store
/// has no insertion order and resolves such ties by id.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<Vec<Payment>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn latest<'a>(payments: impl Iterator<Item = &'a Payment>) -> Option<&'a Payment> {
    payments.fold(None, |latest, payment| match latest {
        Some(current) if payment.created < current.created => Some(current),
        _ => Some(payment),
    })
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn upsert(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        match payments.iter_mut().find(|existing| existing.id == payment.id) {
            Some(existing) => *existing = payment,
            None => payments.push(payment),
        }
        Ok(())
    }

    async fn get(&self, payment_id: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.iter().find(|p| p.id == payment_id).cloned())
    }

    async fn find_by_transaction(&self, txid: &str, address: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.iter().find(|p| p.matches(txid, address)).cloned())
    }

    async fn latest_for_address(&self, address: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(latest(payments.iter().filter(|p| p.address == address)).cloned())
    }

    async fn latest_with_block_hash(&self) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(latest(payments.iter().filter(|p| p.blockhash.is_some())).cloned())
    }

    async fn for_invoice(&self, invoice_id: &str) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id)
            .cloned()
            .collect())
    }
}

/// A thread-safe in-memory store for invoices.
#[derive(Default, Clone)]
pub struct InMemoryInvoiceStore {
    invoices: Arc<RwLock<HashMap<String, Invoice>>>,
}

impl InMemoryInvoiceStore {
    /// Creates a new, empty in-memory invoice store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    async fn store(&self, invoice: Invoice) -> Result<()> {
        let mut invoices = self.invoices.write().await;
        invoices.insert(invoice.id.clone(), invoice);
        Ok(())
    }

    async fn get(&self, invoice_id: &str) -> Result<Option<Invoice>> {
        let invoices = self.invoices.read().await;
        Ok(invoices.get(invoice_id).cloned())
    }

    async fn all_invoices(&self) -> Result<Vec<Invoice>> {
        let invoices = self.invoices.read().await;
        let mut all: Vec<Invoice> = invoices.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

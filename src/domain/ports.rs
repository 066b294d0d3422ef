use super::amounts::Currency;
use super::chain::{Block, BlockHash, SinceBlock, WalletTransaction};
use super::invoice::Invoice;
use super::payment::Payment;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

/// The wallet node the scanner reads from.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Returns `ReconcileError::UnknownBlock` when the node has never seen `hash`.
    async fn get_block(&self, hash: &BlockHash) -> Result<Block>;
    async fn get_block_hash(&self, height: u64) -> Result<BlockHash>;
    async fn list_since_block(&self, hash: &BlockHash) -> Result<SinceBlock>;
    async fn get_transaction(&self, txid: &str) -> Result<WalletTransaction>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts or replaces the payment with the same `id`.
    async fn upsert(&self, payment: Payment) -> Result<()>;
    async fn get(&self, payment_id: &str) -> Result<Option<Payment>>;
    async fn find_by_transaction(&self, txid: &str, address: &str) -> Result<Option<Payment>>;
    /// The most recently created payment for `address`, with or without a txid.
    async fn latest_for_address(&self, address: &str) -> Result<Option<Payment>>;
    /// The most recently created payment that has been seen in a block.
    async fn latest_with_block_hash(&self) -> Result<Option<Payment>>;
    async fn for_invoice(&self, invoice_id: &str) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn store(&self, invoice: Invoice) -> Result<()>;
    async fn get(&self, invoice_id: &str) -> Result<Option<Invoice>>;
    async fn all_invoices(&self) -> Result<Vec<Invoice>>;
}

/// Market rate history, used to quote what is still owed in crypto.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Latest known fiat price of one coin, if any.
    async fn current_rate(&self, currency: Currency) -> Result<Option<Decimal>>;
}

pub type ChainSourceRef = Arc<dyn ChainSource>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type InvoiceStoreRef = Arc<dyn InvoiceStore>;
pub type RateSourceRef = Arc<dyn RateSource>;

#![allow(dead_code)]

use async_trait::async_trait;
use invoice_reconciler::application::invoices::InvoiceService;
use invoice_reconciler::application::scheduler::{ScanContext, Scheduler};
use invoice_reconciler::config::ScanConfig;
use invoice_reconciler::domain::amounts::Currency;
use invoice_reconciler::domain::chain::{
    Block, BlockHash, Category, SinceBlock, Transaction, TxOutput, WalletTransaction,
};
use invoice_reconciler::domain::invoice::Invoice;
use invoice_reconciler::domain::payment::Payment;
use invoice_reconciler::domain::ports::{ChainSource, ChainSourceRef, InvoiceStore, PaymentStore};
use invoice_reconciler::error::Result;
use invoice_reconciler::infrastructure::chain::InMemoryChain;
use invoice_reconciler::infrastructure::in_memory::{InMemoryInvoiceStore, InMemoryPaymentStore};
use invoice_reconciler::infrastructure::rates::InMemoryRateHistory;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Notify;

pub fn block(hash: &str, height: u64, previous: Option<&str>) -> Block {
    Block {
        hash: BlockHash::from(hash),
        height,
        confirmations: 1,
        previous_block_hash: previous.map(BlockHash::from),
    }
}

pub fn receive(txid: &str, blockhash: Option<&str>, confirmations: i64, outputs: &[(&str, Decimal)]) -> Transaction {
    Transaction {
        txid: txid.to_string(),
        blockhash: blockhash.map(BlockHash::from),
        confirmations,
        category: Category::Receive,
        outputs: outputs
            .iter()
            .map(|(address, amount)| TxOutput {
                address: address.to_string(),
                amount: *amount,
            })
            .collect(),
    }
}

/// Stores, chain and rates wired together the way the binary does it.
pub struct Harness {
    pub chain: InMemoryChain,
    pub invoices: Arc<InMemoryInvoiceStore>,
    pub payments: Arc<InMemoryPaymentStore>,
    pub rates: Arc<InMemoryRateHistory>,
}

impl Harness {
    /// A chain with genesis and block 1, `g <- b1`, tip at `b1`.
    pub async fn new() -> Self {
        let chain = InMemoryChain::new();
        chain.add_block(block("g", 0, None)).await;
        chain.add_block(block("b1", 1, Some("g"))).await;
        Self {
            chain,
            invoices: Arc::new(InMemoryInvoiceStore::new()),
            payments: Arc::new(InMemoryPaymentStore::new()),
            rates: Arc::new(InMemoryRateHistory::new()),
        }
    }

    /// Stores an invoice with a fixed total and hands out `address` for it.
    #[allow(clippy::too_many_arguments)]
    pub async fn invoice(
        &self,
        id: &str,
        currency: Currency,
        total: Decimal,
        min_confirmations: i64,
        address: &str,
        expected: Decimal,
        spot_rate: Decimal,
    ) -> Payment {
        let mut invoice = Invoice::new(id, currency, min_confirmations);
        invoice.invoice_total = total;
        self.invoices.store(invoice).await.unwrap();

        let payment = Payment::expected(id, address, expected, spot_rate);
        self.payments.upsert(payment.clone()).await.unwrap();
        payment
    }

    pub fn scheduler(&self, config: ScanConfig) -> Scheduler {
        self.scheduler_with(config, Arc::new(self.chain.clone()), ScanContext::new())
    }

    pub fn scheduler_with(&self, config: ScanConfig, chain: ChainSourceRef, context: ScanContext) -> Scheduler {
        Scheduler::with_context(
            config,
            chain,
            self.payments.clone(),
            self.invoices.clone(),
            context,
        )
    }

    pub fn service(&self) -> InvoiceService {
        InvoiceService::new(self.invoices.clone(), self.payments.clone(), self.rates.clone())
    }
}

/// A chain source whose `list_since_block` blocks until released.
pub struct GatedChain {
    pub inner: InMemoryChain,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedChain {
    pub fn new(inner: InMemoryChain) -> Self {
        Self {
            inner,
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl ChainSource for GatedChain {
    async fn get_block(&self, hash: &BlockHash) -> Result<Block> {
        self.inner.get_block(hash).await
    }

    async fn get_block_hash(&self, height: u64) -> Result<BlockHash> {
        self.inner.get_block_hash(height).await
    }

    async fn list_since_block(&self, hash: &BlockHash) -> Result<SinceBlock> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.list_since_block(hash).await
    }

    async fn get_transaction(&self, txid: &str) -> Result<WalletTransaction> {
        self.inner.get_transaction(txid).await
    }
}

/// A payment store that yields to the runtime before every lookup, so concurrent
/// writers interleave between reading a record and storing it.
#[derive(Clone)]
pub struct YieldingPaymentStore {
    pub inner: InMemoryPaymentStore,
}

impl YieldingPaymentStore {
    pub fn new(inner: InMemoryPaymentStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl PaymentStore for YieldingPaymentStore {
    async fn upsert(&self, payment: Payment) -> Result<()> {
        self.inner.upsert(payment).await
    }

    async fn get(&self, payment_id: &str) -> Result<Option<Payment>> {
        self.inner.get(payment_id).await
    }

    async fn find_by_transaction(&self, txid: &str, address: &str) -> Result<Option<Payment>> {
        tokio::task::yield_now().await;
        self.inner.find_by_transaction(txid, address).await
    }

    async fn latest_for_address(&self, address: &str) -> Result<Option<Payment>> {
        tokio::task::yield_now().await;
        self.inner.latest_for_address(address).await
    }

    async fn latest_with_block_hash(&self) -> Result<Option<Payment>> {
        self.inner.latest_with_block_hash().await
    }

    async fn for_invoice(&self, invoice_id: &str) -> Result<Vec<Payment>> {
        self.inner.for_invoice(invoice_id).await
    }
}

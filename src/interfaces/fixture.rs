use crate::domain::invoice::Invoice;
use crate::domain::payment::Payment;
use crate::domain::ports::{InvoiceStore, PaymentStore};
use crate::error::Result;
use crate::infrastructure::chain::{ChainSnapshot, InMemoryChain};
use crate::infrastructure::rates::{InMemoryRateHistory, RatePoint};
use serde::Deserialize;
use std::io::Read;

/// A replayable scenario: the wallet node's view of the chain plus the gateway's
/// invoices, payment expectations and market rates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub chain: ChainSnapshot,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub rates: Vec<RatePoint>,
}

impl Scenario {
    /// Parses a scenario from JSON.
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    /// Loads invoices, payments and rates into the given stores and returns the chain.
    ///
    /// Invoices with line items get their totals computed; invoices without any keep the
    /// `invoice_total` they were given. Records already present in the stores are kept as
    /// they are, so a persistent store resumes where the last run left off.
    pub async fn seed(
        self,
        invoices: &dyn InvoiceStore,
        payments: &dyn PaymentStore,
        rates: &InMemoryRateHistory,
    ) -> Result<InMemoryChain> {
        for mut invoice in self.invoices {
            if invoices.get(&invoice.id).await?.is_some() {
                continue;
            }
            if !invoice.line_items.is_empty() {
                invoice.prepare();
            }
            invoices.store(invoice).await?;
        }
        for payment in self.payments {
            if payments.get(&payment.id).await?.is_some() {
                continue;
            }
            payments.upsert(payment).await?;
        }
        for point in self.rates {
            rates.record(point).await;
        }
        Ok(InMemoryChain::from_snapshot(self.chain).await)
    }
}

use crate::domain::amounts::Currency;
use crate::domain::payment::PaymentStatus;
use crate::domain::ports::{InvoiceStoreRef, PaymentStoreRef, RateSourceRef};
use crate::domain::settlement::{self, PaymentHistoryEntry};
use crate::error::{ReconcileError, Result};
use rust_decimal::Decimal;
use serde::Serialize;

/// Where an invoice stands, as shown to the payer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceSummary {
    pub invoice_id: String,
    pub currency: Currency,
    pub invoice_total: Decimal,
    pub total_paid: Decimal,
    pub amount_due: Decimal,
    /// Outstanding balance in crypto; `None` when no current market rate is known.
    pub amount_due_crypto: Option<Decimal>,
    pub active_status: Option<PaymentStatus>,
    pub history: Vec<PaymentHistoryEntry>,
}

/// Computes invoice summaries from stored payments.
#[derive(Clone)]
pub struct InvoiceService {
    invoices: InvoiceStoreRef,
    payments: PaymentStoreRef,
    rates: RateSourceRef,
}

impl InvoiceService {
    pub fn new(invoices: InvoiceStoreRef, payments: PaymentStoreRef, rates: RateSourceRef) -> Self {
        Self {
            invoices,
            payments,
            rates,
        }
    }

    pub async fn summarize(&self, invoice_id: &str) -> Result<InvoiceSummary> {
        let invoice = self
            .invoices
            .get(invoice_id)
            .await?
            .ok_or_else(|| ReconcileError::InvoiceNotFound(invoice_id.to_string()))?;
        let payments = self.payments.for_invoice(invoice_id).await?;

        let total_paid = settlement::total_paid(&invoice, &payments)?;
        let amount_due = settlement::amount_due(invoice.invoice_total, total_paid, invoice.currency);

        let current_rate = if invoice.currency.is_fiat() {
            self.rates.current_rate(invoice.currency).await?
        } else {
            None
        };
        let amount_due_crypto =
            match settlement::amount_due_in_crypto(&invoice, &payments, current_rate) {
                Ok(due) => Some(due),
                Err(e @ ReconcileError::RateUnavailable(_)) => {
                    tracing::warn!(invoice_id = %invoice.id, error = %e, "Cannot quote amount due in crypto");
                    None
                }
                Err(e) => return Err(e),
            };

        Ok(InvoiceSummary {
            invoice_id: invoice.id.clone(),
            currency: invoice.currency,
            invoice_total: invoice.invoice_total,
            total_paid,
            amount_due,
            amount_due_crypto,
            active_status: settlement::active_payment(&payments).map(|p| p.status),
            history: settlement::payment_history(&payments),
        })
    }

    pub async fn summarize_all(&self) -> Result<Vec<InvoiceSummary>> {
        let mut summaries = Vec::new();
        for invoice in self.invoices.all_invoices().await? {
            summaries.push(self.summarize(&invoice.id).await?);
        }
        Ok(summaries)
    }
}

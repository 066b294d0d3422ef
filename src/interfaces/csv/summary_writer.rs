use crate::application::invoices::InvoiceSummary;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct SummaryRow<'a> {
    invoice: &'a str,
    currency: String,
    total: Decimal,
    paid: Decimal,
    due: Decimal,
    due_crypto: Option<Decimal>,
    status: String,
}

/// Writes invoice summaries as CSV, one row per invoice.
pub struct SummaryWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> SummaryWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_summaries<'a>(
        &mut self,
        summaries: impl IntoIterator<Item = &'a InvoiceSummary>,
    ) -> Result<()> {
        for summary in summaries {
            self.writer.serialize(SummaryRow {
                invoice: &summary.invoice_id,
                currency: summary.currency.to_string(),
                total: summary.invoice_total,
                paid: summary.total_paid,
                due: summary.amount_due,
                due_crypto: summary.amount_due_crypto,
                status: summary
                    .active_status
                    .map(|status| status.display_label())
                    .unwrap_or_default(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

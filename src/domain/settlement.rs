use super::amounts::{CRYPTO_DECIMALS, Currency, round_half_up, to_fiat};
use super::invoice::Invoice;
use super::payment::{Payment, PaymentStatus};
use crate::error::{ReconcileError, Result};
use rust_decimal::Decimal;
use serde::Serialize;

/// Sum of everything paid toward `invoice`, in the invoice currency.
///
/// Invalid payments are skipped. For fiat invoices every payment is converted at the
/// spot rate it was made at and rounded to cents before summing.
pub fn total_paid(invoice: &Invoice, payments: &[Payment]) -> Result<Decimal> {
    let is_fiat = invoice.currency.is_fiat();
    let total = payments
        .iter()
        .filter(|payment| payment.status != PaymentStatus::Invalid)
        .try_fold(Decimal::ZERO, |total, payment| {
            let paid = if is_fiat {
                to_fiat(payment.amount_paid, payment.spot_rate)?
            } else {
                payment.amount_paid
            };
            total
                .checked_add(paid)
                .ok_or_else(|| ReconcileError::Validation("Total paid is out of range".to_string()))
        })?;
    Ok(invoice.currency.round(total))
}

/// What is still owed. Negative when the invoice was overpaid.
pub fn amount_due(invoice_total: Decimal, total_paid: Decimal, currency: Currency) -> Decimal {
    currency.round(invoice_total - total_paid)
}

/// What is still owed, expressed in crypto.
///
/// Fiat balances are converted at `current_rate`, the market rate now rather than any
/// payment's historical spot rate. Crypto invoices are already denominated on chain.
pub fn amount_due_in_crypto(
    invoice: &Invoice,
    payments: &[Payment],
    current_rate: Option<Decimal>,
) -> Result<Decimal> {
    let remaining = invoice.invoice_total - total_paid(invoice, payments)?;
    if !invoice.currency.is_fiat() {
        return Ok(remaining);
    }

    match current_rate {
        Some(rate) if rate > Decimal::ZERO => remaining
            .checked_div(rate)
            .map(|due| round_half_up(due, CRYPTO_DECIMALS))
            .ok_or_else(|| {
                ReconcileError::Validation(format!("{} at rate {} is out of range", remaining, rate))
            }),
        Some(rate) => Err(ReconcileError::Validation(format!(
            "Exchange rate must be positive, got {}",
            rate
        ))),
        None => Err(ReconcileError::RateUnavailable(invoice.currency.to_string())),
    }
}

/// The most recently created payment attempt. Equal timestamps resolve to the later entry.
pub fn active_payment(payments: &[Payment]) -> Option<&Payment> {
    payments.iter().fold(None, |active, payment| match active {
        Some(current) if payment.created < current.created => Some(current),
        _ => Some(payment),
    })
}

/// A payment as shown in an invoice's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentHistoryEntry {
    pub payment_id: String,
    pub txid: String,
    pub address: String,
    pub amount_paid: Decimal,
    pub confirmations: i64,
    pub status: PaymentStatus,
    pub status_label: String,
}

/// Payments that actually saw a transaction. Labels are for display only; `status` keeps
/// the underlying value.
pub fn payment_history(payments: &[Payment]) -> Vec<PaymentHistoryEntry> {
    payments
        .iter()
        .filter(|payment| payment.status != PaymentStatus::Unpaid)
        .filter_map(|payment| {
            let txid = payment.txid.clone()?;
            Some(PaymentHistoryEntry {
                payment_id: payment.id.clone(),
                txid,
                address: payment.address.clone(),
                amount_paid: payment.amount_paid,
                confirmations: payment.confirmations,
                status: payment.status,
                status_label: payment.status.display_label(),
            })
        })
        .collect()
}

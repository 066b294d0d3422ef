//! Payment status derivation.
//!
//! Status is never advanced through transitions. It is recomputed from the payment's
//! current amounts and the confirmations just observed, so a reorg or a top-up simply
//! yields a different answer on the next observation.

use super::amounts::to_fiat;
use super::chain::ORPHANED;
use super::invoice::Invoice;
use super::payment::{Payment, PaymentStatus};
use crate::error::Result;
use rust_decimal::Decimal;

/// Derives the status of `payment` given `confirmations` for its transaction.
///
/// Rules are checked in order and the first match wins. When none applies (nothing paid
/// and not yet confirmed) the previously recorded status is kept. Fails only when a fiat
/// conversion overflows.
pub fn evaluate(payment: &Payment, confirmations: i64, invoice: &Invoice) -> Result<PaymentStatus> {
    let confirmations_met = confirmations >= invoice.min_confirmations;

    if confirmations == ORPHANED {
        return Ok(PaymentStatus::Invalid);
    }

    if payment.amount_paid > Decimal::ZERO && !confirmations_met {
        return Ok(PaymentStatus::Pending);
    }

    if confirmations_met {
        if payment.amount_paid == payment.expected_amount || fiat_close_enough(payment, invoice)? {
            return Ok(PaymentStatus::Paid);
        }
        if payment.amount_paid < payment.expected_amount {
            return Ok(PaymentStatus::Partial);
        }
        return Ok(PaymentStatus::Overpaid);
    }

    Ok(payment.status)
}

/// Fiat invoices accept a crypto amount that is worth the expected amount to the cent
/// at the payment's spot rate.
fn fiat_close_enough(payment: &Payment, invoice: &Invoice) -> Result<bool> {
    if !invoice.currency.is_fiat() {
        return Ok(false);
    }
    let actual = to_fiat(payment.amount_paid, payment.spot_rate)?;
    let expected = to_fiat(payment.expected_amount, payment.spot_rate)?;
    Ok(actual == expected)
}

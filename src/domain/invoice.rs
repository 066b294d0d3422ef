use super::amounts::{Currency, FIAT_DECIMALS, round_half_up};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    pub quantity: Decimal,
    #[serde(default)]
    pub line_total: Decimal,
}

/// A discount is either a fixed amount or a percentage of the line totals.
///
/// Once `amount` is set it wins; `percentage` is only consulted while `amount` is empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Discount {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub percentage: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub currency: Currency,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub discounts: Vec<Discount>,
    #[serde(default)]
    pub invoice_total: Decimal,
    pub min_confirmations: i64,
}

impl Invoice {
    pub fn new(id: impl Into<String>, currency: Currency, min_confirmations: i64) -> Self {
        Self {
            id: id.into(),
            currency,
            line_items: Vec::new(),
            discounts: Vec::new(),
            invoice_total: Decimal::ZERO,
            min_confirmations,
        }
    }

    /// Computes every derived amount: line totals, then discounts, then the invoice total.
    pub fn prepare(&mut self) {
        self.calculate_line_totals();
        self.calculate_discount_totals();
        self.calculate_invoice_total();
    }

    /// Sets `line_total = amount * quantity` on every line item.
    ///
    /// Fiat invoices also round the unit amount to cents. The line total is taken from the
    /// unrounded unit amount before rounding it.
    pub fn calculate_line_totals(&mut self) {
        let currency = self.currency;
        for item in &mut self.line_items {
            let exact = item.amount * item.quantity;
            if currency.is_fiat() {
                item.amount = round_half_up(item.amount, FIAT_DECIMALS);
            }
            item.line_total = currency.round(exact);
        }
    }

    /// Resolves percentage discounts into amounts. Discounts that already carry an amount
    /// are left alone.
    pub fn calculate_discount_totals(&mut self) {
        let subtotal = self.subtotal();
        let currency = self.currency;
        for discount in &mut self.discounts {
            if discount.amount.is_some() {
                continue;
            }
            if let Some(percentage) = discount.percentage {
                let amount = subtotal * (percentage / Decimal::ONE_HUNDRED);
                discount.amount = Some(currency.round(amount));
            }
        }
    }

    /// Sets `invoice_total` to the line totals minus resolved discounts, never below zero.
    pub fn calculate_invoice_total(&mut self) {
        let discounts: Decimal = self.discounts.iter().filter_map(|d| d.amount).sum();
        let total = self.currency.round(self.subtotal() - discounts);
        self.invoice_total = total.max(Decimal::ZERO);
    }

    pub fn subtotal(&self) -> Decimal {
        self.line_items.iter().map(|item| item.line_total).sum()
    }
}

use super::chain::BlockHash;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Pending,
    Paid,
    Partial,
    Overpaid,
    Invalid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Overpaid => "overpaid",
            PaymentStatus::Invalid => "invalid",
        }
    }

    /// Presentation form: first letter upper case, the rest lower case.
    pub fn display_label(&self) -> String {
        let mut chars = self.as_str().chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One payment attempt against an invoice.
///
/// A record without a `txid` is the expectation created when a payer is shown an
/// address; it gains a txid on the first matching transaction. Further transactions
/// to the same address get records of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub invoice_id: String,
    #[serde(default)]
    pub txid: Option<String>,
    pub address: String,
    #[serde(default)]
    pub blockhash: Option<BlockHash>,
    #[serde(default)]
    pub confirmations: i64,
    #[serde(default)]
    pub amount_paid: Decimal,
    pub expected_amount: Decimal,
    pub spot_rate: Decimal,
    #[serde(default)]
    pub status: PaymentStatus,
    pub created: DateTime<Utc>,
}

impl Payment {
    /// Creates the unpaid expectation for `address`.
    pub fn expected(
        invoice_id: impl Into<String>,
        address: impl Into<String>,
        expected_amount: Decimal,
        spot_rate: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            invoice_id: invoice_id.into(),
            txid: None,
            address: address.into(),
            blockhash: None,
            confirmations: 0,
            amount_paid: Decimal::ZERO,
            expected_amount,
            spot_rate,
            status: PaymentStatus::Unpaid,
            created: Utc::now(),
        }
    }

    /// Starts a fresh record for `txid`, inheriting the invoice terms of `self`.
    pub fn for_transaction(&self, txid: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            txid: Some(txid.into()),
            blockhash: None,
            confirmations: 0,
            amount_paid: Decimal::ZERO,
            status: PaymentStatus::Unpaid,
            created: Utc::now(),
            ..self.clone()
        }
    }

    pub fn matches(&self, txid: &str, address: &str) -> bool {
        self.txid.as_deref() == Some(txid) && self.address == address
    }
}

use crate::domain::chain::{BlockHash, Transaction};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::{InvoiceStoreRef, PaymentStoreRef};
use crate::domain::status;
use crate::error::{ReconcileError, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything one transaction paid to one address.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveUpdate {
    pub txid: String,
    pub blockhash: Option<BlockHash>,
    pub confirmations: i64,
    pub address: String,
    pub amount: Decimal,
}

/// Outcome of reconciling one address of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    Updated {
        payment_id: String,
        address: String,
        previous: PaymentStatus,
        status: PaymentStatus,
    },
    /// No invoice ever handed out this address.
    Untracked { address: String },
}

/// Sums the outputs of `tx` per address, in order of first appearance.
pub fn aggregate_outputs(tx: &Transaction) -> Vec<ReceiveUpdate> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut updates: Vec<ReceiveUpdate> = Vec::new();

    for output in &tx.outputs {
        match index.get(output.address.as_str()) {
            Some(&i) => updates[i].amount += output.amount,
            None => {
                index.insert(output.address.as_str(), updates.len());
                updates.push(ReceiveUpdate {
                    txid: tx.txid.clone(),
                    blockhash: tx.blockhash.clone(),
                    confirmations: tx.confirmations,
                    address: output.address.clone(),
                    amount: output.amount,
                });
            }
        }
    }

    updates
}

/// Applies observed transactions to payment records.
///
/// Records are keyed by `(txid, address)` and every field written is a pure function of
/// the observation, so applying the same transaction again changes nothing. Clones share
/// one write lock: looking up or claiming a record and storing it happen as one step, so
/// two transactions paying the same address never claim the same expectation.
#[derive(Clone)]
pub struct Reconciler {
    payments: PaymentStoreRef,
    invoices: InvoiceStoreRef,
    write_lock: Arc<Mutex<()>>,
}

impl Reconciler {
    pub fn new(payments: PaymentStoreRef, invoices: InvoiceStoreRef) -> Self {
        Self {
            payments,
            invoices,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Reconciles every address `tx` paid, one after the other.
    pub async fn apply(&self, tx: &Transaction) -> Result<Vec<Reconciled>> {
        let mut outcomes = Vec::new();
        for update in aggregate_outputs(tx) {
            outcomes.push(self.apply_update(update).await?);
        }
        Ok(outcomes)
    }

    pub async fn apply_update(&self, update: ReceiveUpdate) -> Result<Reconciled> {
        let _guard = self.write_lock.lock().await;
        let Some(mut payment) = self.payment_for(&update).await? else {
            tracing::debug!(txid = %update.txid, address = %update.address, "Ignoring payment to untracked address");
            return Ok(Reconciled::Untracked {
                address: update.address,
            });
        };

        let invoice = self
            .invoices
            .get(&payment.invoice_id)
            .await?
            .ok_or_else(|| ReconcileError::InvoiceNotFound(payment.invoice_id.clone()))?;

        let previous = payment.status;
        payment.amount_paid = update.amount;
        payment.confirmations = update.confirmations;
        payment.blockhash = update.blockhash;
        payment.status = status::evaluate(&payment, update.confirmations, &invoice)?;

        if payment.status == PaymentStatus::Invalid && previous != PaymentStatus::Invalid {
            tracing::warn!(
                txid = %update.txid,
                invoice_id = %invoice.id,
                "Transaction was double-spent or reorganized out, payment is now invalid"
            );
        }

        let outcome = Reconciled::Updated {
            payment_id: payment.id.clone(),
            address: payment.address.clone(),
            previous,
            status: payment.status,
        };
        self.payments.upsert(payment).await?;
        Ok(outcome)
    }

    /// The record for `(txid, address)`, creating one from the address's invoice terms on
    /// first sight. An expectation that never saw a transaction is claimed in place.
    async fn payment_for(&self, update: &ReceiveUpdate) -> Result<Option<Payment>> {
        if let Some(existing) = self
            .payments
            .find_by_transaction(&update.txid, &update.address)
            .await?
        {
            return Ok(Some(existing));
        }

        let Some(template) = self.payments.latest_for_address(&update.address).await? else {
            return Ok(None);
        };

        if template.txid.is_none() {
            let mut claimed = template;
            claimed.txid = Some(update.txid.clone());
            Ok(Some(claimed))
        } else {
            Ok(Some(template.for_transaction(update.txid.clone())))
        }
    }
}

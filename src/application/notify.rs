use super::reconciler::Reconciled;
use super::scheduler::{PassOutcome, Scheduler};
use crate::domain::chain::BlockHash;
use crate::error::Result;
use std::sync::Arc;

/// Entry points for push notifications from the wallet node.
///
/// Both feed the same reconciliation path as the periodic scan. The reconciler serializes
/// its writes, so a notification racing a scheduled pass neither loses a payment nor
/// claims an expectation twice.
#[derive(Clone)]
pub struct NotificationHandler {
    scheduler: Arc<Scheduler>,
}

impl NotificationHandler {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    /// The node saw a wallet transaction (new, or with new confirmations).
    pub async fn on_transaction_observed(&self, txid: &str) -> Result<Vec<Reconciled>> {
        let wallet_tx = self.scheduler.chain().get_transaction(txid).await?;
        let tx = wallet_tx.into_receive_transaction();
        tracing::debug!(txid = %txid, outputs = tx.outputs.len(), "Transaction notification received");
        self.scheduler.reconciler().apply(&tx).await
    }

    /// The node connected a new block.
    pub async fn on_block_observed(&self, hash: &BlockHash) -> Result<PassOutcome> {
        tracing::debug!(hash = %hash, "Block notification received");
        self.scheduler.run_pass().await
    }
}

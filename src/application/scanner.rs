use super::cursor::BlockCursor;
use super::reconciler::{Reconciled, Reconciler};
use crate::domain::chain::BlockHash;
use crate::domain::ports::ChainSourceRef;
use crate::error::{ReconcileError, Result};

/// Result of reconciling one transaction during a pass.
#[derive(Debug)]
pub struct ItemResult {
    pub txid: String,
    pub outcome: Result<Vec<Reconciled>>,
}

impl ItemResult {
    pub fn is_err(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn error(&self) -> Option<&ReconcileError> {
        self.outcome.as_ref().err()
    }
}

/// What one scan from a safe hash did.
#[derive(Debug)]
pub struct ScanReport {
    pub from: BlockHash,
    pub tip: BlockHash,
    pub advanced: bool,
    pub results: Vec<ItemResult>,
}

impl ScanReport {
    pub fn failures(&self) -> impl Iterator<Item = &ItemResult> {
        self.results.iter().filter(|item| item.is_err())
    }
}

/// Lists wallet transactions since the cursor and feeds received ones to the reconciler.
#[derive(Clone)]
pub struct TransactionScanner {
    chain: ChainSourceRef,
    reconciler: Reconciler,
}

impl TransactionScanner {
    pub fn new(chain: ChainSourceRef, reconciler: Reconciler) -> Self {
        Self { chain, reconciler }
    }

    /// Scans everything since `from` and moves `cursor` to the reported tip.
    ///
    /// Transactions are reconciled strictly one at a time. A failing transaction is
    /// recorded in the report and the scan carries on; only a failure to list transactions
    /// aborts the scan, leaving the cursor where it was.
    pub async fn scan(&self, cursor: &mut BlockCursor, from: BlockHash) -> Result<ScanReport> {
        tracing::debug!(hash = %from, "Updating payments since block");
        let since = self.chain.list_since_block(&from).await?;

        let mut results = Vec::new();
        for tx in since.transactions.into_iter().filter(|tx| tx.is_receive()) {
            let outcome = self.reconciler.apply(&tx).await;
            if let Err(e) = &outcome {
                tracing::error!(txid = %tx.txid, error = %e, "Failed to reconcile transaction");
            }
            results.push(ItemResult {
                txid: tx.txid,
                outcome,
            });
        }

        let advanced = cursor.advance(&from, since.last_block.clone());
        if advanced {
            tracing::info!(tip = %since.last_block, transactions = results.len(), "Scanned up to new tip");
        }

        Ok(ScanReport {
            from,
            tip: since.last_block,
            advanced,
            results,
        })
    }
}

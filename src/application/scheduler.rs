use super::cursor::BlockCursor;
use super::reconciler::Reconciler;
use super::scanner::{ItemResult, ScanReport, TransactionScanner};
use crate::config::ScanConfig;
use crate::domain::ports::{ChainSourceRef, InvoiceStoreRef, PaymentStoreRef};
use crate::error::Result;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Transactions whose reconciliation failed, with the number of attempts so far.
#[derive(Debug, Clone, Default)]
pub struct RetryQueue {
    attempts: BTreeMap<String, u32>,
}

impl RetryQueue {
    /// Counts a failed attempt. Returns false once `max_attempts` is reached and the
    /// transaction has been dropped from the queue.
    pub fn record_failure(&mut self, txid: &str, max_attempts: u32) -> bool {
        let attempts = self.attempts.entry(txid.to_string()).or_insert(0);
        *attempts += 1;
        if *attempts >= max_attempts {
            tracing::error!(txid = %txid, attempts = *attempts, "Giving up on reconciling transaction");
            self.attempts.remove(txid);
            return false;
        }
        true
    }

    pub fn clear(&mut self, txid: &str) {
        self.attempts.remove(txid);
    }

    pub fn attempts(&self, txid: &str) -> Option<u32> {
        self.attempts.get(txid).copied()
    }

    pub fn txids(&self) -> Vec<String> {
        self.attempts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

/// Mutable state carried from one pass to the next.
#[derive(Debug, Clone, Default)]
pub struct ScanContext {
    pub cursor: BlockCursor,
    pub retries: RetryQueue,
}

impl ScanContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(cursor: BlockCursor) -> Self {
        Self {
            cursor,
            retries: RetryQueue::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The previous pass started too recently.
    RateLimited,
    /// Another pass is still running.
    InProgress,
}

#[derive(Debug)]
pub struct PassReport {
    /// Transactions carried over from earlier failed passes.
    pub retried: Vec<ItemResult>,
    pub scan: ScanReport,
}

impl PassReport {
    pub fn failed(&self) -> usize {
        self.retried.iter().filter(|item| item.is_err()).count() + self.scan.failures().count()
    }
}

#[derive(Debug)]
pub enum PassOutcome {
    Skipped(SkipReason),
    Completed(PassReport),
}

/// Runs scan passes, one at a time, over a shared [`ScanContext`].
pub struct Scheduler {
    config: ScanConfig,
    chain: ChainSourceRef,
    payments: PaymentStoreRef,
    reconciler: Reconciler,
    scanner: TransactionScanner,
    context: Mutex<ScanContext>,
}

impl Scheduler {
    pub fn new(
        config: ScanConfig,
        chain: ChainSourceRef,
        payments: PaymentStoreRef,
        invoices: InvoiceStoreRef,
    ) -> Self {
        Self::with_context(config, chain, payments, invoices, ScanContext::new())
    }

    /// Builds a scheduler resuming from `context`, e.g. with a known cursor.
    pub fn with_context(
        config: ScanConfig,
        chain: ChainSourceRef,
        payments: PaymentStoreRef,
        invoices: InvoiceStoreRef,
        context: ScanContext,
    ) -> Self {
        let reconciler = Reconciler::new(payments.clone(), invoices);
        let scanner = TransactionScanner::new(chain.clone(), reconciler.clone());
        Self {
            config,
            chain,
            payments,
            reconciler,
            scanner,
            context: Mutex::new(context),
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn chain(&self) -> &ChainSourceRef {
        &self.chain
    }

    /// A copy of the current context, waiting for any running pass to finish.
    pub async fn snapshot(&self) -> ScanContext {
        self.context.lock().await.clone()
    }

    /// Runs one scan pass.
    ///
    /// Skips without touching the chain when another pass holds the context or the last
    /// pass started less than `min_pass_spacing` ago. Errors abort the pass before the
    /// cursor moves; per-transaction failures are reported inside the `PassReport`.
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        let Ok(mut context) = self.context.try_lock() else {
            tracing::debug!("Scan pass already in progress, skipping");
            return Ok(PassOutcome::Skipped(SkipReason::InProgress));
        };

        if !context
            .cursor
            .try_begin_run(Instant::now(), self.config.min_pass_spacing)
        {
            tracing::debug!("Previous scan pass started too recently, skipping");
            return Ok(PassOutcome::Skipped(SkipReason::RateLimited));
        }

        let from = context
            .cursor
            .resolve(self.chain.as_ref(), self.payments.as_ref())
            .await?;

        let retried = self.retry_failed(&mut context).await;
        let scan = self.scanner.scan(&mut context.cursor, from).await?;

        // A transaction still listed by the node (e.g. unconfirmed) can fail both as a
        // retry and in the scan. It is counted once per pass.
        let counted: HashSet<&str> = retried
            .iter()
            .filter(|item| item.is_err())
            .map(|item| item.txid.as_str())
            .collect();
        for item in &scan.results {
            if !item.is_err() {
                context.retries.clear(&item.txid);
            } else if !counted.contains(item.txid.as_str()) {
                context
                    .retries
                    .record_failure(&item.txid, self.config.max_retries);
            }
        }

        let report = PassReport { retried, scan };
        let failed = report.failed();
        if failed > 0 {
            tracing::warn!(failed, queued = context.retries.len(), "Scan pass finished with failed transactions");
        }
        Ok(PassOutcome::Completed(report))
    }

    async fn retry_failed(&self, context: &mut ScanContext) -> Vec<ItemResult> {
        let mut results = Vec::new();
        for txid in context.retries.txids() {
            let outcome = match self.chain.get_transaction(&txid).await {
                Ok(wallet_tx) => {
                    self.reconciler
                        .apply(&wallet_tx.into_receive_transaction())
                        .await
                }
                Err(e) => Err(e),
            };

            match &outcome {
                Ok(_) => {
                    tracing::info!(txid = %txid, "Retried transaction reconciled");
                    context.retries.clear(&txid);
                }
                Err(e) => {
                    tracing::warn!(txid = %txid, error = %e, "Retry of transaction failed");
                    context
                        .retries
                        .record_failure(&txid, self.config.max_retries);
                }
            }
            results.push(ItemResult { txid, outcome });
        }
        results
    }

    /// Runs a pass every `interval` until `shutdown` is cancelled.
    ///
    /// Failed passes are logged and retried on the next tick. A fatal chain inconsistency
    /// ends the loop with that error.
    pub async fn run_periodic(&self, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_ms = self.config.interval.as_millis() as u64, "Periodic block scanning started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, stopping periodic scanning");
                    break;
                }

                _ = ticker.tick() => {
                    match self.run_pass().await {
                        Ok(_) => {}
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            tracing::error!(error = %e, "Scan pass failed, retrying on next tick");
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

mod common;

use common::{GatedChain, Harness, block, receive};
use invoice_reconciler::application::cursor::BlockCursor;
use invoice_reconciler::application::notify::NotificationHandler;
use invoice_reconciler::application::reconciler::Reconciled;
use invoice_reconciler::application::scheduler::{PassOutcome, ScanContext, SkipReason};
use invoice_reconciler::config::ScanConfig;
use invoice_reconciler::domain::amounts::Currency;
use invoice_reconciler::domain::chain::BlockHash;
use invoice_reconciler::domain::invoice::Invoice;
use invoice_reconciler::domain::payment::{Payment, PaymentStatus};
use invoice_reconciler::domain::ports::{InvoiceStore, PaymentStore};
use invoice_reconciler::error::ReconcileError;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_pass_started_too_soon_is_skipped() {
    let harness = Harness::new().await;
    let config = ScanConfig {
        min_pass_spacing: Duration::from_secs(60),
        ..ScanConfig::default()
    };
    let scheduler = harness.scheduler(config);

    assert!(matches!(
        scheduler.run_pass().await.unwrap(),
        PassOutcome::Completed(_)
    ));
    assert!(matches!(
        scheduler.run_pass().await.unwrap(),
        PassOutcome::Skipped(SkipReason::RateLimited)
    ));
    assert_eq!(harness.chain.list_since_calls().await, 1);
}

#[tokio::test]
async fn test_concurrent_pass_is_skipped_while_one_runs() {
    let harness = Harness::new().await;
    let gated = Arc::new(GatedChain::new(harness.chain.clone()));
    let scheduler = Arc::new(harness.scheduler_with(
        ScanConfig::unthrottled(),
        gated.clone(),
        ScanContext::new(),
    ));

    let running = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_pass().await })
    };
    gated.entered.notified().await;

    assert!(matches!(
        scheduler.run_pass().await.unwrap(),
        PassOutcome::Skipped(SkipReason::InProgress)
    ));

    gated.release.notify_one();
    let first = running.await.unwrap().unwrap();
    assert!(matches!(first, PassOutcome::Completed(_)));
    assert_eq!(harness.chain.list_since_calls().await, 1);
}

#[tokio::test]
async fn test_transient_source_failure_keeps_cursor() {
    let harness = Harness::new().await;
    let context = ScanContext::with_cursor(BlockCursor::with_safe_hash(BlockHash::from("g")));
    let scheduler = harness.scheduler_with(
        ScanConfig::unthrottled(),
        Arc::new(harness.chain.clone()),
        context,
    );

    harness.chain.fail_next_call("connection refused").await;
    let err = scheduler.run_pass().await.unwrap_err();
    assert!(matches!(err, ReconcileError::Source(_)));
    assert!(!err.is_fatal());
    assert_eq!(
        scheduler.snapshot().await.cursor.safe_hash(),
        Some(&BlockHash::from("g"))
    );

    scheduler.run_pass().await.unwrap();
    assert_eq!(
        scheduler.snapshot().await.cursor.safe_hash(),
        Some(&BlockHash::from("b1"))
    );
}

#[tokio::test]
async fn test_injected_cursor_skips_history() {
    let harness = Harness::new().await;
    harness
        .invoice("inv-1", Currency::Btc, dec!(0.05), 1, "addr1", dec!(0.05), dec!(1))
        .await;
    harness
        .chain
        .upsert_transaction(receive("tx-old", Some("b1"), 1, &[("addr1", dec!(0.05))]))
        .await;

    let context = ScanContext::with_cursor(BlockCursor::with_safe_hash(BlockHash::from("b1")));
    let scheduler = harness.scheduler_with(
        ScanConfig::unthrottled(),
        Arc::new(harness.chain.clone()),
        context,
    );

    let PassOutcome::Completed(report) = scheduler.run_pass().await.unwrap() else {
        panic!("expected a completed pass");
    };
    assert_eq!(report.scan.from, BlockHash::from("b1"));
    assert!(report.scan.results.is_empty());
    assert!(!report.scan.advanced);
}

#[tokio::test]
async fn test_unknown_payment_block_is_fatal() {
    let harness = Harness::new().await;
    let mut payment = Payment::expected("inv-1", "addr1", dec!(0.05), dec!(1));
    payment.txid = Some("tx1".to_string());
    payment.blockhash = Some(BlockHash::from("never-seen"));
    harness.payments.upsert(payment).await.unwrap();

    let scheduler = harness.scheduler(ScanConfig::unthrottled());
    let err = scheduler.run_pass().await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(harness.chain.list_since_calls().await, 0);

    let periodic = harness.scheduler(ScanConfig {
        interval: Duration::from_millis(5),
        ..ScanConfig::unthrottled()
    });
    let result = periodic.run_periodic(CancellationToken::new()).await;
    assert!(matches!(result, Err(ReconcileError::FatalChain(_))));
}

#[tokio::test]
async fn test_failed_transaction_is_retried_on_next_pass() {
    let harness = Harness::new().await;
    // The payment points at an invoice the store does not have yet.
    let expected = Payment::expected("inv-late", "addr1", dec!(0.05), dec!(1));
    harness.payments.upsert(expected.clone()).await.unwrap();
    harness
        .chain
        .upsert_transaction(receive("tx1", Some("b1"), 1, &[("addr1", dec!(0.05))]))
        .await;

    let scheduler = harness.scheduler(ScanConfig::unthrottled());
    let PassOutcome::Completed(report) = scheduler.run_pass().await.unwrap() else {
        panic!("expected a completed pass");
    };
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.scan.results[0].error(),
        Some(ReconcileError::InvoiceNotFound(_))
    ));
    let context = scheduler.snapshot().await;
    assert_eq!(context.retries.attempts("tx1"), Some(1));
    assert_eq!(context.cursor.safe_hash(), Some(&BlockHash::from("b1")));

    let mut invoice = Invoice::new("inv-late", Currency::Btc, 1);
    invoice.invoice_total = dec!(0.05);
    harness.invoices.store(invoice).await.unwrap();

    let PassOutcome::Completed(report) = scheduler.run_pass().await.unwrap() else {
        panic!("expected a completed pass");
    };
    assert_eq!(report.retried.len(), 1);
    assert_eq!(report.failed(), 0);
    assert!(scheduler.snapshot().await.retries.is_empty());

    let payment = harness.payments.get(&expected.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_retries_stop_after_max_attempts() {
    let harness = Harness::new().await;
    let expected = Payment::expected("inv-missing", "addr1", dec!(0.05), dec!(1));
    harness.payments.upsert(expected).await.unwrap();
    harness
        .chain
        .upsert_transaction(receive("tx1", Some("b1"), 1, &[("addr1", dec!(0.05))]))
        .await;

    let scheduler = harness.scheduler(ScanConfig {
        max_retries: 2,
        ..ScanConfig::unthrottled()
    });

    scheduler.run_pass().await.unwrap();
    assert_eq!(scheduler.snapshot().await.retries.attempts("tx1"), Some(1));

    let PassOutcome::Completed(report) = scheduler.run_pass().await.unwrap() else {
        panic!("expected a completed pass");
    };
    assert_eq!(report.retried.len(), 1);
    assert!(scheduler.snapshot().await.retries.is_empty());

    let PassOutcome::Completed(report) = scheduler.run_pass().await.unwrap() else {
        panic!("expected a completed pass");
    };
    assert!(report.retried.is_empty());
}

#[tokio::test]
async fn test_failing_mempool_transaction_counts_once_per_pass() {
    let harness = Harness::new().await;
    let expected = Payment::expected("inv-missing", "addr1", dec!(0.05), dec!(1));
    harness.payments.upsert(expected).await.unwrap();
    harness
        .chain
        .upsert_transaction(receive("tx-mempool", None, 0, &[("addr1", dec!(0.05))]))
        .await;

    let scheduler = harness.scheduler(ScanConfig {
        max_retries: 4,
        ..ScanConfig::unthrottled()
    });

    scheduler.run_pass().await.unwrap();
    assert_eq!(scheduler.snapshot().await.retries.attempts("tx-mempool"), Some(1));

    let PassOutcome::Completed(report) = scheduler.run_pass().await.unwrap() else {
        panic!("expected a completed pass");
    };
    assert_eq!(report.retried.len(), 1);
    assert_eq!(report.scan.results.len(), 1);
    assert_eq!(scheduler.snapshot().await.retries.attempts("tx-mempool"), Some(2));

    scheduler.run_pass().await.unwrap();
    assert_eq!(scheduler.snapshot().await.retries.attempts("tx-mempool"), Some(3));
}

#[tokio::test]
async fn test_periodic_scanning_stops_on_cancel() {
    let harness = Harness::new().await;
    let scheduler = Arc::new(harness.scheduler(ScanConfig {
        interval: Duration::from_millis(10),
        ..ScanConfig::unthrottled()
    }));

    let shutdown = CancellationToken::new();
    let handle = {
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run_periodic(shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.chain.add_block(block("b2", 2, Some("b1"))).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    handle.await.unwrap().unwrap();
    assert!(harness.chain.list_since_calls().await >= 2);
    assert_eq!(
        scheduler.snapshot().await.cursor.safe_hash(),
        Some(&BlockHash::from("b2"))
    );
}

#[tokio::test]
async fn test_notifications_feed_the_reconciler() {
    let harness = Harness::new().await;
    let expected = harness
        .invoice("inv-1", Currency::Btc, dec!(0.05), 2, "addr1", dec!(0.05), dec!(1))
        .await;
    let scheduler = Arc::new(harness.scheduler(ScanConfig::unthrottled()));
    let handler = NotificationHandler::new(scheduler.clone());

    harness
        .chain
        .upsert_transaction(receive("tx1", None, 0, &[("addr1", dec!(0.05)), ("stranger", dec!(1))]))
        .await;
    let outcomes = handler.on_transaction_observed("tx1").await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(
        &outcomes[0],
        Reconciled::Updated { status: PaymentStatus::Pending, .. }
    ));
    assert_eq!(
        outcomes[1],
        Reconciled::Untracked {
            address: "stranger".to_string()
        }
    );

    harness.chain.add_block(block("b2", 2, Some("b1"))).await;
    harness
        .chain
        .set_transaction_confirmations("tx1", 2, Some(BlockHash::from("b2")))
        .await;
    let outcome = handler.on_block_observed(&BlockHash::from("b2")).await.unwrap();
    assert!(matches!(outcome, PassOutcome::Completed(_)));

    let payment = harness.payments.get(&expected.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert!(harness.payments.latest_for_address("stranger").await.unwrap().is_none());

    let err = handler.on_transaction_observed("not-a-wallet-tx").await.unwrap_err();
    assert!(matches!(err, ReconcileError::Validation(_)));
}

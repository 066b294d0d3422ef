use clap::Parser;
use invoice_reconciler::application::invoices::InvoiceService;
use invoice_reconciler::application::notify::NotificationHandler;
use invoice_reconciler::application::scheduler::Scheduler;
use invoice_reconciler::config::ScanConfig;
use invoice_reconciler::domain::ports::{InvoiceStoreRef, PaymentStoreRef};
use invoice_reconciler::error::ReconcileError;
use invoice_reconciler::infrastructure::in_memory::{InMemoryInvoiceStore, InMemoryPaymentStore};
use invoice_reconciler::infrastructure::rates::InMemoryRateHistory;
use invoice_reconciler::interfaces::csv::summary_writer::SummaryWriter;
use invoice_reconciler::interfaces::fixture::Scenario;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario JSON file with the chain snapshot, invoices, payments and rates
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "RECONCILER_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Keep scanning periodically until interrupted instead of running a single pass
    #[arg(long)]
    watch: bool,

    /// Milliseconds between periodic scan passes
    #[arg(
        long,
        env = "RECONCILER_SCAN_INTERVAL_MS",
        default_value_t = 5000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval_ms: u64,

    /// Minimum milliseconds between the starts of two passes
    #[arg(long, env = "RECONCILER_MIN_PASS_SPACING_MS", default_value_t = 1000)]
    min_pass_spacing_ms: u64,

    /// Passes a failed transaction is retried for before giving up
    #[arg(long, env = "RECONCILER_MAX_RETRIES", default_value_t = 5)]
    max_retries: u32,

    /// Transaction ids to reconcile as if the wallet node had announced them
    #[arg(long = "notify-tx")]
    notify_tx: Vec<String>,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            interval: Duration::from_millis(self.interval_ms),
            min_pass_spacing: Duration::from_millis(self.min_pass_spacing_ms),
            max_retries: self.max_retries,
        }
    }
}

fn in_memory_stores() -> (InvoiceStoreRef, PaymentStoreRef) {
    (
        Arc::new(InMemoryInvoiceStore::new()),
        Arc::new(InMemoryPaymentStore::new()),
    )
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<&Path>) -> Result<(InvoiceStoreRef, PaymentStoreRef)> {
    use invoice_reconciler::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<&Path>) -> Result<(InvoiceStoreRef, PaymentStoreRef)> {
    if db_path.is_some() {
        tracing::warn!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .init();
}

fn exit_if_fatal(error: &ReconcileError) {
    if error.is_fatal() {
        tracing::error!(error = %error, "Chain source is inconsistent, shutting down");
        std::process::exit(255);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (invoices, payments) = open_stores(cli.db_path.as_deref())?;
    let rates = InMemoryRateHistory::new();

    let file = File::open(&cli.input).into_diagnostic()?;
    let scenario = Scenario::from_reader(file).into_diagnostic()?;
    let chain = scenario
        .seed(invoices.as_ref(), payments.as_ref(), &rates)
        .await
        .into_diagnostic()?;

    let scheduler = Arc::new(Scheduler::new(
        cli.scan_config(),
        Arc::new(chain),
        payments.clone(),
        invoices.clone(),
    ));

    let scan_result = if cli.watch {
        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal_token.cancel();
            }
        });
        scheduler.run_periodic(shutdown).await
    } else {
        scheduler.run_pass().await.map(|_| ())
    };

    if let Err(e) = scan_result {
        exit_if_fatal(&e);
        tracing::error!(error = %e, "Scan pass failed");
    }

    let notifications = NotificationHandler::new(scheduler.clone());
    for txid in &cli.notify_tx {
        if let Err(e) = notifications.on_transaction_observed(txid).await {
            tracing::error!(txid = %txid, error = %e, "Failed to reconcile notified transaction");
        }
    }

    let service = InvoiceService::new(invoices, payments, Arc::new(rates));
    let summaries = service.summarize_all().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = SummaryWriter::new(stdout.lock());
    writer.write_summaries(&summaries).into_diagnostic()?;

    Ok(())
}

use crate::domain::chain::BlockHash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The chain source does not know the requested block at all.
    #[error("Block {0} is unknown to the chain source")]
    UnknownBlock(BlockHash),
    /// A block hash this process observed before has vanished from the chain source.
    /// Orphaned blocks stay known (with -1 confirmations), so this points at a corrupted
    /// or mismatched node and the process must stop.
    #[error("Fatal chain inconsistency: previously observed block {0} is no longer known")]
    FatalChain(BlockHash),
    #[error("Chain source unavailable: {0}")]
    Source(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Invoice {0} not found")]
    InvoiceNotFound(String),
    #[error("No exchange rate available for {0}")]
    RateUnavailable(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

impl ReconcileError {
    /// Returns true for errors after which scanning must not continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReconcileError::FatalChain(_))
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

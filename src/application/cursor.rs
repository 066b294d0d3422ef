use crate::domain::chain::BlockHash;
use crate::domain::ports::{ChainSource, PaymentStore};
use crate::error::{ReconcileError, Result};
use std::time::Duration;
use tokio::time::Instant;

/// Walks back from `start` to the nearest block still on the canonical chain.
///
/// Every hash handed to the walker has been observed before, either persisted with a
/// payment or reported by the node as a predecessor. A node that no longer knows one of
/// them is inconsistent, which surfaces as `ReconcileError::FatalChain`.
pub async fn find_safe_ancestor(chain: &dyn ChainSource, start: &BlockHash) -> Result<BlockHash> {
    let mut hash = start.clone();
    loop {
        let block = match chain.get_block(&hash).await {
            Ok(block) => block,
            Err(ReconcileError::UnknownBlock(unknown)) => {
                tracing::error!(hash = %unknown, "Block hash is not known to the chain source. This should never happen.");
                return Err(ReconcileError::FatalChain(unknown));
            }
            Err(e) => return Err(e),
        };

        if !block.is_orphaned() {
            return Ok(hash);
        }

        match block.previous_block_hash {
            Some(previous) => {
                tracing::info!(hash = %hash, previous = %previous, "Block was reorganized out, stepping back");
                hash = previous;
            }
            // Only genesis lacks a predecessor, and genesis is never reorganized.
            None => return Err(ReconcileError::FatalChain(hash)),
        }
    }
}

/// The last block known to be safe to scan from, plus the start time of the last pass.
///
/// Both live only in memory. After a restart the hash is rebuilt from persisted payments
/// (or genesis) and the timestamp starts empty.
#[derive(Debug, Clone, Default)]
pub struct BlockCursor {
    safe_hash: Option<BlockHash>,
    last_run_at: Option<Instant>,
}

impl BlockCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor resuming from a hash already known to this process.
    pub fn with_safe_hash(hash: BlockHash) -> Self {
        Self {
            safe_hash: Some(hash),
            last_run_at: None,
        }
    }

    pub fn safe_hash(&self) -> Option<&BlockHash> {
        self.safe_hash.as_ref()
    }

    pub fn last_run_at(&self) -> Option<Instant> {
        self.last_run_at
    }

    /// Records the start of a pass unless the previous one started less than `spacing` ago.
    pub fn try_begin_run(&mut self, now: Instant, spacing: Duration) -> bool {
        if let Some(last) = self.last_run_at
            && now.saturating_duration_since(last) < spacing
        {
            return false;
        }
        self.last_run_at = Some(now);
        true
    }

    /// Picks the hash to scan from.
    ///
    /// Preference order: the hash held in memory, the block of the most recent payment seen
    /// in a block, then genesis. Remembered hashes go through [`find_safe_ancestor`] so a
    /// scan never starts from a block that has since been reorganized out.
    pub async fn resolve(
        &self,
        chain: &dyn ChainSource,
        payments: &dyn PaymentStore,
    ) -> Result<BlockHash> {
        if let Some(hash) = &self.safe_hash {
            return find_safe_ancestor(chain, hash).await;
        }

        if let Some(blockhash) = payments
            .latest_with_block_hash()
            .await?
            .and_then(|payment| payment.blockhash)
        {
            let hash = find_safe_ancestor(chain, &blockhash).await?;
            tracing::info!(hash = %hash, "Block cursor initialized from latest payment");
            return Ok(hash);
        }

        let hash = chain.get_block_hash(0).await?;
        tracing::info!(hash = %hash, "Block cursor initialized from genesis");
        Ok(hash)
    }

    /// Moves the cursor to `tip` after a completed pass that started from `from`.
    ///
    /// Returns whether the tip differs from `from`.
    pub fn advance(&mut self, from: &BlockHash, tip: BlockHash) -> bool {
        let moved = &tip != from;
        if moved {
            tracing::debug!(from = %from, tip = %tip, "Advancing block cursor");
        }
        self.safe_hash = Some(tip);
        moved
    }
}

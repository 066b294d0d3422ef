use crate::domain::chain::{
    Block, BlockHash, ORPHANED, SinceBlock, Transaction, TransactionDetail, WalletTransaction,
};
use crate::domain::ports::ChainSource;
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Serializable picture of a wallet node: its blocks, wallet transactions and tip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub tip: Option<BlockHash>,
}

#[derive(Default)]
struct ChainState {
    blocks: HashMap<BlockHash, Block>,
    canonical: BTreeMap<u64, BlockHash>,
    transactions: Vec<Transaction>,
    tip: Option<BlockHash>,
    failures: VecDeque<String>,
    list_since_calls: usize,
}

impl ChainState {
    fn take_failure(&mut self) -> Result<()> {
        match self.failures.pop_front() {
            Some(message) => Err(ReconcileError::Source(message)),
            None => Ok(()),
        }
    }
}

/// A chain source backed by memory, standing in for a wallet node.
///
/// Used by the CLI to replay scenario files and by tests to script reorgs,
/// confirmation growth and transient node failures.
#[derive(Default, Clone)]
pub struct InMemoryChain {
    state: Arc<RwLock<ChainState>>,
}

impl InMemoryChain {
    /// Creates a new, empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_snapshot(snapshot: ChainSnapshot) -> Self {
        let chain = Self::new();
        for block in snapshot.blocks {
            chain.add_block(block).await;
        }
        for tx in snapshot.transactions {
            chain.upsert_transaction(tx).await;
        }
        if let Some(tip) = snapshot.tip {
            chain.set_tip(tip).await;
        }
        chain
    }

    /// Adds a block. Canonical blocks at or above the current tip height become the tip.
    pub async fn add_block(&self, block: Block) {
        let mut state = self.state.write().await;
        if !block.is_orphaned() {
            state.canonical.insert(block.height, block.hash.clone());
            let tip_height = state
                .tip
                .as_ref()
                .and_then(|tip| state.blocks.get(tip))
                .map(|tip| tip.height);
            if tip_height.is_none_or(|height| block.height >= height) {
                state.tip = Some(block.hash.clone());
            }
        }
        state.blocks.insert(block.hash.clone(), block);
    }

    pub async fn set_tip(&self, hash: BlockHash) {
        self.state.write().await.tip = Some(hash);
    }

    /// Marks `hash` as reorganized out, along with every transaction mined in it.
    pub async fn orphan_block(&self, hash: &BlockHash) {
        let mut state = self.state.write().await;
        let Some(block) = state.blocks.get_mut(hash) else {
            return;
        };
        block.confirmations = ORPHANED;
        let height = block.height;
        if state.canonical.get(&height) == Some(hash) {
            state.canonical.remove(&height);
        }
        for tx in state
            .transactions
            .iter_mut()
            .filter(|tx| tx.blockhash.as_ref() == Some(hash))
        {
            tx.confirmations = ORPHANED;
        }
    }

    /// Drops every trace of `hash`, as a mismatched node would.
    pub async fn forget_block(&self, hash: &BlockHash) {
        let mut state = self.state.write().await;
        if let Some(block) = state.blocks.remove(hash) {
            if state.canonical.get(&block.height) == Some(hash) {
                state.canonical.remove(&block.height);
            }
        }
    }

    pub async fn upsert_transaction(&self, tx: Transaction) {
        let mut state = self.state.write().await;
        match state.transactions.iter_mut().find(|t| t.txid == tx.txid) {
            Some(existing) => *existing = tx,
            None => state.transactions.push(tx),
        }
    }

    pub async fn set_transaction_confirmations(
        &self,
        txid: &str,
        confirmations: i64,
        blockhash: Option<BlockHash>,
    ) {
        let mut state = self.state.write().await;
        if let Some(tx) = state.transactions.iter_mut().find(|t| t.txid == txid) {
            tx.confirmations = confirmations;
            tx.blockhash = blockhash;
        }
    }

    /// Makes the next RPC call fail with a transient source error.
    pub async fn fail_next_call(&self, message: impl Into<String>) {
        self.state.write().await.failures.push_back(message.into());
    }

    pub async fn list_since_calls(&self) -> usize {
        self.state.read().await.list_since_calls
    }
}

#[async_trait]
impl ChainSource for InMemoryChain {
    async fn get_block(&self, hash: &BlockHash) -> Result<Block> {
        let mut state = self.state.write().await;
        state.take_failure()?;
        state
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| ReconcileError::UnknownBlock(hash.clone()))
    }

    async fn get_block_hash(&self, height: u64) -> Result<BlockHash> {
        let mut state = self.state.write().await;
        state.take_failure()?;
        state
            .canonical
            .get(&height)
            .cloned()
            .ok_or_else(|| ReconcileError::Source(format!("Block height {} out of range", height)))
    }

    async fn list_since_block(&self, hash: &BlockHash) -> Result<SinceBlock> {
        let mut state = self.state.write().await;
        state.take_failure()?;
        state.list_since_calls += 1;

        let since_height = state
            .blocks
            .get(hash)
            .map(|block| block.height)
            .ok_or_else(|| ReconcileError::UnknownBlock(hash.clone()))?;

        let transactions = state
            .transactions
            .iter()
            .filter(|tx| match &tx.blockhash {
                None => true,
                Some(blockhash) => state
                    .blocks
                    .get(blockhash)
                    .is_none_or(|block| block.height > since_height),
            })
            .cloned()
            .collect();

        Ok(SinceBlock {
            transactions,
            last_block: state.tip.clone().unwrap_or_else(|| hash.clone()),
        })
    }

    async fn get_transaction(&self, txid: &str) -> Result<WalletTransaction> {
        let mut state = self.state.write().await;
        state.take_failure()?;
        let tx = state
            .transactions
            .iter()
            .find(|t| t.txid == txid)
            .ok_or_else(|| {
                ReconcileError::Validation(format!("Invalid or non-wallet transaction id {}", txid))
            })?;

        Ok(WalletTransaction {
            txid: tx.txid.clone(),
            confirmations: tx.confirmations,
            blockhash: tx.blockhash.clone(),
            details: tx
                .outputs
                .iter()
                .map(|output| TransactionDetail {
                    category: tx.category,
                    address: output.address.clone(),
                    amount: output.amount,
                })
                .collect(),
        })
    }
}

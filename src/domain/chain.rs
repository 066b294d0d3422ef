use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confirmation count the chain source reports for blocks and transactions
/// that are no longer on the canonical chain.
pub const ORPHANED: i64 = -1;

/// Hex-encoded block hash as reported by the chain source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHash(String);

impl BlockHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlockHash {
    fn from(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Block header fields needed to walk back across a reorg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub hash: BlockHash,
    #[serde(default)]
    pub height: u64,
    pub confirmations: i64,
    #[serde(rename = "previousblockhash", default)]
    pub previous_block_hash: Option<BlockHash>,
}

impl Block {
    pub fn is_orphaned(&self) -> bool {
        self.confirmations == ORPHANED
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Receive,
    Send,
    Generate,
    Immature,
    Orphan,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: Decimal,
}

/// A wallet transaction as listed by the chain source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    #[serde(default)]
    pub blockhash: Option<BlockHash>,
    pub confirmations: i64,
    pub category: Category,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    pub fn is_receive(&self) -> bool {
        self.category == Category::Receive
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub category: Category,
    pub address: String,
    pub amount: Decimal,
}

/// A single transaction looked up by id, with one detail entry per wallet output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub txid: String,
    pub confirmations: i64,
    #[serde(default)]
    pub blockhash: Option<BlockHash>,
    pub details: Vec<TransactionDetail>,
}

impl WalletTransaction {
    /// Keeps only the outputs this wallet received.
    pub fn into_receive_transaction(self) -> Transaction {
        let outputs = self
            .details
            .into_iter()
            .filter(|detail| detail.category == Category::Receive)
            .map(|detail| TxOutput {
                address: detail.address,
                amount: detail.amount,
            })
            .collect();

        Transaction {
            txid: self.txid,
            blockhash: self.blockhash,
            confirmations: self.confirmations,
            category: Category::Receive,
            outputs,
        }
    }
}

/// Result of listing wallet transactions since a given block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinceBlock {
    pub transactions: Vec<Transaction>,
    #[serde(rename = "lastblock")]
    pub last_block: BlockHash,
}

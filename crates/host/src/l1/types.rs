//! L1 block, transaction and receipt records handed between the L1 service,
//! the guardian and the enclave.

use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

/// Header fields of an L1 block that the host persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1BlockHeader {
    /// Block hash.
    pub hash: B256,
    /// Parent block hash.
    pub parent_hash: B256,
    /// Block number.
    pub number: u64,
    /// Block timestamp.
    pub timestamp: u64,
}

/// A transaction included in an L1 block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Transaction {
    /// Transaction hash.
    pub hash: B256,
    /// Recipient, `None` for contract creation.
    pub to: Option<Address>,
    /// Call data.
    pub input: Bytes,
}

/// An L1 block with its transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Block {
    /// Block header.
    pub header: L1BlockHeader,
    /// Transactions in block order.
    pub transactions: Vec<L1Transaction>,
}

impl L1Block {
    /// Returns the block hash.
    pub const fn hash(&self) -> B256 {
        self.header.hash
    }

    /// Returns the parent block hash.
    pub const fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }

    /// Returns the block number.
    pub const fn number(&self) -> u64 {
        self.header.number
    }
}

/// Receipt of an L1 transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Receipt {
    /// Hash of the transaction this receipt belongs to.
    pub transaction_hash: B256,
    /// Hash of the including block, if mined.
    pub block_hash: Option<B256>,
    /// Number of the including block, if mined.
    pub block_number: Option<u64>,
    /// Whether execution succeeded.
    pub status: bool,
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedL1Tx {
    /// Transaction hash.
    pub hash: B256,
    /// EIP-2718 encoded transaction.
    pub raw: Bytes,
}

/// Reported by a background receipt watcher when a fire-and-forget
/// transaction was not confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1TxFailure {
    /// Hash of the failed transaction.
    pub tx_hash: B256,
    /// What the transaction was for.
    pub kind: &'static str,
    /// Why it failed.
    pub reason: String,
}

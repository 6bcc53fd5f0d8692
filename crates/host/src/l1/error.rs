//! L1 error types.

use std::time::Duration;

use alloy_primitives::B256;
use alloy_transport::TransportError;
use thiserror::Error;

/// RPC-specific error type.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Transport error from alloy.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Block not found.
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// Invalid response from RPC.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request timeout.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),
}

impl RpcError {
    /// Returns true if this error is transient and the operation should be retried.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_) | Self::Connection(_))
    }
}

impl From<TransportError> for RpcError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type alias for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Error returned by the L1 service.
#[derive(Debug, Error)]
pub enum L1Error {
    /// The requested block is already the L1 head.
    #[error("no next block")]
    NoNextBlock,

    /// Walking back to the canonical chain exceeded the configured depth.
    #[error("reorg deeper than {0} blocks")]
    ReorgTooDeep(u64),

    /// L1 RPC failure.
    #[error("L1 RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// The transaction could not be signed.
    #[error("failed to sign transaction: {0}")]
    Signing(String),

    /// The transaction was mined but reverted.
    #[error("transaction {0} reverted")]
    TxReverted(B256),

    /// No receipt appeared within the configured wait.
    #[error("no receipt for transaction {tx_hash} after {waited:?}")]
    ReceiptTimeout {
        /// Hash of the unconfirmed transaction.
        tx_hash: B256,
        /// How long the receipt was polled for.
        waited: Duration,
    },

    /// Not yet mined; retried until the receipt wait runs out.
    #[error("receipt for transaction {0} not found")]
    ReceiptNotFound(B256),
}

/// Result type alias for L1 service operations.
pub type L1Result<T> = Result<T, L1Error>;

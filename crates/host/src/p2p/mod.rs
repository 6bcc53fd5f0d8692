//! Peer-to-peer transport between hosts.

mod http;
pub use http::HttpP2p;

use std::sync::Arc;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use thiserror::Error;

use crate::{BatchRequest, EncryptedTx};

/// Errors returned by the P2P transport.
#[derive(Debug, Error)]
pub enum P2pError {
    /// The inbound listener could not be started.
    #[error("failed to bind P2P listener: {0}")]
    Bind(String),

    /// An outbound message could not be delivered.
    #[error("failed to send to {to}: {reason}")]
    Send {
        /// Destination address.
        to: String,
        /// Failure reason.
        reason: String,
    },

    /// No sequencer is configured to ask for batches.
    #[error("no sequencer configured")]
    NoSequencer,
}

/// Result type alias for P2P operations.
pub type P2pResult<T> = Result<T, P2pError>;

/// Handles messages received from peers.
#[async_trait]
pub trait P2pHandler: Send + Sync {
    /// An RLP-encoded `BatchMsg` arrived.
    async fn receive_batches(&self, encoded: Bytes);

    /// A gossiped encrypted transaction arrived.
    async fn receive_tx(&self, tx: EncryptedTx);

    /// An RLP-encoded `BatchRequest` arrived.
    async fn receive_batch_request(&self, encoded: Bytes);
}

/// Message transport between hosts.
#[async_trait]
pub trait P2p: Send + Sync {
    /// Starts delivering inbound messages to `handler`.
    async fn start_listening(&self, handler: Arc<dyn P2pHandler>) -> P2pResult<()>;

    /// Stops the inbound listener.
    async fn stop_listening(&self);

    /// Sends an encoded `BatchMsg` to the host at `to`.
    async fn send_batches(&self, to: &str, encoded: Bytes) -> P2pResult<()>;

    /// Asks the sequencer for the batches following `request.current_head_batch`.
    async fn request_batches(&self, request: &BatchRequest) -> P2pResult<()>;
}

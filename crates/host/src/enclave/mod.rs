//! The enclave's RPC surface as consumed by the guardian.

mod client;
pub use client::RpcEnclaveClient;

mod error;
pub use error::{EnclaveError, EnclaveResult};

mod types;
pub use types::{
    AttestationReport, EnclaveStatusCode, EnclaveStatusReport, ProducedSecretResponse,
    SubmitBlockResponse,
};

use alloy_primitives::Bytes;
use async_trait::async_trait;

use crate::{EncryptedTx, ExtBatch, L1Block, L1Receipt};

/// Calls the guardian makes into the enclave.
///
/// Submissions for one stream must not overlap; the guardian serializes
/// them before calling in.
#[async_trait]
pub trait EnclaveClient: Send + Sync {
    /// Queries the enclave's status code and processed heads.
    async fn status(&self) -> EnclaveResult<EnclaveStatusReport>;

    /// Fetches an attestation report for this enclave.
    async fn attestation(&self) -> EnclaveResult<AttestationReport>;

    /// Generates a fresh network secret. Only called on the genesis node.
    async fn generate_secret(&self) -> EnclaveResult<Bytes>;

    /// Provisions the enclave with a network secret encrypted to it.
    async fn init_enclave(&self, secret: Bytes) -> EnclaveResult<()>;

    /// Submits an L1 block with its receipts.
    async fn submit_l1_block(
        &self,
        block: L1Block,
        receipts: Vec<L1Receipt>,
        is_latest: bool,
    ) -> EnclaveResult<SubmitBlockResponse>;

    /// Submits an L2 batch.
    async fn submit_batch(&self, batch: ExtBatch) -> EnclaveResult<()>;

    /// Submits a gossiped encrypted transaction.
    async fn submit_tx(&self, tx: EncryptedTx) -> EnclaveResult<()>;
}

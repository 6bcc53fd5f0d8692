//! Enclave RPC client.

use std::time::Duration;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use jsonrpsee::{
    core::client::ClientT,
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};

use super::{
    AttestationReport, EnclaveClient, EnclaveError, EnclaveResult, EnclaveStatusReport,
    SubmitBlockResponse,
};
use crate::{EncryptedTx, ExtBatch, L1Block, L1Receipt};

/// JSON-RPC client for the enclave server.
#[derive(Debug, Clone)]
pub struct RpcEnclaveClient {
    inner: HttpClient,
}

impl RpcEnclaveClient {
    /// Create a new enclave client.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL of the enclave RPC server (e.g., `http://127.0.0.1:11000`)
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(url: &str, timeout: Duration) -> EnclaveResult<Self> {
        let inner = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(url)
            .map_err(|e| EnclaveError::ClientCreation(e.to_string()))?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl EnclaveClient for RpcEnclaveClient {
    async fn status(&self) -> EnclaveResult<EnclaveStatusReport> {
        self.inner.request("enclave_status", rpc_params![]).await.map_err(Into::into)
    }

    async fn attestation(&self) -> EnclaveResult<AttestationReport> {
        self.inner.request("enclave_attestation", rpc_params![]).await.map_err(Into::into)
    }

    async fn generate_secret(&self) -> EnclaveResult<Bytes> {
        self.inner.request("enclave_generateSecret", rpc_params![]).await.map_err(Into::into)
    }

    async fn init_enclave(&self, secret: Bytes) -> EnclaveResult<()> {
        self.inner.request("enclave_initEnclave", rpc_params![secret]).await.map_err(Into::into)
    }

    async fn submit_l1_block(
        &self,
        block: L1Block,
        receipts: Vec<L1Receipt>,
        is_latest: bool,
    ) -> EnclaveResult<SubmitBlockResponse> {
        self.inner
            .request("enclave_submitL1Block", rpc_params![block, receipts, is_latest])
            .await
            .map_err(Into::into)
    }

    async fn submit_batch(&self, batch: ExtBatch) -> EnclaveResult<()> {
        self.inner.request("enclave_submitBatch", rpc_params![batch]).await.map_err(Into::into)
    }

    async fn submit_tx(&self, tx: EncryptedTx) -> EnclaveResult<()> {
        self.inner.request("enclave_submitTx", rpc_params![tx]).await.map_err(Into::into)
    }
}

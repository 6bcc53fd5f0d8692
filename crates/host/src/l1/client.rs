//! L1 RPC client.

use std::time::Duration;

use alloy_eips::BlockNumberOrTag;
use alloy_network::{TransactionBuilder, TransactionResponse};
use alloy_primitives::{Address, B256, Bytes};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::{Block, TransactionReceipt, TransactionRequest};
use alloy_transport_http::{Http, reqwest::Client};
use async_trait::async_trait;
use backon::Retryable;
use tokio::sync::OnceCell;
use url::Url;

use super::error::{RpcError, RpcResult};
use crate::{
    L1Block, L1BlockHeader, L1Receipt, L1Transaction,
    config::RetryConfig,
    constants::{
        DEFAULT_RPC_TIMEOUT, GAS_LIMIT_MULTIPLIER_DENOMINATOR, GAS_LIMIT_MULTIPLIER_NUMERATOR,
    },
};

/// Read and broadcast access to the L1 chain.
#[async_trait]
pub trait L1Client: Send + Sync {
    /// Returns the current head block.
    async fn head_block(&self) -> RpcResult<L1Block>;

    /// Returns the block with the given hash.
    async fn block_by_hash(&self, hash: B256) -> RpcResult<Option<L1Block>>;

    /// Returns the canonical block at the given height.
    async fn block_by_number(&self, number: u64) -> RpcResult<Option<L1Block>>;

    /// Returns the receipt of a transaction, `None` while it is pending.
    async fn transaction_receipt(&self, hash: B256) -> RpcResult<Option<L1Receipt>>;

    /// Returns the next nonce for `address`, including pending transactions.
    async fn nonce(&self, address: Address) -> RpcResult<u64>;

    /// Fills in chain id, fees and gas limit.
    async fn prepare_transaction(&self, tx: TransactionRequest) -> RpcResult<TransactionRequest>;

    /// Broadcasts a signed transaction and returns its hash.
    async fn send_raw_transaction(&self, raw: Bytes) -> RpcResult<B256>;
}

/// Configuration for the L1 client.
#[derive(Debug, Clone)]
pub struct L1ClientConfig {
    /// RPC endpoint URL.
    pub endpoint: Url,
    /// Request timeout.
    pub timeout: Duration,
    /// Retry configuration.
    pub retry_config: RetryConfig,
}

impl L1ClientConfig {
    /// Creates a new L1 client configuration with defaults.
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint, timeout: DEFAULT_RPC_TIMEOUT, retry_config: RetryConfig::default() }
    }

    /// Sets the request timeout.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub const fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }
}

/// Applies a 120% safety margin to a gas estimate using integer arithmetic.
const fn apply_gas_margin(estimated: u64) -> u64 {
    estimated.saturating_mul(GAS_LIMIT_MULTIPLIER_NUMERATOR) / GAS_LIMIT_MULTIPLIER_DENOMINATOR
}

fn to_l1_block(block: Block) -> L1Block {
    let header = L1BlockHeader {
        hash: block.header.hash,
        parent_hash: block.header.parent_hash,
        number: block.header.number,
        timestamp: block.header.timestamp,
    };
    let transactions = block
        .transactions
        .txns()
        .map(|tx| L1Transaction {
            hash: TransactionResponse::tx_hash(tx),
            to: alloy_consensus::Transaction::to(tx),
            input: alloy_consensus::Transaction::input(tx).clone(),
        })
        .collect();
    L1Block { header, transactions }
}

fn to_l1_receipt(receipt: &TransactionReceipt) -> L1Receipt {
    L1Receipt {
        transaction_hash: receipt.transaction_hash,
        block_hash: receipt.block_hash,
        block_number: receipt.block_number,
        status: receipt.status(),
    }
}

/// L1 RPC client implementation using Alloy.
pub struct AlloyL1Client {
    provider: RootProvider,
    retry_config: RetryConfig,
    chain_id: OnceCell<u64>,
}

impl std::fmt::Debug for AlloyL1Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyL1Client")
            .field("chain_id", &self.chain_id.get())
            .finish_non_exhaustive()
    }
}

impl AlloyL1Client {
    /// Creates a new L1 client from the given configuration.
    pub fn new(config: L1ClientConfig) -> RpcResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RpcError::Connection(format!("Failed to build HTTP client: {e}")))?;

        let http = Http::with_client(client, config.endpoint);
        let provider = RootProvider::new(RpcClient::new(http, false));

        Ok(Self { provider, retry_config: config.retry_config, chain_id: OnceCell::new() })
    }

    async fn chain_id(&self) -> RpcResult<u64> {
        self.chain_id
            .get_or_try_init(|| async {
                self.provider.get_chain_id().await.map_err(RpcError::from)
            })
            .await
            .copied()
    }
}

#[async_trait]
impl L1Client for AlloyL1Client {
    async fn head_block(&self) -> RpcResult<L1Block> {
        let backoff = self.retry_config.to_backoff_builder();

        (|| async {
            self.provider
                .get_block_by_number(BlockNumberOrTag::Latest)
                .full()
                .await?
                .map(to_l1_block)
                .ok_or_else(|| RpcError::BlockNotFound("latest".to_string()))
        })
        .retry(backoff)
        .when(|e| e.is_retryable())
        .notify(|err, dur| {
            tracing::debug!(error = %err, delay = ?dur, "Retrying L1Client::head_block");
        })
        .await
    }

    async fn block_by_hash(&self, hash: B256) -> RpcResult<Option<L1Block>> {
        let backoff = self.retry_config.to_backoff_builder();

        (|| async {
            let block = self.provider.get_block_by_hash(hash).full().await?;
            Ok(block.map(to_l1_block))
        })
        .retry(backoff)
        .when(|e: &RpcError| e.is_retryable())
        .notify(|err, dur| {
            tracing::debug!(error = %err, delay = ?dur, "Retrying L1Client::block_by_hash");
        })
        .await
    }

    async fn block_by_number(&self, number: u64) -> RpcResult<Option<L1Block>> {
        let backoff = self.retry_config.to_backoff_builder();

        (|| async {
            let block =
                self.provider.get_block_by_number(BlockNumberOrTag::Number(number)).full().await?;
            Ok(block.map(to_l1_block))
        })
        .retry(backoff)
        .when(|e: &RpcError| e.is_retryable())
        .notify(|err, dur| {
            tracing::debug!(error = %err, delay = ?dur, "Retrying L1Client::block_by_number");
        })
        .await
    }

    async fn transaction_receipt(&self, hash: B256) -> RpcResult<Option<L1Receipt>> {
        let backoff = self.retry_config.to_backoff_builder();

        (|| async {
            let receipt = self.provider.get_transaction_receipt(hash).await?;
            Ok(receipt.as_ref().map(to_l1_receipt))
        })
        .retry(backoff)
        .when(|e: &RpcError| e.is_retryable())
        .notify(|err, dur| {
            tracing::debug!(error = %err, delay = ?dur, "Retrying L1Client::transaction_receipt");
        })
        .await
    }

    async fn nonce(&self, address: Address) -> RpcResult<u64> {
        let backoff = self.retry_config.to_backoff_builder();

        (|| async {
            self.provider.get_transaction_count(address).pending().await.map_err(RpcError::from)
        })
        .retry(backoff)
        .when(|e| e.is_retryable())
        .notify(|err, dur| {
            tracing::debug!(error = %err, delay = ?dur, "Retrying L1Client::nonce");
        })
        .await
    }

    async fn prepare_transaction(
        &self,
        mut tx: TransactionRequest,
    ) -> RpcResult<TransactionRequest> {
        tx.set_chain_id(self.chain_id().await?);

        let fees = self.provider.estimate_eip1559_fees().await?;
        tx = tx
            .max_fee_per_gas(fees.max_fee_per_gas)
            .max_priority_fee_per_gas(fees.max_priority_fee_per_gas);

        let gas_estimate = self.provider.estimate_gas(tx.clone()).await?;
        tx.set_gas_limit(apply_gas_margin(gas_estimate));
        Ok(tx)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> RpcResult<B256> {
        let pending = self.provider.send_raw_transaction(&raw).await?;
        Ok(*pending.tx_hash())
    }
}

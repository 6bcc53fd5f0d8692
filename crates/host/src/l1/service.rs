//! L1 data service: block streaming, catch-up lookups and management contract transactions.

use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, B256, Bytes};
use alloy_rpc_types_eth::{TransactionInput, TransactionRequest};
use async_trait::async_trait;
use backon::{ConstantBuilder, ExponentialBuilder, Retryable};
use parking_lot::{Mutex, RwLock};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    client::L1Client,
    contract::{ManagementContract, ManagementTx, SecretResponse},
    error::{L1Error, L1Result, RpcError},
    responder::SecretResponder,
    wallet::L1Wallet,
};
use crate::{
    AttestationReport, L1Block, L1BlockHeader, L1Receipt, L1TxFailure, ProducedSecretResponse,
    constants::{
        DEFAULT_L1_POLL_INTERVAL, DEFAULT_L1_RECEIPT_INTERVAL, DEFAULT_L1_RECEIPT_TIMEOUT,
        DEFAULT_L1_TX_INITIAL_DELAY, DEFAULT_L1_TX_TRIES, DEFAULT_MAX_L1_REORG_DEPTH,
        TX_FAILURE_CHANNEL_CAPACITY,
    },
    metrics::{L1_TXS_SENT_TOTAL, LABEL_KIND},
};

/// Receives new L1 blocks from the streaming task.
#[async_trait]
pub trait L1BlockReceiver: Send + Sync {
    /// Called once per new block, in chain order.
    async fn on_new_l1_block(&self, block: L1Block);
}

/// L1 service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1ServiceConfig {
    /// Address of the rollup management contract.
    pub management_contract: Address,
    /// Identity this host's enclave attests with on L1.
    pub host_id: Address,
    /// P2P address advertised in secret transactions.
    pub host_address: String,
    /// First L1 block fed to a fresh enclave.
    pub l1_start_block: u64,
    /// Head polling interval.
    pub poll_interval: Duration,
    /// Maximum number of blocks walked back to find a canonical ancestor.
    pub max_reorg_depth: u64,
    /// Broadcast attempts per transaction.
    pub tx_tries: u32,
    /// Delay before the first broadcast retry, doubled on every retry.
    pub tx_initial_delay: Duration,
    /// Total time to wait for a receipt.
    pub receipt_timeout: Duration,
    /// Receipt polling interval.
    pub receipt_interval: Duration,
}

impl Default for L1ServiceConfig {
    fn default() -> Self {
        Self {
            management_contract: Address::ZERO,
            host_id: Address::ZERO,
            host_address: String::new(),
            l1_start_block: 0,
            poll_interval: DEFAULT_L1_POLL_INTERVAL,
            max_reorg_depth: DEFAULT_MAX_L1_REORG_DEPTH,
            tx_tries: DEFAULT_L1_TX_TRIES,
            tx_initial_delay: DEFAULT_L1_TX_INITIAL_DELAY,
            receipt_timeout: DEFAULT_L1_RECEIPT_TIMEOUT,
            receipt_interval: DEFAULT_L1_RECEIPT_INTERVAL,
        }
    }
}

type Subscribers = Arc<RwLock<Vec<Arc<dyn L1BlockReceiver>>>>;

/// Streams L1 blocks to subscribers and sends management contract transactions.
pub struct L1Service {
    config: L1ServiceConfig,
    client: Arc<dyn L1Client>,
    wallet: Arc<dyn L1Wallet>,
    contract: ManagementContract,
    responder: Arc<dyn SecretResponder>,
    subscribers: Subscribers,
    tx_failures: broadcast::Sender<L1TxFailure>,
    cancel: CancellationToken,
    stream_handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for L1Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L1Service")
            .field("config", &self.config)
            .field("subscribers", &self.subscribers.read().len())
            .finish_non_exhaustive()
    }
}

impl L1Service {
    /// Creates the service. Nothing runs until [`L1Service::start`].
    pub fn new(
        config: L1ServiceConfig,
        client: Arc<dyn L1Client>,
        wallet: Arc<dyn L1Wallet>,
        responder: Arc<dyn SecretResponder>,
    ) -> Self {
        let (tx_failures, _) = broadcast::channel(TX_FAILURE_CHANNEL_CAPACITY);
        Self {
            contract: ManagementContract::new(config.management_contract),
            config,
            client,
            wallet,
            responder,
            subscribers: Arc::default(),
            tx_failures,
            cancel: CancellationToken::new(),
            stream_handle: Mutex::new(None),
        }
    }

    /// Registers a receiver for new L1 blocks.
    pub fn subscribe(&self, receiver: Arc<dyn L1BlockReceiver>) {
        self.subscribers.write().push(receiver);
    }

    /// Returns a receiver for failures reported by background receipt watchers.
    pub fn tx_failures(&self) -> broadcast::Receiver<L1TxFailure> {
        self.tx_failures.subscribe()
    }

    /// Seeds the wallet nonce from L1 and starts streaming blocks.
    pub async fn start(&self) -> L1Result<()> {
        let nonce = self.client.nonce(self.wallet.address()).await?;
        self.wallet.set_nonce(nonce);

        let handle = tokio::spawn(stream_blocks(
            Arc::clone(&self.client),
            Arc::clone(&self.subscribers),
            self.config.poll_interval,
            self.config.max_reorg_depth,
            self.cancel.clone(),
        ));
        *self.stream_handle.lock() = Some(handle);

        info!(
            address = %self.wallet.address(),
            nonce,
            contract = %self.contract.address(),
            "L1 service started"
        );
        Ok(())
    }

    /// Stops the streaming task and waits for it to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.stream_handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(error = %e, "L1 streaming task did not exit cleanly");
        }
    }

    /// Returns the block following `prev` on the canonical chain, and whether it is the head.
    ///
    /// A zero `prev` starts from the configured start block. If `prev` is no
    /// longer canonical the walk goes back to its canonical ancestor first.
    pub async fn fetch_next_block(&self, prev: B256) -> L1Result<(L1Block, bool)> {
        let head = self.client.head_block().await?;
        if prev == head.hash() {
            return Err(L1Error::NoNextBlock);
        }

        let next = if prev.is_zero() {
            self.config.l1_start_block
        } else {
            self.canonical_ancestor(prev).await?.number + 1
        };
        if next > head.number() {
            return Err(L1Error::NoNextBlock);
        }

        if next == head.number() {
            return Ok((head, true));
        }
        let block = self
            .client
            .block_by_number(next)
            .await?
            .ok_or_else(|| RpcError::BlockNotFound(next.to_string()))?;
        Ok((block, false))
    }

    async fn canonical_ancestor(&self, from: B256) -> L1Result<L1BlockHeader> {
        let mut hash = from;
        for _ in 0..=self.config.max_reorg_depth {
            let block = self
                .client
                .block_by_hash(hash)
                .await?
                .ok_or_else(|| RpcError::BlockNotFound(hash.to_string()))?;
            let canonical = self.client.block_by_number(block.number()).await?;
            if canonical.is_some_and(|c| c.hash() == hash) {
                return Ok(block.header);
            }
            if block.number() == 0 {
                break;
            }
            hash = block.parent_hash();
        }
        Err(L1Error::ReorgTooDeep(self.config.max_reorg_depth))
    }

    /// Fetches receipts for the management contract transactions in `block`.
    ///
    /// Missing and failed receipts are skipped.
    pub async fn fetch_receipts(&self, block: &L1Block) -> L1Result<Vec<L1Receipt>> {
        let mut receipts = Vec::new();
        for tx in block.transactions.iter().filter(|tx| tx.to == Some(self.contract.address())) {
            match self.client.transaction_receipt(tx.hash).await? {
                Some(receipt) if receipt.status => receipts.push(receipt),
                Some(_) => {
                    warn!(tx_hash = %tx.hash, block = %block.hash(), "Skipping failed receipt");
                }
                None => {
                    warn!(tx_hash = %tx.hash, block = %block.hash(), "Receipt not found");
                }
            }
        }
        Ok(receipts)
    }

    /// Publishes the genesis network secret and waits for the receipt.
    pub async fn initialize_secret(
        &self,
        aggregator_id: Address,
        attestation: &AttestationReport,
        secret: Bytes,
    ) -> L1Result<L1Receipt> {
        let calldata = self.contract.initialize_secret_calldata(
            aggregator_id,
            attestation,
            secret,
            self.config.host_address.clone(),
        );
        let tx_hash = self.sign_and_broadcast(calldata, "initialize_secret").await?;
        info!(%tx_hash, "Network secret broadcast, waiting for receipt");

        let receipt = wait_for_receipt(
            self.client.as_ref(),
            tx_hash,
            self.config.receipt_interval,
            self.config.receipt_timeout,
        )
        .await?;
        info!(%tx_hash, block_number = ?receipt.block_number, "Network secret confirmed");
        Ok(receipt)
    }

    /// Requests the network secret.
    ///
    /// Returns the L1 head hash observed before broadcasting; responses are
    /// found in blocks after it. The receipt is watched in the background.
    pub async fn request_secret(&self, attestation: &AttestationReport) -> L1Result<B256> {
        let cursor = self.client.head_block().await?.hash();
        let calldata = self.contract.request_secret_calldata(attestation);
        let tx_hash = self.sign_and_broadcast(calldata, "request_secret").await?;
        info!(%tx_hash, %cursor, "Network secret requested");

        self.watch_receipt(tx_hash, "request_secret");
        Ok(cursor)
    }

    /// Returns the secret responses carried by `block`.
    pub fn extract_secret_responses(&self, block: &L1Block) -> Vec<SecretResponse> {
        block
            .transactions
            .iter()
            .filter_map(|tx| match self.contract.decode(tx) {
                Some(ManagementTx::RespondSecret(response)) => Some(response),
                _ => None,
            })
            .collect()
    }

    /// Broadcasts the secret responses produced by the enclave, if this node answers requests.
    pub async fn publish_shared_secret_responses(
        &self,
        responses: &[ProducedSecretResponse],
    ) -> L1Result<()> {
        for produced in responses {
            if !self.responder.should_publish(produced) {
                debug!(requester = %produced.requester_id, "Not publishing secret response");
                continue;
            }

            let response = SecretResponse {
                secret: produced.secret.clone(),
                requester_id: produced.requester_id,
                attester_id: self.config.host_id,
                host_address: produced.host_address.clone(),
            };
            let calldata = self.contract.respond_secret_calldata(&response);
            let tx_hash = self.sign_and_broadcast(calldata, "respond_secret").await?;
            info!(%tx_hash, requester = %produced.requester_id, "Secret response broadcast");

            self.watch_receipt(tx_hash, "respond_secret");
        }
        Ok(())
    }

    /// Prepares, signs and broadcasts a call to the management contract.
    pub async fn sign_and_broadcast(&self, calldata: Bytes, kind: &'static str) -> L1Result<B256> {
        let nonce = self.wallet.next_nonce();
        let request = TransactionRequest::default()
            .from(self.wallet.address())
            .to(self.contract.address())
            .input(TransactionInput::new(calldata))
            .nonce(nonce);

        let prepared = match self.client.prepare_transaction(request).await {
            Ok(tx) => tx,
            Err(e) => {
                self.wallet.rollback_nonce(nonce);
                return Err(e.into());
            }
        };
        let signed = match self.wallet.sign(prepared).await {
            Ok(signed) => signed,
            Err(e) => {
                self.wallet.rollback_nonce(nonce);
                return Err(e);
            }
        };

        let sent = (|| async { self.client.send_raw_transaction(signed.raw.clone()).await })
            .retry(broadcast_backoff(self.config.tx_initial_delay, self.config.tx_tries))
            .notify(|err, dur| {
                warn!(error = %err, delay = ?dur, kind, "Retrying L1 transaction broadcast");
            })
            .await;

        match sent {
            Ok(tx_hash) => {
                metrics::counter!(L1_TXS_SENT_TOTAL, LABEL_KIND => kind).increment(1);
                debug!(%tx_hash, nonce, kind, "L1 transaction broadcast");
                Ok(tx_hash)
            }
            Err(e) => {
                // the nonce may or may not have been consumed
                match self.client.nonce(self.wallet.address()).await {
                    Ok(n) => self.wallet.set_nonce(n),
                    Err(err) => warn!(error = %err, "Failed to resync wallet nonce"),
                }
                Err(e.into())
            }
        }
    }

    fn watch_receipt(&self, tx_hash: B256, kind: &'static str) {
        let client = Arc::clone(&self.client);
        let failures = self.tx_failures.clone();
        let interval = self.config.receipt_interval;
        let timeout = self.config.receipt_timeout;

        tokio::spawn(async move {
            match wait_for_receipt(client.as_ref(), tx_hash, interval, timeout).await {
                Ok(receipt) => {
                    debug!(%tx_hash, kind, block_number = ?receipt.block_number, "L1 tx confirmed");
                }
                Err(e) => {
                    warn!(%tx_hash, kind, error = %e, "L1 transaction failed");
                    let _ = failures.send(L1TxFailure { tx_hash, kind, reason: e.to_string() });
                }
            }
        });
    }
}

/// Backoff for broadcast retries: `tries` attempts with a doubling delay and no jitter.
fn broadcast_backoff(initial_delay: Duration, tries: u32) -> ExponentialBuilder {
    let retries = tries.saturating_sub(1);
    ExponentialBuilder::default()
        .with_min_delay(initial_delay)
        .with_factor(2.0)
        .with_max_delay(initial_delay.saturating_mul(1 << retries.min(31)))
        .with_max_times(retries as usize)
}

/// Polls for the receipt of `tx_hash` until it appears or `timeout` runs out.
async fn wait_for_receipt(
    client: &dyn L1Client,
    tx_hash: B256,
    interval: Duration,
    timeout: Duration,
) -> L1Result<L1Receipt> {
    let polls = (timeout.as_millis() / interval.as_millis().max(1)) as usize;
    let backoff = ConstantBuilder::default().with_delay(interval).with_max_times(polls);

    let receipt = (|| async {
        client.transaction_receipt(tx_hash).await?.ok_or(L1Error::ReceiptNotFound(tx_hash))
    })
    .retry(backoff)
    .when(|e| match e {
        L1Error::ReceiptNotFound(_) => true,
        L1Error::Rpc(rpc) => rpc.is_retryable(),
        _ => false,
    })
    .await
    .map_err(|e| match e {
        L1Error::ReceiptNotFound(tx_hash) => L1Error::ReceiptTimeout { tx_hash, waited: timeout },
        other => other,
    })?;

    if !receipt.status {
        return Err(L1Error::TxReverted(tx_hash));
    }
    Ok(receipt)
}

async fn stream_blocks(
    client: Arc<dyn L1Client>,
    subscribers: Subscribers,
    poll_interval: Duration,
    max_reorg_depth: u64,
    cancel: CancellationToken,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<L1BlockHeader> = None;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let blocks = match new_blocks(client.as_ref(), last.as_ref(), max_reorg_depth).await {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!(error = %e, "Failed to poll L1 head");
                continue;
            }
        };

        for block in blocks {
            last = Some(block.header);
            let receivers = subscribers.read().clone();
            for receiver in receivers {
                receiver.on_new_l1_block(block.clone()).await;
            }
        }
    }
    debug!("L1 streaming task stopped");
}

/// Returns the blocks between `last` and the current head, oldest first.
async fn new_blocks(
    client: &dyn L1Client,
    last: Option<&L1BlockHeader>,
    max_reorg_depth: u64,
) -> L1Result<Vec<L1Block>> {
    let head = client.head_block().await?;
    let Some(last) = last else {
        return Ok(vec![head]);
    };
    if head.hash() == last.hash {
        return Ok(Vec::new());
    }

    let mut blocks = vec![head];
    while let Some(oldest) = blocks.last() {
        if oldest.parent_hash() == last.hash
            || oldest.number() <= last.number + 1
            || blocks.len() as u64 > max_reorg_depth
        {
            break;
        }
        match client.block_by_hash(oldest.parent_hash()).await? {
            Some(parent) => blocks.push(parent),
            None => break,
        }
    }
    blocks.reverse();
    Ok(blocks)
}

//! L2 data service: batch ingestion, subscriber fan-out and catch-up lookups.

use std::sync::Arc;

use alloy_primitives::{B256, Bytes};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    BatchMsg, BatchRequest, EncryptedTx, ExtBatch, HostStore, P2p, P2pError, P2pHandler,
    StoreError,
    constants::{
        DEFAULT_MAX_BATCH_WALK_BACK, DEFAULT_MAX_BATCHES_PER_RESPONSE, SUBSCRIBER_QUEUE_CAPACITY,
    },
};

/// Errors returned by the L2 service.
#[derive(Debug, Error)]
pub enum L2Error {
    /// The batch is not in the store.
    #[error("batch {0} not found")]
    BatchNotFound(B256),

    /// Walking back to the canonical chain exceeded the configured depth.
    #[error("batch reorg deeper than {0} batches")]
    ReorgTooDeep(u64),

    /// A peer message could not be decoded.
    #[error("failed to decode peer message: {0}")]
    Decode(String),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// P2P failure.
    #[error(transparent)]
    P2p(#[from] P2pError),
}

/// Result type alias for L2 service operations.
pub type L2Result<T> = Result<T, L2Error>;

/// Receives batches and gossiped transactions from the L2 service.
#[async_trait]
pub trait L2Subscriber: Send + Sync {
    /// A live batch arrived and was stored.
    async fn on_new_batch(&self, batch: ExtBatch);

    /// An encrypted transaction was gossiped.
    async fn on_tx_gossip(&self, tx: EncryptedTx);
}

/// L2 service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2ServiceConfig {
    /// P2P address peers send batches back to.
    pub host_address: String,
    /// Maximum number of batches walked back to find a canonical ancestor.
    pub max_batch_walk_back: u64,
    /// Maximum number of batches sent in reply to one batch request.
    pub max_batches_per_response: usize,
}

impl Default for L2ServiceConfig {
    fn default() -> Self {
        Self {
            host_address: String::new(),
            max_batch_walk_back: DEFAULT_MAX_BATCH_WALK_BACK,
            max_batches_per_response: DEFAULT_MAX_BATCHES_PER_RESPONSE,
        }
    }
}

#[derive(Debug, Clone)]
enum Notification {
    Batch(ExtBatch),
    Tx(EncryptedTx),
}

/// Stores batches received from peers and fans them out to subscribers.
///
/// Every subscriber has its own worker task fed by a bounded queue, so it sees
/// notifications in arrival order and never blocks the receive path. A full
/// queue drops the notification; catch-up fills the gap.
pub struct L2Service {
    config: L2ServiceConfig,
    store: Arc<dyn HostStore>,
    p2p: Arc<dyn P2p>,
    queues: RwLock<Vec<mpsc::Sender<Notification>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for L2Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L2Service")
            .field("config", &self.config)
            .field("subscribers", &self.queues.read().len())
            .finish_non_exhaustive()
    }
}

impl L2Service {
    /// Creates the service. Inbound messages flow once [`L2Service::start`] is called.
    pub fn new(config: L2ServiceConfig, store: Arc<dyn HostStore>, p2p: Arc<dyn P2p>) -> Self {
        Self { config, store, p2p, queues: RwLock::default(), workers: Mutex::default() }
    }

    /// Registers a subscriber and spawns its delivery worker.
    pub fn subscribe(&self, subscriber: Arc<dyn L2Subscriber>) {
        let (sender, mut receiver) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let worker = tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                match notification {
                    Notification::Batch(batch) => subscriber.on_new_batch(batch).await,
                    Notification::Tx(tx) => subscriber.on_tx_gossip(tx).await,
                }
            }
        });
        self.queues.write().push(sender);
        self.workers.lock().push(worker);
    }

    /// Registers this service as the P2P message handler.
    pub async fn start(self: &Arc<Self>) -> L2Result<()> {
        self.p2p.start_listening(Arc::clone(self) as Arc<dyn P2pHandler>).await?;
        info!(host_address = %self.config.host_address, "L2 service started");
        Ok(())
    }

    /// Stops the P2P listener and the subscriber workers.
    pub async fn stop(&self) {
        self.p2p.stop_listening().await;
        self.queues.write().clear();
        for worker in self.workers.lock().drain(..) {
            worker.abort();
        }
    }

    /// Decodes and stores a `BatchMsg`, notifying subscribers unless it is a catch-up reply.
    ///
    /// A store failure stops processing the rest of the message, so subscribers
    /// are only told about batches that were persisted.
    pub fn receive_batches(&self, encoded: &[u8]) -> L2Result<()> {
        let msg = BatchMsg::decode_bytes(encoded).map_err(|e| L2Error::Decode(e.to_string()))?;

        for batch in msg.batches {
            self.store.add_batch(&batch)?;
            debug!(
                hash = %batch.hash(),
                number = batch.number(),
                catch_up = msg.is_catch_up,
                "Stored batch"
            );
            if !msg.is_catch_up {
                self.notify(&Notification::Batch(batch));
            }
        }
        Ok(())
    }

    /// Passes a gossiped transaction to every subscriber.
    pub fn receive_tx(&self, tx: EncryptedTx) {
        self.notify(&Notification::Tx(tx));
    }

    /// Answers a peer's `BatchRequest` with the canonical batches after its head.
    pub async fn receive_batch_request(&self, encoded: &[u8]) -> L2Result<()> {
        let request =
            BatchRequest::decode_bytes(encoded).map_err(|e| L2Error::Decode(e.to_string()))?;

        let mut next = if request.current_head_batch.is_zero() {
            0
        } else {
            match self.canonical_ancestor(request.current_head_batch) {
                Ok(ancestor) => ancestor.map_or(0, |a| a.number() + 1),
                Err(L2Error::BatchNotFound(hash)) => {
                    debug!(%hash, requester = %request.requester, "Unknown requester head");
                    0
                }
                Err(e) => return Err(e),
            }
        };

        let mut batches = Vec::new();
        while batches.len() < self.config.max_batches_per_response {
            let Some(batch) = self.store.canonical_batch(next)? else {
                break;
            };
            batches.push(batch);
            next += 1;
        }
        if batches.is_empty() {
            debug!(requester = %request.requester, "No batches to send");
            return Ok(());
        }

        let count = batches.len();
        let msg = BatchMsg { batches, is_catch_up: true };
        self.p2p.send_batches(&request.requester, msg.encoded()).await?;
        info!(requester = %request.requester, count, "Sent catch-up batches");
        Ok(())
    }

    /// Returns the canonical batch following `from_head`, if it is stored.
    ///
    /// A zero `from_head` returns the genesis batch. If `from_head` is no
    /// longer canonical the walk goes back to its canonical ancestor first;
    /// a fork that reaches a stale genesis batch restarts from the canonical one.
    pub fn fetch_next_batch(&self, from_head: B256) -> L2Result<Option<ExtBatch>> {
        if from_head.is_zero() {
            return Ok(self.store.canonical_batch(0)?);
        }
        let next = self.canonical_ancestor(from_head)?.map_or(0, |a| a.number() + 1);
        Ok(self.store.canonical_batch(next)?)
    }

    /// Asks the sequencer for the batches following `from`.
    pub async fn request_missing_batches(&self, from: B256) -> L2Result<()> {
        let request =
            BatchRequest { requester: self.config.host_address.clone(), current_head_batch: from };
        self.p2p.request_batches(&request).await?;
        debug!(%from, "Requested missing batches");
        Ok(())
    }

    /// Walks back from `from` to the first canonical batch.
    ///
    /// `None` means the fork goes all the way down to a non-canonical genesis batch.
    fn canonical_ancestor(&self, from: B256) -> L2Result<Option<ExtBatch>> {
        let mut batch = self.store.batch(from)?.ok_or(L2Error::BatchNotFound(from))?;
        for _ in 0..self.config.max_batch_walk_back {
            if self.store.canonical_batch_hash(batch.number())? == Some(batch.hash()) {
                return Ok(Some(batch));
            }
            if batch.number() == 0 {
                return Ok(None);
            }
            let parent = batch.parent_hash();
            batch = self.store.batch(parent)?.ok_or(L2Error::BatchNotFound(parent))?;
        }
        Err(L2Error::ReorgTooDeep(self.config.max_batch_walk_back))
    }

    fn notify(&self, notification: &Notification) {
        for queue in self.queues.read().iter() {
            match queue.try_send(notification.clone()) {
                Ok(()) => {}
                // The guardian recovers a dropped batch: the next live batch is
                // rejected over the gap, the status re-check moves it to
                // L2Catchup and catch-up replays the gap from the store.
                Err(TrySendError::Full(_)) => {
                    warn!(
                        capacity = SUBSCRIBER_QUEUE_CAPACITY,
                        "Subscriber queue full, dropping notification; catch-up fills the gap"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Subscriber worker stopped, dropping notification");
                }
            }
        }
    }
}

#[async_trait]
impl P2pHandler for L2Service {
    async fn receive_batches(&self, encoded: Bytes) {
        if let Err(e) = Self::receive_batches(self, &encoded) {
            warn!(error = %e, "Dropping batch message");
        }
    }

    async fn receive_tx(&self, tx: EncryptedTx) {
        Self::receive_tx(self, tx);
    }

    async fn receive_batch_request(&self, encoded: Bytes) {
        if let Err(e) = Self::receive_batch_request(self, &encoded).await {
            warn!(error = %e, "Failed to answer batch request");
        }
    }
}

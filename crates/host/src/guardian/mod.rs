//! Enclave guardian: keeps the enclave provisioned and in sync with L1 and L2.
//!
//! A control loop drives the enclave towards `Live` based on the derived
//! [`EnclaveStatus`]: it reconnects, provides the network secret and replays
//! missed L1 blocks and L2 batches. While live, new data arrives through the
//! [`L1BlockReceiver`] and [`L2Subscriber`] handlers and is forwarded as it
//! comes.

mod error;
pub use error::{GuardianError, GuardianResult};

mod secret;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    EnclaveClient, EnclaveState, EnclaveStatus, EncryptedTx, ExtBatch, HostStore, L1Block,
    L1BlockReceiver, L1Error, L1Service, L2Error, L2Service, L2Subscriber,
    constants::{
        DEFAULT_MONITORING_INTERVAL, DEFAULT_RECONNECT_INTERVAL, DEFAULT_RETRY_INTERVAL,
        DEFAULT_SECRET_RESPONSE_INTERVAL, DEFAULT_SECRET_RESPONSE_TIMEOUT,
    },
    metrics::{
        GUARDIAN_STATUS, L1_BLOCKS_SUBMITTED_TOTAL, L2_BATCHES_SUBMITTED_TOTAL, LABEL_STREAM,
        SUBMISSION_FAILURES_TOTAL,
    },
};

/// Guardian configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianConfig {
    /// Identity the enclave must attest to.
    pub enclave_id: Address,
    /// Whether this node generates the network secret.
    pub is_genesis: bool,
    /// Wait between reconnection attempts while the enclave is unreachable.
    pub reconnect_interval: Duration,
    /// Wait between checks while nothing needs doing.
    pub monitoring_interval: Duration,
    /// Wait after a failed step.
    pub retry_interval: Duration,
    /// Total time to scan L1 for a secret response.
    pub secret_response_timeout: Duration,
    /// Wait between secret response scans.
    pub secret_response_interval: Duration,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            enclave_id: Address::ZERO,
            is_genesis: false,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            monitoring_interval: DEFAULT_MONITORING_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            secret_response_timeout: DEFAULT_SECRET_RESPONSE_TIMEOUT,
            secret_response_interval: DEFAULT_SECRET_RESPONSE_INTERVAL,
        }
    }
}

/// Drives an enclave to `Live` and forwards live L1 and L2 data to it.
pub struct EnclaveGuardian {
    config: GuardianConfig,
    state: EnclaveState,
    enclave: Arc<dyn EnclaveClient>,
    l1: Arc<L1Service>,
    l2: Arc<L2Service>,
    store: Arc<dyn HostStore>,
    running: AtomicBool,
    cancel: CancellationToken,
    l1_submission: tokio::sync::Mutex<()>,
    l2_submission: tokio::sync::Mutex<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for EnclaveGuardian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnclaveGuardian")
            .field("config", &self.config)
            .field("state", &self.state.snapshot())
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EnclaveGuardian {
    /// Creates a guardian. The enclave starts out `Disconnected`.
    pub fn new(
        config: GuardianConfig,
        enclave: Arc<dyn EnclaveClient>,
        l1: Arc<L1Service>,
        l2: Arc<L2Service>,
        store: Arc<dyn HostStore>,
    ) -> Self {
        Self {
            config,
            state: EnclaveState::new(),
            enclave,
            l1,
            l2,
            store,
            running: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            l1_submission: tokio::sync::Mutex::new(()),
            l2_submission: tokio::sync::Mutex::new(()),
            tasks: Mutex::default(),
        }
    }

    /// Shared view of the enclave state.
    pub const fn state(&self) -> &EnclaveState {
        &self.state
    }

    /// Subscribes to the data services and starts the control loop.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Enclave guardian already running");
            return;
        }

        self.l1.subscribe(Arc::clone(self) as Arc<dyn L1BlockReceiver>);
        self.l2.subscribe(Arc::clone(self) as Arc<dyn L2Subscriber>);

        let control = tokio::spawn(Arc::clone(self).run());
        let failures = tokio::spawn(Arc::clone(self).watch_tx_failures());
        self.tasks.lock().extend([control, failures]);
        info!(
            enclave_id = %self.config.enclave_id,
            genesis = self.config.is_genesis,
            "Enclave guardian started"
        );
    }

    /// Stops the control loop after its current step.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Guardian task did not exit cleanly");
            }
        }
        info!("Enclave guardian stopped");
    }

    /// Returns the enclave client if the enclave is live.
    pub fn client_if_healthy(&self) -> GuardianResult<Arc<dyn EnclaveClient>> {
        match self.state.status() {
            EnclaveStatus::Live => Ok(Arc::clone(&self.enclave)),
            status => Err(GuardianError::NotLive(status)),
        }
    }

    /// Queries the enclave and reconciles the state with its answer.
    ///
    /// An unreachable enclave marks the state `Disconnected`.
    pub async fn check_enclave_status(&self) -> EnclaveStatus {
        match self.enclave.status().await {
            Ok(report) => {
                debug!(
                    code = ?report.status_code,
                    l1_head = %report.l1_head,
                    l2_head = %report.l2_head,
                    "Enclave status"
                );
                self.state.on_enclave_status(report);
            }
            Err(e) => {
                warn!(error = %e, "Enclave status query failed");
                self.state.on_disconnected();
            }
        }
        self.state.status()
    }

    async fn run(self: Arc<Self>) {
        info!("Starting guardian loop");

        while self.running.load(Ordering::SeqCst) {
            let delay = self.step().await;
            metrics::gauge!(GUARDIAN_STATUS).set(self.state.status().as_gauge());

            if let Some(delay) = delay {
                tokio::select! {
                    () = self.cancel.cancelled() => break,
                    () = sleep(delay) => {}
                }
            }
        }

        info!("Guardian loop stopped");
    }

    /// Runs the action for the current status and returns how long to wait before the next one.
    async fn step(&self) -> Option<Duration> {
        match self.state.status() {
            EnclaveStatus::Disconnected | EnclaveStatus::Unavailable => {
                match self.check_enclave_status().await {
                    EnclaveStatus::Disconnected | EnclaveStatus::Unavailable => {
                        Some(self.config.reconnect_interval)
                    }
                    _ => None,
                }
            }
            EnclaveStatus::AwaitingSecret => match self.provide_secret().await {
                Ok(()) => None,
                Err(e) => {
                    warn!(error = %e, "Failed to provide network secret");
                    if e.is_enclave_fault() {
                        self.check_enclave_status().await;
                    }
                    Some(self.config.retry_interval)
                }
            },
            EnclaveStatus::L1Catchup => {
                let result = self.catchup_with_l1().await;
                self.after_catchup(result, "l1").await
            }
            EnclaveStatus::L2Catchup => {
                let result = self.catchup_with_l2().await;
                self.after_catchup(result, "l2").await
            }
            EnclaveStatus::Live => Some(self.config.monitoring_interval),
        }
    }

    async fn after_catchup(
        &self,
        result: GuardianResult<bool>,
        stream: &'static str,
    ) -> Option<Duration> {
        match result {
            Ok(true) => None,
            Ok(false) => Some(self.config.monitoring_interval),
            Err(e) => {
                warn!(error = %e, stream, "Catch-up failed");
                self.check_enclave_status().await;
                Some(self.config.retry_interval)
            }
        }
    }

    /// Feeds the enclave the L1 blocks after its head until it reaches the L1 head.
    ///
    /// Stops as soon as the status leaves `L1Catchup`. Returns whether any
    /// block was submitted.
    pub async fn catchup_with_l1(&self) -> GuardianResult<bool> {
        let mut progressed = false;
        while !self.cancel.is_cancelled() && self.state.status() == EnclaveStatus::L1Catchup {
            let head = self.state.enclave_l1_head();
            let (block, is_latest) = match self.l1.fetch_next_block(head).await {
                Ok(next) => next,
                Err(L1Error::NoNextBlock) => break,
                Err(e) => return Err(e.into()),
            };
            debug!(number = block.number(), hash = %block.hash(), "Catching up L1 block");
            self.submit_l1_block(block, is_latest, Some(head)).await?;
            progressed = true;
        }
        Ok(progressed)
    }

    /// Feeds the enclave the stored batches after its head.
    ///
    /// Stops as soon as the status leaves `L2Catchup`, so a new L1 head takes
    /// priority. When the store has nothing to give, the missing batches are
    /// requested from the sequencer. Returns whether any batch was submitted.
    pub async fn catchup_with_l2(&self) -> GuardianResult<bool> {
        let mut progressed = false;
        while !self.cancel.is_cancelled() && self.state.status() == EnclaveStatus::L2Catchup {
            let head = self.state.enclave_l2_head();
            let batch = match self.l2.fetch_next_batch(head) {
                Ok(Some(batch)) => batch,
                Ok(None) | Err(L2Error::BatchNotFound(_)) => {
                    if !progressed {
                        self.request_missing_batches(head).await;
                    }
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            debug!(number = batch.number(), hash = %batch.hash(), "Catching up L2 batch");
            self.submit_l2_batch(batch, Some(head)).await?;
            progressed = true;
        }
        Ok(progressed)
    }

    async fn request_missing_batches(&self, from: B256) {
        if let Err(e) = self.l2.request_missing_batches(from).await {
            debug!(error = %e, %from, "Could not request missing batches");
        }
    }

    /// Submits an L1 block to the enclave and records it.
    ///
    /// With `expected_head` set, the block is only submitted if the enclave's
    /// L1 head is still that hash. Returns whether the block was submitted.
    pub async fn submit_l1_block(
        &self,
        block: L1Block,
        is_latest: bool,
        expected_head: Option<B256>,
    ) -> GuardianResult<bool> {
        let _guard = self.l1_submission.lock().await;
        if let Some(expected) = expected_head
            && self.state.enclave_l1_head() != expected
        {
            debug!(hash = %block.hash(), "Enclave L1 head moved, skipping block");
            return Ok(false);
        }
        if self.state.enclave_l1_head() == block.hash() {
            debug!(hash = %block.hash(), "L1 block already submitted");
            return Ok(false);
        }

        let receipts = self.l1.fetch_receipts(&block).await?;
        let submitted = self.enclave.submit_l1_block(block.clone(), receipts, is_latest).await;
        let response = match submitted {
            Ok(response) => response,
            Err(e) => {
                metrics::counter!(SUBMISSION_FAILURES_TOTAL, LABEL_STREAM => "l1").increment(1);
                warn!(error = %e, hash = %block.hash(), "Enclave rejected L1 block");
                self.check_enclave_status().await;
                return Err(e.into());
            }
        };
        self.state.on_processed_block(block.hash());
        metrics::counter!(L1_BLOCKS_SUBMITTED_TOTAL).increment(1);

        let persisted = self.store.add_block_header(&block.header);

        if !response.produced_secret_responses.is_empty()
            && let Err(e) =
                self.l1.publish_shared_secret_responses(&response.produced_secret_responses).await
        {
            warn!(error = %e, hash = %block.hash(), "Failed to publish secret responses");
        }

        if let Err(e) = persisted {
            error!(error = %e, hash = %block.hash(), "Failed to persist submitted L1 block");
            return Err(GuardianError::Persistence(e));
        }
        Ok(true)
    }

    /// Submits an L2 batch to the enclave and records it.
    ///
    /// With `expected_head` set, the batch is only submitted if the enclave's
    /// L2 head is still that hash. Returns whether the batch was submitted.
    pub async fn submit_l2_batch(
        &self,
        batch: ExtBatch,
        expected_head: Option<B256>,
    ) -> GuardianResult<bool> {
        let _guard = self.l2_submission.lock().await;
        if let Some(expected) = expected_head
            && self.state.enclave_l2_head() != expected
        {
            debug!(hash = %batch.hash(), "Enclave L2 head moved, skipping batch");
            return Ok(false);
        }
        if self.state.enclave_l2_head() == batch.hash() {
            debug!(hash = %batch.hash(), "L2 batch already submitted");
            return Ok(false);
        }

        if let Err(e) = self.enclave.submit_batch(batch.clone()).await {
            metrics::counter!(SUBMISSION_FAILURES_TOTAL, LABEL_STREAM => "l2").increment(1);
            warn!(error = %e, hash = %batch.hash(), "Enclave rejected L2 batch");
            self.check_enclave_status().await;
            return Err(e.into());
        }
        self.state.on_processed_batch(batch.hash());
        metrics::counter!(L2_BATCHES_SUBMITTED_TOTAL).increment(1);

        if let Err(e) = self.store.add_batch(&batch) {
            error!(error = %e, hash = %batch.hash(), "Failed to persist submitted L2 batch");
            return Err(GuardianError::Persistence(e));
        }
        Ok(true)
    }

    async fn watch_tx_failures(self: Arc<Self>) {
        let mut failures = self.l1.tx_failures();
        loop {
            let received = tokio::select! {
                () = self.cancel.cancelled() => break,
                received = failures.recv() => received,
            };
            match received {
                Ok(failure) => {
                    warn!(
                        tx_hash = %failure.tx_hash,
                        kind = failure.kind,
                        reason = %failure.reason,
                        "L1 transaction failed, checking enclave status"
                    );
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Missed L1 transaction failures, checking enclave status");
                }
                Err(RecvError::Closed) => break,
            }
            self.check_enclave_status().await;
        }
    }
}

#[async_trait]
impl L1BlockReceiver for EnclaveGuardian {
    async fn on_new_l1_block(&self, block: L1Block) {
        if !self.state.observe_block(block.hash()) {
            debug!(number = block.number(), hash = %block.hash(), "Not forwarding L1 block");
            return;
        }
        if let Err(e) = self.submit_l1_block(block, true, None).await {
            warn!(error = %e, "Failed to forward live L1 block");
        }
    }
}

#[async_trait]
impl L2Subscriber for EnclaveGuardian {
    async fn on_new_batch(&self, batch: ExtBatch) {
        if !self.state.observe_batch(batch.hash()) {
            debug!(number = batch.number(), hash = %batch.hash(), "Not forwarding L2 batch");
            return;
        }
        if let Err(e) = self.submit_l2_batch(batch, None).await {
            warn!(error = %e, "Failed to forward live L2 batch");
        }
    }

    async fn on_tx_gossip(&self, tx: EncryptedTx) {
        if let Err(e) = self.enclave.submit_tx(tx).await {
            warn!(error = %e, "Failed to forward gossiped transaction");
        }
    }
}

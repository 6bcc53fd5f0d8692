//! The guardian's view of enclave progress.
//!
//! [`EnclaveState`] records two things: what the enclave is believed to have
//! processed, and what the host has observed arriving from L1 and L2. A single
//! [`EnclaveStatus`] is derived from the pair. Every mutation goes through
//! [`EnclaveStateData::apply`] so the derivation can be exercised without I/O.

use alloy_primitives::B256;
use derive_more::Display;
use parking_lot::RwLock;
use serde::Serialize;

use crate::{EnclaveStatusCode, EnclaveStatusReport};

/// Derived status of the enclave, driving the guardian's next action.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EnclaveStatus {
    /// Caught up with both L1 and L2, serving live traffic.
    #[display("live")]
    Live,
    /// The enclave could not be reached.
    #[display("disconnected")]
    Disconnected,
    /// The enclave is reachable but reports itself unavailable.
    #[display("unavailable")]
    Unavailable,
    /// The enclave needs the network secret.
    #[display("awaiting-secret")]
    AwaitingSecret,
    /// The enclave is behind the host's L1 head.
    #[display("l1-catchup")]
    L1Catchup,
    /// The enclave is caught up with L1 but behind the host's L2 head.
    #[display("l2-catchup")]
    L2Catchup,
}

impl EnclaveStatus {
    /// Numeric value reported through the status gauge.
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Live => 0.0,
            Self::Disconnected => 1.0,
            Self::Unavailable => 2.0,
            Self::AwaitingSecret => 3.0,
            Self::L1Catchup => 4.0,
            Self::L2Catchup => 5.0,
        }
    }
}

/// Derives the enclave status from its reported code and the head comparison.
///
/// L1 catch-up takes priority: batches may depend on L1 data the enclave has
/// not ingested yet.
pub const fn derive_status(
    code: EnclaveStatusCode,
    l1_synced: bool,
    l2_synced: bool,
) -> EnclaveStatus {
    match code {
        EnclaveStatusCode::AwaitingSecret => EnclaveStatus::AwaitingSecret,
        EnclaveStatusCode::Unavailable => EnclaveStatus::Unavailable,
        EnclaveStatusCode::Running if !l1_synced => EnclaveStatus::L1Catchup,
        EnclaveStatusCode::Running if !l2_synced => EnclaveStatus::L2Catchup,
        EnclaveStatusCode::Running => EnclaveStatus::Live,
    }
}

/// An event that changes the guardian's view of the enclave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// A new L1 block was observed.
    ReceivedBlock(B256),
    /// A new L2 batch was observed.
    ReceivedBatch(B256),
    /// The enclave accepted an L1 block.
    ProcessedBlock(B256),
    /// The enclave accepted an L2 batch.
    ProcessedBatch(B256),
    /// The enclave was provisioned with the network secret.
    SecretProvided,
    /// Fresh status reported by the enclave.
    EnclaveStatus(EnclaveStatusReport),
    /// The enclave could not be reached.
    Disconnected,
}

/// Snapshot of every field tracked by [`EnclaveState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnclaveStateData {
    /// Derived status.
    pub status: EnclaveStatus,
    /// Last status code the enclave reported.
    pub enclave_status_code: EnclaveStatusCode,
    /// L1 head the enclave is believed to have processed.
    pub enclave_l1_head: B256,
    /// L2 head the enclave is believed to have processed.
    pub enclave_l2_head: B256,
    /// Latest L1 head observed by the host.
    pub host_l1_head: B256,
    /// Latest L2 head observed by the host.
    pub host_l2_head: B256,
    /// Set while the enclave is unreachable. Cleared only by a status report.
    pub disconnected: bool,
}

impl Default for EnclaveStateData {
    fn default() -> Self {
        Self {
            status: EnclaveStatus::Disconnected,
            enclave_status_code: EnclaveStatusCode::Unavailable,
            enclave_l1_head: B256::ZERO,
            enclave_l2_head: B256::ZERO,
            host_l1_head: B256::ZERO,
            host_l2_head: B256::ZERO,
            disconnected: true,
        }
    }
}

impl EnclaveStateData {
    /// Applies `event` and recomputes the derived status.
    pub fn apply(&mut self, event: StateEvent) {
        match event {
            StateEvent::ReceivedBlock(hash) => self.host_l1_head = hash,
            StateEvent::ReceivedBatch(hash) => self.host_l2_head = hash,
            StateEvent::ProcessedBlock(hash) => self.enclave_l1_head = hash,
            StateEvent::ProcessedBatch(hash) => self.enclave_l2_head = hash,
            StateEvent::SecretProvided => {
                if self.enclave_status_code == EnclaveStatusCode::AwaitingSecret {
                    self.enclave_status_code = EnclaveStatusCode::Running;
                }
            }
            StateEvent::EnclaveStatus(report) => {
                self.enclave_status_code = report.status_code;
                self.enclave_l1_head = report.l1_head;
                self.enclave_l2_head = report.l2_head;
                self.disconnected = false;
            }
            StateEvent::Disconnected => self.disconnected = true,
        }
        self.status = self.derive();
    }

    /// Status implied by the current fields.
    pub fn derive(&self) -> EnclaveStatus {
        if self.disconnected {
            return EnclaveStatus::Disconnected;
        }
        derive_status(
            self.enclave_status_code,
            self.host_l1_head == self.enclave_l1_head,
            self.host_l2_head == self.enclave_l2_head,
        )
    }
}

/// Lock-protected [`EnclaveStateData`].
///
/// Each call is atomic. Sequences of calls are not, so callers acting on a
/// status they read must tolerate it having changed.
#[derive(Debug, Default)]
pub struct EnclaveState {
    inner: RwLock<EnclaveStateData>,
}

impl EnclaveState {
    /// Creates a state that reports [`EnclaveStatus::Disconnected`] until the
    /// first status report arrives.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current derived status.
    pub fn status(&self) -> EnclaveStatus {
        self.inner.read().status
    }

    /// Copy of every tracked field.
    pub fn snapshot(&self) -> EnclaveStateData {
        *self.inner.read()
    }

    /// Whether L1 is caught up, regardless of L2.
    pub fn in_sync_with_l1(&self) -> bool {
        matches!(self.status(), EnclaveStatus::Live | EnclaveStatus::L2Catchup)
    }

    /// L1 head the enclave is believed to have processed.
    pub fn enclave_l1_head(&self) -> B256 {
        self.inner.read().enclave_l1_head
    }

    /// L2 head the enclave is believed to have processed.
    pub fn enclave_l2_head(&self) -> B256 {
        self.inner.read().enclave_l2_head
    }

    /// Records the latest L1 block observed by the host.
    pub fn on_received_block(&self, hash: B256) {
        self.apply(StateEvent::ReceivedBlock(hash));
    }

    /// Records the latest L2 batch observed by the host.
    pub fn on_received_batch(&self, hash: B256) {
        self.apply(StateEvent::ReceivedBatch(hash));
    }

    /// Records a newly arrived L1 block and returns whether L1 was in sync
    /// before it arrived, in one atomic step.
    ///
    /// When it was, the enclave has processed the previous head and the new
    /// block can be forwarded directly.
    pub fn observe_block(&self, hash: B256) -> bool {
        let mut inner = self.inner.write();
        let was_synced = matches!(inner.status, EnclaveStatus::Live | EnclaveStatus::L2Catchup);
        inner.apply(StateEvent::ReceivedBlock(hash));
        was_synced
    }

    /// Records a newly arrived L2 batch and returns whether the enclave was
    /// live before it arrived, in one atomic step.
    pub fn observe_batch(&self, hash: B256) -> bool {
        let mut inner = self.inner.write();
        let was_live = inner.status == EnclaveStatus::Live;
        inner.apply(StateEvent::ReceivedBatch(hash));
        was_live
    }

    /// Records an L1 block accepted by the enclave.
    pub fn on_processed_block(&self, hash: B256) {
        self.apply(StateEvent::ProcessedBlock(hash));
    }

    /// Records an L2 batch accepted by the enclave.
    pub fn on_processed_batch(&self, hash: B256) {
        self.apply(StateEvent::ProcessedBatch(hash));
    }

    /// Records that the enclave was provisioned with the network secret.
    pub fn on_secret_provided(&self) {
        self.apply(StateEvent::SecretProvided);
    }

    /// Overwrites the enclave's code and heads with a fresh status report.
    pub fn on_enclave_status(&self, report: EnclaveStatusReport) {
        self.apply(StateEvent::EnclaveStatus(report));
    }

    /// Forces [`EnclaveStatus::Disconnected`] until the next status report.
    pub fn on_disconnected(&self) {
        self.apply(StateEvent::Disconnected);
    }

    fn apply(&self, event: StateEvent) {
        self.inner.write().apply(event);
    }
}

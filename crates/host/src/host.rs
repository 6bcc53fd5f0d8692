//! Host lifecycle: owns the data services and the guardian.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::{EnclaveGuardian, HostStore, L1Error, L1Service, L2Error, L2Service};

/// Error starting the host.
#[derive(Debug, Error)]
pub enum HostError {
    /// The L1 service failed to start.
    #[error("failed to start L1 service: {0}")]
    L1(#[from] L1Error),

    /// The L2 service failed to start.
    #[error("failed to start L2 service: {0}")]
    L2(#[from] L2Error),
}

/// Result type alias for host lifecycle operations.
pub type HostResult<T> = Result<T, HostError>;

/// Starts the services in dependency order and stops them in reverse.
#[derive(Debug)]
pub struct Host {
    l1: Arc<L1Service>,
    l2: Arc<L2Service>,
    guardian: Arc<EnclaveGuardian>,
    store: Arc<dyn HostStore>,
}

impl Host {
    /// Creates a host from already wired services.
    pub const fn new(
        l1: Arc<L1Service>,
        l2: Arc<L2Service>,
        guardian: Arc<EnclaveGuardian>,
        store: Arc<dyn HostStore>,
    ) -> Self {
        Self { l1, l2, guardian, store }
    }

    /// The guardian driving the enclave.
    pub const fn guardian(&self) -> &Arc<EnclaveGuardian> {
        &self.guardian
    }

    /// Starts L1, then L2, then the guardian.
    ///
    /// A service that fails to start leaves the ones before it running; call
    /// [`Host::stop`] to release them.
    pub async fn start(&self) -> HostResult<()> {
        self.l1.start().await?;
        self.l2.start().await?;
        self.guardian.start();
        info!("Host started");
        Ok(())
    }

    /// Stops the guardian, L2, L1 and finally closes the store.
    ///
    /// Failures are logged and do not interrupt the shutdown.
    pub async fn stop(&self) {
        self.guardian.stop().await;
        self.l2.stop().await;
        self.l1.stop().await;
        if let Err(e) = self.store.close() {
            warn!(error = %e, "Failed to close host store");
        }
        info!("Host stopped");
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use super::*;
    use crate::{
        EnclaveStatus, StoreError,
        test_utils::{GuardianHarness, wait_until},
    };

    fn host(harness: &GuardianHarness) -> Host {
        Host::new(
            Arc::clone(&harness.l1),
            Arc::clone(&harness.l2),
            Arc::clone(&harness.guardian),
            Arc::clone(&harness.store) as Arc<dyn HostStore>,
        )
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let harness = GuardianHarness::builder().chain(2).build();
        let host = host(&harness);

        host.start().await.unwrap();
        assert!(harness.p2p.handler().is_some());

        let head = harness.l1_client.head().hash();
        wait_until(|| {
            host.guardian().state().status() == EnclaveStatus::Live
                && harness.enclave.blocks().last() == Some(&head)
        })
        .await;

        host.stop().await;
        assert!(harness.p2p.stopped());
        assert!(matches!(harness.store.batch(B256::ZERO), Err(StoreError::Closed)));
    }
}

//! Network secret provisioning.

use alloy_primitives::B256;
use backon::{ConstantBuilder, Retryable};
use tracing::{debug, info, warn};

use super::{EnclaveGuardian, GuardianError, GuardianResult};
use crate::metrics::SECRET_PROVIDED_TOTAL;

impl EnclaveGuardian {
    /// Provides the enclave with the network secret.
    ///
    /// The genesis node generates the secret and publishes it on L1. Any other
    /// node requests it on L1 and scans the following blocks for a response
    /// addressed to its enclave.
    pub async fn provide_secret(&self) -> GuardianResult<()> {
        let attestation = self.enclave.attestation().await?;
        if attestation.owner != self.config.enclave_id {
            return Err(GuardianError::AttestationMismatch {
                expected: self.config.enclave_id,
                actual: attestation.owner,
            });
        }

        if self.config.is_genesis {
            let secret = self.enclave.generate_secret().await?;
            self.l1.initialize_secret(self.config.enclave_id, &attestation, secret).await?;
        } else {
            let cursor = self.l1.request_secret(&attestation).await?;
            self.await_secret_response(cursor).await?;
        }

        self.state.on_secret_provided();
        metrics::counter!(SECRET_PROVIDED_TOTAL).increment(1);
        info!(genesis = self.config.is_genesis, "Network secret provided to enclave");
        Ok(())
    }

    /// Scans L1 one block per attempt, starting after `from`, for a secret
    /// response to this enclave and initializes the enclave with it.
    async fn await_secret_response(&self, from: B256) -> GuardianResult<()> {
        let interval = self.config.secret_response_interval;
        let attempts = (self.config.secret_response_timeout.as_millis()
            / interval.as_millis().max(1)) as usize;
        let backoff = ConstantBuilder::default().with_delay(interval).with_max_times(attempts);
        let cursor = parking_lot::Mutex::new(from);

        (|| async {
            let prev = *cursor.lock();
            let (block, _) = self.l1.fetch_next_block(prev).await?;
            *cursor.lock() = block.hash();

            for response in self.l1.extract_secret_responses(&block) {
                if response.requester_id != self.config.enclave_id {
                    continue;
                }
                match self.enclave.init_enclave(response.secret).await {
                    Ok(()) => {
                        info!(
                            block = %block.hash(),
                            attester = %response.attester_id,
                            "Secret response accepted"
                        );
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            attester = %response.attester_id,
                            "Secret response rejected"
                        );
                    }
                }
            }
            Err(GuardianError::SecretNotFound)
        })
        .retry(backoff)
        .when(|e| matches!(e, GuardianError::SecretNotFound | GuardianError::L1(_)))
        .notify(|err, _| debug!(error = %err, "Waiting for secret response"))
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use alloy_primitives::{Address, Bytes, keccak256};

    use crate::{
        EnclaveStatus, EnclaveStatusCode, GuardianError, L1Transaction, ManagementContract,
        SecretResponse,
        test_utils::{GuardianHarness, MockL1Client},
    };

    fn response_tx(contract: Address, requester: Address, secret: &'static [u8]) -> L1Transaction {
        let response = SecretResponse {
            secret: Bytes::from_static(secret),
            requester_id: requester,
            attester_id: Address::repeat_byte(0x01),
            host_address: "http://genesis:10000".to_string(),
        };
        let input = ManagementContract::new(contract).respond_secret_calldata(&response);
        L1Transaction { hash: keccak256(&input), to: Some(contract), input }
    }

    #[tokio::test]
    async fn test_genesis_generates_and_publishes_secret() {
        let harness = GuardianHarness::builder().genesis(true).build();
        harness.l1_client.auto_receipt(Some(true));
        harness.enclave.set_code(EnclaveStatusCode::AwaitingSecret);
        harness.guardian.check_enclave_status().await;
        assert_eq!(harness.guardian.state().status(), EnclaveStatus::AwaitingSecret);

        harness.guardian.provide_secret().await.unwrap();

        assert_eq!(harness.enclave.generate_calls(), 1);
        assert_eq!(harness.l1_client.sent().len(), 1);
        let snapshot = harness.guardian.state().snapshot();
        assert_eq!(snapshot.enclave_status_code, EnclaveStatusCode::Running);
        assert!(matches!(
            snapshot.status,
            EnclaveStatus::Live | EnclaveStatus::L1Catchup | EnclaveStatus::L2Catchup
        ));
    }

    #[tokio::test]
    async fn test_attestation_mismatch_sends_nothing() {
        let harness = GuardianHarness::builder().genesis(true).build();
        harness.enclave.set_owner(Address::repeat_byte(0x99));

        let result = harness.guardian.provide_secret().await;

        assert!(matches!(result, Err(GuardianError::AttestationMismatch { .. })));
        assert_eq!(harness.enclave.generate_calls(), 0);
        assert!(harness.l1_client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_genesis_receipt_failure_leaves_secret_unprovided() {
        let harness = GuardianHarness::builder().genesis(true).build();
        harness.l1_client.auto_receipt(Some(false));
        harness.enclave.set_code(EnclaveStatusCode::AwaitingSecret);
        harness.guardian.check_enclave_status().await;

        assert!(harness.guardian.provide_secret().await.is_err());
        assert_eq!(harness.guardian.state().status(), EnclaveStatus::AwaitingSecret);
    }

    #[tokio::test]
    async fn test_non_genesis_scans_for_its_response() {
        let harness = GuardianHarness::builder().genesis(false).build();
        harness.enclave.set_code(EnclaveStatusCode::AwaitingSecret);
        harness.guardian.check_enclave_status().await;
        harness.enclave.fail_init(1);

        let chain: Arc<MockL1Client> = Arc::clone(&harness.l1_client);
        let contract = harness.contract;
        let enclave_id = harness.enclave_id;
        let responder = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            chain.push_block(vec![response_tx(contract, Address::repeat_byte(0x42), b"other")]);
            chain.push_block(vec![
                response_tx(contract, enclave_id, b"bad"),
                response_tx(contract, enclave_id, b"good"),
            ]);
        });

        harness.guardian.provide_secret().await.unwrap();
        responder.await.unwrap();

        // the first matching response was rejected, the second accepted
        assert_eq!(
            harness.enclave.init_calls(),
            vec![Bytes::from_static(b"bad"), Bytes::from_static(b"good")]
        );
        assert_eq!(
            harness.guardian.state().snapshot().enclave_status_code,
            EnclaveStatusCode::Running
        );
    }

    #[tokio::test]
    async fn test_non_genesis_times_out_without_response() {
        let harness = GuardianHarness::builder().genesis(false).build();
        harness.enclave.set_code(EnclaveStatusCode::AwaitingSecret);
        harness.guardian.check_enclave_status().await;

        let result = harness.guardian.provide_secret().await;
        assert!(matches!(result, Err(GuardianError::SecretNotFound | GuardianError::L1(_))));
        assert!(harness.enclave.init_calls().is_empty());
    }
}

//! Management contract calls issued and decoded by the host.

use alloy_primitives::{Address, Bytes, hex};
use alloy_sol_types::{SolCall, sol};

use crate::{AttestationReport, L1Transaction};

sol! {
    /// Network-secret entry points of the rollup management contract.
    interface IManagementContract {
        /// Publishes the network secret generated by the genesis enclave.
        function InitializeNetworkSecret(
            address aggregatorID,
            bytes initSecret,
            string hostAddress,
            string genesisAttestation
        ) external;

        /// Asks existing enclaves for the network secret.
        function RequestNetworkSecret(string requestReport) external;

        /// Answers a secret request with the secret encrypted to the requester.
        function RespondNetworkSecret(
            address attesterID,
            address requesterID,
            bytes attesterSig,
            bytes responseSecret,
            string hostAddress,
            bool verifyAttester
        ) external;
    }
}

/// A secret response published on L1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretResponse {
    /// Secret encrypted to the requester.
    pub secret: Bytes,
    /// Enclave the secret is addressed to.
    pub requester_id: Address,
    /// Enclave that produced the response.
    pub attester_id: Address,
    /// Host address of the requester.
    pub host_address: String,
}

/// A decoded management contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementTx {
    /// The genesis enclave published the network secret.
    InitializeSecret {
        /// Genesis enclave identity.
        aggregator_id: Address,
        /// Encrypted network secret.
        secret: Bytes,
        /// Host address of the genesis node.
        host_address: String,
        /// Encoded attestation of the genesis enclave.
        attestation: Bytes,
    },
    /// An enclave requested the network secret.
    RequestSecret {
        /// Encoded attestation of the requesting enclave.
        attestation: Bytes,
    },
    /// An enclave answered a secret request.
    RespondSecret(SecretResponse),
}

/// Encodes and decodes calls to the management contract at `address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagementContract {
    address: Address,
}

impl ManagementContract {
    /// Creates a codec for the contract at `address`.
    pub const fn new(address: Address) -> Self {
        Self { address }
    }

    /// Contract address.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Calldata publishing the genesis secret.
    pub fn initialize_secret_calldata(
        &self,
        aggregator_id: Address,
        attestation: &AttestationReport,
        secret: Bytes,
        host_address: String,
    ) -> Bytes {
        IManagementContract::InitializeNetworkSecretCall {
            aggregatorID: aggregator_id,
            initSecret: secret,
            hostAddress: host_address,
            genesisAttestation: hex::encode_prefixed(attestation.encoded()),
        }
        .abi_encode()
        .into()
    }

    /// Calldata requesting the network secret.
    pub fn request_secret_calldata(&self, attestation: &AttestationReport) -> Bytes {
        IManagementContract::RequestNetworkSecretCall {
            requestReport: hex::encode_prefixed(attestation.encoded()),
        }
        .abi_encode()
        .into()
    }

    /// Calldata answering a secret request.
    pub fn respond_secret_calldata(&self, response: &SecretResponse) -> Bytes {
        IManagementContract::RespondNetworkSecretCall {
            attesterID: response.attester_id,
            requesterID: response.requester_id,
            attesterSig: Bytes::new(),
            responseSecret: response.secret.clone(),
            hostAddress: response.host_address.clone(),
            verifyAttester: false,
        }
        .abi_encode()
        .into()
    }

    /// Decodes `tx` if it is a management contract call.
    ///
    /// Returns `None` for transactions to other addresses and for calldata
    /// that does not decode.
    pub fn decode(&self, tx: &L1Transaction) -> Option<ManagementTx> {
        if tx.to != Some(self.address) {
            return None;
        }
        let input = tx.input.as_ref();
        let selector = input.get(..4)?;

        if selector == IManagementContract::RespondNetworkSecretCall::SELECTOR {
            let call = IManagementContract::RespondNetworkSecretCall::abi_decode(input).ok()?;
            return Some(ManagementTx::RespondSecret(SecretResponse {
                secret: call.responseSecret,
                requester_id: call.requesterID,
                attester_id: call.attesterID,
                host_address: call.hostAddress,
            }));
        }

        if selector == IManagementContract::RequestNetworkSecretCall::SELECTOR {
            let call = IManagementContract::RequestNetworkSecretCall::abi_decode(input).ok()?;
            return Some(ManagementTx::RequestSecret {
                attestation: hex::decode(&call.requestReport).ok()?.into(),
            });
        }

        if selector == IManagementContract::InitializeNetworkSecretCall::SELECTOR {
            let call = IManagementContract::InitializeNetworkSecretCall::abi_decode(input).ok()?;
            return Some(ManagementTx::InitializeSecret {
                aggregator_id: call.aggregatorID,
                secret: call.initSecret,
                host_address: call.hostAddress,
                attestation: hex::decode(&call.genesisAttestation).ok()?.into(),
            });
        }

        None
    }
}

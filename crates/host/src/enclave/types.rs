//! Types exchanged with the enclave.

use alloy_primitives::{Address, B256, Bytes};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

/// Status code reported by the enclave itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnclaveStatusCode {
    /// The enclave is running and has its shared secret.
    Running,
    /// The enclave is waiting to be provisioned with the network secret.
    AwaitingSecret,
    /// The enclave is up but cannot serve requests.
    #[default]
    Unavailable,
}

/// Response to an enclave status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnclaveStatusReport {
    /// The enclave's own status code.
    pub status_code: EnclaveStatusCode,
    /// Hash of the last L1 block the enclave processed.
    pub l1_head: B256,
    /// Hash of the last L2 batch the enclave processed.
    pub l2_head: B256,
}

/// Attestation report produced by the enclave.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RlpEncodable, RlpDecodable,
)]
#[serde(rename_all = "camelCase")]
pub struct AttestationReport {
    /// Raw attestation quote.
    pub report: Bytes,
    /// Enclave public key used to encrypt the secret for this enclave.
    pub pub_key: Bytes,
    /// Enclave identity the report attests to.
    pub owner: Address,
    /// P2P address of the host running the enclave.
    pub host_address: String,
}

impl AttestationReport {
    /// Encodes the report for transport inside an L1 transaction.
    pub fn encoded(&self) -> Bytes {
        Bytes::from(alloy_rlp::encode(self))
    }

    /// Decodes a report previously produced by [`Self::encoded`].
    pub fn decode_bytes(mut data: &[u8]) -> alloy_rlp::Result<Self> {
        <Self as Decodable>::decode(&mut data)
    }
}

/// A secret response the enclave produced while processing an L1 block
/// that contained a secret request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducedSecretResponse {
    /// Network secret encrypted to the requester's key.
    pub secret: Bytes,
    /// Enclave that requested the secret.
    pub requester_id: Address,
    /// Host address of the requester.
    pub host_address: String,
}

/// Result of submitting an L1 block to the enclave.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBlockResponse {
    /// Secret responses to publish on L1.
    #[serde(default)]
    pub produced_secret_responses: Vec<ProducedSecretResponse>,
}

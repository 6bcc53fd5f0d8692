//! Guardian error types.

use alloy_primitives::Address;
use thiserror::Error;

use crate::{EnclaveError, EnclaveStatus, L1Error, L2Error, StoreError};

/// Error returned by guardian operations.
#[derive(Debug, Error)]
pub enum GuardianError {
    /// An enclave call failed.
    #[error(transparent)]
    Enclave(#[from] EnclaveError),

    /// An L1 service call failed.
    #[error(transparent)]
    L1(#[from] L1Error),

    /// An L2 service call failed.
    #[error(transparent)]
    L2(#[from] L2Error),

    /// The enclave accepted a submission but the host could not record it.
    #[error("failed to persist submitted data: {0}")]
    Persistence(#[source] StoreError),

    /// The enclave attests to a different identity than configured.
    #[error("attestation owner {actual} does not match enclave id {expected}")]
    AttestationMismatch {
        /// Configured enclave ID.
        expected: Address,
        /// Owner reported by the attestation.
        actual: Address,
    },

    /// No usable secret response arrived in time.
    #[error("no secret response for this enclave found on L1")]
    SecretNotFound,

    /// The enclave is not live.
    #[error("enclave is not live: {0}")]
    NotLive(EnclaveStatus),
}

impl GuardianError {
    /// Returns true if the error means the enclave's state may differ from ours.
    pub const fn is_enclave_fault(&self) -> bool {
        matches!(self, Self::Enclave(_) | Self::AttestationMismatch { .. })
    }
}

/// Result type alias for guardian operations.
pub type GuardianResult<T> = Result<T, GuardianError>;

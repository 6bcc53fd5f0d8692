//! Enclave client error types.

use thiserror::Error;

/// Error returned by an [`EnclaveClient`](super::EnclaveClient) call.
#[derive(Debug, Error)]
pub enum EnclaveError {
    /// The RPC client could not be created.
    #[error("failed to create enclave client: {0}")]
    ClientCreation(String),

    /// The enclave could not be reached.
    #[error("enclave unreachable: {0}")]
    Unreachable(String),

    /// The enclave answered with an error.
    #[error("enclave rejected request: {0}")]
    Rejected(String),
}

impl From<jsonrpsee::core::ClientError> for EnclaveError {
    fn from(err: jsonrpsee::core::ClientError) -> Self {
        match err {
            jsonrpsee::core::ClientError::Call(call) => Self::Rejected(call.to_string()),
            other => Self::Unreachable(other.to_string()),
        }
    }
}

/// Result type alias for enclave calls.
pub type EnclaveResult<T> = Result<T, EnclaveError>;

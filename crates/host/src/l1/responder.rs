//! Policy deciding which enclave-produced secret responses reach L1.

use crate::ProducedSecretResponse;

/// Decides whether a secret response produced by the enclave is published.
pub trait SecretResponder: Send + Sync + std::fmt::Debug {
    /// Returns true if `response` should be sent to the management contract.
    fn should_publish(&self, response: &ProducedSecretResponse) -> bool;
}

/// Only the genesis node answers secret requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenesisResponder {
    is_genesis: bool,
}

impl GenesisResponder {
    /// Creates the responder for a node with the given genesis flag.
    pub const fn new(is_genesis: bool) -> Self {
        Self { is_genesis }
    }
}

impl SecretResponder for GenesisResponder {
    fn should_publish(&self, _response: &ProducedSecretResponse) -> bool {
        self.is_genesis
    }
}

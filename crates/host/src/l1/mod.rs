//! L1 chain access: block streaming, receipts and management contract transactions.

mod client;
mod contract;
mod error;
mod responder;
mod service;
mod types;
mod wallet;

// Re-export client types
pub use client::{AlloyL1Client, L1Client, L1ClientConfig};
// Re-export contract codec
pub use contract::{IManagementContract, ManagementContract, ManagementTx, SecretResponse};
// Re-export error types
pub use error::{L1Error, L1Result, RpcError, RpcResult};
pub use responder::{GenesisResponder, SecretResponder};
pub use service::{L1BlockReceiver, L1Service, L1ServiceConfig};
pub use types::{L1Block, L1BlockHeader, L1Receipt, L1Transaction, L1TxFailure, SignedL1Tx};
pub use wallet::{L1Wallet, LocalWallet};

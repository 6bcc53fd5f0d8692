#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/base/base/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod config;
pub use config::{
    ConfigError, HealthServerConfig, HostConfig, MetricsConfig, P2pConfig, RetryConfig,
    build_signer, validate_non_zero, validate_url,
};

pub mod constants;

mod enclave;
pub use enclave::{
    AttestationReport, EnclaveClient, EnclaveError, EnclaveResult, EnclaveStatusCode,
    EnclaveStatusReport, ProducedSecretResponse, RpcEnclaveClient, SubmitBlockResponse,
};

mod guardian;
pub use guardian::{EnclaveGuardian, GuardianConfig, GuardianError, GuardianResult};

mod health;
pub use health::{StatusResponse, serve};

mod host;
pub use host::{Host, HostError, HostResult};

mod l1;
pub use l1::{
    AlloyL1Client, GenesisResponder, IManagementContract, L1Block, L1BlockHeader,
    L1BlockReceiver, L1Client, L1ClientConfig, L1Error, L1Receipt, L1Result, L1Service,
    L1ServiceConfig, L1Transaction, L1TxFailure, L1Wallet, LocalWallet, ManagementContract,
    ManagementTx, RpcError, RpcResult, SecretResponder, SecretResponse, SignedL1Tx,
};

mod l2;
pub use l2::{
    BatchHeader, BatchMsg, BatchRequest, EncryptedTx, ExtBatch, L2Error, L2Result, L2Service,
    L2ServiceConfig, L2Subscriber,
};

mod logging;
pub use logging::{LogConfig, LogFormat, StdoutLogConfig, verbosity_to_level_filter};

pub mod metrics;

mod p2p;
pub use p2p::{HttpP2p, P2p, P2pError, P2pHandler, P2pResult};

mod service;
pub use service::run;

mod signal;
pub use signal::setup_signal_handler;

mod state;
pub use state::{EnclaveState, EnclaveStateData, EnclaveStatus, StateEvent, derive_status};

mod store;
pub use store::{HostStore, MemoryStore, StoreError, StoreResult};

#[cfg(test)]
pub mod test_utils;

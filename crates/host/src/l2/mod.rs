//! L2 batch handling: wire types and the L2 data service.

mod service;
pub use service::{L2Error, L2Result, L2Service, L2ServiceConfig, L2Subscriber};

mod types;
pub use types::{BatchHeader, BatchMsg, BatchRequest, EncryptedTx, ExtBatch};

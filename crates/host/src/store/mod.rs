//! Durable storage for processed L1 headers and received L2 batches.

mod memory;
pub use memory::MemoryStore;

use alloy_primitives::B256;
use thiserror::Error;

use crate::{ExtBatch, L1BlockHeader};

/// Store error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// The underlying storage failed.
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only store shared by the guardian and the L2 service.
///
/// Implementations serialize concurrent writes themselves.
pub trait HostStore: Send + Sync + std::fmt::Debug {
    /// Persists a processed L1 block header, keyed by hash.
    fn add_block_header(&self, header: &L1BlockHeader) -> StoreResult<()>;

    /// Looks up an L1 block header by hash.
    fn block_header(&self, hash: B256) -> StoreResult<Option<L1BlockHeader>>;

    /// Persists a batch, keyed by hash, and records it as canonical at its height.
    fn add_batch(&self, batch: &ExtBatch) -> StoreResult<()>;

    /// Looks up a batch by hash.
    fn batch(&self, hash: B256) -> StoreResult<Option<ExtBatch>>;

    /// Returns the hash of the canonical batch at `number`.
    fn canonical_batch_hash(&self, number: u64) -> StoreResult<Option<B256>>;

    /// Returns the canonical batch at `number`.
    fn canonical_batch(&self, number: u64) -> StoreResult<Option<ExtBatch>> {
        match self.canonical_batch_hash(number)? {
            Some(hash) => self.batch(hash),
            None => Ok(None),
        }
    }

    /// Releases the store. Later calls fail with [`StoreError::Closed`].
    fn close(&self) -> StoreResult<()>;
}

//! In-memory [`HostStore`].

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::B256;
use parking_lot::RwLock;

use super::{HostStore, StoreError, StoreResult};
use crate::{ExtBatch, L1BlockHeader};

#[derive(Debug, Default)]
struct Inner {
    closed: bool,
    headers: HashMap<B256, L1BlockHeader>,
    batches: HashMap<B256, ExtBatch>,
    canonical: BTreeMap<u64, B256>,
}

/// Host store kept in process memory.
///
/// The latest batch added at a height becomes canonical at that height.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the height of the highest canonical batch.
    pub fn head_batch_number(&self) -> Option<u64> {
        self.inner.read().canonical.keys().next_back().copied()
    }

    /// Marks `hash` as canonical at `number` without storing a batch.
    ///
    /// Used when a reorg is learned about out of band.
    pub fn set_canonical(&self, number: u64, hash: B256) {
        self.inner.write().canonical.insert(number, hash);
    }
}

impl HostStore for MemoryStore {
    fn add_block_header(&self, header: &L1BlockHeader) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        inner.headers.insert(header.hash, *header);
        Ok(())
    }

    fn block_header(&self, hash: B256) -> StoreResult<Option<L1BlockHeader>> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner.headers.get(&hash).copied())
    }

    fn add_batch(&self, batch: &ExtBatch) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        let hash = batch.hash();
        inner.canonical.insert(batch.number(), hash);
        inner.batches.insert(hash, batch.clone());
        Ok(())
    }

    fn batch(&self, hash: B256) -> StoreResult<Option<ExtBatch>> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner.batches.get(&hash).cloned())
    }

    fn canonical_batch_hash(&self, number: u64) -> StoreResult<Option<B256>> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner.canonical.get(&number).copied())
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.write().closed = true;
        Ok(())
    }
}

//! L2 batch types and their wire encodings.

use alloy_primitives::{Address, B256, Bytes, keccak256};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

/// An encrypted transaction gossiped between hosts.
pub type EncryptedTx = Bytes;

/// Header of an L2 batch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, RlpEncodable, RlpDecodable,
)]
#[serde(rename_all = "camelCase")]
pub struct BatchHeader {
    /// Hash of the parent batch.
    pub parent_hash: B256,
    /// Batch height.
    pub number: u64,
    /// L1 block the batch was produced against.
    pub l1_proof: B256,
    /// Batch timestamp.
    pub timestamp: u64,
    /// Sequencer that produced the batch.
    pub sequencer: Address,
}

impl BatchHeader {
    /// Returns the keccak hash of the RLP-encoded header.
    pub fn hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }
}

/// An L2 batch as exchanged between hosts and submitted to the enclave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RlpEncodable, RlpDecodable)]
#[serde(rename_all = "camelCase")]
pub struct ExtBatch {
    /// Batch header.
    pub header: BatchHeader,
    /// Hashes of the transactions in the batch.
    pub tx_hashes: Vec<B256>,
    /// Encrypted transaction payload.
    pub encrypted_tx_blob: Bytes,
}

impl ExtBatch {
    /// Returns the batch hash, which is the hash of its header.
    pub fn hash(&self) -> B256 {
        self.header.hash()
    }

    /// Returns the parent batch hash.
    pub const fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }

    /// Returns the batch height.
    pub const fn number(&self) -> u64 {
        self.header.number
    }
}

/// Envelope carrying batches between hosts.
///
/// `is_catch_up` marks bulk replay; receivers store such batches without
/// notifying live subscribers.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BatchMsg {
    /// Batches in ascending height order.
    pub batches: Vec<ExtBatch>,
    /// Whether the batches are a catch-up response rather than live data.
    pub is_catch_up: bool,
}

impl BatchMsg {
    /// Encodes the message for the wire.
    pub fn encoded(&self) -> Bytes {
        Bytes::from(alloy_rlp::encode(self))
    }

    /// Decodes a message from its wire form.
    pub fn decode_bytes(mut data: &[u8]) -> alloy_rlp::Result<Self> {
        <Self as Decodable>::decode(&mut data)
    }
}

/// Request from a peer for the canonical batches following its head.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct BatchRequest {
    /// P2P address the batches are sent back to.
    pub requester: String,
    /// The requester's current head batch, zero to request from genesis.
    pub current_head_batch: B256,
}

impl BatchRequest {
    /// Encodes the request for the wire.
    pub fn encoded(&self) -> Bytes {
        Bytes::from(alloy_rlp::encode(self))
    }

    /// Decodes a request from its wire form.
    pub fn decode_bytes(mut data: &[u8]) -> alloy_rlp::Result<Self> {
        <Self as Decodable>::decode(&mut data)
    }
}

//! Shared test utilities: an in-memory L1 chain, enclave and P2P mocks, and a
//! harness wiring a guardian to them.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use alloy_primitives::{Address, B256, Bytes, keccak256};
use alloy_rpc_types_eth::TransactionRequest;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    AttestationReport, BatchHeader, BatchRequest, EnclaveClient, EnclaveError, EnclaveGuardian,
    EnclaveResult, EnclaveStatusCode, EnclaveStatusReport, EncryptedTx, ExtBatch,
    GenesisResponder, GuardianConfig, HostStore, L1Block, L1BlockHeader, L1BlockReceiver,
    L1Client, L1Receipt, L1Result, L1Service, L1ServiceConfig, L1Transaction, L1Wallet,
    L2Service, L2ServiceConfig, L2Subscriber, MemoryStore, P2p, P2pHandler, P2pResult,
    ProducedSecretResponse, RpcError, RpcResult, SignedL1Tx, StoreError, StoreResult,
    SubmitBlockResponse,
};

/// Batch at `number` on top of `parent`. `salt` varies the timestamp to make siblings.
pub(crate) fn batch(parent: B256, number: u64, salt: u64) -> ExtBatch {
    ExtBatch {
        header: BatchHeader {
            parent_hash: parent,
            number,
            l1_proof: B256::ZERO,
            timestamp: 1_700_000_000 + number * 2 + salt * 1_000,
            sequencer: Address::repeat_byte(0x5e),
        },
        tx_hashes: vec![B256::with_last_byte(number as u8)],
        encrypted_tx_blob: Bytes::from_static(b"blob"),
    }
}

/// L1 header with a hash derived from its fields.
pub(crate) fn header(number: u64, parent: B256) -> L1BlockHeader {
    l1_block(number, parent, 0, Vec::new()).header
}

/// L1 block whose hash commits to `number`, `parent`, `salt` and the transaction hashes.
pub(crate) fn l1_block(
    number: u64,
    parent: B256,
    salt: u64,
    transactions: Vec<L1Transaction>,
) -> L1Block {
    let mut preimage = Vec::with_capacity(48 + transactions.len() * 32);
    preimage.extend_from_slice(&number.to_be_bytes());
    preimage.extend_from_slice(parent.as_slice());
    preimage.extend_from_slice(&salt.to_be_bytes());
    for tx in &transactions {
        preimage.extend_from_slice(tx.hash.as_slice());
    }
    L1Block {
        header: L1BlockHeader {
            hash: keccak256(&preimage),
            parent_hash: parent,
            number,
            timestamp: 1_700_000_000 + number * 12,
        },
        transactions,
    }
}

/// Attestation report for `owner`.
pub(crate) fn attestation(owner: Address) -> AttestationReport {
    AttestationReport {
        report: Bytes::from_static(b"quote"),
        pub_key: Bytes::from_static(b"enclave-key"),
        owner,
        host_address: "http://host-a:10000".to_string(),
    }
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met within 5s");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ---------------------------------------------------------------------------
// L1
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Chain {
    canonical: Vec<L1Block>,
    blocks: HashMap<B256, L1Block>,
    receipts: HashMap<B256, bool>,
    auto_receipt: Option<bool>,
    failing_sends: u32,
    send_attempts: u32,
    sent: Vec<Bytes>,
    fail_prepare: bool,
}

impl Chain {
    fn push(&mut self, salt: u64, transactions: Vec<L1Transaction>) -> L1Block {
        let parent = self.canonical.last().map_or(B256::ZERO, L1Block::hash);
        let block = l1_block(self.canonical.len() as u64, parent, salt, transactions);
        self.blocks.insert(block.hash(), block.clone());
        self.canonical.push(block.clone());
        block
    }
}

/// In-memory L1 chain. Blocks replaced by a reorg stay retrievable by hash.
#[derive(Default)]
pub(crate) struct MockL1Client {
    chain: Mutex<Chain>,
}

impl MockL1Client {
    /// Chain with blocks `0..len`.
    pub(crate) fn with_chain(len: u64) -> Self {
        let client = Self::default();
        for _ in 0..len {
            client.push_block(Vec::new());
        }
        client
    }

    /// Appends a block carrying `transactions` and returns it.
    pub(crate) fn push_block(&self, transactions: Vec<L1Transaction>) -> L1Block {
        self.chain.lock().push(0, transactions)
    }

    pub(crate) fn head(&self) -> L1Block {
        self.chain.lock().canonical.last().cloned().expect("empty mock chain")
    }

    pub(crate) fn canonical(&self, number: u64) -> L1Block {
        self.chain.lock().canonical[number as usize].clone()
    }

    /// Replaces the canonical blocks from `number` on with the same count of new ones.
    pub(crate) fn reorg_from(&self, number: u64, salt: u64) {
        let mut chain = self.chain.lock();
        let replaced = chain.canonical.len() as u64 - number;
        chain.canonical.truncate(number as usize);
        for _ in 0..replaced {
            chain.push(salt, Vec::new());
        }
    }

    pub(crate) fn set_receipt(&self, hash: B256, status: bool) {
        self.chain.lock().receipts.insert(hash, status);
    }

    /// Answers receipt lookups for unknown hashes with `status`, or not at all with `None`.
    pub(crate) fn auto_receipt(&self, status: Option<bool>) {
        self.chain.lock().auto_receipt = status;
    }

    /// Fails the next `count` broadcasts with a retryable error.
    pub(crate) fn fail_sends(&self, count: u32) {
        self.chain.lock().failing_sends = count;
    }

    pub(crate) fn send_attempts(&self) -> u32 {
        self.chain.lock().send_attempts
    }

    /// Raw transactions accepted so far.
    pub(crate) fn sent(&self) -> Vec<Bytes> {
        self.chain.lock().sent.clone()
    }

    pub(crate) fn fail_prepare(&self, fail: bool) {
        self.chain.lock().fail_prepare = fail;
    }
}

#[async_trait]
impl L1Client for MockL1Client {
    async fn head_block(&self) -> RpcResult<L1Block> {
        self.chain
            .lock()
            .canonical
            .last()
            .cloned()
            .ok_or_else(|| RpcError::BlockNotFound("head".to_string()))
    }

    async fn block_by_hash(&self, hash: B256) -> RpcResult<Option<L1Block>> {
        Ok(self.chain.lock().blocks.get(&hash).cloned())
    }

    async fn block_by_number(&self, number: u64) -> RpcResult<Option<L1Block>> {
        Ok(self.chain.lock().canonical.get(number as usize).cloned())
    }

    async fn transaction_receipt(&self, hash: B256) -> RpcResult<Option<L1Receipt>> {
        let chain = self.chain.lock();
        let status = chain.receipts.get(&hash).copied().or(chain.auto_receipt);
        let head = chain.canonical.last();
        Ok(status.map(|status| L1Receipt {
            transaction_hash: hash,
            block_hash: head.map(L1Block::hash),
            block_number: head.map(L1Block::number),
            status,
        }))
    }

    async fn nonce(&self, _: Address) -> RpcResult<u64> {
        Ok(0)
    }

    async fn prepare_transaction(&self, tx: TransactionRequest) -> RpcResult<TransactionRequest> {
        if self.chain.lock().fail_prepare {
            return Err(RpcError::Connection("mock: prepare failed".to_string()));
        }
        Ok(tx)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> RpcResult<B256> {
        let mut chain = self.chain.lock();
        chain.send_attempts += 1;
        if chain.failing_sends > 0 {
            chain.failing_sends -= 1;
            return Err(RpcError::Connection("mock: send failed".to_string()));
        }
        let hash = keccak256(&raw);
        chain.sent.push(raw);
        Ok(hash)
    }
}

/// Wallet whose "signed" transaction is the call data itself.
#[derive(Default)]
pub(crate) struct MockWallet {
    nonce: AtomicU64,
}

#[async_trait]
impl L1Wallet for MockWallet {
    fn address(&self) -> Address {
        Address::repeat_byte(0x77)
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    fn rollback_nonce(&self, nonce: u64) -> bool {
        self.nonce
            .compare_exchange(nonce.saturating_add(1), nonce, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn set_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }

    async fn sign(&self, tx: TransactionRequest) -> L1Result<SignedL1Tx> {
        let raw = tx.input.input().cloned().unwrap_or_default();
        Ok(SignedL1Tx { hash: keccak256(&raw), raw })
    }
}

/// Records the blocks it is notified of.
#[derive(Default)]
pub(crate) struct RecordingL1Receiver {
    blocks: Mutex<Vec<L1Block>>,
}

impl RecordingL1Receiver {
    pub(crate) fn blocks(&self) -> Vec<L1Block> {
        self.blocks.lock().clone()
    }

    pub(crate) async fn wait_for(&self, count: usize) {
        wait_until(|| self.blocks.lock().len() >= count).await;
    }
}

#[async_trait]
impl L1BlockReceiver for RecordingL1Receiver {
    async fn on_new_l1_block(&self, block: L1Block) {
        self.blocks.lock().push(block);
    }
}

// ---------------------------------------------------------------------------
// Enclave
// ---------------------------------------------------------------------------

struct EnclaveMock {
    owner: Address,
    code: EnclaveStatusCode,
    l1_head: B256,
    l2_head: B256,
    reachable: bool,
    reject_submissions: bool,
    fail_init: u32,
    produced: Vec<ProducedSecretResponse>,
    status_calls: u32,
    generate_calls: u32,
    init_calls: Vec<Bytes>,
    blocks: Vec<B256>,
    batches: Vec<B256>,
    txs: Vec<EncryptedTx>,
}

type BatchHook = Box<dyn Fn(usize) + Send + Sync>;

/// Enclave that tracks its heads like the real one and records every call.
pub(crate) struct MockEnclave {
    inner: Mutex<EnclaveMock>,
    on_batch: Mutex<Option<BatchHook>>,
}

impl MockEnclave {
    /// A reachable, running enclave attesting to `owner` with zero heads.
    pub(crate) fn new(owner: Address) -> Self {
        Self {
            inner: Mutex::new(EnclaveMock {
                owner,
                code: EnclaveStatusCode::Running,
                l1_head: B256::ZERO,
                l2_head: B256::ZERO,
                reachable: true,
                reject_submissions: false,
                fail_init: 0,
                produced: Vec::new(),
                status_calls: 0,
                generate_calls: 0,
                init_calls: Vec::new(),
                blocks: Vec::new(),
                batches: Vec::new(),
                txs: Vec::new(),
            }),
            on_batch: Mutex::new(None),
        }
    }

    /// Runs `hook` with the number of accepted batches after each one.
    pub(crate) fn on_batch(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.on_batch.lock() = Some(Box::new(hook));
    }

    pub(crate) fn set_code(&self, code: EnclaveStatusCode) {
        self.inner.lock().code = code;
    }

    pub(crate) fn set_owner(&self, owner: Address) {
        self.inner.lock().owner = owner;
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.inner.lock().reachable = reachable;
    }

    pub(crate) fn set_heads(&self, l1_head: B256, l2_head: B256) {
        let mut inner = self.inner.lock();
        inner.l1_head = l1_head;
        inner.l2_head = l2_head;
    }

    pub(crate) fn reject_submissions(&self, reject: bool) {
        self.inner.lock().reject_submissions = reject;
    }

    /// Fails the next `count` `init_enclave` calls.
    pub(crate) fn fail_init(&self, count: u32) {
        self.inner.lock().fail_init = count;
    }

    /// Returns `responses` from the next submitted L1 block.
    pub(crate) fn produce_responses(&self, responses: Vec<ProducedSecretResponse>) {
        self.inner.lock().produced = responses;
    }

    pub(crate) fn status_calls(&self) -> u32 {
        self.inner.lock().status_calls
    }

    pub(crate) fn generate_calls(&self) -> u32 {
        self.inner.lock().generate_calls
    }

    pub(crate) fn init_calls(&self) -> Vec<Bytes> {
        self.inner.lock().init_calls.clone()
    }

    /// Hashes of the L1 blocks accepted, in order.
    pub(crate) fn blocks(&self) -> Vec<B256> {
        self.inner.lock().blocks.clone()
    }

    /// Hashes of the batches accepted, in order.
    pub(crate) fn batches(&self) -> Vec<B256> {
        self.inner.lock().batches.clone()
    }

    pub(crate) fn txs(&self) -> Vec<EncryptedTx> {
        self.inner.lock().txs.clone()
    }

    fn check_submission(inner: &EnclaveMock) -> EnclaveResult<()> {
        if !inner.reachable {
            return Err(EnclaveError::Unreachable("mock: connection refused".to_string()));
        }
        if inner.reject_submissions {
            return Err(EnclaveError::Rejected("mock: submission rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EnclaveClient for MockEnclave {
    async fn status(&self) -> EnclaveResult<EnclaveStatusReport> {
        let mut inner = self.inner.lock();
        inner.status_calls += 1;
        if !inner.reachable {
            return Err(EnclaveError::Unreachable("mock: connection refused".to_string()));
        }
        Ok(EnclaveStatusReport {
            status_code: inner.code,
            l1_head: inner.l1_head,
            l2_head: inner.l2_head,
        })
    }

    async fn attestation(&self) -> EnclaveResult<AttestationReport> {
        Ok(attestation(self.inner.lock().owner))
    }

    async fn generate_secret(&self) -> EnclaveResult<Bytes> {
        let mut inner = self.inner.lock();
        inner.generate_calls += 1;
        inner.code = EnclaveStatusCode::Running;
        Ok(Bytes::from_static(b"network-secret"))
    }

    async fn init_enclave(&self, secret: Bytes) -> EnclaveResult<()> {
        let mut inner = self.inner.lock();
        inner.init_calls.push(secret);
        if inner.fail_init > 0 {
            inner.fail_init -= 1;
            return Err(EnclaveError::Rejected("mock: cannot decrypt secret".to_string()));
        }
        inner.code = EnclaveStatusCode::Running;
        Ok(())
    }

    async fn submit_l1_block(
        &self,
        block: L1Block,
        _receipts: Vec<L1Receipt>,
        _is_latest: bool,
    ) -> EnclaveResult<SubmitBlockResponse> {
        let mut inner = self.inner.lock();
        Self::check_submission(&inner)?;
        inner.l1_head = block.hash();
        inner.blocks.push(block.hash());
        Ok(SubmitBlockResponse { produced_secret_responses: std::mem::take(&mut inner.produced) })
    }

    async fn submit_batch(&self, batch: ExtBatch) -> EnclaveResult<()> {
        let accepted = {
            let mut inner = self.inner.lock();
            Self::check_submission(&inner)?;
            inner.l2_head = batch.hash();
            inner.batches.push(batch.hash());
            inner.batches.len()
        };
        if let Some(hook) = self.on_batch.lock().as_ref() {
            hook(accepted);
        }
        Ok(())
    }

    async fn submit_tx(&self, tx: EncryptedTx) -> EnclaveResult<()> {
        let mut inner = self.inner.lock();
        Self::check_submission(&inner)?;
        inner.txs.push(tx);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// L2 and P2P
// ---------------------------------------------------------------------------

/// Store whose every call fails.
#[derive(Debug)]
pub(crate) struct FailingStore;

impl FailingStore {
    fn error() -> StoreError {
        StoreError::Backend("mock: disk full".to_string())
    }
}

impl HostStore for FailingStore {
    fn add_block_header(&self, _: &L1BlockHeader) -> StoreResult<()> {
        Err(Self::error())
    }

    fn block_header(&self, _: B256) -> StoreResult<Option<L1BlockHeader>> {
        Err(Self::error())
    }

    fn add_batch(&self, _: &ExtBatch) -> StoreResult<()> {
        Err(Self::error())
    }

    fn batch(&self, _: B256) -> StoreResult<Option<ExtBatch>> {
        Err(Self::error())
    }

    fn canonical_batch_hash(&self, _: u64) -> StoreResult<Option<B256>> {
        Err(Self::error())
    }

    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// P2P transport that records outbound messages and keeps the inbound handler.
#[derive(Default)]
pub(crate) struct MockP2p {
    sent: Mutex<Vec<(String, Bytes)>>,
    requests: Mutex<Vec<BatchRequest>>,
    handler: Mutex<Option<Arc<dyn P2pHandler>>>,
    stopped: AtomicBool,
}

impl MockP2p {
    pub(crate) fn sent_batches(&self) -> Vec<(String, Bytes)> {
        self.sent.lock().clone()
    }

    pub(crate) fn batch_requests(&self) -> Vec<BatchRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn handler(&self) -> Option<Arc<dyn P2pHandler>> {
        self.handler.lock().clone()
    }

    pub(crate) fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl P2p for MockP2p {
    async fn start_listening(&self, handler: Arc<dyn P2pHandler>) -> P2pResult<()> {
        *self.handler.lock() = Some(handler);
        Ok(())
    }

    async fn stop_listening(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn send_batches(&self, to: &str, encoded: Bytes) -> P2pResult<()> {
        self.sent.lock().push((to.to_string(), encoded));
        Ok(())
    }

    async fn request_batches(&self, request: &BatchRequest) -> P2pResult<()> {
        self.requests.lock().push(request.clone());
        Ok(())
    }
}

/// Records the raw messages delivered by a P2P listener.
#[derive(Default)]
pub(crate) struct RecordingP2pHandler {
    batches: Mutex<Vec<Bytes>>,
    txs: Mutex<Vec<Bytes>>,
    batch_requests: Mutex<Vec<Bytes>>,
}

impl RecordingP2pHandler {
    pub(crate) fn batches(&self) -> Vec<Bytes> {
        self.batches.lock().clone()
    }

    pub(crate) fn txs(&self) -> Vec<Bytes> {
        self.txs.lock().clone()
    }

    pub(crate) fn batch_requests(&self) -> Vec<Bytes> {
        self.batch_requests.lock().clone()
    }
}

#[async_trait]
impl P2pHandler for RecordingP2pHandler {
    async fn receive_batches(&self, encoded: Bytes) {
        self.batches.lock().push(encoded);
    }

    async fn receive_tx(&self, tx: EncryptedTx) {
        self.txs.lock().push(tx);
    }

    async fn receive_batch_request(&self, encoded: Bytes) {
        self.batch_requests.lock().push(encoded);
    }
}

/// Records the batches and transactions it is notified of.
#[derive(Default)]
pub(crate) struct RecordingSubscriber {
    batches: Mutex<Vec<ExtBatch>>,
    txs: Mutex<Vec<EncryptedTx>>,
}

impl RecordingSubscriber {
    pub(crate) fn batches(&self) -> Vec<ExtBatch> {
        self.batches.lock().clone()
    }

    pub(crate) fn txs(&self) -> Vec<EncryptedTx> {
        self.txs.lock().clone()
    }

    pub(crate) async fn wait_for_batches(&self, count: usize) {
        wait_until(|| self.batches.lock().len() >= count).await;
    }

    pub(crate) async fn wait_for_txs(&self, count: usize) {
        wait_until(|| self.txs.lock().len() >= count).await;
    }
}

#[async_trait]
impl L2Subscriber for RecordingSubscriber {
    async fn on_new_batch(&self, batch: ExtBatch) {
        self.batches.lock().push(batch);
    }

    async fn on_tx_gossip(&self, tx: EncryptedTx) {
        self.txs.lock().push(tx);
    }
}

// ---------------------------------------------------------------------------
// Guardian harness
// ---------------------------------------------------------------------------

/// Management contract address used by the harness.
pub(crate) const CONTRACT: Address = Address::repeat_byte(0xcc);

/// Enclave identity used by the harness.
pub(crate) const ENCLAVE_ID: Address = Address::repeat_byte(0xaa);

/// A guardian wired to mocks with millisecond intervals.
pub(crate) struct GuardianHarness {
    pub(crate) guardian: Arc<EnclaveGuardian>,
    pub(crate) enclave: Arc<MockEnclave>,
    pub(crate) l1_client: Arc<MockL1Client>,
    pub(crate) l1: Arc<L1Service>,
    pub(crate) l2: Arc<L2Service>,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) p2p: Arc<MockP2p>,
    pub(crate) contract: Address,
    pub(crate) enclave_id: Address,
}

impl GuardianHarness {
    pub(crate) fn builder() -> GuardianHarnessBuilder {
        GuardianHarnessBuilder { genesis: false, chain_len: 1, guardian_store: None }
    }
}

pub(crate) struct GuardianHarnessBuilder {
    genesis: bool,
    chain_len: u64,
    guardian_store: Option<Arc<dyn HostStore>>,
}

impl GuardianHarnessBuilder {
    pub(crate) const fn genesis(mut self, genesis: bool) -> Self {
        self.genesis = genesis;
        self
    }

    /// Starts the L1 chain with blocks `0..len`.
    pub(crate) const fn chain(mut self, len: u64) -> Self {
        self.chain_len = len;
        self
    }

    /// Gives the guardian its own store instead of the shared memory store.
    pub(crate) fn guardian_store(mut self, store: Arc<dyn HostStore>) -> Self {
        self.guardian_store = Some(store);
        self
    }

    pub(crate) fn build(self) -> GuardianHarness {
        let enclave = Arc::new(MockEnclave::new(ENCLAVE_ID));
        let l1_client = Arc::new(MockL1Client::with_chain(self.chain_len));
        let store = Arc::new(MemoryStore::new());
        let p2p = Arc::new(MockP2p::default());

        let l1_config = L1ServiceConfig {
            management_contract: CONTRACT,
            host_id: ENCLAVE_ID,
            host_address: "http://host-a:10000".to_string(),
            poll_interval: Duration::from_millis(10),
            tx_initial_delay: Duration::from_millis(5),
            receipt_timeout: Duration::from_millis(200),
            receipt_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let l1 = Arc::new(L1Service::new(
            l1_config,
            Arc::clone(&l1_client) as Arc<dyn L1Client>,
            Arc::new(MockWallet::default()),
            Arc::new(GenesisResponder::new(self.genesis)),
        ));

        let l2_config = L2ServiceConfig {
            host_address: "http://host-a:10000".to_string(),
            ..Default::default()
        };
        let l2 = Arc::new(L2Service::new(
            l2_config,
            Arc::clone(&store) as Arc<dyn HostStore>,
            Arc::clone(&p2p) as Arc<dyn P2p>,
        ));

        let guardian_config = GuardianConfig {
            enclave_id: ENCLAVE_ID,
            is_genesis: self.genesis,
            reconnect_interval: Duration::from_millis(10),
            monitoring_interval: Duration::from_millis(10),
            retry_interval: Duration::from_millis(10),
            secret_response_timeout: Duration::from_millis(300),
            secret_response_interval: Duration::from_millis(10),
        };
        let guardian_store =
            self.guardian_store.unwrap_or_else(|| Arc::clone(&store) as Arc<dyn HostStore>);
        let guardian = Arc::new(EnclaveGuardian::new(
            guardian_config,
            Arc::clone(&enclave) as Arc<dyn EnclaveClient>,
            Arc::clone(&l1),
            Arc::clone(&l2),
            guardian_store,
        ));

        GuardianHarness {
            guardian,
            enclave,
            l1_client,
            l1,
            l2,
            store,
            p2p,
            contract: CONTRACT,
            enclave_id: ENCLAVE_ID,
        }
    }
}

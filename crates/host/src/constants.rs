//! Constants used throughout the host.

use std::time::Duration;

// ============================================================================
// Guardian Loop Constants
// ============================================================================

/// Delay between status queries while the enclave is disconnected or unavailable.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Delay between loop iterations while the enclave is live.
pub const DEFAULT_MONITORING_INTERVAL: Duration = Duration::from_secs(1);

/// Delay after a failed loop action before it is attempted again.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Total time a non-genesis node waits for a secret response on L1.
pub const DEFAULT_SECRET_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay between L1 blocks scanned while waiting for a secret response.
pub const DEFAULT_SECRET_RESPONSE_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// L1 Constants
// ============================================================================

/// Polling interval for new L1 head blocks.
pub const DEFAULT_L1_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Attempts to send a secret transaction to L1.
///
/// With a doubling delay starting at one second the worst case is 63 seconds
/// of waiting, plus time per request.
pub const DEFAULT_L1_TX_TRIES: u32 = 7;

/// Initial delay between attempts to send an L1 transaction.
pub const DEFAULT_L1_TX_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Maximum time to wait for an L1 transaction receipt.
pub const DEFAULT_L1_RECEIPT_TIMEOUT: Duration = Duration::from_secs(100);

/// Interval between L1 transaction receipt lookups.
pub const DEFAULT_L1_RECEIPT_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum number of blocks walked back when resolving an L1 reorg.
pub const DEFAULT_MAX_L1_REORG_DEPTH: u64 = 256;

/// Capacity of the channel carrying background L1 transaction failures.
pub const TX_FAILURE_CHANNEL_CAPACITY: usize = 64;

/// Gas limit multiplier numerator (120% = 6/5).
pub const GAS_LIMIT_MULTIPLIER_NUMERATOR: u64 = 6;

/// Gas limit multiplier denominator (120% = 6/5).
pub const GAS_LIMIT_MULTIPLIER_DENOMINATOR: u64 = 5;

// ============================================================================
// L2 Constants
// ============================================================================

/// Maximum number of batches walked back when resolving an L2 reorg.
pub const DEFAULT_MAX_BATCH_WALK_BACK: u64 = 1024;

/// Maximum number of batches returned in answer to a peer batch request.
pub const DEFAULT_MAX_BATCHES_PER_RESPONSE: usize = 100;

/// Capacity of each subscriber's notification queue.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 1024;

// ============================================================================
// Retry Configuration Constants
// ============================================================================

/// Default maximum number of retry attempts for RPC operations.
pub const DEFAULT_RPC_MAX_RETRIES: u32 = 5;

/// Default initial delay for exponential backoff.
pub const DEFAULT_RETRY_INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Default maximum delay between retry attempts.
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

/// Default RPC request timeout.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

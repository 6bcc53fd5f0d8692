/// Gauge: host build info, labelled with `version`.
pub const INFO: &str = "enclave_host_info";

/// Gauge: host is running (set to 1 at startup).
pub const UP: &str = "enclave_host_up";

/// Gauge: current guardian status, see `EnclaveStatus::as_gauge`.
pub const GUARDIAN_STATUS: &str = "enclave_host_guardian_status";

/// Counter: total number of L1 blocks submitted to the enclave.
pub const L1_BLOCKS_SUBMITTED_TOTAL: &str = "enclave_host_l1_blocks_submitted_total";

/// Counter: total number of L2 batches submitted to the enclave.
pub const L2_BATCHES_SUBMITTED_TOTAL: &str = "enclave_host_l2_batches_submitted_total";

/// Counter: total number of failed enclave submissions, labelled with `stream`.
pub const SUBMISSION_FAILURES_TOTAL: &str = "enclave_host_submission_failures_total";

/// Counter: total number of L1 transactions broadcast, labelled with `kind`.
pub const L1_TXS_SENT_TOTAL: &str = "enclave_host_l1_txs_sent_total";

/// Counter: total number of times the network secret was provided to the enclave.
pub const SECRET_PROVIDED_TOTAL: &str = "enclave_host_secret_provided_total";

/// Label key for version.
pub const LABEL_VERSION: &str = "version";

/// Label key for the submission stream (`l1` or `l2`).
pub const LABEL_STREAM: &str = "stream";

/// Label key for the L1 transaction kind.
pub const LABEL_KIND: &str = "kind";

/// Records startup metrics (INFO gauge with version label, UP gauge set to 1).
pub fn record_startup_metrics(version: &str) {
    metrics::gauge!(INFO, LABEL_VERSION => version.to_string()).set(1.0);
    metrics::gauge!(UP).set(1.0);
}

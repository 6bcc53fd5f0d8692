//! Configuration types and validation for the host.

use std::{net::IpAddr, time::Duration};

use alloy_signer_local::PrivateKeySigner;
use backon::ExponentialBuilder;
use thiserror::Error;
use url::Url;

use crate::{
    GuardianConfig, L1ServiceConfig, L2ServiceConfig, LogConfig,
    constants::{DEFAULT_RETRY_INITIAL_DELAY, DEFAULT_RETRY_MAX_DELAY, DEFAULT_RPC_MAX_RETRIES},
};

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid URL format.
    #[error("invalid {field} URL: {reason}")]
    InvalidUrl {
        /// The field name that contains the invalid URL.
        field: &'static str,
        /// The reason the URL is invalid.
        reason: String,
    },
    /// A field value is out of the allowed range.
    #[error("{field} must be {constraint}, got {value}")]
    OutOfRange {
        /// The field name that is out of range.
        field: &'static str,
        /// The constraint description.
        constraint: &'static str,
        /// The actual value.
        value: String,
    },
    /// Invalid metrics configuration.
    #[error("invalid metrics config: {0}")]
    Metrics(String),
    /// Invalid signing configuration.
    #[error("invalid signing config: {0}")]
    Signing(String),
}

/// Retry configuration for RPC calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_attempts: u32,
    /// Initial delay for exponential backoff.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RPC_MAX_RETRIES,
            initial_delay: DEFAULT_RETRY_INITIAL_DELAY,
            max_delay: DEFAULT_RETRY_MAX_DELAY,
        }
    }
}

impl RetryConfig {
    /// Creates a `backon` [`ExponentialBuilder`] from this configuration.
    pub fn to_backoff_builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts as usize)
            .with_jitter()
    }
}

/// Metrics server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether the Prometheus exporter is installed.
    pub enabled: bool,
    /// Bind address.
    pub addr: IpAddr,
    /// Bind port.
    pub port: u16,
}

/// Health and status HTTP server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthServerConfig {
    /// Bind address.
    pub addr: IpAddr,
    /// Bind port.
    pub port: u16,
}

/// P2P transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct P2pConfig {
    /// Bind address for inbound peer messages.
    pub addr: IpAddr,
    /// Bind port for inbound peer messages.
    pub port: u16,
    /// Base URL of the sequencer's P2P endpoint, `None` on the sequencer itself.
    pub sequencer_url: Option<Url>,
}

/// Validated host configuration.
#[derive(Clone)]
pub struct HostConfig {
    /// URL of the enclave RPC endpoint.
    pub enclave_rpc: Url,
    /// URL of the L1 Ethereum RPC endpoint.
    pub l1_eth_rpc: Url,
    /// RPC request timeout.
    pub rpc_timeout: Duration,
    /// RPC retry configuration.
    pub retry: RetryConfig,
    /// Signer for L1 transactions.
    pub signer: PrivateKeySigner,
    /// Guardian configuration.
    pub guardian: GuardianConfig,
    /// L1 service configuration.
    pub l1: L1ServiceConfig,
    /// L2 service configuration.
    pub l2: L2ServiceConfig,
    /// P2P transport configuration.
    pub p2p: P2pConfig,
    /// Logging configuration.
    pub log: LogConfig,
    /// Metrics server configuration.
    pub metrics: MetricsConfig,
    /// Health server configuration.
    pub health: HealthServerConfig,
}

impl std::fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostConfig")
            .field("enclave_rpc", &self.enclave_rpc)
            .field("l1_eth_rpc", &self.l1_eth_rpc)
            .field("signer", &self.signer.address())
            .field("guardian", &self.guardian)
            .field("l1", &self.l1)
            .field("l2", &self.l2)
            .field("p2p", &self.p2p)
            .finish_non_exhaustive()
    }
}

/// Validate that a URL has a scheme and host.
pub fn validate_url(url: &Url, field: &'static str) -> Result<(), ConfigError> {
    if url.scheme().is_empty() {
        return Err(ConfigError::InvalidUrl { field, reason: "missing scheme".to_string() });
    }

    if url.host().is_none() {
        return Err(ConfigError::InvalidUrl { field, reason: "missing host".to_string() });
    }

    Ok(())
}

/// Validate that a duration is non-zero.
pub fn validate_non_zero(value: Duration, field: &'static str) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::OutOfRange {
            field,
            constraint: "greater than 0",
            value: "0s".to_string(),
        });
    }
    Ok(())
}

/// Builds a local signer from a hex-encoded private key.
pub fn build_signer(private_key: &str) -> Result<PrivateKeySigner, ConfigError> {
    let hex_str = private_key.strip_prefix("0x").unwrap_or(private_key);
    hex_str.parse().map_err(|e| ConfigError::Signing(format!("invalid private key: {e}")))
}

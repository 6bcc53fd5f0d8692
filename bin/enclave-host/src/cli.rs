//! CLI definition for the enclave host binary.

use std::{net::IpAddr, time::Duration};

use alloy_primitives::Address;
use clap::{ArgAction, Parser, ValueEnum};
use enclave_host::{
    ConfigError, GuardianConfig, HealthServerConfig, HostConfig, L1ServiceConfig,
    L2ServiceConfig, LogConfig, LogFormat, MetricsConfig, P2pConfig, RetryConfig,
    StdoutLogConfig, build_signer, validate_non_zero, validate_url, verbosity_to_level_filter,
};
use url::Url;

/// Enclave host - keeps a rollup enclave in sync with L1 and the L2 batch network.
#[derive(Debug, Clone, Parser)]
#[command(name = "enclave-host")]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// Host configuration arguments.
    #[command(flatten)]
    pub host: HostArgs,

    /// Logging configuration arguments.
    #[command(flatten)]
    pub logging: LogArgs,

    /// Metrics configuration arguments.
    #[command(flatten)]
    pub metrics: MetricsArgs,

    /// Health server configuration arguments.
    #[command(flatten)]
    pub health: HealthArgs,

    /// P2P configuration arguments.
    #[command(flatten)]
    pub p2p: P2pArgs,
}

/// Core host configuration arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Host")]
pub(crate) struct HostArgs {
    /// URL of the enclave RPC endpoint.
    #[arg(long = "enclave-rpc", env = "ENCLAVE_HOST_ENCLAVE_RPC", value_parser = parse_url)]
    pub enclave_rpc: Url,

    /// URL of the L1 Ethereum RPC endpoint.
    #[arg(long = "l1-eth-rpc", env = "ENCLAVE_HOST_L1_ETH_RPC", value_parser = parse_url)]
    pub l1_eth_rpc: Url,

    /// Address of the rollup management contract on L1.
    #[arg(
        long = "management-contract",
        env = "ENCLAVE_HOST_MANAGEMENT_CONTRACT",
        value_parser = parse_address
    )]
    pub management_contract: Address,

    /// Identity the local enclave attests with.
    #[arg(long = "enclave-id", env = "ENCLAVE_HOST_ENCLAVE_ID", value_parser = parse_address)]
    pub enclave_id: Address,

    /// Run as the genesis node, generating the network secret.
    #[arg(long = "genesis", env = "ENCLAVE_HOST_GENESIS", default_value = "false")]
    pub genesis: bool,

    /// P2P address advertised to peers and in secret transactions.
    #[arg(long = "host-address", env = "ENCLAVE_HOST_HOST_ADDRESS")]
    pub host_address: String,

    /// Private key for signing L1 transactions (hex-encoded).
    #[arg(long = "private-key", env = "ENCLAVE_HOST_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// First L1 block fed to a fresh enclave.
    #[arg(long = "l1-start-block", env = "ENCLAVE_HOST_L1_START_BLOCK", default_value = "0")]
    pub l1_start_block: u64,

    /// Polling interval for new L1 blocks (e.g., "2s", "500ms").
    #[arg(
        long = "l1-poll-interval",
        env = "ENCLAVE_HOST_L1_POLL_INTERVAL",
        default_value = "2s",
        value_parser = parse_duration
    )]
    pub l1_poll_interval: Duration,

    /// Delay between status queries while the enclave is unreachable.
    #[arg(
        long = "reconnect-interval",
        env = "ENCLAVE_HOST_RECONNECT_INTERVAL",
        default_value = "1s",
        value_parser = parse_duration
    )]
    pub reconnect_interval: Duration,

    /// Delay between guardian loop iterations while the enclave is live.
    #[arg(
        long = "monitoring-interval",
        env = "ENCLAVE_HOST_MONITORING_INTERVAL",
        default_value = "1s",
        value_parser = parse_duration
    )]
    pub monitoring_interval: Duration,

    /// Delay after a failed guardian action.
    #[arg(
        long = "retry-interval",
        env = "ENCLAVE_HOST_RETRY_INTERVAL",
        default_value = "1s",
        value_parser = parse_duration
    )]
    pub retry_interval: Duration,

    /// Total time a non-genesis node waits for its secret response.
    #[arg(
        long = "secret-response-timeout",
        env = "ENCLAVE_HOST_SECRET_RESPONSE_TIMEOUT",
        default_value = "60s",
        value_parser = parse_duration
    )]
    pub secret_response_timeout: Duration,

    /// Delay between L1 blocks scanned for a secret response.
    #[arg(
        long = "secret-response-interval",
        env = "ENCLAVE_HOST_SECRET_RESPONSE_INTERVAL",
        default_value = "500ms",
        value_parser = parse_duration
    )]
    pub secret_response_interval: Duration,

    /// Broadcast attempts per L1 transaction.
    #[arg(long = "l1-tx-tries", env = "ENCLAVE_HOST_L1_TX_TRIES", default_value = "7")]
    pub l1_tx_tries: u32,

    /// Delay before the first L1 broadcast retry, doubled on every retry.
    #[arg(
        long = "l1-tx-initial-delay",
        env = "ENCLAVE_HOST_L1_TX_INITIAL_DELAY",
        default_value = "1s",
        value_parser = parse_duration
    )]
    pub l1_tx_initial_delay: Duration,

    /// Total time to wait for an L1 transaction receipt.
    #[arg(
        long = "l1-receipt-timeout",
        env = "ENCLAVE_HOST_L1_RECEIPT_TIMEOUT",
        default_value = "100s",
        value_parser = parse_duration
    )]
    pub l1_receipt_timeout: Duration,

    /// Interval between L1 receipt lookups.
    #[arg(
        long = "l1-receipt-interval",
        env = "ENCLAVE_HOST_L1_RECEIPT_INTERVAL",
        default_value = "10s",
        value_parser = parse_duration
    )]
    pub l1_receipt_interval: Duration,

    /// Maximum number of L1 blocks walked back when resolving a reorg.
    #[arg(
        long = "max-l1-reorg-depth",
        env = "ENCLAVE_HOST_MAX_L1_REORG_DEPTH",
        default_value = "256"
    )]
    pub max_l1_reorg_depth: u64,

    /// Maximum number of batches walked back when resolving an L2 fork.
    #[arg(
        long = "max-batch-walk-back",
        env = "ENCLAVE_HOST_MAX_BATCH_WALK_BACK",
        default_value = "1024"
    )]
    pub max_batch_walk_back: u64,

    /// Maximum number of batches returned to a peer per request.
    #[arg(
        long = "max-batches-per-response",
        env = "ENCLAVE_HOST_MAX_BATCHES_PER_RESPONSE",
        default_value = "100"
    )]
    pub max_batches_per_response: usize,

    /// RPC request timeout (e.g., "30s", "1m").
    #[arg(
        long = "rpc-timeout",
        env = "ENCLAVE_HOST_RPC_TIMEOUT",
        default_value = "30s",
        value_parser = parse_duration
    )]
    pub rpc_timeout: Duration,

    /// Maximum number of retry attempts for L1 RPC reads.
    #[arg(long = "rpc-max-retries", env = "ENCLAVE_HOST_RPC_MAX_RETRIES", default_value = "5")]
    pub rpc_max_retries: u32,

    /// Initial delay for exponential backoff (e.g., "100ms", "1s").
    #[arg(
        long = "rpc-retry-initial-delay",
        env = "ENCLAVE_HOST_RPC_RETRY_INITIAL_DELAY",
        default_value = "100ms",
        value_parser = parse_duration
    )]
    pub rpc_retry_initial_delay: Duration,

    /// Maximum delay between retry attempts (e.g., "10s", "1m").
    #[arg(
        long = "rpc-retry-max-delay",
        env = "ENCLAVE_HOST_RPC_RETRY_MAX_DELAY",
        default_value = "10s",
        value_parser = parse_duration
    )]
    pub rpc_retry_max_delay: Duration,
}

/// Stdout log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum StdoutFormat {
    /// Timestamp, level, target and spans.
    #[default]
    Full,
    /// Minimal metadata.
    Compact,
    /// One JSON object per line.
    Json,
}

impl From<StdoutFormat> for LogFormat {
    fn from(format: StdoutFormat) -> Self {
        match format {
            StdoutFormat::Full => Self::Full,
            StdoutFormat::Compact => Self::Compact,
            StdoutFormat::Json => Self::Json,
        }
    }
}

/// Log-related CLI arguments.
///
/// Verbosity levels: 1=ERROR, 2=WARN, 3=INFO (default), 4=DEBUG, 5=TRACE.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Logging")]
pub(crate) struct LogArgs {
    /// Increase logging verbosity (1=ERROR, 2=WARN, 3=INFO, 4=DEBUG, 5=TRACE).
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        default_value = "3",
        env = "ENCLAVE_HOST_LOG_VERBOSITY",
        global = true
    )]
    pub level: u8,

    /// Suppress stdout logging.
    #[arg(long = "logs.stdout.quiet", alias = "quiet", short = 'q', global = true)]
    pub stdout_quiet: bool,

    /// Stdout log format.
    #[arg(
        long = "logs.stdout.format",
        default_value = "full",
        env = "ENCLAVE_HOST_LOG_FORMAT",
        global = true
    )]
    pub stdout_format: StdoutFormat,
}

impl From<LogArgs> for LogConfig {
    fn from(args: LogArgs) -> Self {
        let stdout_logs = if args.stdout_quiet {
            None
        } else {
            Some(StdoutLogConfig { format: args.stdout_format.into() })
        };
        Self { global_level: verbosity_to_level_filter(args.level), stdout_logs }
    }
}

/// Metrics-related CLI arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Metrics")]
pub(crate) struct MetricsArgs {
    /// Enable the Prometheus metrics exporter.
    #[arg(
        id = "metrics_enabled",
        long = "metrics.enabled",
        env = "ENCLAVE_HOST_METRICS_ENABLED",
        default_value = "false"
    )]
    pub enabled: bool,

    /// Metrics server bind address.
    #[arg(
        id = "metrics_addr",
        long = "metrics.addr",
        env = "ENCLAVE_HOST_METRICS_ADDR",
        default_value = "0.0.0.0"
    )]
    pub addr: IpAddr,

    /// Metrics server port.
    #[arg(
        id = "metrics_port",
        long = "metrics.port",
        env = "ENCLAVE_HOST_METRICS_PORT",
        default_value = "7300"
    )]
    pub port: u16,
}

impl From<MetricsArgs> for MetricsConfig {
    fn from(args: MetricsArgs) -> Self {
        Self { enabled: args.enabled, addr: args.addr, port: args.port }
    }
}

/// Health server configuration arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Health Server")]
pub(crate) struct HealthArgs {
    /// Health server bind address.
    #[arg(
        id = "health_addr",
        long = "health.addr",
        env = "ENCLAVE_HOST_HEALTH_ADDR",
        default_value = "0.0.0.0"
    )]
    pub addr: IpAddr,

    /// Health server port.
    #[arg(
        id = "health_port",
        long = "health.port",
        env = "ENCLAVE_HOST_HEALTH_PORT",
        default_value = "8080"
    )]
    pub port: u16,
}

/// P2P configuration arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "P2P")]
pub(crate) struct P2pArgs {
    /// Bind address for inbound peer messages.
    #[arg(
        id = "p2p_addr",
        long = "p2p.addr",
        env = "ENCLAVE_HOST_P2P_ADDR",
        default_value = "0.0.0.0"
    )]
    pub addr: IpAddr,

    /// Bind port for inbound peer messages.
    #[arg(
        id = "p2p_port",
        long = "p2p.port",
        env = "ENCLAVE_HOST_P2P_PORT",
        default_value = "10000"
    )]
    pub port: u16,

    /// Base URL of the sequencer's P2P endpoint. Unset on the sequencer itself.
    #[arg(
        id = "p2p_sequencer_url",
        long = "p2p.sequencer-url",
        env = "ENCLAVE_HOST_P2P_SEQUENCER_URL",
        value_parser = parse_url
    )]
    pub sequencer_url: Option<Url>,
}

impl Cli {
    /// Run the enclave host.
    pub(crate) async fn run(self) -> eyre::Result<()> {
        let config = HostConfig::try_from(self)?;
        enclave_host::run(config).await
    }
}

impl TryFrom<Cli> for HostConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let host = cli.host;

        validate_url(&host.enclave_rpc, "enclave-rpc")?;
        validate_url(&host.l1_eth_rpc, "l1-eth-rpc")?;
        if let Some(url) = &cli.p2p.sequencer_url {
            validate_url(url, "p2p.sequencer-url")?;
        }

        validate_non_zero(host.l1_poll_interval, "l1-poll-interval")?;
        validate_non_zero(host.reconnect_interval, "reconnect-interval")?;
        validate_non_zero(host.monitoring_interval, "monitoring-interval")?;
        validate_non_zero(host.retry_interval, "retry-interval")?;
        validate_non_zero(host.secret_response_interval, "secret-response-interval")?;
        validate_non_zero(host.l1_receipt_interval, "l1-receipt-interval")?;

        if host.l1_tx_tries == 0 {
            return Err(ConfigError::OutOfRange {
                field: "l1-tx-tries",
                constraint: "greater than 0",
                value: "0".to_string(),
            });
        }

        if cli.metrics.enabled && cli.metrics.port == 0 {
            return Err(ConfigError::Metrics(
                "metrics port must be non-zero when metrics are enabled".to_string(),
            ));
        }

        let signer = build_signer(&host.private_key)?;

        let retry = RetryConfig {
            max_attempts: host.rpc_max_retries,
            initial_delay: host.rpc_retry_initial_delay,
            max_delay: host.rpc_retry_max_delay,
        };

        Ok(Self {
            enclave_rpc: host.enclave_rpc,
            l1_eth_rpc: host.l1_eth_rpc,
            rpc_timeout: host.rpc_timeout,
            retry,
            signer,
            guardian: GuardianConfig {
                enclave_id: host.enclave_id,
                is_genesis: host.genesis,
                reconnect_interval: host.reconnect_interval,
                monitoring_interval: host.monitoring_interval,
                retry_interval: host.retry_interval,
                secret_response_timeout: host.secret_response_timeout,
                secret_response_interval: host.secret_response_interval,
            },
            l1: L1ServiceConfig {
                management_contract: host.management_contract,
                host_id: host.enclave_id,
                host_address: host.host_address.clone(),
                l1_start_block: host.l1_start_block,
                poll_interval: host.l1_poll_interval,
                max_reorg_depth: host.max_l1_reorg_depth,
                tx_tries: host.l1_tx_tries,
                tx_initial_delay: host.l1_tx_initial_delay,
                receipt_timeout: host.l1_receipt_timeout,
                receipt_interval: host.l1_receipt_interval,
            },
            l2: L2ServiceConfig {
                host_address: host.host_address,
                max_batch_walk_back: host.max_batch_walk_back,
                max_batches_per_response: host.max_batches_per_response,
            },
            p2p: P2pConfig {
                addr: cli.p2p.addr,
                port: cli.p2p.port,
                sequencer_url: cli.p2p.sequencer_url,
            },
            log: cli.logging.into(),
            metrics: cli.metrics.into(),
            health: HealthServerConfig { addr: cli.health.addr, port: cli.health.port },
        })
    }
}

/// Parse a duration string like "12s", "5m", "1h".
fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

/// Parse a URL string.
fn parse_url(s: &str) -> Result<Url, url::ParseError> {
    Url::parse(s)
}

/// Parse an Ethereum address from hex string.
fn parse_address(s: &str) -> Result<Address, alloy_primitives::hex::FromHexError> {
    s.parse()
}

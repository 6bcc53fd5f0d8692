//! Full host service lifecycle.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use eyre::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    AlloyL1Client, EnclaveClient, EnclaveGuardian, GenesisResponder, Host, HostConfig, HostStore,
    HttpP2p, L1Client, L1ClientConfig, L1Service, L2Service, LocalWallet, MemoryStore, P2p,
    RpcEnclaveClient,
};

/// Runs the host until SIGINT or SIGTERM.
///
/// Steps:
/// 1. Initialise logging and metrics
/// 2. Create the enclave, L1 and P2P clients
/// 3. Wire the L1 and L2 services and the guardian
/// 4. Start the health server
/// 5. Start the host
/// 6. Wait for a shutdown signal
/// 7. Graceful shutdown in reverse order
pub async fn run(config: HostConfig) -> Result<()> {
    config.log.init_tracing_subscriber()?;
    info!(version = env!("CARGO_PKG_VERSION"), "Enclave host starting");

    // ── 1. Cancellation, signals and metrics ─────────────────────────────
    let cancel = CancellationToken::new();
    crate::setup_signal_handler(cancel.clone());

    if config.metrics.enabled {
        let addr = SocketAddr::new(config.metrics.addr, config.metrics.port);
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("failed to install Prometheus recorder");
        info!(%addr, "Metrics server started");
    }
    crate::metrics::record_startup_metrics(env!("CARGO_PKG_VERSION"));

    // ── 2. Clients ───────────────────────────────────────────────────────
    let enclave: Arc<dyn EnclaveClient> =
        Arc::new(RpcEnclaveClient::new(config.enclave_rpc.as_str(), config.rpc_timeout)?);
    info!(endpoint = %config.enclave_rpc, "Enclave client initialized");

    let l1_config = L1ClientConfig::new(config.l1_eth_rpc.clone())
        .with_timeout(config.rpc_timeout)
        .with_retry_config(config.retry.clone());
    let l1_client: Arc<dyn L1Client> = Arc::new(AlloyL1Client::new(l1_config)?);
    info!(endpoint = %config.l1_eth_rpc, "L1 client initialized");

    let wallet = Arc::new(LocalWallet::new(config.signer.clone()));
    info!(address = %config.signer.address(), "Wallet initialized");

    let p2p_addr = SocketAddr::new(config.p2p.addr, config.p2p.port);
    let p2p: Arc<dyn P2p> =
        Arc::new(HttpP2p::new(p2p_addr, config.p2p.sequencer_url.clone(), config.rpc_timeout)?);

    // ── 3. Services ──────────────────────────────────────────────────────
    let store: Arc<dyn HostStore> = Arc::new(MemoryStore::new());
    let l1 = Arc::new(L1Service::new(
        config.l1.clone(),
        l1_client,
        wallet,
        Arc::new(GenesisResponder::new(config.guardian.is_genesis)),
    ));
    let l2 = Arc::new(L2Service::new(config.l2.clone(), Arc::clone(&store), p2p));
    let guardian = Arc::new(EnclaveGuardian::new(
        config.guardian.clone(),
        enclave,
        Arc::clone(&l1),
        Arc::clone(&l2),
        Arc::clone(&store),
    ));
    let host = Host::new(l1, l2, Arc::clone(&guardian), store);

    // ── 4. Health server ─────────────────────────────────────────────────
    let ready = Arc::new(AtomicBool::new(false));
    let health_handle: JoinHandle<Result<()>> = {
        let addr = SocketAddr::new(config.health.addr, config.health.port);
        tokio::spawn(crate::serve(addr, Arc::clone(&ready), guardian, cancel.clone()))
    };

    // ── 5. Start ─────────────────────────────────────────────────────────
    if let Err(e) = host.start().await {
        host.stop().await;
        cancel.cancel();
        let _ = health_handle.await;
        return Err(e.into());
    }
    ready.store(true, Ordering::SeqCst);
    info!(
        enclave_id = %config.guardian.enclave_id,
        genesis = config.guardian.is_genesis,
        p2p = %p2p_addr,
        "Service is ready"
    );

    // ── 6. Wait for shutdown signal ──────────────────────────────────────
    cancel.cancelled().await;
    info!("Stopping service...");

    // ── 7. Graceful shutdown (reverse initialisation order) ──────────────
    ready.store(false, Ordering::SeqCst);
    host.stop().await;

    match health_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Health server error during shutdown"),
        Err(e) => warn!(error = %e, "Health server task panicked"),
    }

    info!("Service stopped");
    Ok(())
}

//! Health and status HTTP server.
//!
//! Provides:
//! - `GET /healthz`: liveness probe (always 200 while the process is alive)
//! - `GET /readyz`: readiness probe (200 once the host has started)
//! - `GET /status`: JSON snapshot of the guardian's view of the enclave

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{EnclaveGuardian, EnclaveStateData, EnclaveStatus};

/// State shared across all HTTP handlers.
#[derive(Clone)]
struct ServerState {
    /// Set to `true` once the host has started.
    ready: Arc<AtomicBool>,
    guardian: Arc<EnclaveGuardian>,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Whether the host has started.
    pub ready: bool,
    /// Whether the enclave is live.
    pub healthy: bool,
    /// The guardian's view of the enclave.
    pub enclave: EnclaveStateData,
}

/// `GET /healthz`: liveness probe.
async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// `GET /readyz`: readiness probe.
async fn readiness(State(state): State<ServerState>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn status(State(state): State<ServerState>) -> Json<StatusResponse> {
    let enclave = state.guardian.state().snapshot();
    Json(StatusResponse {
        ready: state.ready.load(Ordering::Relaxed),
        healthy: enclave.status == EnclaveStatus::Live,
        enclave,
    })
}

fn router(ready: Arc<AtomicBool>, guardian: Arc<EnclaveGuardian>) -> Router {
    Router::new()
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/status", get(status))
        .with_state(ServerState { ready, guardian })
}

/// Starts the health HTTP server.
///
/// The server binds to `addr` and runs until `cancel` is triggered.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to `addr`.
pub async fn serve(
    addr: SocketAddr,
    ready: Arc<AtomicBool>,
    guardian: Arc<EnclaveGuardian>,
    cancel: CancellationToken,
) -> eyre::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Health server started");

    axum::serve(listener, router(ready, guardian))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("Health server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::GuardianHarness;

    /// Starts the health server on an ephemeral port and returns its address.
    async fn start_test_server(
        ready: Arc<AtomicBool>,
        guardian: Arc<EnclaveGuardian>,
    ) -> (SocketAddr, CancellationToken) {
        let cancel = CancellationToken::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = router(ready, guardian);
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .unwrap();
        });

        (addr, cancel)
    }

    #[tokio::test]
    async fn test_liveness_always_ok() {
        let harness = GuardianHarness::builder().build();
        let ready = Arc::new(AtomicBool::new(false));
        let (addr, cancel) = start_test_server(ready, harness.guardian).await;

        let resp = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
        assert_eq!(resp.status(), 200);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_readiness_transitions() {
        let harness = GuardianHarness::builder().build();
        let ready = Arc::new(AtomicBool::new(false));
        let (addr, cancel) = start_test_server(Arc::clone(&ready), harness.guardian).await;

        let resp = reqwest::get(format!("http://{addr}/readyz")).await.unwrap();
        assert_eq!(resp.status(), 503);

        ready.store(true, Ordering::SeqCst);
        let resp = reqwest::get(format!("http://{addr}/readyz")).await.unwrap();
        assert_eq!(resp.status(), 200);

        ready.store(false, Ordering::SeqCst);
        let resp = reqwest::get(format!("http://{addr}/readyz")).await.unwrap();
        assert_eq!(resp.status(), 503);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_status_reports_enclave_state() {
        let harness = GuardianHarness::builder().build();
        let ready = Arc::new(AtomicBool::new(true));
        let (addr, cancel) = start_test_server(ready, Arc::clone(&harness.guardian)).await;

        let body: serde_json::Value =
            reqwest::get(format!("http://{addr}/status")).await.unwrap().json().await.unwrap();
        assert_eq!(body["ready"], true);
        assert_eq!(body["healthy"], false);
        assert_eq!(body["enclave"]["status"], "disconnected");

        harness.guardian.check_enclave_status().await;
        let body: serde_json::Value =
            reqwest::get(format!("http://{addr}/status")).await.unwrap().json().await.unwrap();
        assert_eq!(body["healthy"], true);
        assert_eq!(body["enclave"]["status"], "live");
        assert_eq!(body["enclave"]["enclaveStatusCode"], "running");

        cancel.cancel();
    }
}

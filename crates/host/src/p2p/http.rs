//! HTTP transport: an axum listener for inbound messages and reqwest for outbound ones.
//!
//! Routes, each taking the raw message bytes as the request body:
//! - `POST /p2p/batches`: RLP-encoded `BatchMsg`
//! - `POST /p2p/tx`: encrypted transaction
//! - `POST /p2p/batch-request`: RLP-encoded `BatchRequest`

use std::{net::SocketAddr, sync::Arc, time::Duration};

use alloy_primitives::Bytes;
use async_trait::async_trait;
use axum::{Router, extract::State, http::StatusCode, routing::post};
use parking_lot::Mutex;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use super::{P2p, P2pError, P2pHandler, P2pResult};
use crate::BatchRequest;

const BATCHES_PATH: &str = "/p2p/batches";
const TX_PATH: &str = "/p2p/tx";
const BATCH_REQUEST_PATH: &str = "/p2p/batch-request";

async fn batches(
    State(handler): State<Arc<dyn P2pHandler>>,
    body: axum::body::Bytes,
) -> StatusCode {
    handler.receive_batches(Bytes::from(body)).await;
    StatusCode::ACCEPTED
}

async fn tx(State(handler): State<Arc<dyn P2pHandler>>, body: axum::body::Bytes) -> StatusCode {
    handler.receive_tx(Bytes::from(body)).await;
    StatusCode::ACCEPTED
}

async fn batch_request(
    State(handler): State<Arc<dyn P2pHandler>>,
    body: axum::body::Bytes,
) -> StatusCode {
    handler.receive_batch_request(Bytes::from(body)).await;
    StatusCode::ACCEPTED
}

fn router(handler: Arc<dyn P2pHandler>) -> Router {
    Router::new()
        .route(BATCHES_PATH, post(batches))
        .route(TX_PATH, post(tx))
        .route(BATCH_REQUEST_PATH, post(batch_request))
        .with_state(handler)
}

/// P2P transport over plain HTTP.
#[derive(Debug)]
pub struct HttpP2p {
    bind: SocketAddr,
    sequencer_url: Option<Url>,
    client: reqwest::Client,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HttpP2p {
    /// Creates a transport listening on `bind` once started.
    ///
    /// `sequencer_url` is where batch requests go; `None` on the sequencer itself.
    pub fn new(
        bind: SocketAddr,
        sequencer_url: Option<Url>,
        timeout: Duration,
    ) -> P2pResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| P2pError::Bind(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            bind,
            sequencer_url,
            client,
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
            handle: Mutex::new(None),
        })
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    async fn post(&self, url: &str, body: Bytes) -> P2pResult<()> {
        let send_error = |reason: String| P2pError::Send { to: url.to_string(), reason };
        self.client
            .post(url)
            .body(body.0)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| send_error(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl P2p for HttpP2p {
    async fn start_listening(&self, handler: Arc<dyn P2pHandler>) -> P2pResult<()> {
        let listener =
            TcpListener::bind(self.bind).await.map_err(|e| P2pError::Bind(e.to_string()))?;
        let addr = listener.local_addr().map_err(|e| P2pError::Bind(e.to_string()))?;
        *self.local_addr.lock() = Some(addr);

        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router(handler))
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await
            {
                warn!(error = %e, "P2P listener failed");
            }
        });
        *self.handle.lock() = Some(handle);

        info!(%addr, "P2P listener started");
        Ok(())
    }

    async fn stop_listening(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
            info!("P2P listener stopped");
        }
    }

    async fn send_batches(&self, to: &str, encoded: Bytes) -> P2pResult<()> {
        let url = format!("{}{BATCHES_PATH}", to.trim_end_matches('/'));
        self.post(&url, encoded).await
    }

    async fn request_batches(&self, request: &BatchRequest) -> P2pResult<()> {
        let sequencer = self.sequencer_url.as_ref().ok_or(P2pError::NoSequencer)?;
        let url = format!("{}{BATCH_REQUEST_PATH}", sequencer.as_str().trim_end_matches('/'));
        self.post(&url, request.encoded()).await
    }
}

//! # HTTP Server
//!
//! HTTP server for the deploy API, metrics, and Kubernetes probes.
//!
//! Provides endpoints:
//! - `POST /api/v1/deploy` - Walk the kustomization tree and reconcile every descriptor
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (returns 200 once templates and providers are loaded)
//!
//! TLS is terminated with rustls when a certificate and key are configured.

use crate::api::{DeployRequest, DeployResponse};
use crate::constants::MAX_REQUEST_BODY_BYTES;
use crate::controller::batch::Deployer;
use crate::observability::metrics;
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
    pub deployer: Deployer,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("is_ready", &self.is_ready.load(Ordering::Relaxed))
            .field("root", &self.deployer.root())
            .finish_non_exhaustive()
    }
}

/// Routes of the operator
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/v1/deploy", post(deploy_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES)),
        )
        .with_state(state)
}

/// Serve until the listener fails
///
/// `tls` carries the certificate and key PEM files; plain HTTP is served without it.
///
/// # Errors
///
/// Fails when the TLS files can not be loaded, the port can not be bound or serving stops with an error.
pub async fn start_server(
    port: u16,
    tls: Option<(&Path, &Path)>,
    state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    match tls {
        Some((cert_file, key_file)) => {
            let config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_file, key_file)
                .await
                .with_context(|| {
                    format!(
                        "Failed to load TLS certificate {} and key {}",
                        cert_file.display(),
                        key_file.display()
                    )
                })?;
            info!("HTTPS server listening on {}", addr);
            axum_server::bind_rustls(addr, config)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            warn!("No TLS certificate configured, serving plain HTTP");
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("HTTP server listening on {}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeployRequest>,
) -> Json<DeployResponse> {
    Json(state.deployer.deploy(&request).await)
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = metrics::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

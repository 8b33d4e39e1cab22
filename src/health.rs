// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP endpoints for liveness checks and Prometheus scraping.
//!
//! - `/healthz` - 200 while the process is serving
//! - `/metrics` - Prometheus text format from [`crate::metrics::gather_metrics`]

use crate::constants::{HEALTH_SERVER_PATH, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH};
use crate::metrics::gather_metrics;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tracing::{error, info};

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics() -> Response {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

/// Router serving the health and metrics endpoints.
pub fn router() -> Router {
    Router::new()
        .route(HEALTH_SERVER_PATH, get(healthz))
        .route(METRICS_SERVER_PATH, get(metrics))
}

/// Serve [`router`] on `0.0.0.0:<port>` until the process exits.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn serve(port: u16) -> Result<(), std::io::Error> {
    let address = format!("{METRICS_SERVER_BIND_ADDRESS}:{port}");
    let listener = TcpListener::bind(&address).await?;
    info!(address = %address, "metrics server listening");
    axum::serve(listener, router()).await
}

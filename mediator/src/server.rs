//! HTTP ingress.
//!
//! - `POST <registry route>`: run a stored query through the pipeline
//! - `GET /health`: liveness
//! - `GET /metrics`: Prometheus scrape text

use crate::config::MediatorConfig;
use crate::dispatcher::RegistryQueryDispatcher;
use crate::types::{FinishRequest, IncomingRequest};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use registry_mediator_runtime::metrics::MetricsServer;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Pipeline dispatcher
    pub dispatcher: RegistryQueryDispatcher,
    /// Installed metrics recorder, if any
    pub metrics: Arc<MetricsServer>,
}

/// Builds the router serving stored queries on `registry_route`
pub fn build_router(state: AppState, registry_route: &str) -> Router {
    Router::new()
        .route(registry_route, post(registry_stored_query))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_text))
        .with_state(state)
}

/// Binds the configured address and serves until Ctrl-C.
///
/// # Errors
///
/// Returns the I/O error if the address cannot be bound or serving fails.
pub async fn serve(config: &MediatorConfig, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.server.bind_address()).await?;
    tracing::info!(
        name = %config.name,
        address = %listener.local_addr()?,
        route = %config.registry_route,
        "Registry mediator listening"
    );

    axum::serve(listener, build_router(state, &config.registry_route))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn registry_stored_query(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: String,
) -> Response {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    let request = IncomingRequest {
        method: method.to_string(),
        body,
        headers,
    };

    match state.dispatcher.dispatch(request).await {
        Ok(response) => finish_response(response),
        Err(error) => {
            tracing::error!(%error, "Registry stored query pipeline failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        },
    }
}

fn finish_response(response: FinishRequest) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    if response.content_type.is_empty() {
        let mut relayed = (status, response.body).into_response();
        relayed.headers_mut().remove(header::CONTENT_TYPE);
        return relayed;
    }
    (
        status,
        [(header::CONTENT_TYPE, response.content_type)],
        response.body,
    )
        .into_response()
}

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Pipelines in flight
    pub in_flight: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        in_flight: state.dispatcher.in_flight(),
    })
}

async fn metrics_text(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Some(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

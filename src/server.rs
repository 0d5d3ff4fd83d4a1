//! Axum server setup, shared application state, and graceful shutdown.
//!
//! [`build_router`] mounts `/health` behind the full middleware stack:
//! request tracing, context stamping, body size limit, and request
//! timeout. [`stamp_routes`] applies the stamping middleware alone to
//! any other router. [`shutdown_signal`] resolves on SIGTERM / Ctrl+C.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::health::health_handler;
use crate::middleware::stamp_request_context;

pub struct AppState {
    pub start_time: Instant,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServerSettings {
    pub max_body: usize,
    pub timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            max_body: 1_048_576,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Span for one HTTP request. `request_id` and `user` start empty and are
/// filled in by the stamping middleware.
fn request_span(request: &Request) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = tracing::field::Empty,
        user = tracing::field::Empty,
    )
}

pub fn build_router(state: Arc<AppState>, settings: ServerSettings) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(axum::middleware::from_fn(stamp_request_context))
                .layer(RequestBodyLimitLayer::new(settings.max_body))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    settings.timeout,
                )),
        )
        .with_state(state)
}

/// Install the stamping middleware on every route of `router`, including
/// its fallback.
pub fn stamp_routes<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(axum::middleware::from_fn(stamp_request_context))
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

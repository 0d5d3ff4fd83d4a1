//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload with the server version,
//! uptime, and the correlation id resolved for the health request itself.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub request_id: String,
}

pub async fn health_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Json<HealthResponse> {
    tracing::debug!(request_id = %ctx.request_id, user = %ctx.user, "health check");
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        request_id: ctx.request_id,
    })
}

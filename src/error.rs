//! Unified error types for mcpo-guard.
//!
//! Defines [`McpoError`] (the host binary's error enum) and [`HttpError`],
//! the framework-style HTTP exception that handlers and middleware raise
//! when a failure must reach the client with a specific status, detail
//! payload, and headers. Both use `thiserror` for `Display` and `Error`
//! derives.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Client-facing guidance returned whenever an upstream MCP connection
/// closes mid-request.
pub const MCP_CLOSED_MESSAGE: &str = "MCP server connection closed. \
     Please retry your request after a short delay. \
     If the problem persists, contact support.";

/// Seconds a client should wait before retrying after [`MCP_CLOSED_MESSAGE`].
pub const MCP_CLOSED_RETRY_AFTER_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum McpoError {
    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(StatusCode),
}

/// An error that renders as an HTTP response: a status code, a JSON
/// `detail` payload, and any extra response headers.
///
/// The body is always `{"detail": <detail>}`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{status}: {detail}")]
pub struct HttpError {
    pub status: StatusCode,
    pub detail: Value,
    pub headers: HeaderMap,
}

impl HttpError {
    #[must_use]
    pub fn new(status: StatusCode, detail: Value) -> Self {
        Self {
            status,
            detail,
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: axum::http::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// The standardized `503` raised when an MCP connection closes while a
    /// request is being served. Identical for every endpoint.
    #[must_use]
    pub fn mcp_connection_closed() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "message": MCP_CLOSED_MESSAGE }),
        )
        .with_header(RETRY_AFTER, HeaderValue::from(MCP_CLOSED_RETRY_AFTER_SECS))
    }

    /// The `detail.message` field, when the detail payload carries one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.detail.get("message").and_then(Value::as_str)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(json!({ "detail": self.detail }))).into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}

//! Request context stamping.
//!
//! [`stamp_request_context`] is an `axum::middleware::from_fn` middleware
//! that resolves a [`RequestContext`] from the inbound headers, makes it
//! available to every later stage of the same request, and echoes the
//! correlation id back to the caller as `X-Request-ID`.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

use crate::context::{RequestContext, REQUEST_ID_HEADER};

pub async fn stamp_request_context(mut request: Request, next: Next) -> Response {
    let ctx = RequestContext::from_headers(request.headers());

    // Fields are declared empty by the router's TraceLayer span.
    let span = tracing::Span::current();
    span.record("request_id", ctx.request_id.as_str());
    span.record("user", ctx.user.as_str());

    // An inbound id is echoed byte for byte; only generated ids are encoded.
    let inbound = request.headers().get(REQUEST_ID_HEADER).cloned();
    let request_id = ctx.request_id.clone();
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;

    // Set-if-absent: a value placed further down the pipeline wins.
    if !response.headers().contains_key(REQUEST_ID_HEADER) {
        match inbound.map_or_else(|| HeaderValue::from_str(&request_id), Ok) {
            Ok(value) => {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Err(e) => {
                tracing::debug!(error = %e, "request id not representable as a header value");
            }
        }
    }

    response
}

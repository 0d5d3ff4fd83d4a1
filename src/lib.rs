//! mcpo-guard: request context and closed-connection handling for HTTP
//! services that front MCP tool servers.
//!
//! Every request gets a correlation id and an actor identity; every
//! response echoes the correlation id. Handlers that lose their MCP
//! connection mid-request answer with one uniform, retryable `503`.
//!
//! # Architecture
//!
//! - [`context`] -- [`RequestContext`](context::RequestContext), resolved
//!   from `X-Request-ID` / `X-User` and stored in request extensions.
//! - [`middleware`] -- the context-stamping middleware and the
//!   closed-resource guard / route layer.
//! - [`error`] -- `thiserror` error types, including the [`HttpError`](error::HttpError)
//!   response error and the standardized MCP `503`.
//! - [`server`] -- Axum router assembly, shared state, and graceful shutdown.
//! - [`health`] -- `GET /health` endpoint handler.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`cli`] / [`cmd`] -- Command-line parsing and subcommand execution for
//!   the `mcpo-guard` binary.
//!
//! # Example
//!
//! ```no_run
//! use axum::routing::get;
//! use axum::Router;
//! use mcpo_guard::context::RequestContext;
//! use mcpo_guard::middleware::{ClosedResourceError, ClosedResourceGuard};
//!
//! async fn list_tools(ctx: RequestContext) -> Result<String, ClosedResourceError> {
//!     Ok(format!("tools for {}", ctx.user))
//! }
//!
//! let app: Router = mcpo_guard::server::stamp_routes(Router::new().route(
//!     "/tools",
//!     get(list_tools).layer(ClosedResourceGuard::new("list_tools").layer()),
//! ));
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod context;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod server;

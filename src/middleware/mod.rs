//! Request-scoped middleware.
//!
//! - [`stamp`] attaches a [`RequestContext`](crate::context::RequestContext)
//!   to every request and echoes its correlation id as `X-Request-ID`.
//! - [`closed_resource`] turns closed MCP connections into a uniform,
//!   retryable `503`.

pub mod closed_resource;
pub mod stamp;

pub use closed_resource::{
    ClosedResourceError, ClosedResourceGuard, ClosedResourceLayer, ClosedResourceSignal, Guarded,
    TracingWarn, WarnSink,
};
pub use stamp::stamp_request_context;

//! Translation of closed MCP connections into a uniform `503`.
//!
//! When an upstream MCP connection closes while a request is being
//! served, every endpoint must answer the same way: `503 Service
//! Unavailable`, `Retry-After: 10`, and a fixed retry message (see
//! [`HttpError::mcp_connection_closed`]). Two entry points share that
//! behaviour:
//!
//! - [`ClosedResourceGuard::invoke`] wraps a single async operation and
//!   returns [`Guarded::Unavailable`] when it fails with the closed-resource
//!   signal. Any other failure comes back untouched as
//!   [`Guarded::Passthrough`].
//! - [`ClosedResourceLayer`] wraps a route at registration time. Handlers
//!   return [`ClosedResourceError`], whose response carries a
//!   [`ClosedResourceMarker`] extension; the layer swaps such responses
//!   for the standardized one.
//!
//! Both log one warning per translation through a [`WarnSink`], naming the
//! endpoint and the request's correlation id and user.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use crate::context::RequestContext;
use crate::error::HttpError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An upstream MCP connection was closed while it was in use.
#[derive(Debug, thiserror::Error)]
#[error("MCP connection closed")]
pub struct ClosedResourceError {
    #[source]
    source: Option<BoxError>,
}

impl ClosedResourceError {
    #[must_use]
    pub const fn new() -> Self {
        Self { source: None }
    }

    pub fn with_source(source: impl Into<BoxError>) -> Self {
        Self {
            source: Some(source.into()),
        }
    }
}

impl Default for ClosedResourceError {
    fn default() -> Self {
        Self::new()
    }
}

/// Response extension tagging a response produced from a
/// [`ClosedResourceError`].
#[derive(Debug, Clone, Copy)]
pub struct ClosedResourceMarker;

impl IntoResponse for ClosedResourceError {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(ClosedResourceMarker);
        response
    }
}

/// Reports whether an error is the closed-resource signal.
pub trait ClosedResourceSignal {
    fn is_closed_resource(&self) -> bool;
}

impl ClosedResourceSignal for ClosedResourceError {
    fn is_closed_resource(&self) -> bool {
        true
    }
}

// Boxed errors match when a ClosedResourceError appears anywhere in the
// source chain.
impl ClosedResourceSignal for BoxError {
    fn is_closed_resource(&self) -> bool {
        let root: &(dyn std::error::Error + 'static) = &**self;
        let mut current = Some(root);
        while let Some(err) = current {
            if err.is::<ClosedResourceError>() {
                return true;
            }
            current = err.source();
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedResourceEvent<'a> {
    pub endpoint: &'a str,
    pub request_id: &'a str,
    pub user: &'a str,
}

impl fmt::Display for ClosedResourceEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MCP connection closed while calling {} (request_id={}, user={})",
            self.endpoint, self.request_id, self.user
        )
    }
}

/// Destination for closed-resource warnings.
pub trait WarnSink: Send + Sync {
    fn warn(&self, event: &ClosedResourceEvent<'_>);
}

impl<W: WarnSink + ?Sized> WarnSink for Arc<W> {
    fn warn(&self, event: &ClosedResourceEvent<'_>) {
        (**self).warn(event);
    }
}

/// Default sink: a `tracing` warning with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingWarn;

impl WarnSink for TracingWarn {
    fn warn(&self, event: &ClosedResourceEvent<'_>) {
        tracing::warn!(
            endpoint = %event.endpoint,
            request_id = %event.request_id,
            user = %event.user,
            "{event}"
        );
    }
}

#[derive(Debug, Clone)]
pub struct ClosedResourceGuard<W = TracingWarn> {
    endpoint_name: Arc<str>,
    sink: W,
}

impl ClosedResourceGuard {
    #[must_use]
    pub fn new(endpoint_name: impl Into<Arc<str>>) -> Self {
        Self::with_sink(endpoint_name, TracingWarn)
    }
}

impl<W: WarnSink> ClosedResourceGuard<W> {
    #[must_use]
    pub fn with_sink(endpoint_name: impl Into<Arc<str>>, sink: W) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            sink,
        }
    }

    #[must_use]
    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    /// Run `operation`, translating a closed-resource failure into the
    /// standardized `503`.
    ///
    /// `ctx` is the current request's context, if there is one; without it
    /// the warning reports `request_id=unknown, user=anonymous`.
    pub async fn invoke<T, E, Fut>(
        &self,
        ctx: Option<&RequestContext>,
        operation: Fut,
    ) -> Result<T, Guarded<E>>
    where
        Fut: Future<Output = Result<T, E>>,
        E: ClosedResourceSignal,
    {
        match operation.await {
            Ok(value) => Ok(value),
            Err(e) if e.is_closed_resource() => Err(Guarded::Unavailable(self.translate(ctx))),
            Err(e) => Err(Guarded::Passthrough(e)),
        }
    }

    /// Log the closed connection and build the response error.
    pub fn translate(&self, ctx: Option<&RequestContext>) -> HttpError {
        let (request_id, user) = RequestContext::log_fields(ctx);
        self.sink.warn(&ClosedResourceEvent {
            endpoint: &self.endpoint_name,
            request_id,
            user,
        });
        HttpError::mcp_connection_closed()
    }

    /// A route layer applying this guard to every response of the route.
    #[must_use]
    pub fn layer(self) -> ClosedResourceLayer<W> {
        ClosedResourceLayer {
            guard: Arc::new(self),
        }
    }
}

/// Outcome of a failed [`ClosedResourceGuard::invoke`].
#[derive(Debug)]
pub enum Guarded<E> {
    /// The operation lost its MCP connection; respond with this error.
    Unavailable(HttpError),
    /// Any other failure, exactly as the operation returned it.
    Passthrough(E),
}

impl<E> Guarded<E> {
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// The untouched inner error, if this was not a closed-resource failure.
    pub fn into_passthrough(self) -> Option<E> {
        match self {
            Self::Unavailable(_) => None,
            Self::Passthrough(e) => Some(e),
        }
    }
}

impl<E: fmt::Display> fmt::Display for Guarded<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(e) => e.fmt(f),
            Self::Passthrough(e) => e.fmt(f),
        }
    }
}

impl<E> std::error::Error for Guarded<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unavailable(e) => e.source(),
            Self::Passthrough(e) => e.source(),
        }
    }
}

impl<E: IntoResponse> IntoResponse for Guarded<E> {
    fn into_response(self) -> Response {
        match self {
            Self::Unavailable(e) => e.into_response(),
            Self::Passthrough(e) => e.into_response(),
        }
    }
}

#[derive(Debug)]
pub struct ClosedResourceLayer<W = TracingWarn> {
    guard: Arc<ClosedResourceGuard<W>>,
}

impl<W> Clone for ClosedResourceLayer<W> {
    fn clone(&self) -> Self {
        Self {
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<S, W> Layer<S> for ClosedResourceLayer<W> {
    type Service = ClosedResourceService<S, W>;

    fn layer(&self, inner: S) -> Self::Service {
        ClosedResourceService {
            inner,
            guard: Arc::clone(&self.guard),
        }
    }
}

#[derive(Debug)]
pub struct ClosedResourceService<S, W = TracingWarn> {
    inner: S,
    guard: Arc<ClosedResourceGuard<W>>,
}

impl<S: Clone, W> Clone for ClosedResourceService<S, W> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<S, W> Service<Request> for ClosedResourceService<S, W>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
    W: WarnSink + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let ctx = request.extensions().get::<RequestContext>().cloned();
        // Drive the instance that was polled ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let guard = Arc::clone(&self.guard);

        Box::pin(async move {
            let response = inner.call(request).await?;
            if response.extensions().get::<ClosedResourceMarker>().is_some() {
                Ok(guard.translate(ctx.as_ref()).into_response())
            } else {
                Ok(response)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::http::header::RETRY_AFTER;

    use super::*;
    use crate::error::MCP_CLOSED_MESSAGE;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl WarnSink for Recorder {
        fn warn(&self, event: &ClosedResourceEvent<'_>) {
            self.0.lock().unwrap().push(event.to_string());
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Unrelated;

    impl ClosedResourceSignal for Unrelated {
        fn is_closed_resource(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn success_passes_through() {
        let guard = ClosedResourceGuard::with_sink("list_tools", Recorder::default());
        let result = guard
            .invoke(None, async { Ok::<_, ClosedResourceError>(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert!(guard.sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_resource_becomes_503() {
        let guard = ClosedResourceGuard::with_sink("call_tool", Recorder::default());
        let ctx = RequestContext::new("req-9", "carol");
        let err = guard
            .invoke(Some(&ctx), async {
                Err::<(), _>(ClosedResourceError::new())
            })
            .await
            .unwrap_err();

        let Guarded::Unavailable(http) = err else {
            panic!("expected translation");
        };
        assert_eq!(http.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(http.headers.get(RETRY_AFTER).unwrap(), "10");
        assert_eq!(http.message(), Some(MCP_CLOSED_MESSAGE));
        assert_eq!(
            *guard.sink.0.lock().unwrap(),
            vec!["MCP connection closed while calling call_tool (request_id=req-9, user=carol)"]
        );
    }

    #[tokio::test]
    async fn unrelated_error_is_untouched() {
        let guard = ClosedResourceGuard::with_sink("call_tool", Recorder::default());
        let err = guard
            .invoke(None, async { Err::<(), _>(Unrelated) })
            .await
            .unwrap_err();
        assert!(!err.is_unavailable());
        assert_eq!(err.to_string(), "boom");
        assert!(err.into_passthrough().is_some());
        assert!(guard.sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_context_uses_placeholders() {
        let guard = ClosedResourceGuard::with_sink("get_prompt", Recorder::default());
        let _ = guard
            .invoke(None, async { Err::<(), _>(ClosedResourceError::new()) })
            .await;
        assert_eq!(
            *guard.sink.0.lock().unwrap(),
            vec!["MCP connection closed while calling get_prompt (request_id=unknown, user=anonymous)"]
        );
    }

    #[test]
    fn boxed_error_matches_through_source_chain() {
        #[derive(Debug, thiserror::Error)]
        #[error("session failed")]
        struct Session(#[source] ClosedResourceError);

        let direct: BoxError = Box::new(ClosedResourceError::new());
        let nested: BoxError = Box::new(Session(ClosedResourceError::new()));
        let other: BoxError = "timeout".into();

        assert!(direct.is_closed_resource());
        assert!(nested.is_closed_resource());
        assert!(!other.is_closed_resource());
    }

    #[test]
    fn closed_resource_error_keeps_source() {
        let err = ClosedResourceError::with_source("stream reset");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "stream reset");
    }

    #[test]
    fn unguarded_closed_resource_is_marked_500() {
        let response = ClosedResourceError::new().into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response
            .extensions()
            .get::<ClosedResourceMarker>()
            .is_some());
    }
}

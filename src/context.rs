//! Per-request correlation context.
//!
//! [`RequestContext`] holds the correlation id and actor identity of one
//! in-flight request. The stamping middleware builds it from the inbound
//! headers and stores it in the request's extensions, where handlers read
//! it back with the [`RequestContext`] extractor.

use std::borrow::Cow;
use std::convert::Infallible;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, StatusCode};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub const USER_HEADER: HeaderName = HeaderName::from_static("x-user");

/// Actor identity used when no `X-User` header was supplied.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Request id reported when a failure is handled outside any stamped request.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub user: String,
}

impl RequestContext {
    #[must_use]
    pub fn new(request_id: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            user: user.into(),
        }
    }

    /// Resolve the context from inbound headers.
    ///
    /// `X-Request-ID` is reused verbatim when present, otherwise a random
    /// UUID v4 is generated. `X-User` falls back to [`ANONYMOUS_USER`].
    /// Bytes outside visible ASCII are decoded as latin-1.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = header_str(headers, &REQUEST_ID_HEADER)
            .map_or_else(generate_request_id, Cow::into_owned);
        let user = header_str(headers, &USER_HEADER)
            .map_or_else(|| ANONYMOUS_USER.to_string(), Cow::into_owned);
        Self::new(request_id, user)
    }

    /// Request id and user for log lines, substituting placeholders when no
    /// context is available.
    #[must_use]
    pub fn log_fields(ctx: Option<&Self>) -> (&str, &str) {
        ctx.map_or((UNKNOWN_REQUEST_ID, ANONYMOUS_USER), |c| {
            (c.request_id.as_str(), c.user.as_str())
        })
    }
}

#[must_use]
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<Cow<'a, str>> {
    let value = headers.get(name)?;
    Some(value.to_str().map_or_else(
        |_| Cow::Owned(value.as_bytes().iter().map(|&b| char::from(b)).collect()),
        Cow::Borrowed,
    ))
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "request context missing; is the stamping middleware installed?",
        ))
    }
}

impl<S> OptionalFromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn reuses_inbound_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert(&REQUEST_ID_HEADER, "abc123".parse().unwrap());
        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.request_id, "abc123");
    }

    #[test]
    fn generates_uuid_when_request_id_missing() {
        let ctx = RequestContext::from_headers(&HeaderMap::new());
        assert!(uuid::Uuid::parse_str(&ctx.request_id).is_ok());
    }

    #[test]
    fn user_defaults_to_anonymous() {
        let ctx = RequestContext::from_headers(&HeaderMap::new());
        assert_eq!(ctx.user, ANONYMOUS_USER);
    }

    #[test]
    fn reuses_inbound_user() {
        let mut headers = HeaderMap::new();
        headers.insert(&USER_HEADER, "alice".parse().unwrap());
        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.user, "alice");
    }

    #[test]
    fn empty_request_id_is_kept_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(&REQUEST_ID_HEADER, "".parse().unwrap());
        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.request_id, "");
    }

    #[test]
    fn obs_text_values_are_kept_as_latin1() {
        let mut headers = HeaderMap::new();
        headers.insert(
            &REQUEST_ID_HEADER,
            axum::http::HeaderValue::from_bytes(b"caf\xe9-42").unwrap(),
        );
        headers.insert(
            &USER_HEADER,
            axum::http::HeaderValue::from_bytes(b"j\xfcrgen").unwrap(),
        );
        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.request_id, "caf\u{e9}-42");
        assert_eq!(ctx.user, "j\u{fc}rgen");
    }

    #[test]
    fn generated_ids_do_not_collide() {
        let ids: HashSet<String> = (0..10_000)
            .map(|_| RequestContext::from_headers(&HeaderMap::new()).request_id)
            .collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn log_fields_fall_back_to_placeholders() {
        assert_eq!(RequestContext::log_fields(None), ("unknown", "anonymous"));
        let ctx = RequestContext::new("r-1", "bob");
        assert_eq!(RequestContext::log_fields(Some(&ctx)), ("r-1", "bob"));
    }
}

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, Extensions, HeaderMap, HeaderValue};
use std::convert::Infallible;
use std::fmt;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId as StampedRequestId, SetRequestIdLayer,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request correlation id.
///
/// Extracting it in a handler never fails: when no upstream layer stamped
/// the request a fresh id is generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0).ok()
    }

    /// Finds an id already attached to a request, in order: our own
    /// extension, the `tower-http` extension, the `X-Request-ID` header.
    pub fn lookup(extensions: &Extensions, headers: &HeaderMap) -> Option<Self> {
        if let Some(id) = extensions.get::<RequestId>() {
            return Some(id.clone());
        }

        extensions
            .get::<StampedRequestId>()
            .map(|id| id.header_value())
            .or_else(|| headers.get(REQUEST_ID_HEADER))
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| Self(value.to_string()))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::lookup(&parts.extensions, &parts.headers).unwrap_or_default())
    }
}

/// Stamps `X-Request-ID` on requests that arrive without one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Copies the request's `X-Request-ID` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

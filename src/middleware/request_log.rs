use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request, State},
    http::header::USER_AGENT,
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;

use super::request_id::{RequestId, REQUEST_ID_HEADER};
use crate::observability::{request_span, LatencyTimer};

/// Paths the request logger stays quiet about (probes, metrics scrapes).
#[derive(Debug, Clone, Default)]
pub struct SkipPaths(Arc<HashSet<String>>);

impl SkipPaths {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self(Arc::new(paths.into_iter().map(Into::into).collect()))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }
}

struct RequestLine {
    request_id: RequestId,
    method: String,
    path: String,
    query: String,
    client_ip: String,
    user_agent: String,
}

macro_rules! emit_request_line {
    ($level:ident, $line:expr, $status:expr, $duration_ms:expr, $body_size:expr, $message:literal) => {
        tracing::$level!(
            request_id = %$line.request_id,
            method = %$line.method,
            path = %$line.path,
            query = %$line.query,
            status = $status,
            duration_ms = $duration_ms,
            client_ip = %$line.client_ip,
            user_agent = %$line.user_agent,
            body_size = $body_size,
            $message
        )
    };
}

/// Stamps a correlation id on the request (reusing an existing one) and
/// logs one line per request once the response is produced.
///
/// 5xx responses are logged at error level, 4xx at warn, the rest at info.
pub async fn log_requests(mut request: Request, next: Next) -> Response {
    let request_id = match RequestId::lookup(request.extensions(), request.headers()) {
        Some(id) => id,
        None => {
            let id = RequestId::new();
            if let Some(value) = id.header_value() {
                request.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            id
        }
    };
    request.extensions_mut().insert(request_id.clone());

    let line = RequestLine {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().unwrap_or_default().to_string(),
        client_ip: client_ip(&request),
        user_agent: request
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        request_id,
    };

    let timer = LatencyTimer::new();
    let mut response = next
        .run(request)
        .instrument(request_span(line.request_id.as_str()))
        .await;

    if !response.headers().contains_key(REQUEST_ID_HEADER) {
        if let Some(value) = line.request_id.header_value() {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
    }

    let status = response.status().as_u16();
    let duration_ms = timer.elapsed_ms();
    let body_size = response.body().size_hint().exact().unwrap_or(0);

    if status >= 500 {
        emit_request_line!(error, line, status, duration_ms, body_size, "Server error");
    } else if status >= 400 {
        emit_request_line!(warn, line, status, duration_ms, body_size, "Client error");
    } else {
        emit_request_line!(info, line, status, duration_ms, body_size, "Request completed");
    }

    response
}

/// [`log_requests`] that passes [`SkipPaths`] straight through.
pub async fn log_requests_skipping(
    State(skip): State<SkipPaths>,
    request: Request,
    next: Next,
) -> Response {
    if skip.contains(request.uri().path()) {
        return next.run(request).await;
    }
    log_requests(request, next).await
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address.
pub fn client_ip(request: &Request) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_uses_connect_info() {
        let mut request = Request::builder().body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 20], 40000))));
        assert_eq!(client_ip(&request), "192.168.1.20");
    }

    #[test]
    fn test_client_ip_unknown() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&request), "unknown");
    }

    #[test]
    fn test_skip_paths() {
        let skip = SkipPaths::new(["/health", "/metrics"]);
        assert!(skip.contains("/health"));
        assert!(!skip.contains("/users"));
        assert!(!SkipPaths::default().contains("/health"));
    }
}

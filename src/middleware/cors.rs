use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{
    header::{
        ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
        ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
        ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY,
    },
    HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
};
use std::sync::Arc;

use crate::config::CorsSettings;

/// CORS policy applied by [`cors`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    /// `["*"]` (or empty) allows any origin.
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub allow_credentials: bool,
    /// Seconds a preflight answer may be cached.
    pub max_age: Option<u64>,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .map(String::from)
                .to_vec(),
            allowed_headers: [
                "Origin",
                "Content-Type",
                "Accept",
                "Authorization",
                "X-Request-ID",
                "X-Workspace-Id",
            ]
            .map(String::from)
            .to_vec(),
            exposed_headers: vec!["X-Request-ID".to_string()],
            allow_credentials: true,
            max_age: Some(86400),
        }
    }
}

impl CorsPolicy {
    /// Default policy restricted to a comma separated origin list; `*` or
    /// an empty string keeps it open.
    pub fn with_origins(origins: &str) -> Self {
        let mut policy = Self::default();
        let origins = origins.trim();
        if !origins.is_empty() && origins != "*" {
            policy.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect();
        }
        policy
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins
            .first()
            .map_or(true, |origin| origin == "*")
    }

    /// Value for `Access-Control-Allow-Origin`, or `None` when the origin is
    /// not allowed.
    pub fn resolve_origin(&self, origin: Option<&str>) -> Option<String> {
        let origin = origin.filter(|o| !o.is_empty());
        if self.allows_any_origin() {
            return Some(origin.unwrap_or("*").to_string());
        }
        origin
            .filter(|o| self.allowed_origins.iter().any(|allowed| allowed.as_str() == *o))
            .map(String::from)
    }

    fn apply(&self, headers: &mut HeaderMap, origin: Option<&str>, preflight: bool) {
        if let Some(allowed) = self
            .resolve_origin(origin)
            .and_then(|value| HeaderValue::from_str(&value).ok())
        {
            if allowed != "*" {
                headers.append(VARY, HeaderValue::from_static("Origin"));
            }
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
        }

        insert_joined(headers, ACCESS_CONTROL_ALLOW_METHODS, &self.allowed_methods);
        insert_joined(headers, ACCESS_CONTROL_ALLOW_HEADERS, &self.allowed_headers);
        insert_joined(headers, ACCESS_CONTROL_EXPOSE_HEADERS, &self.exposed_headers);

        if self.allow_credentials {
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }

        if preflight {
            if let Some(max_age) = self.max_age {
                headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age));
            }
        }
    }
}

impl From<&CorsSettings> for CorsPolicy {
    fn from(settings: &CorsSettings) -> Self {
        Self::with_origins(&settings.allowed_origins)
    }
}

fn insert_joined(headers: &mut HeaderMap, name: HeaderName, values: &[String]) {
    if values.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&values.join(", ")) {
        headers.insert(name, value);
    }
}

/// Adds CORS headers to every response. `OPTIONS` requests are answered
/// here with `204 No Content` and never reach the rest of the stack.
pub async fn cors(State(policy): State<Arc<CorsPolicy>>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let preflight = request.method() == Method::OPTIONS;

    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    policy.apply(response.headers_mut(), origin.as_deref(), preflight);
    response
}

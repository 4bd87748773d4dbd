//! Request interceptors for axum routers.
//!
//! Each interceptor is usable on its own through `axum::middleware::from_fn`
//! (or `from_fn_with_state`). [`apply_middleware`] composes them in the
//! standard order: request id, request log, panic recovery, metrics, CORS.

pub mod cors;
pub mod metrics;
pub mod recovery;
pub mod request_id;
pub mod request_log;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use std::sync::Arc;

use crate::observability::HttpMetrics;

pub use self::cors::{cors, CorsPolicy};
pub use self::metrics::{track_metrics, METRICS_PATH};
pub use self::recovery::recover_panics;
pub use self::request_id::{
    propagate_request_id_layer, set_request_id_layer, RequestId, REQUEST_ID_HEADER,
};
pub use self::request_log::{client_ip, log_requests, log_requests_skipping, SkipPaths};

/// Which optional interceptors to install and how.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareStack {
    pub metrics: Option<HttpMetrics>,
    pub cors: Option<Arc<CorsPolicy>>,
    pub skip_log_paths: SkipPaths,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: HttpMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Some(Arc::new(policy));
        self
    }

    pub fn skip_logging<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.skip_log_paths = SkipPaths::new(paths);
        self
    }
}

/// Wraps `router` with the standard interceptor chain.
///
/// Layers added last run first, so they are added innermost first.
pub fn apply_middleware<S>(router: Router<S>, stack: &MiddlewareStack) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let mut router = router;

    if let Some(policy) = &stack.cors {
        router = router.layer(from_fn_with_state(policy.clone(), cors));
    }
    if let Some(metrics) = &stack.metrics {
        router = router.layer(from_fn_with_state(metrics.clone(), track_metrics));
    }

    router
        .layer(from_fn(recover_panics))
        .layer(from_fn_with_state(
            stack.skip_log_paths.clone(),
            log_requests_skipping,
        ))
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
}

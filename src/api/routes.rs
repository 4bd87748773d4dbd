use axum::{extract::FromRef, routing::get, Router};
use std::sync::Arc;

use super::handlers;
use crate::config::Settings;
use crate::health::{self, HealthRegistry};
use crate::middleware::{apply_middleware, CorsPolicy, MiddlewareStack, METRICS_PATH};
use crate::observability::HttpMetrics;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub health: Arc<HealthRegistry>,
    pub metrics: HttpMetrics,
}

impl AppState {
    pub fn new(settings: Settings, metrics: HttpMetrics) -> Self {
        Self {
            settings: Arc::new(settings),
            health: Arc::new(HealthRegistry::new()),
            metrics,
        }
    }

    /// Replaces the health registry, e.g. one with a custom probe timeout.
    pub fn with_health_registry(mut self, registry: Arc<HealthRegistry>) -> Self {
        self.health = registry;
        self
    }
}

impl FromRef<AppState> for Arc<HealthRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.health.clone()
    }
}

impl FromRef<AppState> for HttpMetrics {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

impl FromRef<AppState> for Arc<Settings> {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}

/// Normalizes `server.base_path`; `None` means mount at the root.
fn mount_point(base_path: &str) -> Option<String> {
    let trimmed = base_path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{}", trimmed))
    }
}

/// Builds the service router: probes and metrics at the root, `api` under
/// the configured base path, the standard middleware around everything.
pub fn create_router(state: AppState, api: Router<AppState>) -> Router {
    let stack = MiddlewareStack::new()
        .with_metrics(state.metrics.clone())
        .with_cors(CorsPolicy::from(&state.settings.cors))
        .skip_logging(["/health", "/ready", METRICS_PATH]);

    let router = Router::new()
        .route("/health", get(health::liveness_handler))
        .route("/ready", get(health::readiness_handler))
        .route(METRICS_PATH, get(handlers::metrics_endpoint));

    let router = match mount_point(&state.settings.server.base_path) {
        Some(prefix) => router.nest(&prefix, api),
        None => router.merge(api),
    };

    let router = router
        .fallback(handlers::route_not_found)
        .with_state(state);

    apply_middleware(router, &stack)
}

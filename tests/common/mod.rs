#![allow(dead_code)]

use axum::{body::Body, http::Request, response::Response, Router};
use service_kit::api::{create_router, AppState};
use service_kit::config::Settings;
use service_kit::health::HealthRegistry;
use service_kit::observability::HttpMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

/// Environment lookup backed by a fixed map.
pub fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

pub fn test_state(settings: Settings) -> AppState {
    let metrics = HttpMetrics::new().expect("Failed to create metrics registry");
    AppState::new(settings, metrics)
}

pub fn test_app(settings: Settings, registry: Arc<HealthRegistry>, api: Router<AppState>) -> Router {
    let state = test_state(settings).with_health_registry(registry);
    create_router(state, api)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone()
        .oneshot(request)
        .await
        .expect("Router service is infallible")
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).expect("Body is not UTF-8")
}

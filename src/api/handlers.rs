use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, Uri},
    response::{IntoResponse, Response},
};

use crate::api::responses;
use crate::middleware::RequestId;
use crate::observability::HttpMetrics;

/// Prometheus scrape endpoint.
pub async fn metrics_endpoint(State(metrics): State<HttpMetrics>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.render(),
    )
}

/// Fallback for unmatched routes, in the error envelope.
pub async fn route_not_found(request_id: RequestId, uri: Uri) -> Response {
    responses::not_found(&request_id, format!("No route for {}", uri.path()))
}

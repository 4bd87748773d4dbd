use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::observability::{HttpMetrics, LatencyTimer};

/// Path of the scrape endpoint; never measured.
pub const METRICS_PATH: &str = "/metrics";

struct InFlight<'a>(&'a HttpMetrics);

impl<'a> InFlight<'a> {
    fn start(metrics: &'a HttpMetrics) -> Self {
        metrics.request_started();
        Self(metrics)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.request_finished();
    }
}

/// Counts requests and observes their duration, labeled by method, route
/// template and status. Unmatched routes are labeled `unknown` to keep
/// label cardinality bounded.
pub async fn track_metrics(
    State(metrics): State<HttpMetrics>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path() == METRICS_PATH {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let timer = LatencyTimer::new();
    let response = {
        let _in_flight = InFlight::start(&metrics);
        next.run(request).await
    };

    metrics.record_http_request(&method, &path, response.status().as_u16(), timer.elapsed());
    response
}

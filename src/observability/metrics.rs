use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{AppError, Result};

/// Histogram buckets for request durations, in seconds.
const DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Debug, Clone)]
struct MetricNames {
    requests_total: String,
    request_duration: String,
    requests_in_flight: String,
}

impl MetricNames {
    fn new(prefix: &str) -> Self {
        let name = |base: &str| {
            if prefix.is_empty() {
                base.to_string()
            } else {
                format!("{}_{}", prefix, base)
            }
        };
        Self {
            requests_total: name("http_requests_total"),
            request_duration: name("http_request_duration_seconds"),
            requests_in_flight: name("http_requests_in_flight"),
        }
    }
}

struct Inner {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    names: MetricNames,
}

/// HTTP metrics registry owned by the service.
///
/// Each instance has its own Prometheus recorder; nothing is installed
/// globally, so several registries can live in one process (and in tests).
#[derive(Clone)]
pub struct HttpMetrics {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for HttpMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMetrics")
            .field("names", &self.inner.names)
            .finish()
    }
}

impl HttpMetrics {
    pub fn new() -> Result<Self> {
        Self::with_prefix("")
    }

    /// Registry whose metric names are prefixed with `prefix_`.
    pub fn with_prefix(prefix: &str) -> Result<Self> {
        let names = MetricNames::new(prefix);
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(names.request_duration.clone()),
                &DURATION_BUCKETS,
            )
            .map_err(|e| AppError::Metrics(e.to_string()))?
            .build_recorder();
        let handle = recorder.handle();

        let metrics = Self {
            inner: Arc::new(Inner {
                recorder,
                handle,
                names,
            }),
        };
        metrics.describe();
        Ok(metrics)
    }

    fn describe(&self) {
        let names = &self.inner.names;
        metrics::with_local_recorder(&self.inner.recorder, || {
            describe_counter!(
                names.requests_total.clone(),
                Unit::Count,
                "Total number of HTTP requests"
            );
            describe_histogram!(
                names.request_duration.clone(),
                Unit::Seconds,
                "HTTP request duration in seconds"
            );
            describe_gauge!(
                names.requests_in_flight.clone(),
                Unit::Count,
                "Current number of HTTP requests being processed"
            );
        });
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration: Duration) {
        let names = &self.inner.names;
        let status = status.to_string();
        metrics::with_local_recorder(&self.inner.recorder, || {
            counter!(
                names.requests_total.clone(),
                "method" => method.to_string(),
                "path" => path.to_string(),
                "status" => status.clone()
            )
            .increment(1);
            histogram!(
                names.request_duration.clone(),
                "method" => method.to_string(),
                "path" => path.to_string(),
                "status" => status.clone()
            )
            .record(duration.as_secs_f64());
        });
    }

    pub fn request_started(&self) {
        let names = &self.inner.names;
        metrics::with_local_recorder(&self.inner.recorder, || {
            gauge!(names.requests_in_flight.clone()).increment(1.0);
        });
    }

    pub fn request_finished(&self) {
        let names = &self.inner.names;
        metrics::with_local_recorder(&self.inner.recorder, || {
            gauge!(names.requests_in_flight.clone()).decrement(1.0);
        });
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        self.inner.handle.render()
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

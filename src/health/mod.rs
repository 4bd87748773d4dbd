//! Liveness and readiness probes.
//!
//! A [`HealthRegistry`] holds named [`HealthCheck`] implementations. The
//! liveness probe never looks at them; the readiness probe runs all of them
//! under one shared deadline and reports the most severe status.

pub mod checkers;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{SecondsFormat, Utc};
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub use checkers::{DatabaseChecker, HttpChecker, ProbeChecker, RedisChecker};

/// Shared deadline for one readiness probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Health status of a service or dependency, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, HealthStatus::Degraded)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy)
    }

    /// The most severe status in `statuses`; `Healthy` when empty.
    pub fn most_severe<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses.into_iter().max().unwrap_or(HealthStatus::Healthy)
    }
}

/// Result of checking a single component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentCheck {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_latency"
    )]
    pub latency: Option<Duration>,
}

impl ComponentCheck {
    pub fn new(status: HealthStatus) -> Self {
        Self {
            status,
            message: None,
            latency: None,
        }
    }

    pub fn healthy(message: impl Into<String>) -> Self {
        Self::new(HealthStatus::Healthy).with_message(message)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(HealthStatus::Degraded).with_message(message)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(HealthStatus::Unhealthy).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

fn serialize_latency<S>(latency: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match latency {
        Some(latency) => serializer.serialize_str(&format!("{:?}", latency)),
        None => serializer.serialize_none(),
    }
}

/// Body of `/health` and `/ready`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<BTreeMap<String, ComponentCheck>>,
}

impl HealthResponse {
    /// Liveness answer: healthy, no checks.
    pub fn alive() -> Self {
        Self {
            status: HealthStatus::Healthy,
            timestamp: timestamp_now(),
            checks: None,
        }
    }

    /// Aggregates per-component results into an overall status.
    pub fn from_checks(checks: BTreeMap<String, ComponentCheck>) -> Self {
        let status = HealthStatus::most_severe(checks.values().map(|c| c.status));
        Self {
            status,
            timestamp: timestamp_now(),
            checks: Some(checks),
        }
    }

    /// 503 when unhealthy, 200 otherwise.
    pub fn status_code(&self) -> StatusCode {
        if self.status.is_unhealthy() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        }
    }
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Deadline shared by every checker of one readiness probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeContext {
    deadline: Instant,
    timeout: Duration,
}

impl ProbeContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Resolves once the deadline has passed.
    pub async fn expired(&self) {
        tokio::time::sleep_until(self.deadline).await
    }
}

/// A named dependency check.
///
/// Returning `Err` is equivalent to returning an unhealthy check carrying the
/// error text.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, ctx: &ProbeContext) -> anyhow::Result<ComponentCheck>;
}

/// Registry of checkers behind the readiness probe.
pub struct HealthRegistry {
    checkers: RwLock<Vec<Arc<dyn HealthCheck>>>,
    timeout: Duration,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            checkers: RwLock::new(Vec::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn register<C>(&self, checker: C)
    where
        C: HealthCheck + 'static,
    {
        self.register_arc(Arc::new(checker));
    }

    /// Adds a checker. A checker with the same name is replaced in place.
    pub fn register_arc(&self, checker: Arc<dyn HealthCheck>) {
        let mut checkers = self.checkers.write();
        match checkers.iter().position(|c| c.name() == checker.name()) {
            Some(index) => {
                tracing::warn!(checker = checker.name(), "Replacing health checker with duplicate name");
                checkers[index] = checker;
            }
            None => {
                tracing::debug!(checker = checker.name(), "Registered health checker");
                checkers.push(checker);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.checkers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.read().is_empty()
    }

    /// Registered checker names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.checkers
            .read()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    pub fn liveness(&self) -> HealthResponse {
        HealthResponse::alive()
    }

    /// Runs every checker in turn under one deadline and aggregates the
    /// results. Never fails.
    pub async fn readiness(&self) -> HealthResponse {
        let checkers: Vec<Arc<dyn HealthCheck>> = self.checkers.read().clone();
        let ctx = ProbeContext::new(self.timeout);

        let mut checks = BTreeMap::new();
        for checker in &checkers {
            let check = run_check(checker.as_ref(), &ctx).await;
            checks.insert(checker.name().to_string(), check);
        }

        let response = HealthResponse::from_checks(checks);
        if !response.status.is_healthy() {
            tracing::warn!(status = ?response.status, "Readiness probe not healthy");
        }
        response
    }
}

async fn run_check(checker: &dyn HealthCheck, ctx: &ProbeContext) -> ComponentCheck {
    if ctx.is_expired() {
        return timed_out(ctx);
    }

    let guarded = AssertUnwindSafe(checker.check(ctx)).catch_unwind();
    let outcome = tokio::time::timeout_at(ctx.deadline(), guarded).await;

    // `timeout_at` polls the check before the timer, so a checker that blocked
    // its thread past the deadline can still come back with a result.
    if ctx.is_expired() {
        return timed_out(ctx);
    }

    match outcome {
        Ok(Ok(Ok(check))) => check,
        Ok(Ok(Err(err))) => {
            let message = format!("{:#}", err);
            if message.trim().is_empty() {
                ComponentCheck::unhealthy("Health check failed")
            } else {
                ComponentCheck::unhealthy(message)
            }
        }
        Ok(Err(_)) => {
            tracing::error!(checker = checker.name(), "Health check panicked");
            ComponentCheck::unhealthy("Health check panicked")
        }
        Err(_) => timed_out(ctx),
    }
}

fn timed_out(ctx: &ProbeContext) -> ComponentCheck {
    ComponentCheck::unhealthy(format!("Health check timed out after {:?}", ctx.timeout()))
}

/// `GET /health`
pub async fn liveness_handler(State(registry): State<Arc<HealthRegistry>>) -> Json<HealthResponse> {
    Json(registry.liveness())
}

/// `GET /ready`
pub async fn readiness_handler(
    State(registry): State<Arc<HealthRegistry>>,
) -> (StatusCode, Json<HealthResponse>) {
    let response = registry.readiness().await;
    (response.status_code(), Json(response))
}

/// `/health` and `/ready` bound to `registry`, mergeable into any router.
pub fn health_routes<S>(registry: Arc<HealthRegistry>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(registry)
}

/// Liveness for services without a registry.
pub async fn simple_liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": timestamp_now(),
    }))
}

/// Readiness for services without dependencies.
pub async fn simple_readiness() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ready",
        "timestamp": timestamp_now(),
    }))
}

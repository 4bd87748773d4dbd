//! Ready-made checkers for common dependencies.

use async_trait::async_trait;
use sqlx::{Connection, PgPool};
use std::future::Future;
use std::time::Duration;

use super::{ComponentCheck, HealthCheck, ProbeContext};
use crate::observability::LatencyTimer;

/// Marks a successful check degraded when it took longer than `threshold`.
fn grade(check: ComponentCheck, latency: Duration, threshold: Option<Duration>) -> ComponentCheck {
    match threshold {
        Some(limit) if latency > limit => {
            ComponentCheck::degraded("High latency detected").with_latency(latency)
        }
        _ => check.with_latency(latency),
    }
}

/// Pings a Postgres pool.
pub struct DatabaseChecker {
    pool: PgPool,
    latency_threshold: Option<Duration>,
}

impl DatabaseChecker {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            latency_threshold: None,
        }
    }

    /// Report `degraded` when the round trip exceeds `threshold`.
    pub fn with_latency_threshold(mut self, threshold: Duration) -> Self {
        self.latency_threshold = Some(threshold);
        self
    }
}

#[async_trait]
impl HealthCheck for DatabaseChecker {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self, _ctx: &ProbeContext) -> anyhow::Result<ComponentCheck> {
        let timer = LatencyTimer::new();

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                return Ok(ComponentCheck::unhealthy(format!(
                    "Failed to get database connection: {}",
                    e
                )))
            }
        };

        if let Err(e) = conn.ping().await {
            return Ok(ComponentCheck::unhealthy(format!("Database ping failed: {}", e)));
        }

        Ok(grade(
            ComponentCheck::healthy("Database connection OK"),
            timer.elapsed(),
            self.latency_threshold,
        ))
    }
}

/// Sends `PING` over a multiplexed Redis connection.
pub struct RedisChecker {
    client: redis::Client,
    latency_threshold: Option<Duration>,
}

impl RedisChecker {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            latency_threshold: None,
        }
    }

    pub fn with_latency_threshold(mut self, threshold: Duration) -> Self {
        self.latency_threshold = Some(threshold);
        self
    }
}

#[async_trait]
impl HealthCheck for RedisChecker {
    fn name(&self) -> &str {
        "redis"
    }

    async fn check(&self, _ctx: &ProbeContext) -> anyhow::Result<ComponentCheck> {
        let timer = LatencyTimer::new();

        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                return Ok(ComponentCheck::unhealthy(format!(
                    "Redis connection failed: {}",
                    e
                )))
            }
        };

        match redis::cmd("PING").query_async::<_, ()>(&mut conn).await {
            Ok(()) => Ok(grade(
                ComponentCheck::healthy("Redis connection OK"),
                timer.elapsed(),
                self.latency_threshold,
            )),
            Err(e) => Ok(ComponentCheck::unhealthy(format!("Redis ping failed: {}", e))),
        }
    }
}

/// Checker driven by a caller-supplied async probe.
///
/// ```ignore
/// registry.register(ProbeChecker::new("queue", |_ctx| async move {
///     queue.ping().await.map_err(Into::into)
/// }));
/// ```
pub struct ProbeChecker<F> {
    name: String,
    probe: F,
}

impl<F, Fut> ProbeChecker<F>
where
    F: Fn(ProbeContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    pub fn new(name: impl Into<String>, probe: F) -> Self {
        Self {
            name: name.into(),
            probe,
        }
    }
}

#[async_trait]
impl<F, Fut> HealthCheck for ProbeChecker<F>
where
    F: Fn(ProbeContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &ProbeContext) -> anyhow::Result<ComponentCheck> {
        let timer = LatencyTimer::new();

        match (self.probe)(*ctx).await {
            Ok(()) => Ok(ComponentCheck::healthy(format!("{} connection OK", self.name))
                .with_latency(timer.elapsed())),
            Err(e) => Ok(ComponentCheck::unhealthy(format!(
                "{} ping failed: {:#}",
                self.name, e
            ))),
        }
    }
}

/// `GET`s a downstream service endpoint; any 2xx is healthy.
pub struct HttpChecker {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_client(name, url, reqwest::Client::new())
    }

    pub fn with_client(
        name: impl Into<String>,
        url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthCheck for HttpChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &ProbeContext) -> anyhow::Result<ComponentCheck> {
        let timer = LatencyTimer::new();
        let response = self
            .client
            .get(&self.url)
            .timeout(ctx.remaining())
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                Ok(ComponentCheck::healthy(format!("{} reachable", self.name))
                    .with_latency(timer.elapsed()))
            }
            Ok(resp) => Ok(ComponentCheck::unhealthy(format!(
                "{} returned {}",
                self.url,
                resp.status()
            ))
            .with_latency(timer.elapsed())),
            Err(e) => Ok(ComponentCheck::unhealthy(format!(
                "Request to {} failed: {}",
                self.url, e
            ))),
        }
    }
}

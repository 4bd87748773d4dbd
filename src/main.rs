use axum::{
    extract::{Path, Query},
    response::Response,
    routing::get,
    Router,
};
use service_kit::api::requests::PageQuery;
use service_kit::api::{create_router, responses, AppState};
use service_kit::config::Settings;
use service_kit::health::{DatabaseChecker, HttpChecker, RedisChecker};
use service_kit::middleware::RequestId;
use service_kit::observability::{init_logging, service_span, HttpMetrics, LogConfig};
use sqlx::postgres::PgPoolOptions;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn, Instrument};

const SERVICE_NAME: &str = "service-kit-demo";
const DEMO_ITEM_COUNT: u64 = 95;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config_path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config/config.yaml"));
    let settings = Settings::load(Some(&config_path))?;

    // Initialize logging
    let log_config =
        LogConfig::from(&settings.logger).with_env_switch(|key| std::env::var(key).ok());
    init_logging(&log_config)?;

    run(settings).instrument(service_span(SERVICE_NAME)).await
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        mode = %settings.server.mode,
        port = settings.server.port,
        "Configuration loaded"
    );

    let metrics = HttpMetrics::new()?;
    let state = AppState::new(settings.clone(), metrics);

    if !settings.database.dbname.is_empty() || !settings.database.url.is_empty() {
        info!("Database configured at {}", settings.database.redacted_dsn());
        let pool = PgPoolOptions::new()
            .max_connections(settings.database.max_open_conns)
            .max_lifetime(settings.database.conn_max_lifetime())
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(&settings.database.connection_url())?;
        state.health.register(DatabaseChecker::new(pool));
    }

    info!("Redis configured at {}", settings.redis.addr());
    let redis_client = redis::Client::open(settings.redis.connection_url())?;
    state.health.register(RedisChecker::new(redis_client));

    let http_client = reqwest::Client::builder()
        .timeout(settings.services.timeout())
        .build()?;
    for (name, base_url) in settings.services.configured() {
        let url = format!("{}/health", base_url.trim_end_matches('/'));
        state
            .health
            .register(HttpChecker::with_client(name, url, http_client.clone()));
    }
    info!(checkers = ?state.health.names(), "Health checkers registered");

    let api = Router::new()
        .route("/ping", get(ping))
        .route("/items", get(list_items))
        .route("/items/:id", get(get_item));
    let app = create_router(state, api)
        .layer(TimeoutLayer::new(settings.server.write_timeout()));

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut graceful_rx = shutdown_rx.clone();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = graceful_rx.changed().await;
        info!("Shutdown signal received, draining connections");
    });

    let shutdown_timeout = settings.server.shutdown_timeout();
    let mut deadline_rx = shutdown_rx;
    tokio::select! {
        result = server.into_future() => result?,
        _ = async {
            let _ = deadline_rx.changed().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => warn!("Graceful shutdown exceeded {:?}, exiting", shutdown_timeout),
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn ping(request_id: RequestId) -> Response {
    responses::ok(&request_id, serde_json::json!({ "pong": true }))
}

async fn list_items(request_id: RequestId, Query(page): Query<PageQuery>) -> Response {
    let items: Vec<u64> = (page.offset()..DEMO_ITEM_COUNT)
        .take(page.limit() as usize)
        .map(|index| index + 1)
        .collect();
    responses::paginated(&request_id, items, page.page, page.per_page, DEMO_ITEM_COUNT)
}

async fn get_item(request_id: RequestId, Path(id): Path<u64>) -> Response {
    if id == 0 || id > DEMO_ITEM_COUNT {
        return responses::not_found(&request_id, format!("Item {} not found", id));
    }
    responses::ok(&request_id, serde_json::json!({ "id": id }))
}

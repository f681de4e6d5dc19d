//! colloquy-api - HTTP API server for the colloquy assistant backend

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use colloquy_api::middleware::{build_rate_limiter, RateLimitConfig};
use colloquy_api::{router, AppState, SessionVerifier};
use colloquy_core::TiktokenTokenizer;
use colloquy_core::defaults::{MAX_BODY_BYTES, SERVER_HOST, SERVER_PORT};
use colloquy_db::{Database, PoolConfig};
use colloquy_inference::{
    ModelCatalog, ModelOptimizer, OpenAiCompatBackend, OptimizerConfig, ProviderRegistry,
};
use colloquy_jobs::{LogNotifier, SweepWorker, TaskScheduler, WorkerConfig};

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str =
        std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    if origins.is_empty() {
        return vec![HeaderValue::from_static("http://localhost:3000")];
    }
    origins
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors
    //   RUST_LOG    - standard env filter (default: "colloquy_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "colloquy_api=debug,colloquy_jobs=info,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("colloquy-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/colloquy".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| SERVER_HOST.to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(SERVER_PORT);

    let rate_limit = RateLimitConfig::from_env();
    info!(
        "Rate limiting: {} ({} requests/s, burst {})",
        if rate_limit.enabled {
            "enabled"
        } else {
            "disabled"
        },
        rate_limit.per_second,
        rate_limit.burst
    );

    let sessions = SessionVerifier::from_env()?;
    let webhook_secret = std::env::var("WEBHOOK_SECRET").ok();
    if webhook_secret.as_deref().map_or(true, str::is_empty) {
        warn!("WEBHOOK_SECRET is not set, identity webhooks will be rejected");
    }

    info!("Connecting to database...");
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
    info!("Database connected");

    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    let registry = ProviderRegistry::from_env();
    let disabled = registry.disabled();
    if !disabled.is_empty() {
        info!(
            disabled = ?disabled,
            "Some providers have no credentials, their models are hidden"
        );
    }
    let catalog = registry.apply(&ModelCatalog::default_catalog());
    if catalog.is_empty() {
        warn!("No provider credentials configured, chat requests will fail");
    }
    let optimizer = Arc::new(ModelOptimizer::with_catalog(
        Arc::new(catalog),
        OptimizerConfig::from_env(),
    ));
    let chat = Arc::new(OpenAiCompatBackend::with_registry(registry)?);
    info!(
        models = optimizer.catalog().len(),
        strategy = optimizer.config().default_strategy.as_str(),
        "Model routing initialized"
    );

    let scheduler = TaskScheduler::from_database(&db, Arc::new(LogNotifier));

    let worker_config = WorkerConfig::from_env();
    let worker_handle = if worker_config.enabled {
        info!("Starting sweep worker...");
        let handle = SweepWorker::new(scheduler.clone(), worker_config).start();
        Some(handle)
    } else {
        info!("Sweep worker disabled");
        None
    };

    let mut state = AppState::from_database(&db, scheduler, optimizer, chat, sessions)
        .with_webhook_secret(webhook_secret)
        .with_rate_limiter(build_rate_limiter(&rate_limit));
    match TiktokenTokenizer::cl100k() {
        Ok(tokenizer) => state = state.with_tokenizer(Arc::new(tokenizer)),
        Err(e) => warn!(error = %e, "Tokenizer unavailable, metering with estimates"),
    }

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parse_allowed_origins()))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    header::HeaderName::from_static("x-model"),
                ])
                .expose_headers([header::HeaderName::from_static("x-model")])
                .max_age(Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::new());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = worker_handle {
        if let Err(e) = handle.shutdown().await {
            warn!(error = %e, "Sweep worker did not acknowledge shutdown");
        }
    }
    info!("Server stopped");

    Ok(())
}

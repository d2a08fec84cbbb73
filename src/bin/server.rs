use std::sync::Arc;
use std::time::Duration;

use poem::{Route, Server, listener::TcpListener};
use poem_openapi::OpenApiService;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use notification_service::{
    application::services::{notifications::NotificationService, status::StatusProjection},
    config::Config,
    infrastructure::{cache::redis::RedisStatusCache, repositories::postgres::PostgresRepository},
    presentation::http::endpoints::{
        health::HealthEndpoints, notifications::NotificationEndpoints, root::ApiState,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::try_parse().map_err(anyhow::Error::msg)?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.store_dsn)
        .await?;
    let repo = Arc::new(PostgresRepository::new(pool));

    let status = match &config.cache_addr {
        Some(addr) => StatusProjection::new(Arc::new(RedisStatusCache::connect(addr).await?)),
        None => StatusProjection::disabled(),
    };

    let state = Arc::new(ApiState {
        notifications: Arc::new(NotificationService::new(repo, status)),
    });

    let api_service = OpenApiService::new(
        (
            HealthEndpoints::new(state.clone()),
            NotificationEndpoints::new(state),
        ),
        "Notification API",
        "0.1.0",
    )
    .server(format!("http://localhost:{}/api", config.port));
    let ui = api_service.swagger_ui();
    let app = Route::new().nest("/api", api_service).nest("/", ui);

    info!(port = config.port, "starting http server");
    Server::new(TcpListener::bind(format!("0.0.0.0:{}", config.port)))
        .run_with_graceful_shutdown(
            app,
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
            Some(Duration::from_secs(5)),
        )
        .await?;

    Ok(())
}

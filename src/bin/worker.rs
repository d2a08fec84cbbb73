use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use notification_service::{
    application::{
        handlers::dispatcher::{DeliveryHandler, RetryStrategy},
        services::{
            delivery::{DeliveryAdapter, DeliveryGateway},
            status::StatusProjection,
        },
    },
    config::Config,
    infrastructure::{
        cache::redis::RedisStatusCache,
        delivery::{email::EmailAdapter, telegram::TelegramAdapter},
        messaging::jetstream::{BrokerConfig, JetStreamWorker},
        repositories::postgres::PostgresRepository,
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

    let mut adapters: Vec<Arc<dyn DeliveryAdapter>> = Vec::new();
    if let Some(smtp) = &config.smtp {
        adapters.push(EmailAdapter::new(smtp)?);
        info!("email adapter enabled");
    }
    if let Some(token) = &config.telegram_bot_token {
        adapters.push(TelegramAdapter::new(token.clone()));
        info!("telegram adapter enabled");
    }
    if adapters.is_empty() {
        warn!("no delivery adapters configured; every envelope will be parked as failed");
    }

    let handler = Arc::new(DeliveryHandler::new(
        repo,
        DeliveryGateway::new(adapters),
        status,
        RetryStrategy {
            attempts: config.retry_attempts,
            delay: config.retry_delay,
            backoff: config.retry_backoff,
        },
    ));

    let broker = BrokerConfig::new(config.broker_url.clone(), config.queue_name.clone());
    let worker = JetStreamWorker::connect(&broker).await?;

    let shutdown = CancellationToken::new();
    let handle = worker.spawn(handler, shutdown.clone());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown.cancel();
    handle.await?;

    Ok(())
}

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use notification_service::{
    application::services::{
        scheduler::{DispatchScheduler, SchedulerConfig},
        status::StatusProjection,
    },
    config::Config,
    infrastructure::{
        cache::redis::RedisStatusCache,
        messaging::jetstream::{BrokerConfig, JetStreamQueue},
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

    let broker = BrokerConfig::new(config.broker_url.clone(), config.queue_name.clone());
    let queue = JetStreamQueue::connect(&broker).await?;

    let scheduler = Arc::new(DispatchScheduler::new(
        repo,
        queue,
        status,
        SchedulerConfig {
            tick_interval: config.sched_interval,
            batch_limit: config.sched_batch,
            visibility_timeout: config.visibility_timeout,
        },
    ));

    let shutdown = CancellationToken::new();
    let handle = scheduler.start(shutdown.clone());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown.cancel();
    handle.await?;

    Ok(())
}

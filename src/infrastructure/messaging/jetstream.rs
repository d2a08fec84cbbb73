use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::{
    self, AckKind,
    consumer::{AckPolicy, PullConsumer, pull},
};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    application::{
        handlers::dispatcher::{DeliveryHandler, Disposition},
        services::event_bus::DispatchQueue,
    },
    domain::events::DispatchEnvelope,
};

#[derive(Clone)]
pub struct BrokerConfig {
    pub url: String,
    pub queue: String,
    pub pull_batch: usize,
    pub ack_wait: Duration,
    pub max_deliver: i64,
}

impl BrokerConfig {
    pub fn new(url: String, queue: String) -> Self {
        Self {
            url,
            queue,
            pull_batch: 16,
            ack_wait: Duration::from_secs(30),
            max_deliver: 5,
        }
    }

    fn durable(&self) -> String {
        format!("{}-workers", self.queue)
    }
}

/// Publishing half of the JetStream broker. `connect` ensures the stream
/// exists so publishers and consumers can start in any order.
pub struct JetStreamQueue {
    context: jetstream::Context,
    subject: String,
}

impl JetStreamQueue {
    pub async fn connect(config: &BrokerConfig) -> anyhow::Result<Arc<Self>> {
        let client = async_nats::connect(&config.url).await?;
        let context = jetstream::new(client);
        ensure_stream(&context, config).await?;

        info!(queue = %config.queue, "connected to work broker");
        Ok(Arc::new(Self {
            context,
            subject: config.queue.clone(),
        }))
    }
}

#[async_trait]
impl DispatchQueue for JetStreamQueue {
    async fn publish(&self, envelope: &DispatchEnvelope) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(envelope)?;
        let mut headers = async_nats::HeaderMap::new();
        headers.insert("Content-Type", "application/json");
        // Awaiting the publish ack is what makes the enqueue durable.
        self.context
            .publish_with_headers(self.subject.clone(), headers, payload.into())
            .await?
            .await?;
        Ok(())
    }
}

/// Consuming half: a durable pull consumer feeding the delivery handler.
/// Redelivery of unacked envelopes is the broker's at-least-once half of
/// the pipeline contract.
pub struct JetStreamWorker {
    consumer: PullConsumer,
    pull_batch: usize,
}

impl JetStreamWorker {
    pub async fn connect(config: &BrokerConfig) -> anyhow::Result<Self> {
        let client = async_nats::connect(&config.url).await?;
        let context = jetstream::new(client);
        let stream = ensure_stream(&context, config).await?;

        let consumer = stream
            .get_or_create_consumer(
                &config.durable(),
                pull::Config {
                    durable_name: Some(config.durable()),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: config.ack_wait,
                    max_deliver: config.max_deliver,
                    ..Default::default()
                },
            )
            .await?;

        info!(queue = %config.queue, "worker consumer ready");
        Ok(Self {
            consumer,
            pull_batch: config.pull_batch,
        })
    }

    pub fn spawn(self, handler: Arc<DeliveryHandler>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(err) = self.run(handler, shutdown).await {
                error!("worker consume loop stopped: {err:#}");
            }
        })
    }

    async fn run(
        self,
        handler: Arc<DeliveryHandler>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        loop {
            let mut batch = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("worker stopped");
                    return Ok(());
                }
                batch = self
                    .consumer
                    .batch()
                    .max_messages(self.pull_batch)
                    .expires(Duration::from_secs(5))
                    .messages() => batch?,
            };

            // The in-flight envelope always runs to completion; shutdown is
            // observed between batches.
            while let Some(message) = batch.next().await {
                match message {
                    Ok(message) => Self::process(message, &handler).await,
                    Err(err) => error!("broker delivery error: {err:#}"),
                }
            }

            if shutdown.is_cancelled() {
                info!("worker stopped");
                return Ok(());
            }
        }
    }

    async fn process(message: jetstream::Message, handler: &DeliveryHandler) {
        let envelope: DispatchEnvelope = match serde_json::from_slice(&message.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                // Redelivering bytes we cannot parse would loop forever.
                warn!("dropping undecodable envelope: {err:#}");
                if let Err(err) = message.ack().await {
                    error!("failed to ack undecodable envelope: {err}");
                }
                return;
            }
        };

        match handler.handle(&envelope).await {
            Disposition::Complete => {
                if let Err(err) = message.ack().await {
                    error!(id = %envelope.id, "failed to ack envelope: {err}");
                }
            }
            Disposition::Reject => {
                if let Err(err) = message.ack_with(AckKind::Term).await {
                    error!(id = %envelope.id, "failed to reject envelope: {err}");
                }
            }
        }
    }
}

async fn ensure_stream(
    context: &jetstream::Context,
    config: &BrokerConfig,
) -> anyhow::Result<jetstream::stream::Stream> {
    let stream = context
        .get_or_create_stream(jetstream::stream::Config {
            name: config.queue.clone(),
            subjects: vec![config.queue.clone()],
            ..Default::default()
        })
        .await?;
    Ok(stream)
}

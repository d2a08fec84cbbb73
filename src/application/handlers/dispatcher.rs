use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    application::services::{
        delivery::{DeliveryError, DeliveryGateway},
        status::StatusProjection,
    },
    domain::{
        events::DispatchEnvelope, models::NotificationStatus,
        repositories::NotificationRepository,
    },
};

/// Bounded-backoff retry plan for one envelope: `attempts` tries, sleeping
/// `delay` after the first failure and multiplying it by `backoff` after
/// each subsequent one.
#[derive(Debug, Clone, Copy)]
pub struct RetryStrategy {
    pub attempts: u32,
    pub delay: Duration,
    pub backoff: u32,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
            backoff: 2,
        }
    }
}

/// What the transport loop should do with the broker delivery once the
/// handler is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processing finished; acknowledge and remove the envelope.
    Complete,
    /// Attempts exhausted; reject the envelope without requeue.
    Reject,
}

/// Drives one envelope to its terminal state: resolve the adapter for its
/// kind, run the retry loop, then record the outcome in store and cache.
pub struct DeliveryHandler {
    repo: Arc<dyn NotificationRepository>,
    gateway: DeliveryGateway,
    status: StatusProjection,
    retry: RetryStrategy,
}

impl DeliveryHandler {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        gateway: DeliveryGateway,
        status: StatusProjection,
        retry: RetryStrategy,
    ) -> Self {
        Self {
            repo,
            gateway,
            status,
            retry,
        }
    }

    pub async fn handle(&self, envelope: &DispatchEnvelope) -> Disposition {
        let Some(adapter) = self.gateway.get(envelope.kind) else {
            // Nothing can deliver this kind; park it in a terminal state
            // instead of cycling through the queue.
            warn!(id = %envelope.id, kind = envelope.kind.as_str(), "no delivery adapter registered");
            self.finish(envelope.id, NotificationStatus::Failed).await;
            return Disposition::Complete;
        };

        let mut delay = self.retry.delay;
        for attempt in 1..=self.retry.attempts {
            match adapter.deliver(&envelope.payload).await {
                Ok(()) => {
                    info!(id = %envelope.id, kind = envelope.kind.as_str(), "notification delivered");
                    self.finish(envelope.id, NotificationStatus::Sent).await;
                    return Disposition::Complete;
                }
                Err(DeliveryError::Permanent(err)) => {
                    warn!(id = %envelope.id, attempt, "permanent delivery failure: {err:#}");
                    break;
                }
                Err(DeliveryError::Transient(err)) => {
                    warn!(id = %envelope.id, attempt, "delivery attempt failed: {err:#}");
                    if let Err(err) = self.repo.increment_retries(envelope.id).await {
                        error!(id = %envelope.id, "failed to increment retries: {err:#}");
                    }
                    if attempt < self.retry.attempts {
                        sleep(delay).await;
                        delay *= self.retry.backoff;
                    }
                }
            }
        }

        self.finish(envelope.id, NotificationStatus::Failed).await;
        Disposition::Reject
    }

    /// Store failures here are logged, not propagated: the envelope must
    /// still leave the queue, and the store stays authoritative for the
    /// next reader.
    async fn finish(&self, id: Uuid, status: NotificationStatus) {
        if let Err(err) = self.repo.set_status(id, status).await {
            error!(%id, status = status.as_str(), "failed to update store status: {err:#}");
        }
        self.status.record(id, status).await;
    }
}

use async_trait::async_trait;

use crate::domain::events::DispatchEnvelope;

/// Publishing half of the work broker. Implementations return only after
/// the broker has confirmed the envelope is durably enqueued.
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    async fn publish(&self, envelope: &DispatchEnvelope) -> anyhow::Result<()>;
}

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    application::{handlers::dispatcher::DeliveryHandler, services::event_bus::DispatchQueue},
    domain::events::DispatchEnvelope,
};

/// Channel-backed queue for tests: publishes serialize exactly like the
/// real broker, and consuming a message removes it (both dispositions
/// drop it, mirroring ack and reject-without-requeue).
pub struct InMemoryQueue {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

pub struct InMemoryQueueWorker {
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

pub fn queue_pair() -> (Arc<InMemoryQueue>, InMemoryQueueWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Arc::new(InMemoryQueue { tx }),
        InMemoryQueueWorker { rx: Mutex::new(rx) },
    )
}

#[async_trait]
impl DispatchQueue for InMemoryQueue {
    async fn publish(&self, envelope: &DispatchEnvelope) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(envelope)?;
        self.tx
            .send(payload)
            .map_err(|_| anyhow::anyhow!("queue closed"))?;
        Ok(())
    }
}

impl InMemoryQueueWorker {
    /// Pops the next raw message without blocking; `None` means the queue
    /// is currently empty.
    pub async fn try_next(&self) -> Option<Vec<u8>> {
        self.rx.lock().await.try_recv().ok()
    }

    pub fn spawn(self, handler: Arc<DeliveryHandler>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut rx = self.rx.into_inner();
            loop {
                let payload = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    payload = rx.recv() => match payload {
                        Some(payload) => payload,
                        None => return,
                    },
                };
                match serde_json::from_slice::<DispatchEnvelope>(&payload) {
                    Ok(envelope) => {
                        let _ = handler.handle(&envelope).await;
                    }
                    Err(err) => warn!("dropping undecodable envelope: {err:#}"),
                }
            }
        })
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::domain::models::NotificationStatus;

#[async_trait]
pub trait StatusCache: Send + Sync {
    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> anyhow::Result<()>;
    async fn get_status(&self, id: Uuid) -> anyhow::Result<Option<NotificationStatus>>;
}

/// Best-effort projection of store status into the cache. The store stays
/// authoritative; a cache failure is logged and swallowed, never surfaced.
#[derive(Clone)]
pub struct StatusProjection {
    cache: Option<Arc<dyn StatusCache>>,
}

impl StatusProjection {
    pub fn new(cache: Arc<dyn StatusCache>) -> Self {
        Self { cache: Some(cache) }
    }

    /// Used when no cache endpoint is configured; every write is a no-op
    /// and every lookup is a miss.
    pub fn disabled() -> Self {
        Self { cache: None }
    }

    pub async fn record(&self, id: Uuid, status: NotificationStatus) {
        let Some(cache) = &self.cache else { return };
        if let Err(err) = cache.set_status(id, status).await {
            warn!(%id, status = status.as_str(), "failed to write status cache: {err:#}");
        }
    }

    pub async fn lookup(&self, id: Uuid) -> Option<NotificationStatus> {
        let cache = self.cache.as_ref()?;
        match cache.get_status(id).await {
            Ok(status) => status,
            Err(err) => {
                warn!(%id, "status cache read failed: {err:#}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenCache;

    #[async_trait]
    impl StatusCache for BrokenCache {
        async fn set_status(&self, _id: Uuid, _status: NotificationStatus) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }

        async fn get_status(&self, _id: Uuid) -> anyhow::Result<Option<NotificationStatus>> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn cache_failures_are_swallowed() {
        let projection = StatusProjection::new(Arc::new(BrokenCache));
        let id = Uuid::new_v4();

        projection.record(id, NotificationStatus::Sent).await;
        assert_eq!(projection.lookup(id).await, None);
    }

    #[tokio::test]
    async fn disabled_projection_always_misses() {
        let projection = StatusProjection::disabled();
        let id = Uuid::new_v4();

        projection.record(id, NotificationStatus::Scheduled).await;
        assert_eq!(projection.lookup(id).await, None);
    }
}

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    application::services::status::StatusProjection,
    domain::{
        errors::StoreError,
        models::{NewNotification, Notification, NotificationStatus},
        repositories::NotificationRepository,
    },
};

/// Submitter-facing operations over the durable store, with the status
/// cache primed after every authoritative write. Field validation is the
/// caller's concern; this service accepts whatever it is given.
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    status: StatusProjection,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, status: StatusProjection) -> Self {
        Self { repo, status }
    }

    pub async fn create(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let created = self.repo.create(new).await?;
        self.status.record(created.id, created.status).await;
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<Notification, StoreError> {
        self.repo.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<Notification>, StoreError> {
        self.repo.list().await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<(), StoreError> {
        self.repo.cancel(id).await?;
        self.status.record(id, NotificationStatus::Canceled).await;
        Ok(())
    }

    /// Status lookup through the cache. On a miss the store answers and the
    /// cache is re-primed for the next reader.
    pub async fn status(&self, id: Uuid) -> Result<NotificationStatus, StoreError> {
        if let Some(status) = self.status.lookup(id).await {
            return Ok(status);
        }

        let notification = self.repo.get(id).await?;
        self.status
            .record(notification.id, notification.status)
            .await;
        Ok(notification.status)
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    errors::StoreError,
    models::{NewNotification, Notification, NotificationStatus},
    repositories::NotificationRepository,
};

/// Map-backed store used by tests and local development. The write lock
/// plays the role of the database transaction: a reservation flips its
/// rows before any other reserver can see them.
#[derive(Default)]
pub struct InMemoryRepository {
    notifications: Arc<RwLock<HashMap<Uuid, Notification>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test support: age a row so reaper paths can be exercised without
    /// waiting out a real visibility timeout.
    pub async fn backdate_updated_at(&self, id: Uuid, by: chrono::Duration) {
        let mut notifications = self.notifications.write().await;
        if let Some(entry) = notifications.get_mut(&id) {
            entry.updated_at -= by;
        }
    }
}

#[async_trait]
impl NotificationRepository for InMemoryRepository {
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            payload: new.payload,
            status: NotificationStatus::Scheduled,
            scheduled_at: new.scheduled_at,
            retries: 0,
            created_at: now,
            updated_at: now,
        };
        let mut notifications = self.notifications.write().await;
        notifications.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn get(&self, id: Uuid) -> Result<Notification, StoreError> {
        let notifications = self.notifications.read().await;
        notifications
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<Notification>, StoreError> {
        let notifications = self.notifications.read().await;
        Ok(notifications.values().cloned().collect())
    }

    async fn cancel(&self, id: Uuid) -> Result<(), StoreError> {
        let mut notifications = self.notifications.write().await;
        let entry = notifications.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if entry.status != NotificationStatus::Scheduled {
            return Err(StoreError::CancelTooLate(id));
        }
        entry.status = NotificationStatus::Canceled;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn reserve_due(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut notifications = self.notifications.write().await;

        let mut due: Vec<(DateTime<Utc>, Uuid)> = notifications
            .values()
            .filter(|n| n.status == NotificationStatus::Scheduled && n.scheduled_at <= now)
            .map(|n| (n.scheduled_at, n.id))
            .collect();
        due.sort();
        due.truncate(limit.max(0) as usize);

        let mut reserved = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(entry) = notifications.get_mut(&id) {
                entry.status = NotificationStatus::Processing;
                entry.updated_at = Utc::now();
                reserved.push(entry.clone());
            }
        }
        Ok(reserved)
    }

    async fn increment_retries(&self, id: Uuid) -> Result<(), StoreError> {
        let mut notifications = self.notifications.write().await;
        if let Some(entry) = notifications.get_mut(&id) {
            entry.retries += 1;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> Result<(), StoreError> {
        let mut notifications = self.notifications.write().await;
        if let Some(entry) = notifications.get_mut(&id) {
            entry.status = status;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn release_overdue(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut notifications = self.notifications.write().await;
        let mut released = 0;
        for entry in notifications.values_mut() {
            if entry.status == NotificationStatus::Processing && entry.updated_at < older_than {
                entry.status = NotificationStatus::Scheduled;
                entry.updated_at = Utc::now();
                released += 1;
            }
        }
        Ok(released)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    errors::StoreError,
    models::{NewNotification, Notification, NotificationStatus},
};

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Inserts a new notification in `Scheduled` with zero retries. The
    /// payload row is written in the same transaction as the parent row.
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError>;

    /// Reads the full record including payload.
    async fn get(&self, id: Uuid) -> Result<Notification, StoreError>;

    /// Management view over all notifications.
    async fn list(&self) -> Result<Vec<Notification>, StoreError>;

    /// Cancels a notification that is still `Scheduled`. A row past that
    /// state surfaces `CancelTooLate`; an unknown id surfaces `NotFound`.
    async fn cancel(&self, id: Uuid) -> Result<(), StoreError>;

    /// Atomically flips up to `limit` due `Scheduled` rows to `Processing`
    /// and returns them, earliest `scheduled_at` first. Rows locked by a
    /// concurrent reserver are skipped, never waited on, so a given row is
    /// handed to at most one caller.
    async fn reserve_due(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Atomic `retries := retries + 1` with an `updated_at` bump.
    async fn increment_retries(&self, id: Uuid) -> Result<(), StoreError>;

    /// Unconditional status flip with an `updated_at` bump.
    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> Result<(), StoreError>;

    /// Returns `Processing` rows untouched since `older_than` back to
    /// `Scheduled` so a future reservation can pick them up again. Returns
    /// how many rows were released.
    async fn release_overdue(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError>;
}

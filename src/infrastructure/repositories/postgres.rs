use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres};
use uuid::Uuid;

use crate::domain::{
    errors::StoreError,
    models::{
        NewNotification, Notification, NotificationKind, NotificationPayload, NotificationStatus,
    },
    repositories::NotificationRepository,
};

pub type PgPool = Pool<Postgres>;

/// Postgres-backed store. Expected schema:
///
/// ```sql
/// notifications(id uuid primary key, kind text, status text,
///               scheduled_at timestamptz, retries int,
///               created_at timestamptz, updated_at timestamptz)
/// email_payloads(id uuid primary key, notification_id uuid references notifications,
///                email text, subject text, body text)
/// telegram_payloads(id uuid primary key, notification_id uuid references notifications,
///                   chat_id text, body text)
/// ```
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_payload(
        &self,
        id: Uuid,
        kind: NotificationKind,
    ) -> Result<NotificationPayload, StoreError> {
        match kind {
            NotificationKind::Email => {
                let record = sqlx::query_as::<_, EmailPayloadRecord>(
                    r#"SELECT email, subject, body FROM email_payloads WHERE notification_id = $1"#,
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?
                .ok_or_else(|| missing_payload(id, kind))?;
                Ok(NotificationPayload::Email {
                    email: record.email,
                    subject: record.subject,
                    body: record.body,
                })
            }
            NotificationKind::Telegram => {
                let record = sqlx::query_as::<_, TelegramPayloadRecord>(
                    r#"SELECT chat_id, body FROM telegram_payloads WHERE notification_id = $1"#,
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?
                .ok_or_else(|| missing_payload(id, kind))?;
                Ok(NotificationPayload::Telegram {
                    chat_id: record.chat_id,
                    body: record.body,
                })
            }
        }
    }

    async fn hydrate(&self, record: NotificationRecord) -> Result<Notification, StoreError> {
        let kind = NotificationKind::from_str(&record.kind)
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("unknown kind {}", record.kind)))?;
        let payload = self.load_payload(record.id, kind).await?;
        record.into_notification(payload)
    }
}

#[async_trait]
impl NotificationRepository for PostgresRepository {
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let kind = new.payload.kind();

        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            r#"
            INSERT INTO notifications (id, kind, status, scheduled_at, retries, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(NotificationStatus::Scheduled.as_str())
        .bind(new.scheduled_at)
        .bind(0_i32)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        match &new.payload {
            NotificationPayload::Email {
                email,
                subject,
                body,
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO email_payloads (id, notification_id, email, subject, body)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(id)
                .bind(email)
                .bind(subject)
                .bind(body)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            }
            NotificationPayload::Telegram { chat_id, body } => {
                sqlx::query(
                    r#"
                    INSERT INTO telegram_payloads (id, notification_id, chat_id, body)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(id)
                .bind(chat_id)
                .bind(body)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            }
        }

        tx.commit().await.map_err(backend)?;

        Ok(Notification {
            id,
            payload: new.payload,
            status: NotificationStatus::Scheduled,
            scheduled_at: new.scheduled_at,
            retries: 0,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Notification, StoreError> {
        let record = sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT id, kind, status, scheduled_at, retries, created_at, updated_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound(id))?;

        self.hydrate(record).await
    }

    async fn list(&self) -> Result<Vec<Notification>, StoreError> {
        let records = sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT id, kind, status, scheduled_at, retries, created_at, updated_at
            FROM notifications
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut notifications = Vec::with_capacity(records.len());
        for record in records {
            notifications.push(self.hydrate(record).await?);
        }
        Ok(notifications)
    }

    async fn cancel(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(NotificationStatus::Canceled.as_str())
        .bind(id)
        .bind(NotificationStatus::Scheduled.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, bool>(
                r#"SELECT EXISTS(SELECT 1 FROM notifications WHERE id = $1)"#,
            )
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
            return Err(if exists {
                StoreError::CancelTooLate(id)
            } else {
                StoreError::NotFound(id)
            });
        }
        Ok(())
    }

    async fn reserve_due(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, StoreError> {
        // SKIP LOCKED keeps concurrent reservers from blocking on each
        // other while guaranteeing a row goes to exactly one of them.
        let records = sqlx::query_as::<_, NotificationRecord>(
            r#"
            WITH due AS (
                SELECT id
                FROM notifications
                WHERE status = $1
                  AND scheduled_at <= $2
                ORDER BY scheduled_at
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            UPDATE notifications AS n
            SET status = $4, updated_at = NOW()
            FROM due
            WHERE n.id = due.id
            RETURNING n.id, n.kind, n.status, n.scheduled_at, n.retries, n.created_at, n.updated_at
            "#,
        )
        .bind(NotificationStatus::Scheduled.as_str())
        .bind(now)
        .bind(limit)
        .bind(NotificationStatus::Processing.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut reserved = Vec::with_capacity(records.len());
        for record in records {
            reserved.push(self.hydrate(record).await?);
        }
        // UPDATE .. RETURNING does not promise the CTE's ordering.
        reserved.sort_by(|a, b| (a.scheduled_at, a.id).cmp(&(b.scheduled_at, b.id)));
        Ok(reserved)
    }

    async fn increment_retries(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE notifications SET retries = retries + 1, updated_at = NOW() WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE notifications SET status = $1, updated_at = NOW() WHERE id = $2"#)
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn release_overdue(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $1, updated_at = NOW()
            WHERE status = $2 AND updated_at < $3
            "#,
        )
        .bind(NotificationStatus::Scheduled.as_str())
        .bind(NotificationStatus::Processing.as_str())
        .bind(older_than)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected())
    }
}

#[derive(FromRow)]
struct NotificationRecord {
    id: Uuid,
    kind: String,
    status: String,
    scheduled_at: DateTime<Utc>,
    retries: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl NotificationRecord {
    fn into_notification(self, payload: NotificationPayload) -> Result<Notification, StoreError> {
        let status = NotificationStatus::from_str(&self.status).ok_or_else(|| {
            StoreError::Backend(anyhow::anyhow!("unknown status {}", self.status))
        })?;
        Ok(Notification {
            id: self.id,
            payload,
            status,
            scheduled_at: self.scheduled_at,
            retries: self.retries.max(0) as u32,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct EmailPayloadRecord {
    email: String,
    subject: String,
    body: String,
}

#[derive(FromRow)]
struct TelegramPayloadRecord {
    chat_id: String,
    body: String,
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.into())
}

fn missing_payload(id: Uuid, kind: NotificationKind) -> StoreError {
    StoreError::Backend(anyhow::anyhow!(
        "missing {} payload for notification {id}",
        kind.as_str()
    ))
}

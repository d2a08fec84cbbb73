use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::info;
use uuid::Uuid;

use crate::{
    application::services::status::StatusCache, domain::models::NotificationStatus,
};

const STATUS_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Redis-backed status projection. Entries expire after a week; the store
/// remains the authority for anything older.
#[derive(Clone)]
pub struct RedisStatusCache {
    conn: ConnectionManager,
}

impl RedisStatusCache {
    pub async fn connect(addr: &str) -> anyhow::Result<Self> {
        info!("connecting to status cache at {addr}");
        let client = redis::Client::open(addr)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn key(id: Uuid) -> String {
        format!("notification:{id}:status")
    }
}

#[async_trait]
impl StatusCache for RedisStatusCache {
    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(Self::key(id), status.as_str(), STATUS_TTL.as_secs())
            .await?;
        Ok(())
    }

    async fn get_status(&self, id: Uuid) -> anyhow::Result<Option<NotificationStatus>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(Self::key(id)).await?;
        Ok(value.as_deref().and_then(NotificationStatus::from_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_matches_the_agreed_layout() {
        let id = Uuid::nil();
        assert_eq!(
            RedisStatusCache::key(id),
            "notification:00000000-0000-0000-0000-000000000000:status"
        );
    }
}

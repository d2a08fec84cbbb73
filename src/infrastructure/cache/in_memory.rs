use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::services::status::StatusCache, domain::models::NotificationStatus,
};

/// Map-backed cache for tests. No TTL; `clear` stands in for expiry.
#[derive(Default)]
pub struct InMemoryStatusCache {
    entries: RwLock<HashMap<Uuid, NotificationStatus>>,
}

impl InMemoryStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<NotificationStatus> {
        self.entries.read().unwrap().get(&id).copied()
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

#[async_trait]
impl StatusCache for InMemoryStatusCache {
    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> anyhow::Result<()> {
        self.entries.write().unwrap().insert(id, status);
        Ok(())
    }

    async fn get_status(&self, id: Uuid) -> anyhow::Result<Option<NotificationStatus>> {
        Ok(self.get(id))
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    application::services::{event_bus::DispatchQueue, status::StatusProjection},
    domain::{
        events::DispatchEnvelope, models::NotificationStatus,
        repositories::NotificationRepository,
    },
};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub batch_limit: i64,
    /// Window after which a `Processing` row with no progress is returned
    /// to `Scheduled` for another reservation attempt.
    pub visibility_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            batch_limit: 50,
            visibility_timeout: Duration::from_secs(600),
        }
    }
}

/// Periodic dispatcher: every tick reserves due notifications from the
/// store and publishes them to the work broker. Replicas may run
/// concurrently; the store's reservation keeps each row single-owner.
pub struct DispatchScheduler {
    repo: Arc<dyn NotificationRepository>,
    queue: Arc<dyn DispatchQueue>,
    status: StatusProjection,
    config: SchedulerConfig,
}

impl DispatchScheduler {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        queue: Arc<dyn DispatchQueue>,
        status: StatusProjection,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            repo,
            queue,
            status,
            config,
        }
    }

    /// Spawns the tick loop. Cancelling `shutdown` lets a tick in progress
    /// finish, then the task returns.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(interval = ?self.config.tick_interval, "scheduler started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("scheduler stopped");
                        return;
                    }
                    _ = ticker.tick() => self.tick().await,
                }
            }
        })
    }

    pub async fn tick(&self) {
        self.release_overdue().await;

        let due = match self
            .repo
            .reserve_due(self.config.batch_limit, Utc::now())
            .await
        {
            Ok(due) => due,
            Err(err) => {
                error!("failed to reserve due notifications: {err:#}");
                return;
            }
        };
        if due.is_empty() {
            return;
        }
        debug!(count = due.len(), "reserved due notifications");

        for notification in &due {
            let envelope = DispatchEnvelope::from(notification);
            // A failed publish leaves the row in Processing; the reaper
            // returns it to Scheduled after the visibility timeout.
            if let Err(err) = self.queue.publish(&envelope).await {
                error!(id = %notification.id, "failed to publish envelope: {err:#}");
                continue;
            }
            self.status
                .record(notification.id, NotificationStatus::Processing)
                .await;
        }
    }

    async fn release_overdue(&self) {
        let window = chrono::Duration::seconds(self.config.visibility_timeout.as_secs() as i64);
        match self.repo.release_overdue(Utc::now() - window).await {
            Ok(0) => {}
            Ok(released) => info!(released, "returned stuck notifications to the schedule"),
            Err(err) => error!("failed to release stuck notifications: {err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;

    use super::*;
    use crate::{
        domain::models::{NewNotification, NotificationPayload},
        infrastructure::{
            cache::in_memory::InMemoryStatusCache, repositories::in_memory::InMemoryRepository,
        },
    };

    #[derive(Default)]
    struct RecordingQueue {
        published: Mutex<Vec<DispatchEnvelope>>,
        fail_ids: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl DispatchQueue for RecordingQueue {
        async fn publish(&self, envelope: &DispatchEnvelope) -> anyhow::Result<()> {
            if self.fail_ids.lock().unwrap().contains(&envelope.id) {
                anyhow::bail!("broker unavailable");
            }
            self.published.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    fn telegram_at(offset_secs: i64) -> NewNotification {
        NewNotification {
            payload: NotificationPayload::Telegram {
                chat_id: "42".to_string(),
                body: "hi".to_string(),
            },
            scheduled_at: Utc::now() + ChronoDuration::seconds(offset_secs),
        }
    }

    fn scheduler(
        repo: Arc<InMemoryRepository>,
        queue: Arc<RecordingQueue>,
        cache: Arc<InMemoryStatusCache>,
    ) -> DispatchScheduler {
        DispatchScheduler::new(
            repo,
            queue,
            StatusProjection::new(cache),
            SchedulerConfig::default(),
        )
    }

    #[tokio::test]
    async fn tick_publishes_due_and_skips_future() {
        let repo = Arc::new(InMemoryRepository::new());
        let queue = Arc::new(RecordingQueue::default());
        let cache = Arc::new(InMemoryStatusCache::new());

        let due = repo.create(telegram_at(-1)).await.unwrap();
        let future = repo.create(telegram_at(3600)).await.unwrap();

        scheduler(repo.clone(), queue.clone(), cache.clone())
            .tick()
            .await;

        let published = queue.published.lock().unwrap().clone();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, due.id);

        assert_eq!(
            repo.get(due.id).await.unwrap().status,
            NotificationStatus::Processing
        );
        assert_eq!(
            repo.get(future.id).await.unwrap().status,
            NotificationStatus::Scheduled
        );
        assert_eq!(cache.get(due.id), Some(NotificationStatus::Processing));
    }

    #[tokio::test]
    async fn publish_failure_skips_the_message_and_continues() {
        let repo = Arc::new(InMemoryRepository::new());
        let queue = Arc::new(RecordingQueue::default());
        let cache = Arc::new(InMemoryStatusCache::new());

        let first = repo.create(telegram_at(-10)).await.unwrap();
        let second = repo.create(telegram_at(-5)).await.unwrap();
        queue.fail_ids.lock().unwrap().push(first.id);

        scheduler(repo.clone(), queue.clone(), cache)
            .tick()
            .await;

        let published = queue.published.lock().unwrap().clone();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, second.id);

        // Both rows were reserved; the failed publish leaves its row in
        // Processing for the reaper rather than re-publishing it.
        assert_eq!(
            repo.get(first.id).await.unwrap().status,
            NotificationStatus::Processing
        );
    }

    #[tokio::test]
    async fn reaper_returns_stale_processing_rows() {
        let repo = Arc::new(InMemoryRepository::new());
        let queue = Arc::new(RecordingQueue::default());
        let cache = Arc::new(InMemoryStatusCache::new());

        let stuck = repo.create(telegram_at(-120)).await.unwrap();
        repo.set_status(stuck.id, NotificationStatus::Processing)
            .await
            .unwrap();
        repo.backdate_updated_at(stuck.id, ChronoDuration::seconds(3600))
            .await;

        let mut config = SchedulerConfig::default();
        config.visibility_timeout = Duration::from_secs(600);
        let scheduler = DispatchScheduler::new(
            repo.clone(),
            queue.clone(),
            StatusProjection::new(cache),
            config,
        );
        scheduler.tick().await;

        // Released back to Scheduled and immediately re-reserved in the
        // same tick, so it reaches the queue again.
        let published = queue.published.lock().unwrap().clone();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, stuck.id);
        assert_eq!(
            repo.get(stuck.id).await.unwrap().status,
            NotificationStatus::Processing
        );
    }

    #[tokio::test]
    async fn start_and_stop_round_trip() {
        let repo = Arc::new(InMemoryRepository::new());
        let queue = Arc::new(RecordingQueue::default());
        let cache = Arc::new(InMemoryStatusCache::new());

        repo.create(telegram_at(-1)).await.unwrap();

        let mut config = SchedulerConfig::default();
        config.tick_interval = Duration::from_millis(20);
        let scheduler = Arc::new(DispatchScheduler::new(
            repo,
            queue.clone(),
            StatusProjection::new(cache),
            config,
        ));

        let shutdown = CancellationToken::new();
        let handle = scheduler.start(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(queue.published.lock().unwrap().len(), 1);
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::{Notification, NotificationKind, NotificationPayload};

/// Snapshot of a notification as carried through the work broker from a
/// scheduler to a worker. Serialized as JSON; a consumer that cannot decode
/// an envelope drops it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchEnvelope {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub payload: NotificationPayload,
    pub retries: u32,
}

impl From<&Notification> for DispatchEnvelope {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind(),
            payload: notification.payload.clone(),
            retries: notification.retries,
        }
    }
}

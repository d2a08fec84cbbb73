use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Email,
    Telegram,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Email => "email",
            NotificationKind::Telegram => "telegram",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "email" => Some(NotificationKind::Email),
            "telegram" => Some(NotificationKind::Telegram),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Scheduled,
    Processing,
    Sent,
    Failed,
    Canceled,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Scheduled => "scheduled",
            NotificationStatus::Processing => "processing",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(NotificationStatus::Scheduled),
            "processing" => Some(NotificationStatus::Processing),
            "sent" => Some(NotificationStatus::Sent),
            "failed" => Some(NotificationStatus::Failed),
            "canceled" => Some(NotificationStatus::Canceled),
            _ => None,
        }
    }

    /// Sent, Failed and Canceled accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Sent | NotificationStatus::Failed | NotificationStatus::Canceled
        )
    }
}

/// Channel-specific delivery parameters. The store keeps one payload table
/// per kind; in memory the kind and its fields travel together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPayload {
    Email {
        email: String,
        subject: String,
        body: String,
    },
    Telegram {
        chat_id: String,
        body: String,
    },
}

impl NotificationPayload {
    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationPayload::Email { .. } => NotificationKind::Email,
            NotificationPayload::Telegram { .. } => NotificationKind::Telegram,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub payload: NotificationPayload,
    pub status: NotificationStatus,
    pub scheduled_at: DateTime<Utc>,
    pub retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        self.payload.kind()
    }
}

/// Submission input: everything the caller decides. Id, status, retries and
/// the audit timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub payload: NotificationPayload,
    pub scheduled_at: DateTime<Utc>,
}

use poem_openapi::Enum;

use crate::domain::models::{NotificationKind, NotificationStatus};

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum NotificationKindDto {
    #[oai(rename = "email")]
    Email,
    #[oai(rename = "telegram")]
    Telegram,
}

impl From<NotificationKindDto> for NotificationKind {
    fn from(value: NotificationKindDto) -> Self {
        match value {
            NotificationKindDto::Email => NotificationKind::Email,
            NotificationKindDto::Telegram => NotificationKind::Telegram,
        }
    }
}

impl From<NotificationKind> for NotificationKindDto {
    fn from(value: NotificationKind) -> Self {
        match value {
            NotificationKind::Email => NotificationKindDto::Email,
            NotificationKind::Telegram => NotificationKindDto::Telegram,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum NotificationStatusDto {
    #[oai(rename = "scheduled")]
    Scheduled,
    #[oai(rename = "processing")]
    Processing,
    #[oai(rename = "sent")]
    Sent,
    #[oai(rename = "failed")]
    Failed,
    #[oai(rename = "canceled")]
    Canceled,
}

impl From<NotificationStatus> for NotificationStatusDto {
    fn from(value: NotificationStatus) -> Self {
        match value {
            NotificationStatus::Scheduled => NotificationStatusDto::Scheduled,
            NotificationStatus::Processing => NotificationStatusDto::Processing,
            NotificationStatus::Sent => NotificationStatusDto::Sent,
            NotificationStatus::Failed => NotificationStatusDto::Failed,
            NotificationStatus::Canceled => NotificationStatusDto::Canceled,
        }
    }
}

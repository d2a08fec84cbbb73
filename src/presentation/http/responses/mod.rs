use poem_openapi::Object;
use uuid::Uuid;

use crate::presentation::models::{NotificationKindDto, NotificationStatusDto};

#[derive(Object)]
pub struct CreateNotificationResponseDto {
    pub id: Uuid,
}

#[derive(Object)]
pub struct NotificationDto {
    pub id: Uuid,
    pub kind: NotificationKindDto,
    pub status: NotificationStatusDto,
    pub email: Option<String>,
    pub chat_id: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub scheduled_at: String,
    pub retries: u32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Object)]
pub struct StatusResponseDto {
    pub status: NotificationStatusDto,
}

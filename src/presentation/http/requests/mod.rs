use chrono::{DateTime, Utc};
use poem_openapi::Object;

use crate::presentation::models::NotificationKindDto;

#[derive(Object, Debug)]
pub struct CreateNotificationRequestDto {
    pub kind: NotificationKindDto,
    /// Recipient address; required when `kind` is `email`.
    pub email: Option<String>,
    /// Chat identifier; required when `kind` is `telegram`.
    pub chat_id: Option<String>,
    pub subject: Option<String>,
    #[oai(validator(min_length = 1, max_length = 4096))]
    pub message: String,
    pub scheduled_at: DateTime<Utc>,
}

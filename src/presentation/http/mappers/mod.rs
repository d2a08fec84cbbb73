use crate::{
    domain::models::{Notification, NotificationPayload},
    presentation::http::responses::NotificationDto,
};

pub fn map_notification(notification: &Notification) -> NotificationDto {
    let (email, chat_id, subject, message) = match &notification.payload {
        NotificationPayload::Email {
            email,
            subject,
            body,
        } => (
            Some(email.clone()),
            None,
            Some(subject.clone()),
            body.clone(),
        ),
        NotificationPayload::Telegram { chat_id, body } => {
            (None, Some(chat_id.clone()), None, body.clone())
        }
    };

    NotificationDto {
        id: notification.id,
        kind: notification.kind().into(),
        status: notification.status.into(),
        email,
        chat_id,
        subject,
        message,
        scheduled_at: notification.scheduled_at.to_rfc3339(),
        retries: notification.retries,
        created_at: notification.created_at.to_rfc3339(),
        updated_at: notification.updated_at.to_rfc3339(),
    }
}

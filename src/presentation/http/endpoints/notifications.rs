use std::sync::Arc;

use chrono::Utc;
use poem::Result as PoemResult;
use poem_openapi::{OpenApi, param::Path, payload::Json};

use crate::{
    domain::{
        errors::StoreError,
        models::{NewNotification, NotificationPayload},
    },
    presentation::{
        http::{
            endpoints::root::{ApiState, EndpointsTags},
            mappers::map_notification,
            requests::CreateNotificationRequestDto,
            responses::{CreateNotificationResponseDto, NotificationDto, StatusResponseDto},
        },
        models::NotificationKindDto,
    },
};

#[derive(Clone)]
pub struct NotificationEndpoints {
    state: Arc<ApiState>,
}

impl NotificationEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl NotificationEndpoints {
    #[oai(
        path = "/notifications",
        method = "post",
        tag = EndpointsTags::Notifications,
    )]
    pub async fn create(
        &self,
        request: Json<CreateNotificationRequestDto>,
    ) -> PoemResult<Json<CreateNotificationResponseDto>> {
        let payload = build_payload(&request)?;

        if request.scheduled_at <= Utc::now() {
            return Err(bad_request("scheduled_at cannot be in the past"));
        }

        let created = self
            .state
            .notifications
            .create(NewNotification {
                payload,
                scheduled_at: request.scheduled_at,
            })
            .await
            .map_err(map_store_error)?;

        Ok(Json(CreateNotificationResponseDto { id: created.id }))
    }

    #[oai(
        path = "/notifications",
        method = "get",
        tag = EndpointsTags::Notifications,
    )]
    pub async fn list(&self) -> PoemResult<Json<Vec<NotificationDto>>> {
        let notifications = self
            .state
            .notifications
            .list()
            .await
            .map_err(map_store_error)?;

        Ok(Json(notifications.iter().map(map_notification).collect()))
    }

    #[oai(
        path = "/notifications/:id",
        method = "get",
        tag = EndpointsTags::Notifications,
    )]
    pub async fn get(&self, id: Path<uuid::Uuid>) -> PoemResult<Json<NotificationDto>> {
        let notification = self
            .state
            .notifications
            .get(id.0)
            .await
            .map_err(map_store_error)?;

        Ok(Json(map_notification(&notification)))
    }

    #[oai(
        path = "/notifications/:id/status",
        method = "get",
        tag = EndpointsTags::Notifications,
    )]
    pub async fn status(&self, id: Path<uuid::Uuid>) -> PoemResult<Json<StatusResponseDto>> {
        let status = self
            .state
            .notifications
            .status(id.0)
            .await
            .map_err(map_store_error)?;

        Ok(Json(StatusResponseDto {
            status: status.into(),
        }))
    }

    #[oai(
        path = "/notifications/:id",
        method = "delete",
        tag = EndpointsTags::Notifications,
    )]
    pub async fn cancel(&self, id: Path<uuid::Uuid>) -> PoemResult<()> {
        self.state
            .notifications
            .cancel(id.0)
            .await
            .map_err(map_store_error)?;

        Ok(())
    }
}

fn build_payload(request: &CreateNotificationRequestDto) -> PoemResult<NotificationPayload> {
    match request.kind {
        NotificationKindDto::Email => {
            let email = request
                .email
                .clone()
                .filter(|email| !email.is_empty())
                .ok_or_else(|| bad_request("email is required for email notifications"))?;
            Ok(NotificationPayload::Email {
                email,
                subject: request.subject.clone().unwrap_or_default(),
                body: request.message.clone(),
            })
        }
        NotificationKindDto::Telegram => {
            let chat_id = request
                .chat_id
                .clone()
                .filter(|chat_id| !chat_id.is_empty())
                .ok_or_else(|| bad_request("chat_id is required for telegram notifications"))?;
            Ok(NotificationPayload::Telegram {
                chat_id,
                body: request.message.clone(),
            })
        }
    }
}

fn bad_request(message: &str) -> poem::Error {
    poem::Error::from_string(message.to_string(), poem::http::StatusCode::BAD_REQUEST)
}

fn map_store_error(err: StoreError) -> poem::Error {
    let status = match &err {
        StoreError::NotFound(_) => poem::http::StatusCode::NOT_FOUND,
        StoreError::CancelTooLate(_) => poem::http::StatusCode::CONFLICT,
        StoreError::Backend(_) => poem::http::StatusCode::INTERNAL_SERVER_ERROR,
    };
    poem::Error::from_string(err.to_string(), status)
}

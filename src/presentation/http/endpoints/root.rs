use std::sync::Arc;

use poem_openapi::Tags;

use crate::application::services::notifications::NotificationService;

#[derive(Clone)]
pub struct ApiState {
    pub notifications: Arc<NotificationService>,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Notifications,
}
